//! Report-card assembly: one denormalized record per student.
//!
//! Everything is borrowed from a caller-supplied snapshot. Unresolvable
//! references never fail the build; they degrade to placeholders.

use crate::calc::{self, Extreme};
use crate::models::{
    Extracurricular, ExtracurricularPredicate, GradePredicate, LearningObjective, Student,
    StudentAttendance, StudentCoCurricular, StudentExtracurricular, StudentFamilyData,
    StudentSubjectGrade, Subject, SubjectCategory,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PLACEHOLDER_NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    Identity,
    Grades,
}

impl ReportMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "identity" => Some(ReportMode::Identity),
            "grades" => Some(ReportMode::Grades),
            _ => None,
        }
    }
}

/// The three school-profile phrases the subject narrative is built from.
#[derive(Debug, Clone, Copy)]
pub struct NarrativeTemplate<'a> {
    pub prefix: &'a str,
    pub highest_phrase: &'a str,
    pub lowest_phrase: &'a str,
}

impl NarrativeTemplate<'_> {
    pub fn render(&self, first_name: &str, highest: &str, lowest: &str) -> String {
        format!(
            "{} {} {} {}. {} {}.",
            self.prefix, first_name, self.highest_phrase, highest, self.lowest_phrase, lowest
        )
    }
}

/// Lookup tables shared by every student of one report run.
#[derive(Debug, Clone, Copy)]
pub struct ReportSources<'a> {
    pub subjects: &'a [Subject],
    pub learning_objectives: &'a [LearningObjective],
    pub grade_predicates: &'a [GradePredicate],
    pub extracurriculars: &'a [Extracurricular],
    pub extracurricular_predicates: &'a [ExtracurricularPredicate],
    pub families: &'a [StudentFamilyData],
    pub grades: &'a [StudentSubjectGrade],
    pub attendances: &'a [StudentAttendance],
    pub co_curriculars: &'a [StudentCoCurricular],
    pub student_extracurriculars: &'a [StudentExtracurricular],
}

/// Activity names and predicate descriptions keyed for total lookup.
///
/// On duplicate keys the first row wins.
#[derive(Debug, Clone, Default)]
pub struct ExtracurricularLookup<'a> {
    names: HashMap<&'a str, &'a str>,
    descriptions: HashMap<&'a str, HashMap<&'a str, &'a str>>,
}

impl<'a> ExtracurricularLookup<'a> {
    pub fn new(
        extracurriculars: &'a [Extracurricular],
        predicates: &'a [ExtracurricularPredicate],
    ) -> Self {
        let mut names = HashMap::new();
        for e in extracurriculars {
            names.entry(e.id.as_str()).or_insert(e.name.as_str());
        }
        let mut descriptions: HashMap<&'a str, HashMap<&'a str, &'a str>> = HashMap::new();
        for p in predicates {
            descriptions
                .entry(p.extracurricular_id.as_str())
                .or_default()
                .entry(p.predicate.as_str())
                .or_insert(p.description.as_str());
        }
        Self {
            names,
            descriptions,
        }
    }

    pub fn from_sources(sources: &ReportSources<'a>) -> Self {
        Self::new(sources.extracurriculars, sources.extracurricular_predicates)
    }

    pub fn name(&self, extracurricular_id: &str) -> &'a str {
        self.names
            .get(extracurricular_id)
            .copied()
            .unwrap_or(PLACEHOLDER_NOT_AVAILABLE)
    }

    pub fn description(&self, extracurricular_id: &str, predicate: &str) -> &'a str {
        self.descriptions
            .get(extracurricular_id)
            .and_then(|by_letter| by_letter.get(predicate))
            .copied()
            .unwrap_or(calc::PLACEHOLDER_DASH)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGradeLine {
    pub subject: Subject,
    pub final_score: i64,
    pub predicate: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradesByCategory {
    pub wajib: Vec<SubjectGradeLine>,
    pub pilihan: Vec<SubjectGradeLine>,
    pub mulok: Vec<SubjectGradeLine>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtracurricularLine {
    pub name: String,
    pub predicate: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub mode: ReportMode,
    pub student: Student,
    pub family_data: Option<StudentFamilyData>,
    pub grades_by_category: GradesByCategory,
    pub attendance: Option<StudentAttendance>,
    pub co_curricular: Option<StudentCoCurricular>,
    pub extracurricular_entries: Vec<ExtracurricularLine>,
    pub teacher_note: String,
}

/// Display-order key: leading digits of the last `-` segment of the id.
///
/// `subject-10` sorts after `subject-9`; ids without a hyphen or without
/// digits there share key 0. Ids from `db::next_subject_id` have exactly one
/// hyphen, so the last segment is also the second one.
pub fn subject_order_key(subject_id: &str) -> i64 {
    let Some((_, tail)) = subject_id.rsplit_once('-') else {
        return 0;
    };
    let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().unwrap_or(0)
}

fn sort_for_print(lines: &mut [SubjectGradeLine]) {
    lines.sort_by_key(|l| subject_order_key(&l.subject.id));
}

/// Builds the report record for `student` in `class_id`.
///
/// Pure: the same sources produce the same record, nothing is written.
/// `lookup` is built once from `sources` and shared across a class run.
pub fn build_report(
    sources: &ReportSources<'_>,
    lookup: &ExtracurricularLookup<'_>,
    template: &NarrativeTemplate<'_>,
    student: &Student,
    class_id: &str,
    mode: ReportMode,
) -> ReportRecord {
    let first_name = student.first_name();

    let mut grades = GradesByCategory::default();
    for g in sources
        .grades
        .iter()
        .filter(|g| g.student_id == student.id && g.class_id == class_id)
    {
        let Some(subject) = sources.subjects.iter().find(|s| s.id == g.subject_id) else {
            continue;
        };
        let final_score = calc::compute_final_score(g);
        let highest =
            calc::extreme_objective_description(g, sources.learning_objectives, Extreme::Highest);
        let lowest =
            calc::extreme_objective_description(g, sources.learning_objectives, Extreme::Lowest);
        let line = SubjectGradeLine {
            subject: subject.clone(),
            final_score,
            predicate: calc::grade_predicate(final_score, sources.grade_predicates).to_string(),
            description: template.render(first_name, highest, lowest),
        };
        match subject.category {
            SubjectCategory::Wajib => grades.wajib.push(line),
            SubjectCategory::Pilihan => grades.pilihan.push(line),
            SubjectCategory::Mulok => grades.mulok.push(line),
        }
    }
    sort_for_print(&mut grades.wajib);
    sort_for_print(&mut grades.pilihan);
    sort_for_print(&mut grades.mulok);

    let attendance = sources
        .attendances
        .iter()
        .find(|a| a.student_id == student.id)
        .cloned();
    let co_curricular = sources
        .co_curriculars
        .iter()
        .find(|c| c.student_id == student.id)
        .cloned();
    let family_data = sources
        .families
        .iter()
        .find(|f| f.student_id == student.id)
        .cloned();

    let extracurricular_entries = sources
        .student_extracurriculars
        .iter()
        .filter(|e| e.student_id == student.id)
        .map(|e| ExtracurricularLine {
            name: lookup.name(&e.extracurricular_id).to_string(),
            predicate: e.predicate.clone(),
            description: lookup
                .description(&e.extracurricular_id, &e.predicate)
                .to_string(),
        })
        .collect();

    let teacher_note = attendance
        .as_ref()
        .map(|a| a.teacher_note.clone())
        .unwrap_or_default();

    ReportRecord {
        mode,
        student: student.clone(),
        family_data,
        grades_by_category: grades,
        attendance,
        co_curricular,
        extracurricular_entries,
        teacher_note,
    }
}
