//! Score aggregation for one student in one subject.
//!
//! Scores are assumed to be validated at the IPC boundary: every present
//! value is a number in `[0, 100]`. Nothing in here fails; missing data
//! degrades to `0` or to one of the placeholder constants.

use crate::models::{GradePredicate, LearningObjective, StudentSubjectGrade};

/// Used when no predicate threshold is at or below the score.
pub const DEFAULT_PREDICATE: &str = "Perlu Bimbingan";

pub const PLACEHOLDER_DASH: &str = "-";

/// Grade-entry sheet text for a subject with no TP score yet.
pub const NOT_GRADED_NOTE: &str = "Belum ada nilai TP yang diisi.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Highest,
    Lowest,
}

/// The three averaged components that feed the final score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreComponents {
    pub tp_average: f64,
    pub summative_average: f64,
    pub final_exam: f64,
}

/// Half-up rounding (`floor(x + 0.5)`), same as the report card has always
/// printed for non-negative scores.
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

fn mean_of_present<I>(scores: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for s in scores.into_iter().flatten() {
        sum += s;
        count += 1;
    }
    if count > 0 {
        sum / (count as f64)
    } else {
        0.0
    }
}

pub fn score_components(grade: &StudentSubjectGrade) -> ScoreComponents {
    ScoreComponents {
        tp_average: mean_of_present(grade.tp_grades.iter().map(|(_, s)| s)),
        summative_average: mean_of_present(grade.summative_grades.iter().copied()),
        final_exam: grade.final_exam_score.unwrap_or(0.0),
    }
}

/// Final subject score in `[0, 100]`.
///
/// Components equal to zero are dropped before averaging, so an earned 0
/// counts the same as "not graded yet". Report cards printed so far rely on
/// this, keep it.
pub fn compute_final_score(grade: &StudentSubjectGrade) -> i64 {
    let c = score_components(grade);
    let counted: Vec<f64> = [c.tp_average, c.summative_average, c.final_exam]
        .into_iter()
        .filter(|s| *s > 0.0)
        .collect();
    if counted.is_empty() {
        return 0;
    }
    let mean = counted.iter().sum::<f64>() / (counted.len() as f64);
    round_half_up(mean).clamp(0, 100)
}

/// Description of the highest predicate whose threshold is `<= score`.
///
/// Thresholds are compared highest first; equal thresholds keep their input
/// order.
pub fn grade_predicate(score: i64, predicates: &[GradePredicate]) -> &str {
    let mut sorted: Vec<&GradePredicate> = predicates.iter().collect();
    sorted.sort_by(|a, b| b.threshold.cmp(&a.threshold));
    sorted
        .into_iter()
        .find(|p| p.threshold <= score)
        .map(|p| p.description.as_str())
        .unwrap_or(DEFAULT_PREDICATE)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectivePick<'a> {
    /// No TP entry has a score.
    NotGraded,
    /// The winning id has no objective for this subject/class.
    Unknown,
    Found(&'a LearningObjective),
}

/// Objective holding the highest (or lowest) TP score.
///
/// The first key in `tp_grades` order that carries the extreme score wins.
pub fn pick_extreme_objective<'a>(
    grade: &StudentSubjectGrade,
    objectives: &'a [LearningObjective],
    extreme: Extreme,
) -> ObjectivePick<'a> {
    let mut target: Option<f64> = None;
    for (_, score) in grade.tp_grades.scored() {
        target = Some(match (target, extreme) {
            (None, _) => score,
            (Some(t), Extreme::Highest) => t.max(score),
            (Some(t), Extreme::Lowest) => t.min(score),
        });
    }
    let Some(target) = target else {
        return ObjectivePick::NotGraded;
    };

    let winner = grade
        .tp_grades
        .scored()
        .find(|(_, score)| *score == target)
        .map(|(id, _)| id);

    winner
        .and_then(|id| {
            objectives.iter().find(|lo| {
                lo.id == id && lo.subject_id == grade.subject_id && lo.class_id == grade.class_id
            })
        })
        .map(ObjectivePick::Found)
        .unwrap_or(ObjectivePick::Unknown)
}

/// Report-card text for the extreme objective; `"-"` when there is none.
pub fn extreme_objective_description<'a>(
    grade: &StudentSubjectGrade,
    objectives: &'a [LearningObjective],
    extreme: Extreme,
) -> &'a str {
    match pick_extreme_objective(grade, objectives, extreme) {
        ObjectivePick::Found(lo) => lo.description.as_str(),
        ObjectivePick::NotGraded | ObjectivePick::Unknown => PLACEHOLDER_DASH,
    }
}
