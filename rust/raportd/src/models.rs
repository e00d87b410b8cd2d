use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Subject placement on the report card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectCategory {
    Wajib,
    Pilihan,
    Mulok,
}

impl SubjectCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectCategory::Wajib => "Wajib",
            SubjectCategory::Pilihan => "Pilihan",
            SubjectCategory::Mulok => "Mulok",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Wajib" => Some(SubjectCategory::Wajib),
            "Pilihan" => Some(SubjectCategory::Pilihan),
            "Mulok" => Some(SubjectCategory::Mulok),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    L,
    P,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::L => "L",
            Gender::P => "P",
        }
    }

    /// `P` in any case is female; anything else falls back to `L`.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("p") {
            Gender::P
        } else {
            Gender::L
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Headmaster,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Headmaster => "headmaster",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "headmaster" => Some(Role::Headmaster),
            _ => None,
        }
    }
}

macro_rules! text_enum_sql {
    ($ty:ty, $what:literal) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                <$ty>::parse(raw).ok_or_else(|| {
                    FromSqlError::Other(format!("unknown {}: {}", $what, raw).into())
                })
            }
        }
    };
}

text_enum_sql!(SubjectCategory, "subject category");
text_enum_sql!(Role, "role");

impl ToSql for Gender {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Gender {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(Gender::parse_lenient(value.as_str()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub nip: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassData {
    pub id: String,
    pub name: String,
    pub teacher_id: String,
    pub fase: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub nis: String,
    pub nisn: String,
    pub class_id: String,
    pub gender: Gender,
    pub birth_date: String,
    pub birth_place: String,
    pub religion: String,
    pub previous_education: String,
    pub student_address: String,
}

impl Student {
    /// First whitespace-delimited token of the full name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ParentAddress {
    pub street: String,
    pub village: String,
    pub district: String,
    pub city: String,
    pub province: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentFamilyData {
    pub student_id: String,
    pub father_name: String,
    pub father_job: String,
    pub mother_name: String,
    pub mother_job: String,
    pub parent_address: ParentAddress,
    pub parent_phone: String,
    pub guardian_name: String,
    pub guardian_job: String,
    pub guardian_address: String,
    pub guardian_phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub category: SubjectCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningObjective {
    pub id: String,
    pub code: String,
    pub description: String,
    pub subject_id: String,
    pub class_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradePredicate {
    pub id: String,
    pub threshold: i64,
    pub description: String,
}

/// Learning-objective scores keyed by objective id.
///
/// Keys keep the order they were first inserted in. Extreme-objective
/// selection picks the first key holding the extreme score, so the order
/// is part of the data and survives JSON round trips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TpGrades(Vec<(String, Option<f64>)>);

impl TpGrades {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, objective_id: &str) -> Option<Option<f64>> {
        self.0
            .iter()
            .find(|(id, _)| id == objective_id)
            .map(|(_, score)| *score)
    }

    /// Replaces the score in place when the key exists, appends otherwise.
    pub fn insert(&mut self, objective_id: impl Into<String>, score: Option<f64>) {
        let objective_id = objective_id.into();
        match self.0.iter_mut().find(|(id, _)| *id == objective_id) {
            Some(slot) => slot.1 = score,
            None => self.0.push((objective_id, score)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.0.iter().map(|(id, score)| (id.as_str(), *score))
    }

    /// Entries that carry a score, in key order.
    pub fn scored(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0
            .iter()
            .filter_map(|(id, score)| score.map(|s| (id.as_str(), s)))
    }
}

impl<K: Into<String>> FromIterator<(K, Option<f64>)> for TpGrades {
    fn from_iter<T: IntoIterator<Item = (K, Option<f64>)>>(iter: T) -> Self {
        let mut out = TpGrades::new();
        for (id, score) in iter {
            out.insert(id, score);
        }
        out
    }
}

/// Writes a score so whole values come back as the integers clients sent.
struct ScoreOut(Option<f64>);

impl Serialize for ScoreOut {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            None => serializer.serialize_none(),
            Some(x) if x.fract() == 0.0 && x.abs() < 1e15 => serializer.serialize_i64(x as i64),
            Some(x) => serializer.serialize_f64(x),
        }
    }
}

fn serialize_score<S: Serializer>(score: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    ScoreOut(*score).serialize(serializer)
}

fn serialize_scores<S: Serializer>(scores: &[Option<f64>], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(scores.iter().map(|s| ScoreOut(*s)))
}

impl Serialize for TpGrades {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, score) in &self.0 {
            map.serialize_entry(id, &ScoreOut(*score))?;
        }
        map.end()
    }
}

struct TpGradesVisitor;

impl<'de> Visitor<'de> for TpGradesVisitor {
    type Value = TpGrades;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping learning objective ids to scores or null")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = TpGrades::new();
        while let Some((id, score)) = access.next_entry::<String, Option<f64>>()? {
            out.insert(id, score);
        }
        Ok(out)
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(TpGrades::new())
    }
}

impl<'de> Deserialize<'de> for TpGrades {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TpGradesVisitor)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentSubjectGrade {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub class_id: String,
    pub tp_grades: TpGrades,
    #[serde(serialize_with = "serialize_scores")]
    pub summative_grades: Vec<Option<f64>>,
    #[serde(serialize_with = "serialize_score")]
    pub final_exam_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Extracurricular {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtracurricularPredicate {
    pub id: String,
    pub extracurricular_id: String,
    pub predicate: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentExtracurricular {
    pub id: String,
    pub student_id: String,
    pub extracurricular_id: String,
    pub predicate: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentAttendance {
    pub student_id: String,
    pub present: i64,
    pub permitted: i64,
    pub unpermitted: i64,
    pub teacher_note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentCoCurricular {
    pub student_id: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tp_grades_keep_insertion_order_through_json() {
        let raw = r#"{"lo-9": 70, "lo-1": null, "lo-5": 90}"#;
        let parsed: TpGrades = serde_json::from_str(raw).expect("parse");
        let keys: Vec<&str> = parsed.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["lo-9", "lo-1", "lo-5"]);

        let back = serde_json::to_string(&parsed).expect("serialize");
        assert_eq!(back, r#"{"lo-9":70,"lo-1":null,"lo-5":90}"#);
    }

    #[test]
    fn whole_scores_serialize_as_integers() {
        let grade = StudentSubjectGrade {
            tp_grades: vec![("lo-1", Some(70.0)), ("lo-2", Some(88.5))].into_iter().collect(),
            summative_grades: vec![Some(80.0), None],
            final_exam_score: Some(90.0),
            ..StudentSubjectGrade::default()
        };
        let v = serde_json::to_value(&grade).expect("serialize");
        assert_eq!(v["tpGrades"], json!({ "lo-1": 70, "lo-2": 88.5 }));
        assert_eq!(v["summativeGrades"], json!([80, null]));
        assert_eq!(v["finalExamScore"], json!(90));

        let back: StudentSubjectGrade = serde_json::from_value(v).expect("parse");
        assert_eq!(back, grade);
    }

    #[test]
    fn tp_grades_order_survives_value_params() {
        let params = json!({ "tpGrades": { "b": 1, "a": 2, "c": 3 } });
        let grade: StudentSubjectGrade = serde_json::from_value(params).expect("grade");
        let keys: Vec<&str> = grade.tp_grades.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn tp_grades_insert_replaces_in_place() {
        let mut g: TpGrades = vec![("x", Some(1.0)), ("y", Some(2.0))].into_iter().collect();
        g.insert("x", None);
        assert_eq!(g.get("x"), Some(None));
        assert_eq!(g.iter().next().map(|(k, _)| k), Some("x"));
        assert_eq!(g.iter().count(), 2);
    }

    #[test]
    fn first_name_is_first_token() {
        let s = Student {
            name: "  Adi Saputra".into(),
            ..Student::default()
        };
        assert_eq!(s.first_name(), "Adi");
        assert_eq!(Student::default().first_name(), "");
    }

    #[test]
    fn gender_is_lenient() {
        assert_eq!(Gender::parse_lenient("p"), Gender::P);
        assert_eq!(Gender::parse_lenient("x"), Gender::L);
    }
}
