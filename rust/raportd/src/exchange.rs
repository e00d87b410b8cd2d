//! Student roster CSV export/import.

use crate::db;
use crate::models::{Gender, ParentAddress, Student, StudentFamilyData};
use anyhow::Context;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

pub const STUDENT_CSV_COLUMNS: [&str; 24] = [
    "class_name",
    "name",
    "nis",
    "nisn",
    "gender",
    "birthPlace",
    "birthDate",
    "religion",
    "previousEducation",
    "studentAddress",
    "fatherName",
    "fatherJob",
    "motherName",
    "motherJob",
    "parentPhone",
    "parent_street",
    "parent_village",
    "parent_district",
    "parent_city",
    "parent_province",
    "guardianName",
    "guardianJob",
    "guardianAddress",
    "guardianPhone",
];

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    out.push(buf);
    out
}

/// Physical lines joined into records, so quoted cells may span lines.
/// Each record carries the 1-based line it starts on.
fn csv_records(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let (start, mut record) = match pending.take() {
            Some((start, mut acc)) => {
                acc.push('\n');
                (start, acc)
            }
            None => (idx + 1, String::new()),
        };
        record.push_str(line);
        if record.matches('"').count() % 2 == 1 {
            pending = Some((start, record));
        } else {
            out.push((start, record));
        }
    }
    if let Some(rest) = pending {
        out.push(rest);
    }
    out
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImportWarning {
    pub line: usize,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub warnings: Vec<ImportWarning>,
}

pub fn students_csv(conn: &Connection) -> anyhow::Result<(String, usize)> {
    let class_names: HashMap<String, String> = db::list_classes(conn, None)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let families: HashMap<String, StudentFamilyData> = db::list_families(conn, None)?
        .into_iter()
        .map(|f| (f.student_id.clone(), f))
        .collect();

    let mut students = db::list_students(conn, None)?;
    students.sort_by(|a, b| {
        let ca = class_names.get(&a.class_id).map(String::as_str).unwrap_or("");
        let cb = class_names.get(&b.class_id).map(String::as_str).unwrap_or("");
        ca.cmp(cb).then_with(|| a.name.cmp(&b.name))
    });

    let empty = StudentFamilyData::default();
    let mut csv = STUDENT_CSV_COLUMNS.join(",");
    csv.push('\n');
    for s in &students {
        let f = families.get(&s.id).unwrap_or(&empty);
        let class_name = class_names.get(&s.class_id).map(String::as_str).unwrap_or("");
        let cells: [&str; 24] = [
            class_name,
            &s.name,
            &s.nis,
            &s.nisn,
            s.gender.as_str(),
            &s.birth_place,
            &s.birth_date,
            &s.religion,
            &s.previous_education,
            &s.student_address,
            &f.father_name,
            &f.father_job,
            &f.mother_name,
            &f.mother_job,
            &f.parent_phone,
            &f.parent_address.street,
            &f.parent_address.village,
            &f.parent_address.district,
            &f.parent_address.city,
            &f.parent_address.province,
            &f.guardian_name,
            &f.guardian_job,
            &f.guardian_address,
            &f.guardian_phone,
        ];
        let line: Vec<String> = cells.iter().map(|c| csv_quote(c)).collect();
        csv.push_str(&line.join(","));
        csv.push('\n');
    }
    Ok((csv, students.len()))
}

pub fn export_students(conn: &Connection, out_path: &Path) -> anyhow::Result<usize> {
    let (csv, rows) = students_csv(conn)?;
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.to_string_lossy()))?;
    }
    std::fs::write(out_path, csv)
        .with_context(|| format!("failed to write {}", out_path.to_string_lossy()))?;
    Ok(rows)
}

/// One parsed data row, keyed by header name.
struct CsvRow<'a> {
    cells: &'a [String],
    columns: &'a HashMap<String, usize>,
}

impl CsvRow<'_> {
    fn get(&self, column: &str) -> String {
        self.columns
            .get(column)
            .and_then(|i| self.cells.get(*i))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

fn row_to_student(row: &CsvRow<'_>, class_id: &str) -> (Student, StudentFamilyData) {
    let id = db::new_id();
    let student = Student {
        id: id.clone(),
        name: row.get("name"),
        nis: row.get("nis"),
        nisn: row.get("nisn"),
        class_id: class_id.to_string(),
        gender: Gender::parse_lenient(&row.get("gender")),
        birth_date: row.get("birthDate"),
        birth_place: row.get("birthPlace"),
        religion: row.get("religion"),
        previous_education: row.get("previousEducation"),
        student_address: row.get("studentAddress"),
    };
    let family = StudentFamilyData {
        student_id: id,
        father_name: row.get("fatherName"),
        father_job: row.get("fatherJob"),
        mother_name: row.get("motherName"),
        mother_job: row.get("motherJob"),
        parent_address: ParentAddress {
            street: row.get("parent_street"),
            village: row.get("parent_village"),
            district: row.get("parent_district"),
            city: row.get("parent_city"),
            province: row.get("parent_province"),
        },
        parent_phone: row.get("parentPhone"),
        guardian_name: row.get("guardianName"),
        guardian_job: row.get("guardianJob"),
        guardian_address: row.get("guardianAddress"),
        guardian_phone: row.get("guardianPhone"),
    };
    (student, family)
}

pub fn import_students_text(conn: &Connection, text: &str) -> anyhow::Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let records = csv_records(text);
    let mut it = records
        .iter()
        .filter(|(_, r)| !r.trim().is_empty());
    let Some((_, header)) = it.next() else {
        return Ok(summary);
    };
    let columns: HashMap<String, usize> = parse_csv_record(header)
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name.trim().trim_start_matches('\u{feff}').to_string(), i))
        .collect();

    let mut class_ids: HashMap<String, String> = HashMap::new();
    for c in db::list_classes(conn, None)? {
        class_ids.entry(c.name.trim().to_string()).or_insert(c.id);
    }

    let tx = conn
        .unchecked_transaction()
        .context("failed to begin import transaction")?;
    for (line_no, record) in it {
        let cells = parse_csv_record(record);
        let row = CsvRow {
            cells: &cells,
            columns: &columns,
        };
        if row.get("name").is_empty() {
            summary.skipped += 1;
            tracing::warn!(line = *line_no, "student row without name skipped");
            summary.warnings.push(ImportWarning {
                line: *line_no,
                code: "missing_name",
                message: "name is empty".to_string(),
            });
            continue;
        }
        let class_name = row.get("class_name");
        let Some(class_id) = class_ids.get(&class_name) else {
            summary.skipped += 1;
            tracing::warn!(line = *line_no, class_name = %class_name, "student row with unknown class skipped");
            summary.warnings.push(ImportWarning {
                line: *line_no,
                code: "unknown_class",
                message: format!("no class named '{}'", class_name),
            });
            continue;
        };
        let (student, family) = row_to_student(&row, class_id);
        db::insert_student(&tx, &student)?;
        db::upsert_family(&tx, &family)?;
        summary.imported += 1;
    }
    tx.commit().context("failed to commit student import")?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_only_when_needed() {
        assert_eq!(csv_quote("Cirebon"), "Cirebon");
        assert_eq!(csv_quote("Jl. Mawar, No. 3"), "\"Jl. Mawar, No. 3\"");
        assert_eq!(csv_quote("a \"b\""), "\"a \"\"b\"\"\"");
    }

    #[test]
    fn parse_handles_quotes_and_empty_cells() {
        assert_eq!(
            parse_csv_record("1,\"Jl. Mawar, No. 3\",,\"x \"\"y\"\"\""),
            vec!["1", "Jl. Mawar, No. 3", "", "x \"y\""]
        );
        assert_eq!(parse_csv_record(""), vec![""]);
    }

    #[test]
    fn quoted_newline_stays_in_one_record() {
        let text = "a,b\r\n1,\"baris\nkedua\"\n\n2,x\n";
        let recs = csv_records(text);
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[1], (2, "1,\"baris\nkedua\"".to_string()));
        assert_eq!(recs[3].0, 5);
        assert_eq!(parse_csv_record(&recs[1].1)[1], "baris\nkedua");
    }

    #[test]
    fn header_lookup_by_name() {
        let columns: HashMap<String, usize> = [("name".to_string(), 1), ("gender".to_string(), 0)]
            .into_iter()
            .collect();
        let cells = vec!["p".to_string(), " Siti Aminah ".to_string()];
        let row = CsvRow {
            cells: &cells,
            columns: &columns,
        };
        let (s, f) = row_to_student(&row, "c1");
        assert_eq!(s.name, "Siti Aminah");
        assert_eq!(s.gender, Gender::P);
        assert_eq!(s.class_id, "c1");
        assert_eq!(f.student_id, s.id);
        assert_eq!(f.parent_address, ParentAddress::default());
    }
}
