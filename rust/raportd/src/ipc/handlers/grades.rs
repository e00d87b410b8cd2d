use crate::calc::{self, Extreme, ObjectivePick};
use crate::db;
use crate::ipc::helpers::{
    db_conn, optional_str, required_array, required_str, respond, score_value, DbResultExt,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{GradePredicate, LearningObjective, StudentSubjectGrade, TpGrades};
use rusqlite::Connection;
use serde_json::{json, Value};

/// Summative columns shown on an entry sheet even when nothing is graded.
const MIN_SUMMATIVE_COLUMNS: usize = 2;

fn is_unsaved_id(id: &str) -> bool {
    id.is_empty() || id.starts_with("new-")
}

/// Reads one grade record, validating every score at the boundary.
fn parse_grade(v: &Value, idx: usize) -> Result<StudentSubjectGrade, HandlerErr> {
    let at = |e: HandlerErr| e.with_details(json!({ "index": idx }));
    let text = |key: &str| -> Result<String, HandlerErr> {
        required_str(v, key)
            .map(|s| s.trim().to_string())
            .and_then(|s| {
                if s.is_empty() {
                    Err(HandlerErr::bad_params(format!("{} must not be empty", key)))
                } else {
                    Ok(s)
                }
            })
            .map_err(at)
    };

    let mut tp_grades = TpGrades::new();
    match v.get("tpGrades") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (objective_id, score) in map {
                let s = score_value(score, &format!("tpGrades.{}", objective_id)).map_err(at)?;
                tp_grades.insert(objective_id.clone(), s);
            }
        }
        Some(_) => return Err(at(HandlerErr::bad_params("tpGrades must be an object"))),
    }

    let mut summative_grades = Vec::new();
    match v.get("summativeGrades") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (i, score) in items.iter().enumerate() {
                summative_grades
                    .push(score_value(score, &format!("summativeGrades[{}]", i)).map_err(at)?);
            }
        }
        Some(_) => return Err(at(HandlerErr::bad_params("summativeGrades must be an array"))),
    }

    let final_exam_score = match v.get("finalExamScore") {
        None => None,
        Some(score) => score_value(score, "finalExamScore").map_err(at)?,
    };

    Ok(StudentSubjectGrade {
        id: v
            .get("id")
            .and_then(|x| x.as_str())
            .unwrap_or("")
            .to_string(),
        student_id: text("studentId")?,
        subject_id: text("subjectId")?,
        class_id: text("classId")?,
        tp_grades,
        summative_grades,
        final_exam_score,
    })
}

fn ensure_refs(conn: &Connection, g: &StudentSubjectGrade) -> Result<(), HandlerErr> {
    for (table, what, id) in [
        ("students", "student", &g.student_id),
        ("subjects", "subject", &g.subject_id),
        ("classes", "class", &g.class_id),
    ] {
        if !db::exists(conn, table, "id", id).db_err("db_query_failed")? {
            return Err(HandlerErr::not_found(what, id));
        }
    }
    Ok(())
}

/// Upsert on (student, subject, class); returns the id the row ended up with.
fn upsert_grade(conn: &Connection, g: &StudentSubjectGrade) -> anyhow::Result<String> {
    let id = if is_unsaved_id(&g.id) {
        db::new_id()
    } else {
        g.id.clone()
    };
    conn.execute(
        "INSERT INTO student_subject_grades(id, student_id, subject_id, class_id,
            tp_grades, summative_grades, final_exam_score, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, subject_id, class_id) DO UPDATE SET
            tp_grades = excluded.tp_grades,
            summative_grades = excluded.summative_grades,
            final_exam_score = excluded.final_exam_score,
            updated_at = excluded.updated_at",
        rusqlite::params![
            id,
            g.student_id,
            g.subject_id,
            g.class_id,
            serde_json::to_string(&g.tp_grades)?,
            serde_json::to_string(&g.summative_grades)?,
            g.final_exam_score,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    let stored: String = conn.query_row(
        "SELECT id FROM student_subject_grades
         WHERE student_id = ? AND subject_id = ? AND class_id = ?",
        (&g.student_id, &g.subject_id, &g.class_id),
        |r| r.get(0),
    )?;
    Ok(stored)
}

fn handle_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let grades = db::list_grades(conn, &class_id, optional_str(&req.params, "subjectId"))
        .db_err("db_query_failed")?;
    Ok(json!({ "grades": grades }))
}

fn handle_save(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let items = required_array(&req.params, "grades")?;
    let mut grades = Vec::with_capacity(items.len());
    for (idx, v) in items.iter().enumerate() {
        let g = parse_grade(v, idx)?;
        ensure_refs(conn, &g)?;
        grades.push(g);
    }

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    for g in grades.iter_mut() {
        match upsert_grade(&tx, g) {
            Ok(id) => g.id = id,
            Err(e) => {
                let _ = tx.rollback();
                return Err(HandlerErr::db("db_update_failed", format!("{e:#}"))
                    .with_details(json!({ "studentId": g.student_id, "subjectId": g.subject_id })));
            }
        }
    }
    tx.commit().db_err("db_tx_failed")?;
    tracing::debug!(count = grades.len(), "grades saved");
    Ok(json!({ "saved": grades.len(), "grades": grades }))
}

fn sheet_description(pick: ObjectivePick<'_>) -> &str {
    match pick {
        ObjectivePick::Found(lo) => lo.description.as_str(),
        ObjectivePick::NotGraded => calc::NOT_GRADED_NOTE,
        ObjectivePick::Unknown => calc::PLACEHOLDER_DASH,
    }
}

/// Nothing graded yet reads as `-`, not as the lowest band.
fn sheet_predicate(final_score: i64, predicates: &[GradePredicate]) -> &str {
    if final_score == 0 {
        return calc::PLACEHOLDER_DASH;
    }
    calc::grade_predicate(final_score, predicates)
}

/// Grade-entry rows for one subject in one class, one per student.
fn handle_sheet(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let subject_id = required_str(&req.params, "subjectId")?;
    if db::get_class(conn, &class_id).db_err("db_query_failed")?.is_none() {
        return Err(HandlerErr::not_found("class", &class_id));
    }
    if !db::exists(conn, "subjects", "id", &subject_id).db_err("db_query_failed")? {
        return Err(HandlerErr::not_found("subject", &subject_id));
    }

    let objectives: Vec<LearningObjective> =
        db::list_learning_objectives(conn, Some(subject_id.as_str()), Some(class_id.as_str()))
            .db_err("db_query_failed")?;
    let students = db::list_students(conn, Some(class_id.as_str())).db_err("db_query_failed")?;
    let existing = db::list_grades(conn, &class_id, Some(subject_id.as_str())).db_err("db_query_failed")?;
    let predicates = db::list_grade_predicates(conn).db_err("db_query_failed")?;

    let summative_columns = existing
        .iter()
        .map(|g| g.summative_grades.len())
        .max()
        .unwrap_or(0)
        .max(MIN_SUMMATIVE_COLUMNS);

    let mut rows = Vec::with_capacity(students.len());
    for s in &students {
        let mut grade = existing
            .iter()
            .find(|g| g.student_id == s.id)
            .cloned()
            .unwrap_or_else(|| StudentSubjectGrade {
                id: format!("new-{}-{}", s.id, subject_id),
                student_id: s.id.clone(),
                subject_id: subject_id.clone(),
                class_id: class_id.clone(),
                ..StudentSubjectGrade::default()
            });
        for lo in &objectives {
            if grade.tp_grades.get(&lo.id).is_none() {
                grade.tp_grades.insert(lo.id.clone(), None);
            }
        }
        grade.summative_grades.resize(summative_columns, None);

        let final_score = calc::compute_final_score(&grade);
        let highest = calc::pick_extreme_objective(&grade, &objectives, Extreme::Highest);
        let lowest = calc::pick_extreme_objective(&grade, &objectives, Extreme::Lowest);
        rows.push(json!({
            "studentName": s.name,
            "grade": grade,
            "finalScore": final_score,
            "predicate": sheet_predicate(final_score, &predicates),
            "highestDescription": sheet_description(highest),
            "lowestDescription": sheet_description(lowest),
        }));
    }

    Ok(json!({
        "objectives": objectives,
        "summativeColumns": summative_columns,
        "rows": rows,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.list" => handle_list(state, req),
        "grades.save" => handle_save(state, req),
        "grades.sheet" => handle_sheet(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
