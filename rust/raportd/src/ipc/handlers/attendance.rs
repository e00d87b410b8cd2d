//! Per-student class records: attendance, co-curricular notes and
//! extracurricular predicates.

use crate::db;
use crate::ipc::helpers::{
    db_conn, required_array, required_str, respond, DbResultExt, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{StudentAttendance, StudentCoCurricular};
use rusqlite::Connection;
use serde_json::{json, Value};

fn ensure_student(conn: &Connection, student_id: &str) -> Result<(), HandlerErr> {
    if !db::exists(conn, "students", "id", student_id).db_err("db_query_failed")? {
        return Err(HandlerErr::not_found("student", student_id));
    }
    Ok(())
}

fn parse_records<T: serde::de::DeserializeOwned>(
    items: &[Value],
) -> Result<Vec<T>, HandlerErr> {
    items
        .iter()
        .enumerate()
        .map(|(idx, v)| {
            serde_json::from_value::<T>(v.clone()).map_err(|e| {
                HandlerErr::bad_params(format!("invalid record: {}", e))
                    .with_details(json!({ "index": idx }))
            })
        })
        .collect()
}

fn handle_attendance_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let records = db::list_attendances(conn, &class_id).db_err("db_query_failed")?;
    Ok(json!({ "records": records }))
}

fn handle_attendance_save(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let records: Vec<StudentAttendance> = parse_records(required_array(&req.params, "records")?)?;
    for (idx, r) in records.iter().enumerate() {
        if r.present < 0 || r.permitted < 0 || r.unpermitted < 0 {
            return Err(HandlerErr::bad_params("attendance counts must not be negative")
                .with_details(json!({ "index": idx, "studentId": r.student_id })));
        }
        ensure_student(conn, &r.student_id)?;
    }

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    for r in &records {
        if let Err(e) = tx.execute(
            "INSERT INTO student_attendances(student_id, present, permitted, unpermitted, teacher_note)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(student_id) DO UPDATE SET
                present = excluded.present,
                permitted = excluded.permitted,
                unpermitted = excluded.unpermitted,
                teacher_note = excluded.teacher_note",
            (
                &r.student_id,
                r.present,
                r.permitted,
                r.unpermitted,
                r.teacher_note.trim(),
            ),
        ) {
            let _ = tx.rollback();
            return Err(HandlerErr::db("db_update_failed", e)
                .with_details(json!({ "table": "student_attendances" })));
        }
    }
    tx.commit().db_err("db_tx_failed")?;
    Ok(json!({ "saved": records.len() }))
}

fn handle_cocurricular_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let records = db::list_cocurriculars(conn, &class_id).db_err("db_query_failed")?;
    Ok(json!({ "records": records }))
}

/// Blank descriptions are skipped, not stored.
fn handle_cocurricular_save(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let records: Vec<StudentCoCurricular> =
        parse_records(required_array(&req.params, "records")?)?;
    let (keep, blank): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| !r.description.trim().is_empty());
    for r in &keep {
        ensure_student(conn, &r.student_id)?;
    }

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    for r in &keep {
        if let Err(e) = tx.execute(
            "INSERT INTO student_cocurriculars(student_id, description) VALUES(?, ?)
             ON CONFLICT(student_id) DO UPDATE SET description = excluded.description",
            (&r.student_id, r.description.trim()),
        ) {
            let _ = tx.rollback();
            return Err(HandlerErr::db("db_update_failed", e)
                .with_details(json!({ "table": "student_cocurriculars" })));
        }
    }
    tx.commit().db_err("db_tx_failed")?;
    Ok(json!({ "saved": keep.len(), "skipped": blank.len() }))
}

fn handle_student_extracurriculars_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let entries = db::list_student_extracurriculars(conn, &class_id).db_err("db_query_failed")?;
    Ok(json!({ "entries": entries }))
}

/// A non-empty predicate upserts the pair; an empty one removes it.
fn handle_student_extracurriculars_save(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let items = required_array(&req.params, "entries")?;
    let mut entries = Vec::with_capacity(items.len());
    for (idx, v) in items.iter().enumerate() {
        let at = |e: HandlerErr| e.with_details(json!({ "index": idx }));
        let student_id = required_str(v, "studentId").map_err(at)?;
        let extracurricular_id = required_str(v, "extracurricularId").map_err(at)?;
        let predicate = v
            .get("predicate")
            .and_then(|p| p.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        ensure_student(conn, &student_id)?;
        if !predicate.is_empty()
            && !db::exists(conn, "extracurriculars", "id", &extracurricular_id)
                .db_err("db_query_failed")?
        {
            return Err(HandlerErr::not_found("extracurricular", &extracurricular_id));
        }
        entries.push((student_id, extracurricular_id, predicate));
    }

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    let mut saved = 0usize;
    let mut removed = 0usize;
    for (student_id, extracurricular_id, predicate) in &entries {
        let res = if predicate.is_empty() {
            tx.execute(
                "DELETE FROM student_extracurriculars
                 WHERE student_id = ? AND extracurricular_id = ?",
                (student_id, extracurricular_id),
            )
            .map(|n| removed += n)
        } else {
            tx.execute(
                "INSERT INTO student_extracurriculars(id, student_id, extracurricular_id, predicate)
                 VALUES(?, ?, ?, ?)
                 ON CONFLICT(student_id, extracurricular_id) DO UPDATE SET
                    predicate = excluded.predicate",
                (db::new_id(), student_id, extracurricular_id, predicate),
            )
            .map(|_| saved += 1)
        };
        if let Err(e) = res {
            let _ = tx.rollback();
            return Err(HandlerErr::db("db_update_failed", e)
                .with_details(json!({ "table": "student_extracurriculars" })));
        }
    }
    tx.commit().db_err("db_tx_failed")?;
    Ok(json!({ "saved": saved, "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.list" => handle_attendance_list(state, req),
        "attendance.save" => handle_attendance_save(state, req),
        "cocurricular.list" => handle_cocurricular_list(state, req),
        "cocurricular.save" => handle_cocurricular_save(state, req),
        "studentExtracurriculars.list" => handle_student_extracurriculars_list(state, req),
        "studentExtracurriculars.save" => handle_student_extracurriculars_save(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
