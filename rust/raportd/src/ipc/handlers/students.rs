use crate::db;
use crate::exchange;
use crate::ipc::helpers::{
    db_conn, optional_str, required_array, required_obj, required_str, required_text, respond,
    to_value, DbResultExt, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{Student, StudentFamilyData};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Student plus optional family block from `{student, family?}`.
fn read_student_input(params: &Value) -> Result<(Student, Option<StudentFamilyData>), HandlerErr> {
    let mut student: Student = required_obj(params, "student")?;
    student.name = student.name.trim().to_string();
    if student.name.is_empty() {
        return Err(HandlerErr::bad_params("student.name must not be empty"));
    }
    let family = match params.get("family") {
        None | Some(Value::Null) => None,
        Some(_) => Some(required_obj::<StudentFamilyData>(params, "family")?),
    };
    Ok((student, family))
}

fn ensure_class(conn: &Connection, class_id: &str) -> Result<(), HandlerErr> {
    if !db::exists(conn, "classes", "id", class_id).db_err("db_query_failed")? {
        return Err(HandlerErr::not_found("class", class_id));
    }
    Ok(())
}

fn handle_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = optional_str(&req.params, "classId");
    let students = db::list_students(conn, class_id).db_err("db_query_failed")?;
    Ok(json!({ "students": students }))
}

fn handle_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let Some(student) = db::get_student(conn, &student_id).db_err("db_query_failed")? else {
        return Err(HandlerErr::not_found("student", &student_id));
    };
    let family = db::get_family(conn, &student_id).db_err("db_query_failed")?;
    Ok(json!({ "student": student, "family": family }))
}

fn handle_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let (mut student, family) = read_student_input(&req.params)?;
    ensure_class(conn, &student.class_id)?;
    student.id = db::new_id();

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    if let Err(e) = db::insert_student(&tx, &student) {
        let _ = tx.rollback();
        return Err(HandlerErr::db("db_insert_failed", format!("{e:#}")));
    }
    if let Some(mut f) = family {
        f.student_id = student.id.clone();
        if let Err(e) = db::upsert_family(&tx, &f) {
            let _ = tx.rollback();
            return Err(HandlerErr::db("db_insert_failed", format!("{e:#}")));
        }
    }
    tx.commit().db_err("db_tx_failed")?;
    Ok(json!({ "student": student }))
}

fn handle_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let (mut student, family) = read_student_input(&req.params)?;
    student.id = student_id.clone();
    ensure_class(conn, &student.class_id)?;

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    let n = match db::update_student(&tx, &student) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return Err(HandlerErr::db("db_update_failed", format!("{e:#}")));
        }
    };
    if n == 0 {
        let _ = tx.rollback();
        return Err(HandlerErr::not_found("student", &student_id));
    }
    if let Some(mut f) = family {
        f.student_id = student_id.clone();
        if let Err(e) = db::upsert_family(&tx, &f) {
            let _ = tx.rollback();
            return Err(HandlerErr::db("db_update_failed", format!("{e:#}")));
        }
    }
    tx.commit().db_err("db_tx_failed")?;
    Ok(json!({ "student": student }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let n = conn
        .execute("DELETE FROM students WHERE id = ?", [&student_id])
        .db_err("db_delete_failed")?;
    if n == 0 {
        return Err(HandlerErr::not_found("student", &student_id));
    }
    Ok(json!({ "deleted": true }))
}

/// All rows or none: the first invalid row fails the whole batch.
fn handle_bulk_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let rows = required_array(&req.params, "rows")?;
    let mut parsed = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let (mut student, family) = read_student_input(row)
            .map_err(|e| e.with_details(json!({ "row": idx })))?;
        ensure_class(conn, &student.class_id)?;
        student.id = db::new_id();
        parsed.push((student, family));
    }

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    for (student, family) in &parsed {
        let res = db::insert_student(&tx, student).and_then(|_| match family {
            Some(f) => {
                let mut f = f.clone();
                f.student_id = student.id.clone();
                db::upsert_family(&tx, &f)
            }
            None => Ok(()),
        });
        if let Err(e) = res {
            let _ = tx.rollback();
            return Err(HandlerErr::db("db_insert_failed", format!("{e:#}")));
        }
    }
    tx.commit().db_err("db_tx_failed")?;
    tracing::info!(count = parsed.len(), "students bulk created");
    let ids: Vec<&str> = parsed.iter().map(|(s, _)| s.id.as_str()).collect();
    Ok(json!({ "created": parsed.len(), "studentIds": ids }))
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let out_path = required_text(&req.params, "outPath")?;
    let rows = exchange::export_students(conn, &PathBuf::from(&out_path))
        .map_err(|e| HandlerErr::db("io_failed", format!("{e:#}")).with_details(json!({ "path": out_path })))?;
    Ok(json!({ "rowsExported": rows, "path": out_path }))
}

fn handle_import_csv(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let in_path = required_text(&req.params, "inPath")?;
    let text = std::fs::read_to_string(&in_path).map_err(|e| {
        HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": in_path }))
    })?;
    let summary = exchange::import_students_text(conn, &text).db_err("db_insert_failed")?;
    tracing::info!(
        imported = summary.imported,
        skipped = summary.skipped,
        "students imported from csv"
    );
    to_value(&summary)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_list(state, req),
        "students.get" => handle_get(state, req),
        "students.create" => handle_create(state, req),
        "students.update" => handle_update(state, req),
        "students.delete" => handle_delete(state, req),
        "students.bulkCreate" => handle_bulk_create(state, req),
        "students.exportCsv" => handle_export_csv(state, req),
        "students.importCsv" => handle_import_csv(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
