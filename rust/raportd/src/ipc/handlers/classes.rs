use crate::db;
use crate::ipc::helpers::{
    db_conn, optional_str, required_str, required_text, respond, DbResultExt, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::models::ClassData;
use rusqlite::Connection;
use serde_json::json;

fn ensure_teacher(conn: &Connection, teacher_id: &str) -> Result<(), HandlerErr> {
    if teacher_id.is_empty() {
        return Ok(());
    }
    if !db::exists(conn, "teachers", "id", teacher_id).db_err("db_query_failed")? {
        return Err(HandlerErr::not_found("teacher", teacher_id));
    }
    Ok(())
}

fn handle_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let teacher_id = optional_str(&req.params, "teacherId");
    let classes = db::list_classes(conn, teacher_id).db_err("db_query_failed")?;
    Ok(json!({ "classes": classes }))
}

fn handle_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class = ClassData {
        id: db::new_id(),
        name: required_text(&req.params, "name")?,
        teacher_id: optional_str(&req.params, "teacherId").unwrap_or("").to_string(),
        fase: optional_str(&req.params, "fase").unwrap_or("").trim().to_string(),
    };
    ensure_teacher(conn, &class.teacher_id)?;
    conn.execute(
        "INSERT INTO classes(id, name, teacher_id, fase) VALUES(?, ?, ?, ?)",
        (&class.id, &class.name, &class.teacher_id, &class.fase),
    )
    .db_err("db_insert_failed")?;
    Ok(json!({ "class": class }))
}

fn handle_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let Some(mut class) = db::get_class(conn, &class_id).db_err("db_query_failed")? else {
        return Err(HandlerErr::not_found("class", &class_id));
    };
    if req.params.get("name").is_some() {
        class.name = required_text(&req.params, "name")?;
    }
    if let Some(t) = req.params.get("teacherId").and_then(|v| v.as_str()) {
        class.teacher_id = t.trim().to_string();
    }
    if let Some(f) = req.params.get("fase").and_then(|v| v.as_str()) {
        class.fase = f.trim().to_string();
    }
    ensure_teacher(conn, &class.teacher_id)?;
    conn.execute(
        "UPDATE classes SET name = ?, teacher_id = ?, fase = ? WHERE id = ?",
        (&class.name, &class.teacher_id, &class.fase, &class.id),
    )
    .db_err("db_update_failed")?;
    Ok(json!({ "class": class }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let students: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM students WHERE class_id = ?",
            [&class_id],
            |r| r.get(0),
        )
        .db_err("db_query_failed")?;
    if students > 0 {
        return Err(HandlerErr::new("conflict", "class still has students")
            .with_details(json!({ "classId": class_id, "students": students })));
    }
    let n = conn
        .execute("DELETE FROM classes WHERE id = ?", [&class_id])
        .db_err("db_delete_failed")?;
    if n == 0 {
        return Err(HandlerErr::not_found("class", &class_id));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => handle_list(state, req),
        "classes.create" => handle_create(state, req),
        "classes.update" => handle_update(state, req),
        "classes.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
