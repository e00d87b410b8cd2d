use crate::auth;
use crate::db;
use crate::ipc::helpers::{
    db_conn, optional_str, required_str, required_text, respond, DbResultExt, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{Role, Teacher};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn username_owner(conn: &Connection, username: &str) -> Result<Option<String>, HandlerErr> {
    conn.query_row(
        "SELECT id FROM users WHERE username = ?",
        [username],
        |r| r.get::<_, String>(0),
    )
    .optional()
    .db_err("db_query_failed")
}

fn username_taken(username: &str) -> HandlerErr {
    HandlerErr::new("conflict", "username already in use")
        .with_details(json!({ "username": username }))
}

fn handle_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let teachers = db::list_teachers(conn).db_err("db_query_failed")?;
    Ok(json!({ "teachers": teachers }))
}

fn handle_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let name = required_text(&req.params, "name")?;
    let nip = required_text(&req.params, "nip")?;
    let username = required_text(&req.params, "username")?;
    let password = required_str(&req.params, "password")?;
    if password.is_empty() {
        return Err(HandlerErr::bad_params("password must not be empty"));
    }
    if username_owner(conn, &username)?.is_some() {
        return Err(username_taken(&username));
    }

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    let user = match auth::insert_user(&tx, &username, &password, Role::Teacher) {
        Ok(u) => u,
        Err(e) => {
            let _ = tx.rollback();
            return Err(HandlerErr::db("db_insert_failed", format!("{e:#}")));
        }
    };
    let teacher = Teacher {
        id: db::new_id(),
        user_id: user.id,
        name,
        nip,
    };
    if let Err(e) = tx.execute(
        "INSERT INTO teachers(id, user_id, name, nip) VALUES(?, ?, ?, ?)",
        (&teacher.id, &teacher.user_id, &teacher.name, &teacher.nip),
    ) {
        let _ = tx.rollback();
        return Err(HandlerErr::db("db_insert_failed", e)
            .with_details(json!({ "table": "teachers" })));
    }
    tx.commit().db_err("db_tx_failed")?;
    Ok(json!({ "teacher": teacher }))
}

fn handle_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let teacher_id = required_str(&req.params, "teacherId")?;
    let Some(existing) = db::get_teacher(conn, &teacher_id).db_err("db_query_failed")? else {
        return Err(HandlerErr::not_found("teacher", &teacher_id));
    };
    let name = required_text(&req.params, "name")?;
    let nip = required_text(&req.params, "nip")?;
    let username = required_text(&req.params, "username")?;
    if let Some(owner) = username_owner(conn, &username)? {
        if owner != existing.user_id {
            return Err(username_taken(&username));
        }
    }

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    let updated = tx
        .execute(
            "UPDATE teachers SET name = ?, nip = ? WHERE id = ?",
            (&name, &nip, &teacher_id),
        )
        .and_then(|_| {
            tx.execute(
                "UPDATE users SET username = ? WHERE id = ?",
                (&username, &existing.user_id),
            )
        });
    if let Err(e) = updated {
        let _ = tx.rollback();
        return Err(HandlerErr::db("db_update_failed", e));
    }
    if let Some(password) = optional_str(&req.params, "password") {
        if let Err(e) = auth::set_password(&tx, &existing.user_id, password) {
            let _ = tx.rollback();
            return Err(HandlerErr::db("db_update_failed", format!("{e:#}")));
        }
    }
    tx.commit().db_err("db_tx_failed")?;

    Ok(json!({
        "teacher": Teacher {
            id: teacher_id,
            user_id: existing.user_id,
            name,
            nip,
        }
    }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let teacher_id = required_str(&req.params, "teacherId")?;
    let Some(existing) = db::get_teacher(conn, &teacher_id).db_err("db_query_failed")? else {
        return Err(HandlerErr::not_found("teacher", &teacher_id));
    };

    let tx = conn.unchecked_transaction().db_err("db_tx_failed")?;
    // The teacher row goes with its user through the foreign key.
    let deleted = tx
        .execute(
            "UPDATE classes SET teacher_id = '' WHERE teacher_id = ?",
            [&teacher_id],
        )
        .and_then(|_| tx.execute("DELETE FROM users WHERE id = ?", [&existing.user_id]));
    if let Err(e) = deleted {
        let _ = tx.rollback();
        return Err(HandlerErr::db("db_delete_failed", e));
    }
    tx.commit().db_err("db_tx_failed")?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "teachers.list" => handle_list(state, req),
        "teachers.create" => handle_create(state, req),
        "teachers.update" => handle_update(state, req),
        "teachers.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
