use crate::db;
use crate::ipc::helpers::{
    db_conn, optional_str, required_str, required_text, respond, DbResultExt, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{Extracurricular, ExtracurricularPredicate};
use serde_json::json;

fn handle_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let extracurriculars = db::list_extracurriculars(conn).db_err("db_query_failed")?;
    Ok(json!({ "extracurriculars": extracurriculars }))
}

fn handle_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let e = Extracurricular {
        id: db::new_id(),
        name: required_text(&req.params, "name")?,
    };
    conn.execute(
        "INSERT INTO extracurriculars(id, name) VALUES(?, ?)",
        (&e.id, &e.name),
    )
    .db_err("db_insert_failed")?;
    Ok(json!({ "extracurricular": e }))
}

fn handle_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let e = Extracurricular {
        id: required_str(&req.params, "extracurricularId")?,
        name: required_text(&req.params, "name")?,
    };
    let n = conn
        .execute(
            "UPDATE extracurriculars SET name = ? WHERE id = ?",
            (&e.name, &e.id),
        )
        .db_err("db_update_failed")?;
    if n == 0 {
        return Err(HandlerErr::not_found("extracurricular", &e.id));
    }
    Ok(json!({ "extracurricular": e }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let id = required_str(&req.params, "extracurricularId")?;
    let n = conn
        .execute("DELETE FROM extracurriculars WHERE id = ?", [&id])
        .db_err("db_delete_failed")?;
    if n == 0 {
        return Err(HandlerErr::not_found("extracurricular", &id));
    }
    Ok(json!({ "deleted": true }))
}

fn handle_predicates_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let predicates = db::list_extracurricular_predicates(
        conn,
        optional_str(&req.params, "extracurricularId"),
    )
    .db_err("db_query_failed")?;
    Ok(json!({ "predicates": predicates }))
}

fn handle_predicates_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let p = ExtracurricularPredicate {
        id: db::new_id(),
        extracurricular_id: required_str(&req.params, "extracurricularId")?,
        predicate: required_text(&req.params, "predicate")?,
        description: required_text(&req.params, "description")?,
    };
    if !db::exists(conn, "extracurriculars", "id", &p.extracurricular_id)
        .db_err("db_query_failed")?
    {
        return Err(HandlerErr::not_found("extracurricular", &p.extracurricular_id));
    }
    conn.execute(
        "INSERT INTO extracurricular_predicates(id, extracurricular_id, predicate, description)
         VALUES(?, ?, ?, ?)",
        (&p.id, &p.extracurricular_id, &p.predicate, &p.description),
    )
    .db_err("db_insert_failed")?;
    Ok(json!({ "predicate": p }))
}

fn handle_predicates_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let id = required_str(&req.params, "predicateId")?;
    let predicate = required_text(&req.params, "predicate")?;
    let description = required_text(&req.params, "description")?;
    let n = conn
        .execute(
            "UPDATE extracurricular_predicates SET predicate = ?, description = ? WHERE id = ?",
            (&predicate, &description, &id),
        )
        .db_err("db_update_failed")?;
    if n == 0 {
        return Err(HandlerErr::not_found("extracurricular predicate", &id));
    }
    Ok(json!({ "predicateId": id, "predicate": predicate, "description": description }))
}

fn handle_predicates_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let id = required_str(&req.params, "predicateId")?;
    let n = conn
        .execute("DELETE FROM extracurricular_predicates WHERE id = ?", [&id])
        .db_err("db_delete_failed")?;
    if n == 0 {
        return Err(HandlerErr::not_found("extracurricular predicate", &id));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "extracurriculars.list" => handle_list(state, req),
        "extracurriculars.create" => handle_create(state, req),
        "extracurriculars.update" => handle_update(state, req),
        "extracurriculars.delete" => handle_delete(state, req),
        "extracurricularPredicates.list" => handle_predicates_list(state, req),
        "extracurricularPredicates.create" => handle_predicates_create(state, req),
        "extracurricularPredicates.update" => handle_predicates_update(state, req),
        "extracurricularPredicates.delete" => handle_predicates_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
