//! Subjects, learning objectives and grade predicates.

use crate::db;
use crate::ipc::helpers::{
    db_conn, optional_str, required_str, required_text, respond, DbResultExt, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{GradePredicate, LearningObjective, Subject, SubjectCategory};
use serde_json::{json, Value};

fn category_param(params: &Value) -> Result<SubjectCategory, HandlerErr> {
    let raw = required_str(params, "category")?;
    SubjectCategory::parse(&raw).ok_or_else(|| {
        HandlerErr::bad_params("category must be Wajib, Pilihan or Mulok")
            .with_details(json!({ "category": raw }))
    })
}

fn threshold_param(params: &Value) -> Result<i64, HandlerErr> {
    let t = params
        .get("threshold")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params("threshold must be an integer"))?;
    if !(0..=100).contains(&t) {
        return Err(HandlerErr::bad_params("threshold must be between 0 and 100"));
    }
    Ok(t)
}

fn not_found_if_zero(n: usize, what: &str, id: &str) -> Result<(), HandlerErr> {
    if n == 0 {
        return Err(HandlerErr::not_found(what, id));
    }
    Ok(())
}

fn handle_subjects_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let subjects = db::list_subjects(conn).db_err("db_query_failed")?;
    Ok(json!({ "subjects": subjects }))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let name = required_text(&req.params, "name")?;
    let category = category_param(&req.params)?;
    let id = db::next_subject_id(conn).db_err("db_query_failed")?;
    conn.execute(
        "INSERT INTO subjects(id, name, category) VALUES(?, ?, ?)",
        (&id, &name, category),
    )
    .db_err("db_insert_failed")?;
    Ok(json!({ "subject": Subject { id, name, category } }))
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let subject_id = required_str(&req.params, "subjectId")?;
    let name = required_text(&req.params, "name")?;
    let category = category_param(&req.params)?;
    let n = conn
        .execute(
            "UPDATE subjects SET name = ?, category = ? WHERE id = ?",
            (&name, category, &subject_id),
        )
        .db_err("db_update_failed")?;
    not_found_if_zero(n, "subject", &subject_id)?;
    Ok(json!({ "subject": Subject { id: subject_id, name, category } }))
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let subject_id = required_str(&req.params, "subjectId")?;
    let n = conn
        .execute("DELETE FROM subjects WHERE id = ?", [&subject_id])
        .db_err("db_delete_failed")?;
    not_found_if_zero(n, "subject", &subject_id)?;
    Ok(json!({ "deleted": true }))
}

fn handle_objectives_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let objectives = db::list_learning_objectives(
        conn,
        optional_str(&req.params, "subjectId"),
        optional_str(&req.params, "classId"),
    )
    .db_err("db_query_failed")?;
    Ok(json!({ "objectives": objectives }))
}

fn handle_objectives_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let objective = LearningObjective {
        id: db::new_id(),
        code: required_text(&req.params, "code")?,
        description: required_text(&req.params, "description")?,
        subject_id: required_str(&req.params, "subjectId")?,
        class_id: required_str(&req.params, "classId")?,
    };
    if !db::exists(conn, "subjects", "id", &objective.subject_id).db_err("db_query_failed")? {
        return Err(HandlerErr::not_found("subject", &objective.subject_id));
    }
    if !db::exists(conn, "classes", "id", &objective.class_id).db_err("db_query_failed")? {
        return Err(HandlerErr::not_found("class", &objective.class_id));
    }
    conn.execute(
        "INSERT INTO learning_objectives(id, code, description, subject_id, class_id)
         VALUES(?, ?, ?, ?, ?)",
        (
            &objective.id,
            &objective.code,
            &objective.description,
            &objective.subject_id,
            &objective.class_id,
        ),
    )
    .db_err("db_insert_failed")?;
    Ok(json!({ "objective": objective }))
}

fn handle_objectives_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let objective_id = required_str(&req.params, "objectiveId")?;
    let code = required_text(&req.params, "code")?;
    let description = required_text(&req.params, "description")?;
    let n = conn
        .execute(
            "UPDATE learning_objectives SET code = ?, description = ? WHERE id = ?",
            (&code, &description, &objective_id),
        )
        .db_err("db_update_failed")?;
    not_found_if_zero(n, "learning objective", &objective_id)?;
    Ok(json!({ "objectiveId": objective_id, "code": code, "description": description }))
}

fn handle_objectives_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let objective_id = required_str(&req.params, "objectiveId")?;
    let n = conn
        .execute("DELETE FROM learning_objectives WHERE id = ?", [&objective_id])
        .db_err("db_delete_failed")?;
    not_found_if_zero(n, "learning objective", &objective_id)?;
    Ok(json!({ "deleted": true }))
}

fn handle_predicates_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let predicates = db::list_grade_predicates(conn).db_err("db_query_failed")?;
    Ok(json!({ "predicates": predicates }))
}

fn handle_predicates_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let predicate = GradePredicate {
        id: db::new_id(),
        threshold: threshold_param(&req.params)?,
        description: required_text(&req.params, "description")?,
    };
    conn.execute(
        "INSERT INTO grade_predicates(id, threshold, description) VALUES(?, ?, ?)",
        (&predicate.id, predicate.threshold, &predicate.description),
    )
    .db_err("db_insert_failed")?;
    Ok(json!({ "predicate": predicate }))
}

fn handle_predicates_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let predicate = GradePredicate {
        id: required_str(&req.params, "predicateId")?,
        threshold: threshold_param(&req.params)?,
        description: required_text(&req.params, "description")?,
    };
    let n = conn
        .execute(
            "UPDATE grade_predicates SET threshold = ?, description = ? WHERE id = ?",
            (predicate.threshold, &predicate.description, &predicate.id),
        )
        .db_err("db_update_failed")?;
    not_found_if_zero(n, "predicate", &predicate.id)?;
    Ok(json!({ "predicate": predicate }))
}

fn handle_predicates_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let predicate_id = required_str(&req.params, "predicateId")?;
    let n = conn
        .execute("DELETE FROM grade_predicates WHERE id = ?", [&predicate_id])
        .db_err("db_delete_failed")?;
    not_found_if_zero(n, "predicate", &predicate_id)?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.list" => handle_subjects_list(state, req),
        "subjects.create" => handle_subjects_create(state, req),
        "subjects.update" => handle_subjects_update(state, req),
        "subjects.delete" => handle_subjects_delete(state, req),
        "objectives.list" => handle_objectives_list(state, req),
        "objectives.create" => handle_objectives_create(state, req),
        "objectives.update" => handle_objectives_update(state, req),
        "objectives.delete" => handle_objectives_delete(state, req),
        "predicates.list" => handle_predicates_list(state, req),
        "predicates.create" => handle_predicates_create(state, req),
        "predicates.update" => handle_predicates_update(state, req),
        "predicates.delete" => handle_predicates_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
