use crate::ipc::helpers::{db_conn, required_obj, respond, DbResultExt, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::profile::{self, SchoolProfile};
use serde_json::json;

fn handle_get(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let p = profile::load(conn).db_err("db_query_failed")?;
    Ok(json!({ "profile": p }))
}

fn handle_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let p: SchoolProfile = required_obj(&req.params, "profile")?;
    profile::save(conn, &p).db_err("db_update_failed")?;
    tracing::info!(school = %p.name, "school profile updated");
    Ok(json!({ "profile": p }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "profile.get" => handle_get(state, req),
        "profile.update" => handle_update(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
