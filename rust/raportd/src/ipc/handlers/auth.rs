use crate::auth;
use crate::db;
use crate::ipc::helpers::{
    db_conn, required_str, respond, to_value, DbResultExt, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let username = required_str(&req.params, "username")?;
    let password = required_str(&req.params, "password")?;
    match auth::login(conn, &username, &password).db_err("db_query_failed")? {
        Some(session) => {
            tracing::info!(username = %session.user.username, role = session.user.role.as_str(), "login");
            to_value(&session)
        }
        None => Err(HandlerErr::new("auth_failed", "invalid username or password")),
    }
}

fn handle_users_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let users = db::list_users(conn).db_err("db_query_failed")?;
    Ok(json!({ "users": users }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.login" => handle_login(state, req),
        "users.list" => handle_users_list(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
