use super::handlers;
use super::helpers::HandlerErr;
use super::types::{AppState, Request};

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::auth::try_handle,
    handlers::teachers::try_handle,
    handlers::classes::try_handle,
    handlers::students::try_handle,
    handlers::catalog::try_handle,
    handlers::extracurriculars::try_handle,
    handlers::grades::try_handle,
    handlers::attendance::try_handle,
    handlers::profile::try_handle,
    handlers::reports::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    for &try_handle in FAMILIES {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }
    HandlerErr::new("not_implemented", format!("unknown method: {}", req.method)).response(&req.id)
}
