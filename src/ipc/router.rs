use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

/// Everything outside the workspace/session surface requires an open session.
fn requires_session(method: &str) -> bool {
    !matches!(method, "health" | "workspace.select") && !method.starts_with("session.")
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    // The gate runs before any parameter parsing or data access.
    if requires_session(&req.method) && state.session_user.is_none() {
        return err(&req.id, "not_authenticated", "login required", None);
    }

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::session::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::filters::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::reports::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
