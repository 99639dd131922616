use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if state.workspace.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    if state.credentials.is_empty() {
        return err(
            &req.id,
            "no_credentials",
            "workspace has no credential set",
            None,
        );
    }

    if state.credentials.verify(&username, &password) {
        state.session_user = Some(username.clone());
        ok(
            &req.id,
            json!({
                "user": username,
                "message": format!("Bem-vindo, {}!", username)
            }),
        )
    } else {
        // A failed attempt leaves any existing session untouched.
        err(&req.id, "invalid_credentials", "Credenciais inválidas.", None)
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session_user = None;
    ok(&req.id, json!({ "authenticated": false }))
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "authenticated": state.session_user.is_some(),
            "user": state.session_user.as_deref()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.login" => Some(handle_login(state, req)),
        "session.logout" => Some(handle_logout(state, req)),
        "session.status" => Some(handle_status(state, req)),
        _ => None,
    }
}
