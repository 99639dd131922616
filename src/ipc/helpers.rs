use crate::calc::CalcError;
use crate::db::{self, AttendanceRecord};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("missing params.{}", key),
            None,
        )),
    }
}

pub fn calc_err(req: &Request, e: CalcError) -> serde_json::Value {
    let CalcError {
        code,
        message,
        details,
    } = e;
    err(&req.id, &code, message, details)
}

/// Returns the cached base table, loading it on first access. Load failures
/// surface as ready-made error responses.
pub fn cached_records<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a [AttendanceRecord], serde_json::Value> {
    let Some(conn) = state.db.as_ref() else {
        return Err(err(
            &req.id,
            "no_workspace",
            "select a workspace first",
            None,
        ));
    };
    if state.records.is_none() {
        let loaded = db::load_records(conn).map_err(|e| calc_err(req, e))?;
        state.records = Some(loaded);
    }
    Ok(state.records.as_deref().unwrap_or_default())
}
