use crate::filters;
use crate::ipc::error::ok;
use crate::ipc::helpers::{cached_records, calc_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    let selection = match filters::parse_selection(req.params.get("selection")) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let records = match cached_records(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let opts = filters::cascade_options(records, &selection);
    ok(
        &req.id,
        json!({
            "years": opts.years,
            "schools": opts.schools,
            "courses": opts.courses,
            "regimes": opts.regimes,
            "curricularUnits": opts.curricular_units,
            "shifts": opts.shifts,
            "components": opts.components,
            "weekRange": opts.week_range,
            "weekNote": filters::WEEK_NOTE
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "filters.options" => Some(handle_options(state, req)),
        _ => None,
    }
}
