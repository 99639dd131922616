use crate::calc;
use crate::filters;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{cached_records, calc_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const PAGE_SIZE: usize = 100;

const EMPTY_RESULT_MESSAGE: &str = "Nenhum registo encontrado para os filtros selecionados.";

/// Display mapping for the report table: internal column name and shown
/// header, in output order. The school-year column is intentionally absent.
const DISPLAY_COLUMNS: [(&str, &str); 10] = [
    ("unidade_nome", "Escola"),
    ("curso_nome", "Curso"),
    ("curso_regime", "Regime"),
    ("uc_nome", "Unidade Curricular"),
    ("turno", "Turno"),
    ("turno_componente", "Componente"),
    ("data_semana_letiva", "Semana Letiva"),
    ("data_completa", "Data"),
    ("n_alunos", "Presenças"),
    ("impacto_presencas", "Impacto"),
];

fn empty_result(req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "empty": true,
            "message": EMPTY_RESULT_MESSAGE
        }),
    )
}

/// Filter plus derivation on the cached base table; every reports method
/// starts from the rows this returns.
fn derived_rows(
    state: &mut AppState,
    req: &Request,
) -> Result<Vec<calc::DerivedRow>, serde_json::Value> {
    let selection = match filters::parse_selection(req.params.get("selection")) {
        Ok(v) => v,
        Err(e) => return Err(calc_err(req, e)),
    };
    let records = cached_records(state, req)?;
    let filtered = filters::apply_selection(records, &selection);
    Ok(calc::derive_rows(&filtered))
}

fn cell(row: &calc::DerivedRow, column: &str) -> serde_json::Value {
    match column {
        "unidade_nome" => json!(row.unidade),
        "curso_nome" => json!(row.curso),
        "curso_regime" => json!(row.regime),
        "uc_nome" => json!(row.uc),
        "turno" => json!(row.turno),
        "turno_componente" => json!(row.componente),
        "data_semana_letiva" => json!(row.semana),
        "data_completa" => json!(row.data.to_string()),
        "n_alunos" => json!(row.presencas),
        "impacto_presencas" => json!(row.impacto.as_str()),
        _ => serde_json::Value::Null,
    }
}

fn handle_rows(state: &mut AppState, req: &Request) -> serde_json::Value {
    let requested = match req.params.get("page") {
        None => 1,
        Some(v) => match v.as_u64() {
            Some(p) => p as usize,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "page must be a non-negative integer",
                    None,
                )
            }
        },
    };

    let rows = match derived_rows(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if rows.is_empty() {
        return empty_result(req);
    }

    let total_rows = rows.len();
    let total_pages = (total_rows - 1) / PAGE_SIZE + 1;
    let page = requested.clamp(1, total_pages);
    let start = (page - 1) * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(total_rows);

    let headers: Vec<&str> = DISPLAY_COLUMNS.iter().map(|(_, shown)| *shown).collect();
    let cells: Vec<serde_json::Value> = rows[start..end]
        .iter()
        .map(|row| {
            json!(DISPLAY_COLUMNS
                .iter()
                .map(|(internal, _)| cell(row, internal))
                .collect::<Vec<_>>())
        })
        .collect();

    ok(
        &req.id,
        json!({
            "empty": false,
            "columns": headers,
            "rows": cells,
            "page": page,
            "pageSize": PAGE_SIZE,
            "totalRows": total_rows,
            "totalPages": total_pages
        }),
    )
}

fn handle_weekly_series(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match derived_rows(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(series) = calc::weekly_series(&rows) else {
        return empty_result(req);
    };

    ok(
        &req.id,
        json!({
            "empty": false,
            "series": series.series,
            "weekRange": { "min": series.week_min, "max": series.week_max },
            "checkpoint": { "week": calc::CHECKPOINT_WEEK, "label": calc::CHECKPOINT_LABEL }
        }),
    )
}

fn handle_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match derived_rows(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if rows.is_empty() {
        return empty_result(req);
    }

    let entries = calc::low_attendance_ranking(&rows);
    ok(&req.id, json!({ "empty": false, "entries": entries }))
}

fn handle_shift_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let selected = req
        .params
        .get("turnoSimples")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let rows = match derived_rows(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if rows.is_empty() {
        return empty_result(req);
    }

    let stats = calc::shift_stats(&rows);
    if let Some(label) = selected {
        let Some(found) = stats.iter().find(|s| s.turno_simples == label) else {
            return err(
                &req.id,
                "not_found",
                format!("no shift named {} under the current filters", label),
                None,
            );
        };
        return ok(
            &req.id,
            json!({ "empty": false, "rows": stats, "selected": found }),
        );
    }

    ok(&req.id, json!({ "empty": false, "rows": stats }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.rows" => Some(handle_rows(state, req)),
        "reports.weeklySeries" => Some(handle_weekly_series(state, req)),
        "reports.lowAttendanceRanking" => Some(handle_ranking(state, req)),
        "reports.shiftStats" => Some(handle_shift_stats(state, req)),
        _ => None,
    }
}
