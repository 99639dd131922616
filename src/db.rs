use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;

use crate::calc::CalcError;

/// Column set the reporting pipeline depends on. Workspaces are produced by an
/// external ETL step, so the table may predate this daemon; anything missing
/// here is a fatal mismatch rather than something to silently default.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "data_ano_letivo",
    "unidade_nome",
    "curso_nome",
    "curso_regime",
    "uc_nome",
    "turno",
    "turno_componente",
    "data_semana_letiva",
    "data_completa",
    "n_alunos",
];

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub ano_letivo: String,
    pub unidade: Option<String>,
    pub curso: Option<String>,
    pub regime: Option<String>,
    pub uc: Option<String>,
    pub turno: Option<String>,
    pub componente: Option<String>,
    pub semana: i64,
    pub data: NaiveDate,
    pub presencas: i64,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("presencas.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS presencas(
            data_ano_letivo TEXT NOT NULL,
            unidade_nome TEXT,
            curso_nome TEXT,
            curso_regime TEXT,
            uc_nome TEXT,
            turno TEXT,
            turno_componente TEXT,
            data_semana_letiva INTEGER NOT NULL,
            data_completa TEXT NOT NULL,
            n_alunos INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_presencas_ano ON presencas(data_ano_letivo)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_presencas_semana ON presencas(data_semana_letiva)",
        [],
    )?;

    Ok(conn)
}

pub fn check_schema(conn: &Connection) -> Result<(), CalcError> {
    let have = table_columns(conn, "presencas")?;
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !have.iter().any(|h| h == *col))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(CalcError::with_details(
            "schema_mismatch",
            "presencas table is missing required columns",
            json!({ "missingColumns": missing }),
        ));
    }
    Ok(())
}

/// Loads the whole presencas table in insert order. Rows keep their physical
/// order so later date sorting stays stable across reloads.
pub fn load_records(conn: &Connection) -> Result<Vec<AttendanceRecord>, CalcError> {
    check_schema(conn)?;

    let mut stmt = conn
        .prepare(
            "SELECT data_ano_letivo, unidade_nome, curso_nome, curso_regime, uc_nome,
                    turno, turno_componente, data_semana_letiva, data_completa, n_alunos
             FROM presencas ORDER BY rowid",
        )
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;

    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, i64>(9)?,
            ))
        })
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;

    let mut records = Vec::with_capacity(raw.len());
    for (ano_letivo, unidade, curso, regime, uc, turno, componente, semana, data, presencas) in raw
    {
        records.push(AttendanceRecord {
            ano_letivo,
            unidade,
            curso,
            regime,
            uc,
            turno,
            componente,
            semana,
            data: parse_record_date(&data)?,
            presencas,
        });
    }
    Ok(records)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, CalcError> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;

    let mut columns = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?
    {
        let name: String = row
            .get(1)
            .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;
        columns.push(name);
    }
    Ok(columns)
}

/// ETL exports usually write plain ISO dates, but some dumps carry a time
/// component. Accept both; anything else is corrupt input.
fn parse_record_date(text: &str) -> Result<NaiveDate, CalcError> {
    let trimmed = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(stamp.date());
    }
    Err(CalcError::with_details(
        "invalid_date",
        "data_completa is not a recognizable date",
        json!({ "value": text }),
    ))
}
