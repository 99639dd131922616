use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::CredentialSet;
use crate::db::AttendanceRecord;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub credentials: CredentialSet,
    pub session_user: Option<String>,
    /// Base table cache, filled on first authenticated data access and
    /// dropped by `data.reload` or a workspace switch.
    pub records: Option<Vec<AttendanceRecord>>,
}
