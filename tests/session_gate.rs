use serde_json::json;
use sha2::{Digest, Sha256};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_presencasd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn presencasd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "expected an error response: {}",
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn write_secrets(workspace: &PathBuf, username: &str, password: &str) {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    let body = json!({ "users": { username: digest } });
    std::fs::write(
        workspace.join("secrets.json"),
        serde_json::to_string_pretty(&body).expect("serialize secrets"),
    )
    .expect("write secrets.json");
}

#[test]
fn data_methods_require_login() {
    let workspace = temp_dir("presencasd-session-gate");
    write_secrets(&workspace, "ana", "segredo");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let blocked = request(&mut stdin, &mut reader, "2", "filters.options", json!({}));
    assert_eq!(error_code(&blocked), "not_authenticated");

    let missing = request(
        &mut stdin,
        &mut reader,
        "3",
        "session.login",
        json!({ "username": "ana" }),
    );
    assert_eq!(error_code(&missing), "bad_params");

    let denied = request(
        &mut stdin,
        &mut reader,
        "4",
        "session.login",
        json!({ "username": "ana", "password": "errada" }),
    );
    assert_eq!(error_code(&denied), "invalid_credentials");
    assert_eq!(
        denied
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str()),
        Some("Credenciais inválidas.")
    );

    let status = request_ok(&mut stdin, &mut reader, "5", "session.status", json!({}));
    assert_eq!(
        status.get("authenticated").and_then(|v| v.as_bool()),
        Some(false)
    );

    let greeting = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "session.login",
        json!({ "username": "ana", "password": "segredo" }),
    );
    assert_eq!(greeting.get("user").and_then(|v| v.as_str()), Some("ana"));
    assert_eq!(
        greeting.get("message").and_then(|v| v.as_str()),
        Some("Bem-vindo, ana!")
    );

    let status = request_ok(&mut stdin, &mut reader, "7", "session.status", json!({}));
    assert_eq!(
        status.get("authenticated").and_then(|v| v.as_bool()),
        Some(true)
    );
    assert_eq!(status.get("user").and_then(|v| v.as_str()), Some("ana"));

    let open = request_ok(&mut stdin, &mut reader, "8", "filters.options", json!({}));
    assert!(open.get("years").and_then(|v| v.as_array()).is_some());

    let unknown = request(&mut stdin, &mut reader, "9", "no.such.method", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    let _ = request_ok(&mut stdin, &mut reader, "10", "session.logout", json!({}));
    let blocked = request(&mut stdin, &mut reader, "11", "reports.rows", json!({}));
    assert_eq!(error_code(&blocked), "not_authenticated");
}

#[test]
fn login_without_secrets_file_reports_no_credentials() {
    let workspace = temp_dir("presencasd-no-credentials");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let denied = request(
        &mut stdin,
        &mut reader,
        "2",
        "session.login",
        json!({ "username": "ana", "password": "segredo" }),
    );
    assert_eq!(error_code(&denied), "no_credentials");
}

#[test]
fn login_requires_a_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let denied = request(
        &mut stdin,
        &mut reader,
        "1",
        "session.login",
        json!({ "username": "ana", "password": "segredo" }),
    );
    assert_eq!(error_code(&denied), "no_workspace");
}

#[test]
fn workspace_switch_closes_the_session() {
    let first = temp_dir("presencasd-ws-first");
    let second = temp_dir("presencasd-ws-second");
    write_secrets(&first, "ana", "segredo");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": first.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.login",
        json!({ "username": "ana", "password": "segredo" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": second.to_string_lossy() }),
    );
    let status = request_ok(&mut stdin, &mut reader, "4", "session.status", json!({}));
    assert_eq!(
        status.get("authenticated").and_then(|v| v.as_bool()),
        Some(false)
    );

    // The second workspace carries no secrets.json, so the old credentials
    // must be gone as well.
    let denied = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.login",
        json!({ "username": "ana", "password": "segredo" }),
    );
    assert_eq!(error_code(&denied), "no_credentials");
}

#[test]
fn health_reports_version_workspace_and_session() {
    let workspace = temp_dir("presencasd-health");
    write_secrets(&workspace, "ana", "segredo");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health
        .get("version")
        .and_then(|v| v.as_str())
        .map(|s| !s.is_empty())
        .unwrap_or(false));
    assert!(health
        .get("workspacePath")
        .map(|v| v.is_null())
        .unwrap_or(false));
    assert_eq!(
        health.get("authenticated").and_then(|v| v.as_bool()),
        Some(false)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.login",
        json!({ "username": "ana", "password": "segredo" }),
    );

    let health = request_ok(&mut stdin, &mut reader, "4", "health", json!({}));
    assert_eq!(
        health.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );
    assert_eq!(
        health.get("authenticated").and_then(|v| v.as_bool()),
        Some(true)
    );
}
