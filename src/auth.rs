use anyhow::Context;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

pub const SECRETS_FILE: &str = "secrets.json";

/// Workspace-local credential file: a map of username to sha256(password) in
/// lowercase hex. Stored next to the database so each workspace controls who
/// may read its reports.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialSet {
    #[serde(default)]
    users: HashMap<String, String>,
}

impl CredentialSet {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Some(stored) = self.users.get(username) else {
            return false;
        };
        stored.eq_ignore_ascii_case(&password_digest(password))
    }
}

pub fn load_credentials(workspace: &Path) -> anyhow::Result<CredentialSet> {
    let path = workspace.join(SECRETS_FILE);
    if !path.is_file() {
        return Ok(CredentialSet::default());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed reading {}", path.to_string_lossy()))?;
    let parsed: CredentialSet = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.to_string_lossy()))?;
    Ok(parsed)
}

pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_with(username: &str, password: &str) -> CredentialSet {
        let mut users = HashMap::new();
        users.insert(username.to_string(), password_digest(password));
        CredentialSet { users }
    }

    #[test]
    fn verify_accepts_matching_password_only() {
        let creds = set_with("ana", "segredo");
        assert!(creds.verify("ana", "segredo"));
        assert!(!creds.verify("ana", "errado"));
        assert!(!creds.verify("rui", "segredo"));
    }

    #[test]
    fn verify_ignores_digest_case() {
        let mut users = HashMap::new();
        users.insert("ana".to_string(), password_digest("segredo").to_uppercase());
        let creds = CredentialSet { users };
        assert!(creds.verify("ana", "segredo"));
    }

    #[test]
    fn empty_set_rejects_everyone() {
        let creds = CredentialSet::default();
        assert!(creds.is_empty());
        assert!(!creds.verify("ana", "segredo"));
    }
}
