//! API key lookup. First hit wins:
//! environment variable, then `secrets.toml`, then `.env`, then `api_key.txt`
//! (both `KEY=value` files), all relative to the workspace.

use std::path::Path;

use tracing::{debug, warn};

pub const SECRETS_FILE: &str = "secrets.toml";
pub const KEY_FILES: [&str; 2] = [".env", "api_key.txt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    SecretsFile,
    KeyFile(&'static str),
}

pub fn resolve_api_key(workspace: &Path, var: &str) -> Option<(String, KeySource)> {
    if let Some(key) = std::env::var(var).ok().and_then(non_empty) {
        return Some((key, KeySource::Environment));
    }
    if let Some(key) = from_secrets_file(&workspace.join(SECRETS_FILE), var) {
        return Some((key, KeySource::SecretsFile));
    }
    for name in KEY_FILES {
        if let Some(key) = from_key_file(&workspace.join(name), var) {
            return Some((key, KeySource::KeyFile(name)));
        }
    }
    debug!(var, "no API credential found");
    None
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn from_secrets_file(path: &Path, var: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let table: toml::Table = match toml::from_str(&content) {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable secrets file");
            return None;
        }
    };
    table
        .get(var)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .and_then(non_empty)
}

/// Reads `KEY=value` lines without touching the process environment.
fn from_key_file(path: &Path, var: &str) -> Option<String> {
    let iter = dotenvy::from_path_iter(path).ok()?;
    for item in iter {
        match item {
            Ok((k, v)) if k == var => return non_empty(v),
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "stopping at malformed key file line");
                return None;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // Uses a variable name nothing else sets so tests stay independent of
    // the developer's shell.
    const VAR: &str = "SEDAMD_TEST_KEY_UNSET";

    #[test]
    fn nothing_configured_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_api_key(dir.path(), VAR), None);
    }

    #[test]
    fn secrets_file_beats_key_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SECRETS_FILE),
            format!("{} = \"from-secrets\"\n", VAR),
        )
        .unwrap();
        std::fs::write(dir.path().join(".env"), format!("{}=from-env-file\n", VAR)).unwrap();
        assert_eq!(
            resolve_api_key(dir.path(), VAR),
            Some(("from-secrets".to_string(), KeySource::SecretsFile))
        );
    }

    #[test]
    fn dotenv_is_read_before_api_key_txt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("api_key.txt"), format!("{}=from-txt\n", VAR)).unwrap();
        assert_eq!(
            resolve_api_key(dir.path(), VAR),
            Some(("from-txt".to_string(), KeySource::KeyFile("api_key.txt")))
        );

        std::fs::write(
            dir.path().join(".env"),
            format!("OTHER=1\n{}=from-dotenv\n", VAR),
        )
        .unwrap();
        assert_eq!(
            resolve_api_key(dir.path(), VAR),
            Some(("from-dotenv".to_string(), KeySource::KeyFile(".env")))
        );
    }

    #[test]
    fn blank_values_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SECRETS_FILE), format!("{} = \"  \"\n", VAR)).unwrap();
        std::fs::write(dir.path().join("api_key.txt"), format!("{}=real\n", VAR)).unwrap();
        assert_eq!(
            resolve_api_key(dir.path(), VAR).map(|(k, _)| k),
            Some("real".to_string())
        );
    }
}
