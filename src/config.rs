//! Workspace configuration (`sedamd.toml`).

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "sedamd.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database file name inside the workspace directory.
    pub db_file: String,
    pub generation: GenerationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_file: "student_system.sqlite3".to_string(),
            generation: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Used when a request carries no `context.useGeneration`.
    /// Off by default so nothing is spent unless asked for.
    pub enabled_by_default: bool,
    pub model: String,
    pub base_url: String,
    /// `None` keeps the HTTP client's own default.
    pub timeout_secs: Option<u64>,
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled_by_default: false,
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com".to_string(),
            timeout_secs: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Loads `sedamd.toml` from the workspace, or defaults when it is absent.
pub fn load(workspace: &Path) -> Result<AppConfig> {
    let path = workspace.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path()).unwrap();
        assert_eq!(config.db_file, "student_system.sqlite3");
        assert!(!config.generation.enabled_by_default);
        assert_eq!(config.generation.api_key_env, "OPENAI_API_KEY");
        assert!(config.generation.timeout_secs.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[generation]\nenabled_by_default = true\nmodel = \"gpt-4o-mini\"\n",
        )
        .unwrap();
        let config = load(dir.path()).unwrap();
        assert!(config.generation.enabled_by_default);
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.generation.base_url, "https://api.openai.com");
        assert_eq!(config.db_file, "student_system.sqlite3");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "generation = [").unwrap();
        assert!(load(dir.path()).is_err());
    }
}
