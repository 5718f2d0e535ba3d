use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::generation::Generator;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub context: RequestContext,
}

/// Per-request settings. Nothing here outlives the request.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Live generation toggle; falls back to `generation.enabled_by_default`.
    #[serde(default)]
    pub use_generation: Option<bool>,
    #[serde(default)]
    pub actor: Option<Actor>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Actor {
    pub role: String,
    pub id: String,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: AppConfig,
    pub generator: Generator,
}

impl AppState {
    pub fn new() -> Self {
        let config = AppConfig::default();
        let generator = Generator::new(None, config.generation.model.clone());
        Self {
            workspace: None,
            db: None,
            config,
            generator,
        }
    }

    pub fn live_generation(&self, req: &Request) -> bool {
        req.context
            .use_generation
            .unwrap_or(self.config.generation.enabled_by_default)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
