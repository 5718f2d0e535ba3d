use crate::config;
use crate::db;
use crate::generation::Generator;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "generation": {
                "enabledByDefault": state.config.generation.enabled_by_default,
                "liveAvailable": state.generator.has_client(),
                "model": state.config.generation.model,
            }
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let cfg = match config::load(&path) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "bad_config", format!("{e:#}"), None),
    };
    let conn = match db::open_db(&path, &cfg.db_file) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:#}"), None),
    };

    let generator = Generator::from_config(&path, &cfg.generation);
    info!(
        workspace = %path.display(),
        db_file = %cfg.db_file,
        live_available = generator.has_client(),
        "workspace opened"
    );

    state.workspace = Some(path.clone());
    state.db = Some(conn);
    state.generator = generator;
    state.config = cfg;
    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "liveGenerationAvailable": state.generator.has_client(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
