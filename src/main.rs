mod coaching;
mod config;
mod db;
mod generation;
mod grading;
mod ipc;
mod parents;
mod progress;
mod psych;
mod quiz;
mod students;
mod study;
mod teachers;
mod universities;
mod vocab;

use std::io::{self, BufRead, Write};

use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    // stdout carries the protocol; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sedamd=info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let mut state = ipc::AppState::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => {
                debug!(id = %req.id, method = %req.method, "request");
                ipc::handle_request(&mut state, req)
            }
            Err(e) => ipc::bad_json(e.to_string()),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
