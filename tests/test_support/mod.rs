#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

pub fn temp_workspace() -> TempDir {
    tempfile::Builder::new()
        .prefix("sedamd-test-")
        .tempdir()
        .expect("create temp workspace")
}

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_sedamd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        // Credentials from the host must not switch live generation on.
        .env("OPENAI_API_KEY", "")
        .env_remove("RUST_LOG")
        .spawn()
        .expect("spawn sedamd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
    }
}

impl Sidecar {
    pub fn send_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response");
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request_with_context(
        &mut self,
        id: &str,
        method: &str,
        params: serde_json::Value,
        context: serde_json::Value,
    ) -> serde_json::Value {
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
            "context": context,
        });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
        value
    }

    pub fn request(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.request_with_context(id, method, params, json!({}))
    }

    pub fn request_ok(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Returns the error code of a failed request.
    pub fn request_err(&mut self, id: &str, method: &str, params: serde_json::Value) -> String {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn open_workspace(&mut self, workspace: &TempDir) {
        self.request_ok(
            "ws",
            "workspace.select",
            json!({ "path": workspace.path().to_string_lossy() }),
        );
    }

    /// Id of the seeded learner with the given login.
    pub fn student_id(&mut self, login: &str) -> String {
        let list = self.request_ok("students", "students.list", json!({}));
        list["students"]
            .as_array()
            .expect("students")
            .iter()
            .find(|s| s["loginId"] == login)
            .and_then(|s| s["id"].as_str())
            .expect("seeded student")
            .to_string()
    }
}
