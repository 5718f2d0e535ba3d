use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Reply for lines that could not be parsed into a request. There is no
/// id to echo back.
pub fn bad_json(message: impl Into<String>) -> serde_json::Value {
    json!({
        "id": serde_json::Value::Null,
        "ok": false,
        "error": { "code": "bad_json", "message": message.into() },
    })
}
