use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::students::try_handle,
    handlers::study::try_handle,
    handlers::goals::try_handle,
    handlers::psych::try_handle,
    handlers::vocab::try_handle,
    handlers::generation::try_handle,
    handlers::parents::try_handle,
    handlers::teachers::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    for try_handle in FAMILIES {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
