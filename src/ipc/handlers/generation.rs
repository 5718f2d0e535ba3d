use crate::generation::Moment;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

// Neither method needs a workspace: both only reach the adapter.

fn handle_motivation(state: &mut AppState, req: &Request) -> serde_json::Value {
    let moment = match required_str(req, "moment") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(moment) = Moment::parse(&moment) else {
        return err(&req.id, "bad_params", "moment must be start or finish", None);
    };
    let message = state.generator.motivation(moment, state.live_generation(req));
    ok(&req.id, json!({ "message": message }))
}

fn handle_books(state: &mut AppState, req: &Request) -> serde_json::Value {
    let books = state.generator.book_recommendations(state.live_generation(req));
    ok(&req.id, json!({ "books": books }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "generate.motivation" => Some(handle_motivation(state, req)),
        "generate.books" => Some(handle_books(state, req)),
        _ => None,
    }
}
