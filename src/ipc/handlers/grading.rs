use crate::grading;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

use super::setup;

fn handle_grading_resolve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(mark) = req.params.get("mark").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "mark must be a number", None);
    };
    let bands = match setup::request_bands(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!(grading::grade_for(mark, &bands)))
}

fn handle_grading_legend(state: &mut AppState, req: &Request) -> serde_json::Value {
    let bands = match setup::request_bands(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "bands": grading::legend(&bands) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grading.resolve" => Some(handle_grading_resolve(state, req)),
        "grading.legend" => Some(handle_grading_legend(state, req)),
        _ => None,
    }
}
