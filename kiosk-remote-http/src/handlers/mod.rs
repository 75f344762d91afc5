pub mod actions;
pub mod legacy;
pub mod notify;
pub mod socket;
pub mod system;

// Re-export all handlers for easier imports
pub use actions::*;
pub use legacy::*;
pub use notify::*;
pub use socket::*;
pub use system::*;

use std::collections::HashMap;

use axum::{body::Bytes, response::Json};
use kiosk_remote_core::{RemoteRequest, RemoteResponse, RemoteResult};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::server::AppState;

pub type ApiResult = Result<Json<Value>, AppError>;

/// Turns a dispatcher result into the HTTP answer.
pub fn respond(result: RemoteResult<RemoteResponse>) -> ApiResult {
    Ok(Json(result?.to_json()))
}

/// Executes `request` and answers with its normalized response.
pub async fn execute(state: &AppState, request: RemoteRequest) -> ApiResult {
    respond(state.dispatcher.execute(request).await)
}

/// Query parameters without the API key.
pub fn query_params(query: HashMap<String, String>) -> Map<String, Value> {
    let mut params: Vec<_> = query
        .into_iter()
        .filter(|(key, _)| key != "apiKey")
        .collect();
    params.sort();
    params
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

/// Parses an optional JSON request body.
pub fn json_body(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::bad_request(format!("Invalid JSON body: {}", e)))
}
