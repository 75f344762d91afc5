//! Query-string routes kept for older remote clients. These are not behind
//! the API key.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
};
use kiosk_remote_core::RemoteRequest;
use serde_json::Value;

use super::{ApiResult, execute, json_body, respond};
use crate::error::AppError;
use crate::server::AppState;

/// `GET /remote?action=...`
pub async fn legacy_remote(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult {
    let request = RemoteRequest::from_query(query);
    if request.action.is_none() {
        return Err(AppError::bad_request(format!(
            "Unknown command, original input: {}",
            request.describe()
        )));
    }
    execute(&state, request).await
}

/// `GET /get?data=...`
pub async fn legacy_get(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult {
    execute(&state, RemoteRequest::from_query(query)).await
}

/// `POST /post?data=config` with the new configuration as body.
pub async fn legacy_post(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> ApiResult {
    match query.get("data").map(String::as_str) {
        Some("config") => {
            let config = json_body(&body)?.unwrap_or(Value::Null);
            respond(state.dispatcher.save_config(config).await)
        }
        other => Err(AppError::bad_request(format!(
            "Unknown or Bad Command: {}",
            other.unwrap_or_default()
        ))),
    }
}
