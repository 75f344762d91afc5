//! Built-in actions, data queries and widget lifecycle under `/api`.

use axum::{
    extract::{Path, State},
    response::Json,
};
use kiosk_remote_core::RemoteRequest;
use serde_json::{Value, json};

use super::{ApiResult, execute, respond};
use crate::error::AppError;
use crate::models::{ApiResponse, InstallRequest, UpdateConfigRequest};
use crate::server::AppState;

/// Answers the data query `data`.
pub async fn data_query(state: &AppState, data: &str) -> ApiResult {
    execute(state, RemoteRequest::data(data)).await
}

/// Runs the built-in action `action` without parameters.
pub async fn builtin_action(state: &AppState, action: &str) -> ApiResult {
    execute(state, RemoteRequest::action(action)).await
}

/// Read user presence
#[utoipa::path(
    get,
    path = "/api/userpresence",
    responses((status = 200, description = "Current presence in `result`", body = ApiResponse))
)]
pub async fn get_user_presence(State(state): State<AppState>) -> ApiResult {
    data_query(&state, "userPresence").await
}

/// Set user presence
#[utoipa::path(
    get,
    path = "/api/userpresence/{value}",
    params(("value" = String, Path, description = "`true` or `false`")),
    responses(
        (status = 200, description = "Presence updated", body = ApiResponse),
        (status = 400, description = "Value is not a boolean", body = ApiResponse)
    )
)]
pub async fn set_user_presence(
    State(state): State<AppState>,
    Path(value): Path<String>,
) -> ApiResult {
    let present = match value.as_str() {
        "true" => true,
        "false" => false,
        other => {
            return Err(AppError::bad_request(format!(
                "Invalid value {} provided in request. Must be true or false.",
                other
            )));
        }
    };
    let request = RemoteRequest::action("USER_PRESENCE").with_param("value", json!(present));
    execute(&state, request).await
}

/// Update the host application
#[utoipa::path(
    get,
    path = "/api/update",
    responses(
        (status = 200, description = "`code` is `up-to-date` or `restart`", body = ApiResponse),
        (status = 400, description = "Update failed", body = ApiResponse)
    )
)]
pub async fn update_host(State(state): State<AppState>) -> ApiResult {
    builtin_action(&state, "UPDATE").await
}

/// Update a widget
#[utoipa::path(
    get,
    path = "/api/update/{module}",
    params(("module" = String, Path, description = "Widget name")),
    responses(
        (status = 200, description = "`code` is `up-to-date` or `restart`", body = ApiResponse),
        (status = 400, description = "Unknown widget or update failed", body = ApiResponse)
    )
)]
pub async fn update_module(
    State(state): State<AppState>,
    Path(module): Path<String>,
) -> ApiResult {
    let request = RemoteRequest::action("UPDATE").with_param("module", Value::String(module));
    execute(&state, request).await
}

/// Install a widget
#[utoipa::path(
    post,
    path = "/api/install",
    request_body = InstallRequest,
    responses(
        (status = 200, description = "Widget installed", body = ApiResponse),
        (status = 400, description = "Missing URL or install failed", body = ApiResponse)
    )
)]
pub async fn install_module(
    State(state): State<AppState>,
    Json(body): Json<InstallRequest>,
) -> ApiResult {
    let url = body
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::bad_request("Invalid URL provided in request body"))?;
    let request = RemoteRequest::action("INSTALL").with_param("url", Value::String(url));
    execute(&state, request).await
}

pub async fn install_wrong_method() -> AppError {
    AppError::bad_request("Invalid method, use POST")
}

/// Delete a widget
#[utoipa::path(
    post,
    path = "/api/delete/{module}",
    params(("module" = String, Path, description = "Widget name")),
    responses(
        (status = 200, description = "Widget folder removed", body = ApiResponse),
        (status = 400, description = "Refused or failed", body = ApiResponse)
    )
)]
pub async fn delete_module(
    State(state): State<AppState>,
    Path(module): Path<String>,
) -> ApiResult {
    let request = RemoteRequest::action("DELETE").with_param("module", Value::String(module));
    execute(&state, request).await
}

/// Declared defaults of a widget
#[utoipa::path(
    get,
    path = "/api/getModuleConfig/{module}",
    params(("module" = String, Path, description = "Widget name")),
    responses((status = 200, description = "Defaults in `data`", body = ApiResponse))
)]
pub async fn get_module_config(
    State(state): State<AppState>,
    Path(module): Path<String>,
) -> ApiResult {
    let request =
        RemoteRequest::data("defaultConfig").with_param("module", Value::String(module));
    execute(&state, request).await
}

/// Replace the host configuration
///
/// The previous file is kept as a rotating backup and the display reloads.
#[utoipa::path(
    post,
    path = "/api/updateConfig",
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Saved", body = ApiResponse),
        (status = 400, description = "Invalid document or save failed", body = ApiResponse)
    )
)]
pub async fn update_config(
    State(state): State<AppState>,
    Json(body): Json<UpdateConfigRequest>,
) -> ApiResult {
    respond(state.dispatcher.update_config(body.config).await)
}

/// Screen power
#[utoipa::path(
    get,
    path = "/api/monitor/{action}",
    params(("action" = String, Path, description = "`on`, `off`, `toggle` or `status`")),
    responses(
        (status = 200, description = "Screen state in `monitor`", body = ApiResponse),
        (status = 400, description = "Unknown action or command failed", body = ApiResponse)
    )
)]
pub async fn monitor(State(state): State<AppState>, Path(action): Path<String>) -> ApiResult {
    builtin_action(&state, &format!("MONITOR{}", action.to_uppercase())).await
}

pub async fn monitor_status(State(state): State<AppState>) -> ApiResult {
    builtin_action(&state, "MONITORSTATUS").await
}

/// Set brightness
#[utoipa::path(
    get,
    path = "/api/brightness/{value}",
    params(("value" = u32, Path, description = "Brightness level")),
    responses((status = 200, description = "Relayed to the display", body = ApiResponse))
)]
pub async fn set_brightness(State(state): State<AppState>, Path(value): Path<u32>) -> ApiResult {
    let request = RemoteRequest::action("BRIGHTNESS").with_param("value", json!(value));
    execute(&state, request).await
}
