//! Raw notifications, widget commands and widget-contributed routes.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::Method,
};
use kiosk_remote_core::RemoteRequest;
use kiosk_remote_core::dispatcher::notification_payload;

use super::{ApiResult, execute, json_body, query_params, respond};
use crate::models::ApiResponse;
use crate::server::AppState;

/// Path segments of `/api/notification/...` and `/api/module/...`.
#[derive(Debug, serde::Deserialize)]
pub struct NotifyPath {
    notification: Option<String>,
    route: Option<String>,
    action: Option<String>,
    p: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ModulePath {
    name: String,
    action: Option<String>,
}

fn build_payload(
    method: &Method,
    p: Option<String>,
    query: HashMap<String, String>,
    body: &Bytes,
) -> Result<serde_json::Value, crate::error::AppError> {
    let body = if method == Method::POST {
        json_body(body)?
    } else {
        None
    };
    Ok(notification_payload(p, query_params(query), body))
}

/// Relay a notification
///
/// The payload is the optional path parameter, the query string and, for
/// `POST`, the JSON body.
#[utoipa::path(
    post,
    path = "/api/notification/{notification}/{p}",
    params(
        ("notification" = String, Path, description = "Notification name"),
        ("p" = Option<String>, Path, description = "Optional payload parameter")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses((status = 200, description = "Notification relayed", body = ApiResponse))
)]
pub async fn relay_notification(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<NotifyPath>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> ApiResult {
    let name = path.notification.unwrap_or_default();
    let payload = build_payload(&method, path.p, query, &body)?;
    Ok(axum::Json(
        state.dispatcher.relay_notification(&name, payload).to_json(),
    ))
}

/// Widget data or visibility
#[utoipa::path(
    get,
    path = "/api/modules/{name}/{action}",
    params(
        ("name" = String, Path, description = "Widget name, identifier or `all`"),
        ("action" = Option<String>, Path, description = "`show`, `hide`, `toggle`, `force` or `defaults`")
    ),
    responses(
        (status = 200, description = "Command relayed, or widget data in `data`", body = ApiResponse),
        (status = 400, description = "Unknown widget or action", body = ApiResponse)
    )
)]
pub async fn module_command(
    State(state): State<AppState>,
    Path(path): Path<ModulePath>,
) -> ApiResult {
    respond(
        state
            .dispatcher
            .module_command(&path.name, path.action.as_deref())
            .await,
    )
}

/// List widget-contributed routes
#[utoipa::path(
    get,
    path = "/api/module",
    responses((status = 200, description = "Routes keyed by route key", body = ApiResponse))
)]
pub async fn list_routes(State(state): State<AppState>) -> ApiResult {
    Ok(axum::Json(state.dispatcher.list_routes().to_json()))
}

/// Invoke a widget-contributed action
///
/// Without an action, the route's actions are listed.
#[utoipa::path(
    post,
    path = "/api/module/{route}/{action}/{p}",
    params(
        ("route" = String, Path, description = "Route key"),
        ("action" = String, Path, description = "Action name"),
        ("p" = Option<String>, Path, description = "Optional payload parameter")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Notification relayed, or route listing", body = ApiResponse),
        (status = 400, description = "Unknown route, action or method", body = ApiResponse)
    )
)]
pub async fn external_action(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<NotifyPath>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> ApiResult {
    let route = path.route.unwrap_or_default();
    let payload = build_payload(&method, path.p, query, &body)?;
    let request = RemoteRequest::external(route, path.action, method.as_str())
        .with_param("payload", payload);
    execute(&state, request).await
}
