use axum::{http::StatusCode, response::IntoResponse, response::Json};
use kiosk_remote_core::net::ip_addresses;
use serde_json::{Value, json};

use super::ApiResult;
use crate::models::{ApiResponse, IpAddressesResponse};

/// Health check endpoint for container health monitoring
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Test the API
///
/// Answers `{success: true}` once the caller is authenticated.
#[utoipa::path(
    get,
    path = "/api/test",
    responses(
        (status = 200, description = "API reachable", body = ApiResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn api_test() -> Json<Value> {
    Json(json!({"success": true}))
}

/// List IP addresses
///
/// Non-internal IPv4 addresses per network interface.
#[utoipa::path(
    get,
    path = "/api/getIP",
    responses(
        (status = 200, description = "Addresses listed", body = IpAddressesResponse),
        (status = 400, description = "Interfaces could not be read", body = ApiResponse)
    )
)]
pub async fn get_ip() -> ApiResult {
    let addresses = ip_addresses()?;
    Ok(Json(json!({"success": true, "data": addresses})))
}
