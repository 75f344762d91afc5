//! Error handling for kiosk-remote-http
//!
//! Every failure leaves the API as `{success: false, ...}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kiosk_remote_core::{RemoteError, RemoteResponse};
use serde_json::json;

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Failure reported by the dispatcher
    Remote(RemoteError),

    /// Request rejected before reaching the dispatcher
    BadRequest(String),
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        Self::Remote(err)
    }
}

impl PartialEq<StatusCode> for AppError {
    fn eq(&self, status_code: &StatusCode) -> bool {
        &self.status() == status_code
    }
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Remote(RemoteError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Remote(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Remote(err) => RemoteResponse::from_error(err).to_json(),
            Self::BadRequest(message) => json!({"success": false, "message": message}),
        };
        (status, Json(body)).into_response()
    }
}
