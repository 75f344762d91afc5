use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, Request, State},
    http::{Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::server::AppState;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized: Wrong API Key Provided!")]
    WrongKey,

    #[error("Forbidden: API Key Not Provided!")]
    MissingKey,

    #[error("Incorrect content-type, must be 'application/json'")]
    ContentType,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::WrongKey => StatusCode::UNAUTHORIZED,
            AuthError::MissingKey => StatusCode::FORBIDDEN,
            AuthError::ContentType => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({"success": false, "message": self.to_string()}));
        (self.status(), body).into_response()
    }
}

/// Axum middleware guarding the `/api` routes.
///
/// The key is only checked when one is configured. It is read from an
/// `Authorization: apiKey <key>` header, else from the `apiKey` query
/// parameter.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(expected) = state.dispatcher.api_key().await {
        check_api_key(&request, &expected)?;
    }
    if request.method() == Method::POST && !is_json(&request) {
        return Err(AuthError::ContentType);
    }
    Ok(next.run(request).await)
}

fn check_api_key(request: &Request, expected: &str) -> Result<(), AuthError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| value.contains("apiKey"));

    if let Some(header) = header {
        return match header.split(' ').nth(1) {
            Some(key) if key == expected => Ok(()),
            _ => Err(AuthError::WrongKey),
        };
    }

    match query_api_key(request) {
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(AuthError::WrongKey),
        None => Err(AuthError::MissingKey),
    }
}

fn query_api_key(request: &Request) -> Option<String> {
    let Query(mut query) = Query::<HashMap<String, String>>::try_from_uri(request.uri()).ok()?;
    query.remove("apiKey")
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, authorization: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_header_key() {
        assert_eq!(check_api_key(&request("/api/test", Some("apiKey s3cret")), "s3cret"), Ok(()));
        assert_eq!(
            check_api_key(&request("/api/test", Some("apiKey nope")), "s3cret"),
            Err(AuthError::WrongKey)
        );
    }

    #[test]
    fn test_query_key() {
        assert_eq!(check_api_key(&request("/api/test?apiKey=s3cret", None), "s3cret"), Ok(()));
        assert_eq!(
            check_api_key(&request("/api/test?a=1&apiKey=x", None), "s3cret"),
            Err(AuthError::WrongKey)
        );
        assert_eq!(
            check_api_key(&request("/api/test", Some("Bearer s3cret")), "s3cret"),
            Err(AuthError::MissingKey)
        );
    }

    #[test]
    fn test_query_key_is_decoded() {
        assert_eq!(check_api_key(&request("/api/test?apiKey=a%26b", None), "a&b"), Ok(()));
        assert_eq!(
            check_api_key(&request("/api/test?apiKey=two+words&x=1", None), "two words"),
            Ok(())
        );
        assert_eq!(
            check_api_key(&request("/api/test?apiKey=a&b", None), "a&b"),
            Err(AuthError::WrongKey)
        );
    }
}
