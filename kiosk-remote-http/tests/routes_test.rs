use std::{path::Path, sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use kiosk_remote_core::{
    Dispatcher, Notification, NotificationBus, Registration, RemoteConfig, command::MockCommandRunner,
    names, vcs::MockVersionControl,
};
use kiosk_remote_http::server::{AppState, create_app};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

fn create_test_state(root: &Path, api_key: Option<&str>) -> AppState {
    let mut config = RemoteConfig::with_root(root);
    config.snapshot_timeout = Duration::from_millis(50);
    config.api_key = api_key.map(|key| SecretString::from(key.to_string()));
    AppState::new(Dispatcher::with_runtime(
        config,
        NotificationBus::default(),
        Arc::new(MockCommandRunner::new()),
        Arc::new(MockVersionControl::new()),
    ))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_is_open() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(create_test_state(root.path(), Some("s3cret")));

    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_api_key() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(create_test_state(root.path(), Some("s3cret")));

    let (status, body) = send(&app, get("/api/test")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body,
        json!({"success": false, "message": "Forbidden: API Key Not Provided!"})
    );

    let (status, body) = send(&app, get("/api/test?apiKey=wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Unauthorized: Wrong API Key Provided!"));

    let (status, body) = send(&app, get("/api/test?apiKey=s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let request = Request::builder()
        .uri("/api/test")
        .header("Authorization", "apiKey s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_api_open_without_configured_key() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(create_test_state(root.path(), None));

    let (status, body) = send(&app, get("/api/test")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn test_post_requires_json() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(create_test_state(root.path(), None));

    let request = Request::builder()
        .uri("/api/updateConfig")
        .method("POST")
        .header("Content-Type", "text/plain")
        .body(Body::from("config"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!("Incorrect content-type, must be 'application/json'")
    );
}

#[tokio::test]
async fn test_show_alert_through_legacy_route() {
    let root = tempfile::tempdir().unwrap();
    let state = create_test_state(root.path(), Some("s3cret"));
    let mut rx = state.dispatcher.bus().subscribe();
    let app = create_app(state);

    let (status, body) = send(&app, get("/remote?action=SHOW_ALERT&title=Note")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
    assert_eq!(
        rx.drain(),
        vec![Notification::new(
            names::SHOW_ALERT,
            json!({"type": "alert", "title": "Note", "message": "Attention!", "timer": 4000})
        )]
    );
}

#[tokio::test]
async fn test_brightness_before_display_reports() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(create_test_state(root.path(), None));

    let (status, body) = send(&app, get("/api/brightness")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["reason"], json!("not_initialized"));
}

#[tokio::test]
async fn test_unknown_legacy_command() {
    let root = tempfile::tempdir().unwrap();
    let state = create_test_state(root.path(), None);
    let mut rx = state.dispatcher.bus().subscribe();
    let app = create_app(state);

    let (status, body) = send(&app, get("/remote?action=DANCE")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["info"], json!("Invalid Option: DANCE"));
    assert!(rx.drain().is_empty());
}

#[tokio::test]
async fn test_user_presence() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(create_test_state(root.path(), None));

    let (status, body) = send(&app, get("/api/userpresence/maybe")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!("Invalid value maybe provided in request. Must be true or false.")
    );

    let (status, _) = send(&app, get("/api/userpresence/true")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, get("/api/userpresence")).await;
    assert_eq!(body["result"], json!(true));
}

#[tokio::test]
async fn test_notification_relay() {
    let root = tempfile::tempdir().unwrap();
    let state = create_test_state(root.path(), None);
    let mut rx = state.dispatcher.bus().subscribe();
    let app = create_app(state);

    let (status, body) = send(&app, get("/api/notification/PAGE_CHANGED/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "notification": "PAGE_CHANGED", "payload": "2"})
    );

    let (_, body) = send(
        &app,
        post_json("/api/notification/PAGE_CHANGED/2?speed=fast", json!({"page": 3})),
    )
    .await;
    assert_eq!(
        body["payload"],
        json!({"param": "2", "speed": "fast", "page": 3})
    );

    let emitted = rx.drain();
    assert_eq!(emitted.len(), 2);
    assert_eq!(
        emitted[0],
        Notification::new(
            names::NOTIFICATION,
            json!({"notification": "PAGE_CHANGED", "payload": "2"})
        )
    );
}

#[tokio::test]
async fn test_external_module_routes() {
    let root = tempfile::tempdir().unwrap();
    let state = create_test_state(root.path(), None);
    let registration: Registration = serde_json::from_value(json!({
        "module": "MMM-Carousel",
        "path": "carousel",
        "actions": {
            "next": {"notification": "CAROUSEL_NEXT", "method": "POST"}
        }
    }))
    .unwrap();
    state.dispatcher.routes().register(registration);
    let app = create_app(state);

    let (status, body) = send(&app, post_json("/api/module/carousel/next", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notification"], json!("CAROUSEL_NEXT"));

    let (status, body) = send(&app, get("/api/module/carousel/next")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["info"],
        json!("Method GET is not allowed for carousel/next.")
    );

    let (status, body) = send(&app, get("/api/module")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["carousel"]["ownerModule"], json!("MMM-Carousel"));

    let (status, body) = send(&app, get("/api/module/weather")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["info"], json!("No API routes found for weather."));
}

#[tokio::test]
async fn test_install_requires_post_and_url() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(create_test_state(root.path(), None));

    let (status, body) = send(&app, get("/api/install")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid method, use POST"));

    let (status, body) = send(&app, post_json("/api/install", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid URL provided in request body"));
}

#[tokio::test]
async fn test_update_config_saves_and_refreshes() {
    let root = tempfile::tempdir().unwrap();
    let state = create_test_state(root.path(), None);
    let mut rx = state.dispatcher.bus().subscribe();
    let app = create_app(state);

    let (status, body) = send(
        &app,
        post_json(
            "/api/updateConfig",
            json!({"config": {"language": "de", "modules": []}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(root.path().join("config/config.js").exists());
    assert!(root.path().join("config/config.js.backup1").exists());
    assert_eq!(rx.drain(), vec![Notification::bare(names::REFRESH)]);
}
