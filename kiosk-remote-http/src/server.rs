use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use kiosk_remote_core::{Dispatcher, NotificationBus, RemoteConfig};
use secrecy::SecretString;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::routes::create_api_router;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Service configuration file, defaults apply when absent
    pub remote_config: Option<PathBuf>,

    /// Overrides the API key of the service configuration
    pub api_key: Option<SecretString>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            remote_config: None,
            api_key: None,
        }
    }
}

impl ServerConfig {
    /// Loads the service configuration this server runs with.
    pub fn load_remote_config(&self) -> anyhow::Result<RemoteConfig> {
        let mut config = match &self.remote_config {
            Some(path) => RemoteConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => RemoteConfig::default(),
        };
        if self.api_key.is_some() {
            config.api_key = self.api_key.clone();
        }
        Ok(config)
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// State backed by the shell and git, with a fresh notification bus.
    pub fn from_config(config: RemoteConfig) -> Self {
        Self::new(Dispatcher::new(config, NotificationBus::default()))
    }
}

/// Builds the complete application: routes, auth, tracing and CORS.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_api_router(state.clone())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Refreshes the module index once per configured interval.
fn spawn_index_refresh(state: &AppState) {
    let dispatcher = state.dispatcher.clone();
    let interval = dispatcher.config().module_index.refresh_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let outcome = dispatcher.refresh_module_index(false).await;
            tracing::debug!(?outcome, "Module index refresh finished");
        }
    });
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let remote_config = config.load_remote_config()?;
    let state = AppState::from_config(remote_config);

    state.dispatcher.start().await;
    if state.dispatcher.api_key().await.is_none() {
        warn!("No API key configured, the /api routes are open");
    }
    spawn_index_refresh(&state);

    let app = create_app(state);

    let addr = format!("{}:{}", config.host, config.port)
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
