//! Kiosk remote control HTTP server
//!
//! Serves the `/api` surface, the legacy query routes and the WebSocket the
//! display process connects to.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

use server::{ServerConfig, start_server};

/// Start the server with a custom configuration
pub async fn start_with_config(config: ServerConfig) -> anyhow::Result<()> {
    start_server(config).await
}
