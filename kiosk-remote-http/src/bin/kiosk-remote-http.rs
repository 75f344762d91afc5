use clap::Parser;
use kiosk_remote_http::{self, server::ServerConfig};
use secrecy::SecretString;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Kiosk remote control server
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "KIOSK_REMOTE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "KIOSK_REMOTE_PORT", default_value_t = 8080)]
    port: u16,

    /// Service configuration file (JSON)
    #[arg(short, long, env = "KIOSK_REMOTE_CONFIG")]
    config: Option<PathBuf>,

    /// API key guarding the /api routes
    #[arg(long, env = "KIOSK_REMOTE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log level (error, warn, info, debug, trace), used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        remote_config: cli.config,
        api_key: cli.api_key.map(SecretString::from),
    };

    tracing::info!(
        "Starting kiosk remote control on {}:{}",
        config.host,
        config.port
    );
    kiosk_remote_http::start_with_config(config).await
}
