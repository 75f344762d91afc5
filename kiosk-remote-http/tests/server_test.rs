use kiosk_remote_http::server::{ServerConfig, start_server};
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;
use tokio::time::timeout;

#[test]
fn test_server_config_default() {
    let config = ServerConfig::default();

    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert!(config.remote_config.is_none());
    assert!(config.api_key.is_none());
}

#[test]
fn test_server_address_parsing() {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 8081,
        ..ServerConfig::default()
    };

    let addr = format!("{}:{}", config.host, config.port)
        .parse::<SocketAddr>()
        .unwrap();

    assert_eq!(addr.ip().to_string(), "127.0.0.1");
    assert_eq!(addr.port(), 8081);
}

#[test]
fn test_load_remote_config_with_key_override() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"host_root": "/opt/display", "api_key": "from-file"}}"#
    )
    .unwrap();

    let config = ServerConfig {
        remote_config: Some(file.path().to_path_buf()),
        ..ServerConfig::default()
    };
    let remote = config.load_remote_config().unwrap();
    assert_eq!(remote.api_key.unwrap().expose_secret(), "from-file");

    let config = ServerConfig {
        remote_config: Some(file.path().to_path_buf()),
        api_key: Some(SecretString::from("from-cli".to_string())),
        ..ServerConfig::default()
    };
    let remote = config.load_remote_config().unwrap();
    assert_eq!(remote.api_key.unwrap().expose_secret(), "from-cli");
}

#[test]
fn test_load_remote_config_missing_file() {
    let config = ServerConfig {
        remote_config: Some("/definitely/not/here.json".into()),
        ..ServerConfig::default()
    };
    assert!(config.load_remote_config().is_err());
}

#[tokio::test]
#[ignore] // Binds a real port and touches the default host root
async fn test_server_startup() {
    let port = find_available_port().expect("Failed to find an available port");
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..ServerConfig::default()
    };

    // The server runs until cancelled, so a timeout means it started.
    let result = timeout(Duration::from_secs(1), start_server(config)).await;
    assert!(result.is_err(), "Server should still be running");
}

fn find_available_port() -> Option<u16> {
    (10000..11000).find(|port| TcpListener::bind(("127.0.0.1", *port)).is_ok())
}
