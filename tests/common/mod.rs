//! Common test utilities

use pingback::models::{SeedMode, ServerConfig};
use pingback::oob::OobServer;
use std::sync::Arc;

/// Server config bound to loopback with the given seeding policy
pub fn test_config(seed_mode: SeedMode) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        seed_mode,
        ..ServerConfig::default()
    }
}

/// Starts a server on an ephemeral port, returning its base URL
pub async fn start_server(config: ServerConfig) -> (String, Arc<OobServer>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = Arc::new(OobServer::new(config));
    let running = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = running.serve(listener).await {
            eprintln!("OOB server error: {}", e);
        }
    });

    (format!("http://127.0.0.1:{}", port), server)
}
