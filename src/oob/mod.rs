//! Out-of-Band (OOB) interaction capture
//!
//! Exposes HTTP and DNS-simulated callback endpoints that payloads under
//! test (SSRF, blind XSS, RCE, SQLi, XXE, DNS exfiltration) can reach, and
//! keeps the most recent interactions for inspection.

pub mod demo;
pub mod dns;
pub mod http_server;
pub mod ingest;
pub mod store;

pub use ingest::{Normalizer, RawBody, RawHttpRequest};
pub use store::{InteractionStore, MAX_INTERACTIONS};

use crate::error::{PingbackError, Result};
use crate::models::{SeedMode, ServerConfig};
use tokio::net::TcpListener;
use tracing::info;
use url::form_urlencoded::byte_serialize;

/// Path of the generic HTTP callback endpoint
pub const PINGBACK_PATH: &str = "/api/pingback";
/// Path of the DNS-simulation endpoint
pub const DNS_PINGBACK_PATH: &str = "/api/dns-pingback";
/// Path of the interaction log endpoint
pub const REQUESTS_PATH: &str = "/api/requests";

/// Generates a unique interaction ID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// OOB callback server owning the interaction store
pub struct OobServer {
    config: ServerConfig,
    store: InteractionStore,
}

impl OobServer {
    /// Creates a server with a fresh, empty store
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            store: InteractionStore::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &InteractionStore {
        &self.store
    }

    /// A normalizer writing into this server's store
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.store.clone())
    }

    /// URL of the generic HTTP callback endpoint
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.config.base_url(), PINGBACK_PATH)
    }

    /// URL of the DNS-simulation endpoint for a given domain and query type
    pub fn dns_callback_url(&self, domain: &str, query_type: &str) -> String {
        format!(
            "{}{}?domain={}&type={}",
            self.config.base_url(),
            DNS_PINGBACK_PATH,
            byte_serialize(domain.as_bytes()).collect::<String>(),
            byte_serialize(query_type.as_bytes()).collect::<String>()
        )
    }

    /// URL of the interaction log endpoint
    pub fn requests_url(&self) -> String {
        format!("{}{}", self.config.base_url(), REQUESTS_PATH)
    }

    /// Binds the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|e| PingbackError::ServerError(format!("Failed to bind to {}: {}", addr, e)))
    }

    /// Binds the configured address and serves callbacks until the task is dropped
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serves callbacks on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if self.config.seed_mode == SeedMode::Startup && self.store.seed_demo_data_if_empty() {
            info!("Seeded demo DNS interactions");
        }

        let context = http_server::HandlerContext {
            normalizer: self.normalizer(),
            seed_mode: self.config.seed_mode,
            max_body_bytes: self.config.max_body_bytes,
        };
        http_server::serve(listener, context).await
    }
}
