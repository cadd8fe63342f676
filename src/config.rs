//! Configuration management for the pingback server

use crate::error::{PingbackError, Result};
use crate::models::{SeedMode, ServerConfig};
use serde::Deserialize;
use std::path::Path;

/// File-based configuration structure matching pingback.toml
#[derive(Debug, Deserialize)]
struct FileConfig {
    server: Option<ServerSection>,
    demo: Option<DemoSection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    public_url: Option<String>,
    max_body_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DemoSection {
    seed: Option<SeedMode>,
}

/// Loads configuration from a TOML file and merges with defaults
pub fn load_config(path: &Path) -> Result<ServerConfig> {
    let content = std::fs::read_to_string(path).map_err(PingbackError::IoError)?;
    parse_config(&content)
}

/// Parses TOML configuration text and merges with defaults
pub fn parse_config(content: &str) -> Result<ServerConfig> {
    let file_config: FileConfig = toml::from_str(content)?;

    let mut config = ServerConfig::default();

    if let Some(server) = file_config.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(url) = server.public_url {
            config.public_url = Some(url);
        }
        if let Some(max) = server.max_body_bytes {
            config.max_body_bytes = max;
        }
    }

    if let Some(seed) = file_config.demo.and_then(|d| d.seed) {
        config.seed_mode = seed;
    }

    validate(&config)?;
    Ok(config)
}

/// Merges CLI arguments into an existing ServerConfig
pub fn merge_cli_args(
    config: &mut ServerConfig,
    host: Option<String>,
    port: Option<u16>,
    public_url: Option<String>,
    seed_mode: Option<SeedMode>,
) -> Result<()> {
    if let Some(h) = host {
        config.host = h;
    }
    if let Some(p) = port {
        config.port = p;
    }
    if let Some(u) = public_url {
        config.public_url = Some(u);
    }
    if let Some(s) = seed_mode {
        config.seed_mode = s;
    }
    validate(config)
}

fn validate(config: &ServerConfig) -> Result<()> {
    if config.host.trim().is_empty() {
        return Err(PingbackError::ConfigError("host must not be empty".to_string()));
    }
    if config.max_body_bytes == 0 {
        return Err(PingbackError::ConfigError(
            "max_body_bytes must be greater than zero".to_string(),
        ));
    }
    if let Some(ref url) = config.public_url {
        let parsed = url::Url::parse(url).map_err(|e| {
            PingbackError::ConfigError(format!("invalid public_url '{}': {}", url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PingbackError::ConfigError(format!(
                "public_url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
    }
    Ok(())
}
