//! Core data models for the pingback endpoint

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Method marker recorded for every DNS-simulated interaction
pub const DNS_QUERY_METHOD: &str = "DNS_QUERY";

/// Body value recorded when a declared content type could not be parsed
pub const UNPARSABLE_BODY: &str = "Could not parse body";

/// Header or query-parameter mapping, keyed by name as received
pub type FieldMap = BTreeMap<String, String>;

/// How an interaction reached the endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    /// A plain HTTP callback against the generic endpoint
    #[serde(rename = "http")]
    Http,
    /// An HTTP callback shaped like a DNS query
    #[serde(rename = "dns")]
    DnsSimulated,
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionKind::Http => write!(f, "HTTP"),
            InteractionKind::DnsSimulated => write!(f, "DNS"),
        }
    }
}

/// Captured request body, tagged by how it was interpreted
///
/// Serializes shape-preserving: consumers see a string, a JSON value or a
/// flat object, never the tag itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// No body was sent, or the stream could not be read
    #[default]
    Absent,
    /// Raw text (`text/*` and any undeclared type)
    Text(String),
    /// Parsed `application/json`
    Json(serde_json::Value),
    /// Parsed `application/x-www-form-urlencoded`
    FormFields(FieldMap),
    /// A declared content type whose payload failed to parse
    Unparsable,
}

impl Body {
    pub fn is_absent(&self) -> bool {
        matches!(self, Body::Absent)
    }
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Body::Absent => serializer.serialize_none(),
            Body::Text(text) => serializer.serialize_str(text),
            Body::Json(value) => value.serialize(serializer),
            Body::FormFields(fields) => fields.serialize(serializer),
            Body::Unparsable => serializer.serialize_str(UNPARSABLE_BODY),
        }
    }
}

/// One captured out-of-band callback
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Unique interaction ID, never reused within a store
    pub id: String,
    /// Transport classification, fixed at creation
    pub kind: InteractionKind,
    /// HTTP method, or `DNS_QUERY` for DNS-simulated interactions
    pub method: String,
    /// Full request URL, or `"<domain> (<type>)"` for DNS-simulated interactions
    pub target: String,
    pub headers: FieldMap,
    pub query: FieldMap,
    #[serde(skip_serializing_if = "Body::is_absent")]
    pub body: Body,
    /// Ingestion time
    #[serde(serialize_with = "serialize_iso")]
    pub received_at: DateTime<Utc>,
}

fn serialize_iso<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&iso_timestamp(ts))
}

impl Interaction {
    /// `received_at` rendered as ISO-8601 with millisecond precision
    pub fn received_at_iso(&self) -> String {
        iso_timestamp(&self.received_at)
    }

    pub fn is_dns(&self) -> bool {
        self.kind == InteractionKind::DnsSimulated
    }
}

/// Formats a timestamp as ISO-8601 UTC with milliseconds (`2024-01-01T00:00:00.000Z`)
pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// When the demo DNS interactions are placed in the store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    /// Seed once while the server starts
    #[default]
    Startup,
    /// Seed before every read of the interaction log
    OnRead,
    /// Never seed
    Off,
}

impl std::str::FromStr for SeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "startup" => Ok(SeedMode::Startup),
            "on_read" | "on-read" => Ok(SeedMode::OnRead),
            "off" | "none" => Ok(SeedMode::Off),
            other => Err(format!(
                "invalid seed mode '{other}' (use: startup, on_read, off)"
            )),
        }
    }
}

/// Runtime configuration for the callback server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port to bind
    pub port: u16,
    /// Externally reachable base URL used when printing callback endpoints
    pub public_url: Option<String>,
    /// Upper bound on a captured request body
    pub max_body_bytes: usize,
    /// Demo data seeding policy
    pub seed_mode: SeedMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
            public_url: None,
            max_body_bytes: 1024 * 1024,
            seed_mode: SeedMode::Startup,
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL callers should use to reach this server
    pub fn base_url(&self) -> String {
        match self.public_url {
            Some(ref url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = if self.host == "0.0.0.0" {
                    "127.0.0.1"
                } else {
                    self.host.as_str()
                };
                format!("http://{}:{}", host, self.port)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_serializes_without_tag() {
        assert_eq!(
            serde_json::to_value(Body::Text("hi".into())).unwrap(),
            serde_json::json!("hi")
        );
        assert_eq!(
            serde_json::to_value(Body::Unparsable).unwrap(),
            serde_json::json!(UNPARSABLE_BODY)
        );
        let mut fields = FieldMap::new();
        fields.insert("a".into(), "1".into());
        assert_eq!(
            serde_json::to_value(Body::FormFields(fields)).unwrap(),
            serde_json::json!({"a": "1"})
        );
    }

    #[test]
    fn test_absent_body_is_omitted() {
        let interaction = Interaction {
            id: "x".into(),
            kind: InteractionKind::Http,
            method: "GET".into(),
            target: "http://h/".into(),
            headers: FieldMap::new(),
            query: FieldMap::new(),
            body: Body::Absent,
            received_at: Utc::now(),
        };
        let value = serde_json::to_value(&interaction).unwrap();
        assert!(value.get("body").is_none());
        assert_eq!(value["kind"], "http");
        assert!(value.get("receivedAt").is_some());
    }

    #[test]
    fn test_received_at_uses_millisecond_iso() {
        let received_at = DateTime::parse_from_rfc3339("2024-05-01T12:30:03.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let interaction = Interaction {
            id: "x".into(),
            kind: InteractionKind::DnsSimulated,
            method: DNS_QUERY_METHOD.into(),
            target: "unknown (A)".into(),
            headers: FieldMap::new(),
            query: FieldMap::new(),
            body: Body::Absent,
            received_at,
        };
        let value = serde_json::to_value(&interaction).unwrap();
        assert_eq!(value["receivedAt"], "2024-05-01T12:30:03.123Z");
        assert_eq!(value["receivedAt"], interaction.received_at_iso());
    }

    #[test]
    fn test_seed_mode_parse() {
        assert_eq!("startup".parse::<SeedMode>().unwrap(), SeedMode::Startup);
        assert_eq!("on-read".parse::<SeedMode>().unwrap(), SeedMode::OnRead);
        assert_eq!("OFF".parse::<SeedMode>().unwrap(), SeedMode::Off);
        assert!("later".parse::<SeedMode>().is_err());
    }

    #[test]
    fn test_base_url() {
        let config = ServerConfig::default();
        assert_eq!(config.base_url(), "http://127.0.0.1:8888");

        let config = ServerConfig {
            public_url: Some("https://oob.example.test/".into()),
            ..ServerConfig::default()
        };
        assert_eq!(config.base_url(), "https://oob.example.test");
    }
}
