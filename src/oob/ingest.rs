//! Normalizes inbound callbacks into [`Interaction`] records
//!
//! Both entry points are total: malformed input degrades to a partial
//! record plus a log line, and the record is always stored.

use crate::models::{
    iso_timestamp, Body, FieldMap, Interaction, InteractionKind, DNS_QUERY_METHOD,
};
use chrono::Utc;
use hyper::body::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

use super::generate_id;
use super::store::InteractionStore;

/// Query type used when the caller does not name one
pub const DEFAULT_DNS_TYPE: &str = "A";
/// Placeholder for a missing domain or client address
pub const UNKNOWN: &str = "unknown";

/// A request body as delivered by the transport layer
#[derive(Debug, Clone, Default)]
pub struct RawBody {
    /// Value of the `Content-Type` header, if any
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Transport-agnostic description of an inbound HTTP callback
#[derive(Debug, Clone, Default)]
pub struct RawHttpRequest {
    pub method: String,
    /// Absolute request URL
    pub url: String,
    pub headers: FieldMap,
    pub query: FieldMap,
    /// `None` when no body was sent or the stream could not be read
    pub body: Option<RawBody>,
}

/// Failure to interpret a body under its declared content type
#[derive(Debug, Error)]
pub enum BodyParseError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Interprets body bytes according to the declared content type
pub fn parse_body(content_type: Option<&str>, data: &[u8]) -> Result<Body, BodyParseError> {
    if data.is_empty() {
        return Ok(Body::Absent);
    }

    let content_type = content_type.unwrap_or("").to_ascii_lowercase();
    if content_type.contains("application/json") {
        let value: serde_json::Value = serde_json::from_slice(data)?;
        if value.is_null() {
            return Ok(Body::Absent);
        }
        Ok(Body::Json(value))
    } else if content_type.contains("application/x-www-form-urlencoded") {
        Ok(Body::FormFields(parse_pairs(data)))
    } else {
        Ok(Body::Text(String::from_utf8_lossy(data).into_owned()))
    }
}

/// Parses `a=1&b=2` style pairs; a repeated key keeps its last value
pub fn parse_pairs(data: &[u8]) -> FieldMap {
    url::form_urlencoded::parse(data).into_owned().collect()
}

/// Builds interactions from inbound callbacks and records them in the store
#[derive(Debug, Clone)]
pub struct Normalizer {
    store: InteractionStore,
}

impl Normalizer {
    pub fn new(store: InteractionStore) -> Self {
        Self { store }
    }

    /// The store this normalizer writes to
    pub fn store(&self) -> &InteractionStore {
        &self.store
    }

    /// Records a generic HTTP callback
    pub fn ingest_http(&self, request: RawHttpRequest) -> Interaction {
        let body = match request.body {
            None => Body::Absent,
            Some(raw) => match parse_body(raw.content_type.as_deref(), &raw.data) {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        "Could not parse {} body for {} {}: {}",
                        raw.content_type.as_deref().unwrap_or("untyped"),
                        request.method,
                        request.url,
                        e
                    );
                    Body::Unparsable
                }
            },
        };

        let interaction = Interaction {
            id: generate_id(),
            kind: InteractionKind::Http,
            method: request.method,
            target: request.url,
            headers: request.headers,
            query: request.query,
            body,
            received_at: Utc::now(),
        };

        debug!(
            "OOB HTTP interaction {}: {} {}",
            interaction.id, interaction.method, interaction.target
        );

        self.store.insert(interaction.clone());
        interaction
    }

    /// Records a DNS-shaped callback delivered over HTTP
    pub fn ingest_dns_simulated(&self, mut query: FieldMap, mut headers: FieldMap) -> Interaction {
        let dns_type = non_empty(&query, "type").unwrap_or(DEFAULT_DNS_TYPE).to_string();
        let domain = non_empty(&query, "domain")
            .or_else(|| non_empty(&query, "q"))
            .unwrap_or(UNKNOWN)
            .to_string();
        let client_ip = header_value(&headers, "x-forwarded-for")
            .or_else(|| header_value(&headers, "x-real-ip"))
            .unwrap_or(UNKNOWN)
            .to_string();

        let received_at = Utc::now();

        headers.insert("dns-query-type".to_string(), dns_type.clone());
        headers.insert("dns-domain".to_string(), domain.clone());
        headers.insert("client-ip".to_string(), client_ip.clone());
        headers.insert("dns-timestamp".to_string(), iso_timestamp(&received_at));

        query.insert("resolved_domain".to_string(), domain.clone());
        query.insert("query_type".to_string(), dns_type.clone());
        query.insert("client_ip".to_string(), client_ip.clone());

        let interaction = Interaction {
            id: generate_id(),
            kind: InteractionKind::DnsSimulated,
            method: DNS_QUERY_METHOD.to_string(),
            target: format!("{domain} ({dns_type})"),
            headers,
            query,
            body: Body::Absent,
            received_at,
        };

        debug!(
            "OOB DNS interaction {}: {} from {}",
            interaction.id, interaction.target, client_ip
        );

        self.store.insert(interaction.clone());
        interaction
    }
}

fn non_empty<'a>(map: &'a FieldMap, key: &str) -> Option<&'a str> {
    map.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Header names are matched case-insensitively
fn header_value<'a>(headers: &'a FieldMap, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(InteractionStore::new())
    }

    fn post(content_type: &str, body: &str) -> RawHttpRequest {
        RawHttpRequest {
            method: "POST".to_string(),
            url: "http://oob.test/api/pingback".to_string(),
            body: Some(RawBody {
                content_type: Some(content_type.to_string()),
                data: Bytes::from(body.to_string()),
            }),
            ..RawHttpRequest::default()
        }
    }

    #[test]
    fn test_json_body() {
        let n = normalizer();
        let interaction = n.ingest_http(post("application/json", r#"{"a":1}"#));
        assert_eq!(interaction.kind, InteractionKind::Http);
        assert_eq!(interaction.method, "POST");
        assert_eq!(interaction.body, Body::Json(json!({"a": 1})));
        assert_eq!(n.store().snapshot()[0], interaction);
    }

    #[test]
    fn test_json_null_counts_as_no_body() {
        let interaction = normalizer().ingest_http(post("application/json", "null"));
        assert!(interaction.body.is_absent());
        assert_eq!(
            parse_body(Some("application/json"), b" null ").unwrap(),
            Body::Absent
        );
    }

    #[test]
    fn test_json_with_charset() {
        let interaction =
            normalizer().ingest_http(post("Application/JSON; charset=utf-8", "[1,2]"));
        assert_eq!(interaction.body, Body::Json(json!([1, 2])));
    }

    #[test]
    fn test_malformed_json_still_recorded() {
        let n = normalizer();
        let interaction = n.ingest_http(post("application/json", "{not json"));
        assert_eq!(interaction.body, Body::Unparsable);
        assert_eq!(n.store().len(), 1);
    }

    #[test]
    fn test_form_body() {
        let interaction = normalizer().ingest_http(post(
            "application/x-www-form-urlencoded",
            "test=123&domain=x.test&test=456&msg=hello+world",
        ));
        match interaction.body {
            Body::FormFields(fields) => {
                assert_eq!(fields["test"], "456");
                assert_eq!(fields["domain"], "x.test");
                assert_eq!(fields["msg"], "hello world");
            }
            other => panic!("expected form fields, got {:?}", other),
        }
    }

    #[test]
    fn test_text_and_untyped_bodies() {
        let n = normalizer();
        assert_eq!(
            n.ingest_http(post("text/plain", "ping")).body,
            Body::Text("ping".to_string())
        );
        assert_eq!(
            n.ingest_http(post("application/xml", "<x/>")).body,
            Body::Text("<x/>".to_string())
        );

        let mut untyped = post("", "raw");
        if let Some(ref mut body) = untyped.body {
            body.content_type = None;
        }
        assert_eq!(n.ingest_http(untyped).body, Body::Text("raw".to_string()));
    }

    #[test]
    fn test_missing_or_empty_body_is_absent() {
        let n = normalizer();
        let get = RawHttpRequest {
            method: "GET".to_string(),
            url: "http://oob.test/api/pingback?ssrf=1".to_string(),
            ..RawHttpRequest::default()
        };
        assert!(n.ingest_http(get).body.is_absent());
        assert!(n.ingest_http(post("application/json", "")).body.is_absent());
    }

    #[test]
    fn test_ids_are_unique() {
        let n = normalizer();
        let ids: std::collections::HashSet<String> = (0..100)
            .map(|_| n.ingest_http(RawHttpRequest::default()).id)
            .collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_dns_defaults() {
        let interaction = normalizer().ingest_dns_simulated(FieldMap::new(), FieldMap::new());
        assert_eq!(interaction.kind, InteractionKind::DnsSimulated);
        assert_eq!(interaction.method, "DNS_QUERY");
        assert_eq!(interaction.target, "unknown (A)");
        assert_eq!(interaction.query["resolved_domain"], "unknown");
        assert_eq!(interaction.query["query_type"], "A");
        assert_eq!(interaction.headers["client-ip"], "unknown");
        assert!(interaction.body.is_absent());
    }

    #[test]
    fn test_dns_with_input() {
        let mut query = FieldMap::new();
        query.insert("domain".to_string(), "evil.test".to_string());
        query.insert("type".to_string(), "TXT".to_string());
        let mut headers = FieldMap::new();
        headers.insert("x-forwarded-for".to_string(), "10.0.0.5".to_string());

        let interaction = normalizer().ingest_dns_simulated(query, headers);
        assert_eq!(interaction.target, "evil.test (TXT)");
        assert_eq!(interaction.headers["dns-domain"], "evil.test");
        assert_eq!(interaction.headers["client-ip"], "10.0.0.5");
        assert_eq!(interaction.headers["x-forwarded-for"], "10.0.0.5");
        assert_eq!(interaction.query["query_type"], "TXT");
        assert_eq!(interaction.query["domain"], "evil.test");
        assert_eq!(
            interaction.headers["dns-timestamp"],
            interaction.received_at_iso()
        );
    }

    #[test]
    fn test_dns_fallbacks() {
        let mut query = FieldMap::new();
        query.insert("domain".to_string(), String::new());
        query.insert("q".to_string(), "leak.example.test".to_string());
        let mut headers = FieldMap::new();
        headers.insert("X-Real-IP".to_string(), "192.0.2.7".to_string());

        let interaction = normalizer().ingest_dns_simulated(query, headers);
        assert_eq!(interaction.target, "leak.example.test (A)");
        assert_eq!(interaction.headers["client-ip"], "192.0.2.7");
    }

    #[test]
    fn test_parse_body_reports_json_errors() {
        assert!(matches!(
            parse_body(Some("application/json"), b"{"),
            Err(BodyParseError::Json(_))
        ));
    }
}
