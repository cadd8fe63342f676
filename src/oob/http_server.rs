//! HTTP callback server for OOB interaction capture
//!
//! Routes:
//! - `ANY /api/pingback[/...]` records a generic HTTP interaction
//! - `GET|POST /api/dns-pingback` records a DNS-simulated interaction
//! - `GET /api/requests` returns the newest-first interaction log

use super::dns::{simulate_answer, SimulatedAnswer};
use super::ingest::{parse_pairs, Normalizer, RawBody, RawHttpRequest};
use super::{DNS_PINGBACK_PATH, PINGBACK_PATH, REQUESTS_PATH};
use crate::error::Result;
use crate::models::{FieldMap, Interaction, SeedMode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body as HttpBody, Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::any::Any;
use std::convert::Infallible;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Everything a request handler needs, cloned into each connection
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub normalizer: Normalizer,
    pub seed_mode: SeedMode,
    pub max_body_bytes: usize,
}

#[derive(Serialize)]
struct PingbackAck<'a> {
    message: String,
    request: RequestEcho<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestEcho<'a> {
    id: &'a str,
    method: &'a str,
    timestamp: String,
    url: &'a str,
    body_received: bool,
}

#[derive(Serialize)]
struct DnsAck<'a> {
    message: &'static str,
    dns_query: DnsQueryEcho<'a>,
    dns_response: SimulatedAnswer,
}

#[derive(Serialize)]
struct DnsQueryEcho<'a> {
    id: &'a str,
    domain: &'a str,
    #[serde(rename = "type")]
    query_type: &'a str,
    timestamp: String,
    client_ip: &'a str,
}

#[derive(Serialize)]
struct RequestsPage<'a> {
    requests: &'a [Interaction],
    count: usize,
}

#[derive(Serialize)]
struct FailureAck {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    requests: Option<Vec<Interaction>>,
}

/// Accepts connections on `listener` until the task is dropped
pub async fn serve(listener: TcpListener, context: HandlerContext) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("OOB HTTP server listening on http://{}", addr);

    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("OOB HTTP accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let context = context.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let context = context.clone();
                async move { Ok::<_, Infallible>(handle_request(req, &context).await) }
            });

            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                debug!("OOB HTTP connection error from {}: {}", remote_addr, e);
            }
        });
    }
}

/// Routes a single request
pub async fn handle_request<B>(req: Request<B>, context: &HandlerContext) -> Response<Full<Bytes>>
where
    B: HttpBody,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    match path.as_str() {
        REQUESTS_PATH => {
            if method == Method::GET || method == Method::HEAD {
                list_interactions(context)
            } else {
                method_not_allowed(&method)
            }
        }
        DNS_PINGBACK_PATH => {
            if method == Method::GET || method == Method::POST {
                dns_pingback(req, context)
            } else {
                method_not_allowed(&method)
            }
        }
        p if p == PINGBACK_PATH || p.starts_with("/api/pingback/") => pingback(req, context).await,
        _ => json_response(
            StatusCode::NOT_FOUND,
            &FailureAck {
                error: "Not found".to_string(),
                message: format!("No route for {}", path),
                requests: None,
            },
        ),
    }
}

async fn pingback<B>(req: Request<B>, context: &HandlerContext) -> Response<Full<Bytes>>
where
    B: HttpBody,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let method = parts.method.to_string();

    let body = if parts.method == Method::GET || parts.method == Method::HEAD {
        None
    } else {
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        read_body(body, content_type, context.max_body_bytes).await
    };

    let raw = RawHttpRequest {
        method: method.clone(),
        url: request_url(&parts.uri, &parts.headers),
        headers: collect_headers(&parts.headers),
        query: parse_pairs(parts.uri.query().unwrap_or("").as_bytes()),
        body,
    };

    let normalizer = &context.normalizer;
    match contain_fault(format!("Failed to process {} request", method), || {
        normalizer.ingest_http(raw)
    }) {
        Ok(interaction) => json_response(
            StatusCode::OK,
            &PingbackAck {
                message: format!("{} pingback received successfully", method),
                request: RequestEcho {
                    id: &interaction.id,
                    method: &interaction.method,
                    timestamp: interaction.received_at_iso(),
                    url: &interaction.target,
                    body_received: !interaction.body.is_absent(),
                },
            },
        ),
        Err(fault) => fault,
    }
}

fn dns_pingback<B>(req: Request<B>, context: &HandlerContext) -> Response<Full<Bytes>> {
    let query = parse_pairs(req.uri().query().unwrap_or("").as_bytes());
    let headers = collect_headers(req.headers());

    let normalizer = &context.normalizer;
    let interaction = match contain_fault("Failed to process DNS pingback".to_string(), || {
        normalizer.ingest_dns_simulated(query, headers)
    }) {
        Ok(interaction) => interaction,
        Err(fault) => return fault,
    };

    let query_type = query_field(&interaction, "query_type");

    json_response(
        StatusCode::OK,
        &DnsAck {
            message: "DNS pingback received successfully",
            dns_query: DnsQueryEcho {
                id: &interaction.id,
                domain: query_field(&interaction, "resolved_domain"),
                query_type,
                timestamp: interaction.received_at_iso(),
                client_ip: query_field(&interaction, "client_ip"),
            },
            dns_response: simulate_answer(query_type),
        },
    )
}

fn query_field<'a>(interaction: &'a Interaction, key: &str) -> &'a str {
    interaction.query.get(key).map(String::as_str).unwrap_or("")
}

fn list_interactions(context: &HandlerContext) -> Response<Full<Bytes>> {
    let store = context.normalizer.store();
    if context.seed_mode == SeedMode::OnRead {
        store.seed_demo_data_if_empty();
    }

    match store.try_snapshot() {
        Ok(requests) => json_response(
            StatusCode::OK,
            &RequestsPage {
                requests: &requests,
                count: requests.len(),
            },
        ),
        Err(e) => {
            error!("Failed to fetch requests: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &FailureAck {
                    error: "Failed to fetch requests".to_string(),
                    message: e.to_string(),
                    requests: Some(Vec::new()),
                },
            )
        }
    }
}

/// Collects the body up to `limit` bytes; an empty, oversized or broken body counts as absent
async fn read_body<B>(body: B, content_type: Option<String>, limit: usize) -> Option<RawBody>
where
    B: HttpBody,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => {
            let data = collected.to_bytes();
            if data.is_empty() {
                None
            } else {
                Some(RawBody { content_type, data })
            }
        }
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            None
        }
    }
}

/// Flattens headers into a map; repeated headers are joined with `", "`
pub fn collect_headers(headers: &HeaderMap) -> FieldMap {
    let mut map = FieldMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        map.entry(name.to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    map
}

/// Rebuilds the absolute request URL from the request line and `Host`
pub fn request_url(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .and_then(|p| p.split(',').next())
        .map(str::trim)
        .filter(|p| p.eq_ignore_ascii_case("https"))
        .map_or("http", |_| "https");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    format!("{}://{}{}", scheme, host, path)
}

fn method_not_allowed(method: &Method) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &FailureAck {
            error: "Method not allowed".to_string(),
            message: format!("{} is not supported on this endpoint", method),
            requests: None,
        },
    )
}

/// Runs an ingestion step, turning a panic into a failure ack
fn contain_fault<T>(
    error: String,
    step: impl FnOnce() -> T,
) -> std::result::Result<T, Response<Full<Bytes>>> {
    catch_unwind(AssertUnwindSafe(step)).map_err(|panic| fault_response(error, &*panic))
}

fn fault_response(error: String, panic: &(dyn Any + Send)) -> Response<Full<Bytes>> {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unknown error".to_string());
    error!("{}: {}", error, message);

    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &FailureAck {
            error,
            message,
            requests: None,
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(payload) {
        Ok(body) => Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error")))),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}
