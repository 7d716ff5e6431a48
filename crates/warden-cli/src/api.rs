//! Decision HTTP API.
//!
//! Every path except the health endpoint is a decision request for the
//! request it describes. A proxy in front of the gateway may describe the
//! original request through `X-Forwarded-Method`, `X-Forwarded-Proto`,
//! `X-Forwarded-Host` and `X-Forwarded-Uri`.

use std::collections::BTreeMap;
use std::future::Future;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use http::header::{HOST, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;
use warden_core::Request;
use warden_rules::{Decision, Executor};

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/.well-known/health";

const FORWARDED_METHOD: &str = "x-forwarded-method";
const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";
const FORWARDED_URI: &str = "x-forwarded-uri";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct ApiState {
    executor: Executor,
    verbose_errors: bool,
}

impl ApiState {
    /// State answering through `executor`.
    pub fn new(executor: Executor, verbose_errors: bool) -> Self {
        Self {
            executor,
            verbose_errors,
        }
    }
}

/// Build the router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .fallback(decide)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: ApiState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn decide(
    State(state): State<ApiState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match described_request(method, &uri, headers, body) {
        Ok(request) => request,
        Err(message) => {
            tracing::debug!(%uri, error = %message, "Malformed decision request");
            return (StatusCode::BAD_REQUEST, message).into_response();
        }
    };

    match state.executor.decide(request).await {
        Decision::Allowed {
            headers, cookies, ..
        } => allowed(headers, cookies),
        Decision::Denied { error, response } => {
            let body = if state.verbose_errors {
                Json(json!({
                    "code": error.kind().to_string(),
                    "message": error.to_string(),
                }))
                .into_response()
            } else {
                ().into_response()
            };
            let mut denied = (response.status, body).into_response();
            append_headers(denied.headers_mut(), &response.headers);
            denied
        }
    }
}

/// The request a decision is made for, honouring `X-Forwarded-*` overrides.
fn described_request(
    method: Method,
    uri: &Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Request, String> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let method = match header(FORWARDED_METHOD) {
        Some(raw) => Method::from_bytes(raw.trim().as_bytes())
            .map_err(|_| format!("invalid {FORWARDED_METHOD} '{raw}'"))?,
        None => method,
    };
    let scheme = header(FORWARDED_PROTO)
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");
    let host = header(FORWARDED_HOST)
        .or_else(|| header(HOST.as_str()))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let path = header(FORWARDED_URI)
        .or_else(|| uri.path_and_query().map(|p| p.as_str()))
        .unwrap_or("/");

    let url = Url::parse(&format!("{scheme}://{host}{path}"))
        .map_err(|e| format!("invalid request url: {e}"))?;

    Ok(Request::new(method, url)
        .with_headers(headers)
        .with_body(body.to_vec()))
}

fn allowed(headers: BTreeMap<String, String>, cookies: BTreeMap<String, String>) -> Response {
    let mut response = StatusCode::OK.into_response();
    append_headers(response.headers_mut(), &headers);
    for (name, value) in &cookies {
        match HeaderValue::from_str(&format!("{name}={value}")) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(_) => tracing::debug!(cookie = %name, "Skipping invalid upstream cookie"),
        }
    }
    response
}

fn append_headers(target: &mut HeaderMap, headers: &BTreeMap<String, String>) {
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                target.append(name, value);
            }
            _ => tracing::debug!(header = %name, "Skipping invalid response header"),
        }
    }
}
