//! Forwarding of authenticated requests to downstream services.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    BoxError,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use url::Url;

use crate::auth::EdgeFailure;

/// Largest request body buffered for forwarding.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [header::HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// One entry of the route table: requests under `prefix` go to `upstream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub prefix: String,
    pub upstream: Url,
}

impl Route {
    fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        path == self.prefix
            || path
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    fn target(&self, path: &str, query: Option<&str>) -> String {
        let base = self.upstream.as_str().trim_end_matches('/');
        match query {
            Some(query) => format!("{}{}?{}", base, path, query),
            None => format!("{}{}", base, path),
        }
    }
}

/// Parse a `PREFIX=URL` route argument.
pub fn parse_route(s: &str) -> Result<Route, String> {
    let (prefix, upstream) = s
        .split_once('=')
        .ok_or_else(|| format!("Route must be PREFIX=URL: {}", s))?;

    let prefix = prefix.trim();
    if !prefix.starts_with('/') {
        return Err(format!("Route prefix must start with '/': {}", prefix));
    }
    if prefix.len() > 1 && prefix.ends_with('/') {
        return Err(format!("Route prefix must not end with '/': {}", prefix));
    }

    let upstream = Url::parse(upstream.trim())
        .map_err(|e| format!("Invalid upstream URL {}: {}", upstream, e))?;
    if !matches!(upstream.scheme(), "http" | "https") {
        return Err(format!("Upstream must use http or https: {}", upstream));
    }

    Ok(Route {
        prefix: prefix.to_string(),
        upstream,
    })
}

/// Errors forwarding a request.
#[derive(Debug)]
pub enum ProxyError {
    /// Request body exceeds the forwarding limit
    BodyTooLarge,
    /// Request body could not be read
    Body(BoxError),
    /// Downstream could not be reached or did not answer in time
    Upstream(reqwest::Error),
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::BodyTooLarge => {
                write!(f, "Request body exceeds {} bytes", MAX_BODY_BYTES)
            }
            ProxyError::Body(e) => write!(f, "Failed to read request body: {}", e),
            ProxyError::Upstream(e) => write!(f, "Upstream request failed: {}", e),
        }
    }
}

impl std::error::Error for ProxyError {}

/// Route table plus the shared HTTP client.
pub struct Proxy {
    routes: Vec<Route>,
    client: reqwest::Client,
}

impl Proxy {
    pub fn new(mut routes: Vec<Route>, timeout: Duration) -> Result<Self, reqwest::Error> {
        // Longest prefix first so the most specific route wins.
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self { routes, client })
    }

    pub fn route_for(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Forward `request` to `route`. Any downstream status is passed through
    /// and the downstream body is streamed back without buffering.
    pub async fn forward(&self, route: &Route, request: Request) -> Result<Response, ProxyError> {
        let target = route.target(request.uri().path(), request.uri().query());
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| {
                let inner = e.into_inner();
                if inner.is::<LengthLimitError>() {
                    ProxyError::BodyTooLarge
                } else {
                    ProxyError::Body(inner)
                }
            })?;

        let mut headers = parts.headers;
        strip_connection_headers(&mut headers);
        headers.remove(header::HOST);

        let upstream = self
            .client
            .request(parts.method, &target)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(ProxyError::Upstream)?;

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_connection_headers(&mut response_headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

fn strip_connection_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Fallback handler for routed traffic.
pub async fn forward_request(State(proxy): State<Arc<Proxy>>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let Some(route) = proxy.route_for(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match proxy.forward(route, request).await {
        Ok(response) => response,
        Err(ProxyError::BodyTooLarge) => {
            tracing::debug!(path = %path, "Request body too large");
            (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
        }
        Err(e) => {
            tracing::warn!(path = %path, upstream = %route.upstream, error = %e, "Forwarding failed");
            EdgeFailure::Unhandled(e.to_string()).into_response()
        }
    }
}
