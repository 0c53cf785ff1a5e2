#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, Uri},
    routing::get,
};
use gatehouse::{
    GatewayConfig,
    jwt::{Claims, SigningKeys},
    proxy::parse_route,
    rate_limit::RateLimitConfig,
};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

pub const ACCESS_SECRET: &[u8] = b"gateway-access-secret-for-integration-tests";
pub const REFRESH_SECRET: &[u8] = b"gateway-refresh-secret-for-integration-tests";

pub const CLIENT_ADDR: &str = "203.0.113.7:52100";

/// Size of the `/api/tests/large` downstream response, above the request body limit.
pub const LARGE_RESPONSE_BYTES: usize = 20 * 1024 * 1024;

pub fn keys() -> SigningKeys {
    SigningKeys::from_bytes(ACCESS_SECRET, REFRESH_SECRET).expect("Invalid test keys")
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn sign(secret: &[u8], member_id: i64, exp: u64) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        &Claims { member_id, exp },
        &EncodingKey::from_secret(secret),
    )
    .expect("Failed to sign token")
}

/// Valid access token for `member_id`, expiring in five minutes.
pub fn access_token(member_id: i64) -> String {
    sign(ACCESS_SECRET, member_id, now() + 300)
}

/// Valid refresh token for `member_id`, expiring in two weeks.
pub fn refresh_token(member_id: i64) -> String {
    sign(REFRESH_SECRET, member_id, now() + 14 * 24 * 60 * 60)
}

/// Correctly signed access token that expired a minute ago.
pub fn expired_access_token(member_id: i64) -> String {
    sign(ACCESS_SECRET, member_id, now() - 60)
}

/// Downstream service echoing what it received as JSON.
///
/// `/api/tests/missing` answers 404 and `/api/tests/broken` answers 500, each
/// with a body the gateway must pass through untouched. `/api/tests/large`
/// answers with [`LARGE_RESPONSE_BYTES`] bytes.
pub async fn start_downstream() -> SocketAddr {
    async fn echo(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let status = match uri.path() {
            "/api/tests/missing" => StatusCode::NOT_FOUND,
            "/api/tests/broken" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        };
        let member_ids: Vec<&str> = headers
            .get_all("member-id")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();

        (
            status,
            Json(json!({
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query(),
                "member_ids": member_ids,
                "cookie": headers.get("cookie").and_then(|v| v.to_str().ok()),
                "body": body,
            })),
        )
    }

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local address");
    let app = Router::new()
        .route(
            "/api/tests/large",
            get(|| async { vec![b'x'; LARGE_RESPONSE_BYTES] }),
        )
        .fallback(echo);

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    addr
}

/// Address nothing listens on.
pub async fn dead_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    listener.local_addr().expect("Failed to get local address")
}

pub fn config(upstream: SocketAddr, rate_limit: Option<RateLimitConfig>) -> GatewayConfig {
    GatewayConfig {
        keys: keys(),
        routes: vec![parse_route(&format!("/api/tests=http://{}", upstream)).unwrap()],
        rate_limit,
        upstream_timeout: Duration::from_secs(5),
    }
}

/// Request as it would arrive through `into_make_service_with_connect_info`.
pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    let mut request = builder.body(body).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(CLIENT_ADDR.parse::<SocketAddr>().unwrap()));
    request
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}
