pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod jwt;
pub mod proxy;
pub mod rate_limit;

use axum::{Router, middleware, routing::get};
use jwt::{SigningKeys, TokenCodec};
use proxy::{Proxy, Route, forward_request};
use rate_limit::{RateLimitConfig, rate_limit_clients};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct GatewayConfig {
    /// Access and refresh verification keys
    pub keys: SigningKeys,
    /// Authenticated route table
    pub routes: Vec<Route>,
    /// Per-client throttling, disabled when `None`
    pub rate_limit: Option<RateLimitConfig>,
    /// Timeout for a single downstream request
    pub upstream_timeout: Duration,
}

/// Create the gateway router with the given configuration.
///
/// `/health` is public. Everything else is throttled (when enabled), then
/// authenticated, then forwarded along the route table.
pub fn create_app(config: &GatewayConfig) -> Result<Router, reqwest::Error> {
    let codec = Arc::new(TokenCodec::new(config.keys.clone()));
    let proxy = Arc::new(Proxy::new(config.routes.clone(), config.upstream_timeout)?);

    let mut routed: Router = Router::new()
        .fallback(forward_request)
        .with_state(proxy)
        .layer(middleware::from_fn_with_state(codec, auth::require_access_token));

    // Added last so it runs before authentication.
    if let Some(rate_limit) = config.rate_limit.clone() {
        routed = routed.layer(middleware::from_fn_with_state(rate_limit, rate_limit_clients));
    }

    Ok(Router::new()
        .route("/health", get(|| async { "ok" }))
        .fallback_service(routed))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: GatewayConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    if let Some(rate_limit) = &config.rate_limit {
        cleanup::spawn_cleanup_scheduler(rate_limit.limiter.clone());
    }
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: GatewayConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
