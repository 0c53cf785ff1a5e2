//! CLI argument parsing, validation, and startup helpers.

use std::num::NonZeroU32;
use std::time::Duration;

use crate::GatewayConfig;
use crate::auth::{ClientIpHeader, ClientKeyResolver};
use crate::jwt::{SigningKeys, TokenType};
use crate::proxy::{Route, parse_route};
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use tracing::{error, info};

/// Environment variable holding the base64 access-token secret.
pub const ACCESS_SECRET_ENV: &str = "ACCESS_SECRET";

/// Environment variable holding the base64 refresh-token secret.
pub const REFRESH_SECRET_ENV: &str = "REFRESH_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gatehouse",
    about = "API gateway authenticating requests by access-token cookie"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Path to file containing the base64 access-token secret. Prefer the ACCESS_SECRET env var
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the base64 refresh-token secret. Prefer the REFRESH_SECRET env var
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Authenticated route as PREFIX=URL, e.g. /api/tests=http://localhost:8081 (repeatable)
    #[arg(short, long = "route", value_parser = parse_route)]
    pub routes: Vec<Route>,

    /// Take the client IP from this proxy header (only behind a trusted reverse proxy)
    #[arg(long)]
    pub ip_header: Option<ClientIpHeader>,

    /// Requests per second allowed per client; throttling is off when unset
    #[arg(long)]
    pub rate_limit_per_second: Option<NonZeroU32>,

    /// Burst capacity per client (defaults to --rate-limit-per-second)
    #[arg(long, requires = "rate_limit_per_second")]
    pub rate_limit_burst: Option<NonZeroU32>,

    /// Timeout in seconds for a single downstream request
    #[arg(long, default_value = "30")]
    pub upstream_timeout_secs: u64,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load one base64 secret from its environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(token_type: TokenType, secret_file: Option<&str>) -> Option<String> {
    let (env_var, flag) = match token_type {
        TokenType::Access => (ACCESS_SECRET_ENV, "--access-secret-file"),
        TokenType::Refresh => (REFRESH_SECRET_ENV, "--refresh-secret-file"),
    };

    if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        return Some(secret.trim().to_string());
    }

    match secret_file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(content) => Some(content.trim().to_string()),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                None
            }
        },
        None => {
            error!(
                "Secret is required. Set {} environment variable (recommended) or use {}",
                env_var, flag
            );
            None
        }
    }
}

/// Load and decode both signing keys.
/// Returns None and logs an error if either key is missing or invalid.
pub fn load_signing_keys(args: &Args) -> Option<SigningKeys> {
    let access = load_secret(TokenType::Access, args.access_secret_file.as_deref())?;
    let refresh = load_secret(TokenType::Refresh, args.refresh_secret_file.as_deref())?;

    match SigningKeys::from_base64(&access, &refresh) {
        Ok(keys) => Some(keys),
        Err(e) => {
            error!(error = %e, "Invalid signing secret");
            None
        }
    }
}

/// Build GatewayConfig from validated arguments.
pub fn build_config(args: &Args, keys: SigningKeys) -> GatewayConfig {
    if args.routes.is_empty() {
        info!("No routes configured; every routed request will return 404");
    }
    for route in &args.routes {
        info!(prefix = %route.prefix, upstream = %route.upstream, "Route");
    }

    let rate_limit = args.rate_limit_per_second.map(|per_second| {
        RateLimitConfig::new(
            per_second,
            args.rate_limit_burst,
            ClientKeyResolver::new(args.ip_header),
        )
    });

    GatewayConfig {
        keys,
        routes: args.routes.clone(),
        rate_limit,
        upstream_timeout: Duration::from_secs(args.upstream_timeout_secs),
    }
}
