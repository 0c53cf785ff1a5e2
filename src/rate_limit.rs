//! Per-client rate limiting for routed requests.
//!
//! Uses a token bucket per [`ClientKey`](crate::auth::ClientKey), so
//! authenticated callers are bucketed by token and anonymous callers by
//! hashed IP. Counters live in process memory only.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::ClientKeyResolver;

/// Keyed limiter indexed by client key.
pub type ClientLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for routed requests.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub limiter: Arc<ClientLimiter>,
    pub resolver: ClientKeyResolver,
}

impl RateLimitConfig {
    /// `per_second` replenishes each bucket; `burst` caps it (defaults to `per_second`).
    pub fn new(
        per_second: NonZeroU32,
        burst: Option<NonZeroU32>,
        resolver: ClientKeyResolver,
    ) -> Self {
        let quota = Quota::per_second(per_second).allow_burst(burst.unwrap_or(per_second));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            resolver,
        }
    }
}

/// Middleware rejecting callers whose bucket is empty.
pub async fn rate_limit_clients(
    State(config): State<RateLimitConfig>,
    request: Request,
    next: Next,
) -> Response {
    let key = config.resolver.resolve(&request).into_string();

    match config.limiter.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::debug!(path = %request.uri().path(), "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again later.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_are_per_key() {
        let config = RateLimitConfig::new(
            NonZeroU32::new(1).unwrap(),
            Some(NonZeroU32::new(2).unwrap()),
            ClientKeyResolver::default(),
        );

        let alice = "alice-token".to_string();
        let bob = "bob-token".to_string();

        assert!(config.limiter.check_key(&alice).is_ok());
        assert!(config.limiter.check_key(&alice).is_ok());
        assert!(config.limiter.check_key(&alice).is_err());
        assert!(config.limiter.check_key(&bob).is_ok());
    }
}
