//! Scheduled eviction of idle rate-limit buckets.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::rate_limit::ClientLimiter;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Drop buckets that have fully replenished; they carry no state worth keeping.
pub fn run_cleanup(limiter: &ClientLimiter) {
    let before = limiter.len();
    limiter.retain_recent();
    limiter.shrink_to_fit();
    let evicted = before.saturating_sub(limiter.len());
    if evicted > 0 {
        debug!("Evicted {} idle rate-limit buckets", evicted);
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(limiter: Arc<ClientLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&limiter);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::{Quota, RateLimiter};
    use std::num::NonZeroU32;

    #[test]
    fn test_cleanup_keeps_active_buckets() {
        let limiter: ClientLimiter =
            RateLimiter::keyed(Quota::per_hour(NonZeroU32::new(1).unwrap()));
        let key = "caller".to_string();

        assert!(limiter.check_key(&key).is_ok());
        run_cleanup(&limiter);

        // Bucket still exhausted, so it must not have been evicted.
        assert!(limiter.check_key(&key).is_err());
        assert_eq!(limiter.len(), 1);
    }
}
