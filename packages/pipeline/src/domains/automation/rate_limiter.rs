//! Per-platform hourly submission budget shared by every worker.
//!
//! The default `CheckThenIncrement` mode reads, compares and then increments,
//! so two workers racing on the last slot can both pass; the overshoot is
//! bounded by the number of workers. `IncrementThenCompare` closes that gap
//! by reserving first and rolling back a reservation that went over.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::common::TaskError;
use crate::domains::platforms::Platform;
use crate::kernel::BaseCache;

pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitMode {
    #[default]
    CheckThenIncrement,
    IncrementThenCompare,
}

impl FromStr for RateLimitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check-then-increment" => Ok(RateLimitMode::CheckThenIncrement),
            "increment-then-compare" | "strict" => Ok(RateLimitMode::IncrementThenCompare),
            other => Err(format!(
                "unknown rate limit mode {} (expected check-then-increment or increment-then-compare)",
                other
            )),
        }
    }
}

/// Counter key shared by every spelling of the same platform.
pub fn rate_limit_key(platform: &str) -> String {
    format!("rate_limit:{}", Platform::canonical_name(platform))
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn BaseCache>,
    limit: i64,
    window: Duration,
    mode: RateLimitMode,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn BaseCache>, limit: i64, mode: RateLimitMode) -> Self {
        Self {
            cache,
            limit,
            window: RATE_LIMIT_WINDOW,
            mode,
        }
    }

    /// Reserve one submission for `platform` or fail without consuming budget.
    pub async fn check_and_reserve(&self, platform: &str) -> Result<(), TaskError> {
        let key = rate_limit_key(platform);
        match self.mode {
            RateLimitMode::CheckThenIncrement => self.check_then_increment(platform, &key).await,
            RateLimitMode::IncrementThenCompare => {
                self.increment_then_compare(platform, &key).await
            }
        }
    }

    async fn check_then_increment(&self, platform: &str, key: &str) -> Result<(), TaskError> {
        let count = self
            .cache
            .get(key)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);

        if count >= self.limit {
            return Err(self.exceeded(platform, count));
        }

        let reserved = self.cache.incr(key).await?;
        self.cache.expire(key, self.window).await?;
        debug!(platform, reserved, limit = self.limit, "rate limit slot reserved");
        Ok(())
    }

    async fn increment_then_compare(&self, platform: &str, key: &str) -> Result<(), TaskError> {
        let reserved = self.cache.incr(key).await?;
        self.cache.expire(key, self.window).await?;

        if reserved > self.limit {
            if let Err(e) = self.cache.decr(key).await {
                warn!(platform, error = %e, "failed to roll back rate limit reservation");
            }
            return Err(self.exceeded(platform, reserved - 1));
        }

        debug!(platform, reserved, limit = self.limit, "rate limit slot reserved");
        Ok(())
    }

    fn exceeded(&self, platform: &str, count: i64) -> TaskError {
        TaskError::RateLimitExceeded {
            platform: Platform::canonical_name(platform),
            count,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::MemoryCache;

    fn limiter(cache: &Arc<MemoryCache>, mode: RateLimitMode) -> RateLimiter {
        RateLimiter::new(cache.clone(), 5, mode)
    }

    #[tokio::test]
    async fn test_refuses_at_threshold_without_mutating() {
        let cache = Arc::new(MemoryCache::new());
        cache.set_counter("rate_limit:linkedin", 5, Duration::from_secs(600));

        let err = limiter(&cache, RateLimitMode::CheckThenIncrement)
            .check_and_reserve("LinkedIn")
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "rate-limited");
        assert_eq!(cache.value("rate_limit:linkedin").as_deref(), Some("5"));
        assert!(cache.ttl("rate_limit:linkedin").unwrap() <= Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reservation_refreshes_window() {
        let cache = Arc::new(MemoryCache::new());

        limiter(&cache, RateLimitMode::CheckThenIncrement)
            .check_and_reserve("indeed")
            .await
            .unwrap();

        assert_eq!(cache.value("rate_limit:indeed").as_deref(), Some("1"));
        assert_eq!(cache.ttl("rate_limit:indeed"), Some(RATE_LIMIT_WINDOW));
    }

    #[tokio::test]
    async fn test_padded_platform_shares_the_budget() {
        let cache = Arc::new(MemoryCache::new());
        cache.set_counter("rate_limit:linkedin", 5, Duration::from_secs(600));

        let err = limiter(&cache, RateLimitMode::CheckThenIncrement)
            .check_and_reserve(" LinkedIn ")
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "rate-limited");
        assert!(err.to_string().contains("linkedin"));
        assert!(cache.value("rate_limit: linkedin").is_none());
        assert!(cache.value("rate_limit: linkedin ").is_none());
    }

    #[test]
    fn test_mode_parses_from_env_values() {
        assert_eq!(
            " Increment-Then-Compare ".parse::<RateLimitMode>().unwrap(),
            RateLimitMode::IncrementThenCompare
        );
        assert_eq!(
            "check-then-increment".parse::<RateLimitMode>().unwrap(),
            RateLimitMode::CheckThenIncrement
        );
        assert!("lenient".parse::<RateLimitMode>().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_reservations_are_counted_exactly() {
        let cache = Arc::new(MemoryCache::new());
        let limiter = RateLimiter::new(cache.clone(), 100, RateLimitMode::CheckThenIncrement);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check_and_reserve("naukri").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(cache.value("rate_limit:naukri").as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn test_strict_mode_never_exceeds_limit() {
        let cache = Arc::new(MemoryCache::new());
        let limiter = limiter(&cache, RateLimitMode::IncrementThenCompare);

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check_and_reserve("monster").await.is_ok() })
            })
            .collect();
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 5);
        assert_eq!(cache.value("rate_limit:monster").as_deref(), Some("5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_returns_after_window() {
        let cache = Arc::new(MemoryCache::new());
        let limiter = limiter(&cache, RateLimitMode::CheckThenIncrement);
        for _ in 0..5 {
            limiter.check_and_reserve("glassdoor").await.unwrap();
        }
        assert!(limiter.check_and_reserve("glassdoor").await.is_err());

        tokio::time::advance(RATE_LIMIT_WINDOW + Duration::from_secs(1)).await;

        assert!(limiter.check_and_reserve("glassdoor").await.is_ok());
    }
}
