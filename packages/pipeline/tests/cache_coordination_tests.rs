//! Integration tests for cross-process coordination over real Redis.

mod common;

use std::time::Duration;

use common::TestHarness;
use futures::future::join_all;
use pipeline_core::common::TaskError;
use pipeline_core::domains::automation::{
    rate_limit_key, RateLimitMode, RateLimiter, ResultStore, RESULT_TTL,
};
use pipeline_core::domains::applications::TaskResult;
use pipeline_core::domains::tracking::{HistoryMaintenance, SweepLock, SWEEP_LOCK_KEY};
use pipeline_core::kernel::BaseCache;
use test_context::test_context;
use uuid::Uuid;

fn unique_platform() -> String {
    format!("itest-{}", Uuid::new_v4().simple())
}

#[test_context(TestHarness)]
#[tokio::test]
async fn rate_limiter_refuses_at_threshold_without_incrementing(ctx: &TestHarness) {
    let limiter = RateLimiter::new(ctx.cache.clone(), 2, RateLimitMode::CheckThenIncrement);
    let platform = unique_platform();

    limiter.check_and_reserve(&platform).await.unwrap();
    limiter.check_and_reserve(&platform).await.unwrap();
    let err = limiter.check_and_reserve(&platform).await.unwrap_err();

    assert!(matches!(err, TaskError::RateLimitExceeded { count: 2, limit: 2, .. }));
    let counter = ctx.cache.get(&rate_limit_key(&platform)).await.unwrap();
    assert_eq!(counter.as_deref(), Some("2"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_reservations_are_all_counted(ctx: &TestHarness) {
    let limiter = RateLimiter::new(ctx.cache.clone(), 100, RateLimitMode::CheckThenIncrement);
    let platform = unique_platform();

    let results = join_all((0..10).map(|_| {
        let limiter = limiter.clone();
        let platform = platform.clone();
        async move { limiter.check_and_reserve(&platform).await }
    }))
    .await;

    assert!(results.iter().all(Result::is_ok));
    let counter = ctx.cache.get(&rate_limit_key(&platform)).await.unwrap();
    assert_eq!(counter.as_deref(), Some("10"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn strict_mode_never_exceeds_the_limit(ctx: &TestHarness) {
    let limiter = RateLimiter::new(ctx.cache.clone(), 3, RateLimitMode::IncrementThenCompare);
    let platform = unique_platform();

    let results = join_all((0..8).map(|_| {
        let limiter = limiter.clone();
        let platform = platform.clone();
        async move { limiter.check_and_reserve(&platform).await }
    }))
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    let counter = ctx.cache.get(&rate_limit_key(&platform)).await.unwrap();
    assert_eq!(counter.as_deref(), Some("3"));
}

// Both lock checks share the one global key, so they run in sequence here.
#[test_context(TestHarness)]
#[tokio::test]
async fn sweep_lock_is_exclusive_and_expires(ctx: &TestHarness) {
    ctx.cache.del(SWEEP_LOCK_KEY).await.unwrap();
    let lock = SweepLock::new(ctx.cache.clone(), Duration::from_secs(1));

    let guard = lock.try_acquire().await.unwrap().expect("first acquisition");
    assert!(lock.try_acquire().await.unwrap().is_none());
    guard.release().await;

    let _abandoned = lock.try_acquire().await.unwrap().expect("after release");
    assert!(lock.try_acquire().await.unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let again = lock.try_acquire().await.unwrap().expect("after expiry");
    again.release().await;
}

#[test_context(TestHarness)]
#[tokio::test]
async fn results_round_trip_through_redis(ctx: &TestHarness) {
    let store = ResultStore::new(ctx.cache.clone(), RESULT_TTL);
    let task_id = format!("task-{}", Uuid::new_v4());
    let result = TaskResult::Failed {
        platform: "indeed".to_string(),
        failed_at: chrono::Utc::now(),
        error: "Unsupported platform: dice".to_string(),
        reason: "unsupported-platform".to_string(),
    };

    store.store(&task_id, &result).await.unwrap();

    assert_eq!(store.fetch(&task_id).await.unwrap(), Some(result));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn history_trim_uses_redis_ltrim(ctx: &TestHarness) {
    ctx.cache.del("email_history").await.unwrap();
    for i in 0..12 {
        ctx.cache
            .lpush("email_history", &format!("email-{}", i))
            .await
            .unwrap();
    }

    let remaining = HistoryMaintenance::new(ctx.cache.clone(), 10)
        .run()
        .await
        .unwrap();

    assert_eq!(remaining, 10);
}
