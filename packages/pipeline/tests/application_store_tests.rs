//! Integration tests for the Postgres application store.
//!
//! Each test works on fresh user ids; shared-table queries are filtered to them.

mod common;

use chrono::{Duration, Utc};
use common::{insert_application, insert_credentials, TestHarness};
use pipeline_core::domains::applications::{
    ApplicationRecord, ApplicationStatus, ApplicationStore, AttemptRecord, CredentialStore,
    PgApplicationStore, PgCredentialStore,
};
use pipeline_core::domains::platforms::Platform;
use serde_json::json;
use test_context::test_context;
use uuid::Uuid;

const WIDE: i64 = 10_000;

fn attempt(user_id: Uuid, status: ApplicationStatus, last_error: Option<&str>) -> AttemptRecord {
    AttemptRecord {
        user_id,
        platform: Platform::LinkedIn,
        platform_job_id: "3791234567".to_string(),
        job_title: "Backend Engineer".to_string(),
        company: "Acme".to_string(),
        link: "https://www.linkedin.com/jobs/view/3791234567/".to_string(),
        status,
        last_error: last_error.map(str::to_string),
        metadata: json!({ "taskId": "task-1" }),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_query_never_returns_terminal_statuses(ctx: &TestHarness) {
    let store = PgApplicationStore::new(ctx.db_pool.clone());
    let user_id = Uuid::new_v4();
    let long_ago = Utc::now() - Duration::days(10);

    let mut trackable = Vec::new();
    for status in [ApplicationStatus::Applied, ApplicationStatus::Reviewing] {
        trackable.push(
            insert_application(&ctx.db_pool, user_id, Platform::Indeed, status, long_ago, None)
                .await
                .unwrap(),
        );
    }
    for status in [
        ApplicationStatus::Failed,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
        ApplicationStatus::Closed,
        ApplicationStatus::Interview,
        ApplicationStatus::Pending,
    ] {
        insert_application(&ctx.db_pool, user_id, Platform::Indeed, status, long_ago, None)
            .await
            .unwrap();
    }

    let stale: Vec<ApplicationRecord> = store
        .find_stale_for_status_check(Utc::now() - Duration::hours(24), WIDE)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.user_id == user_id)
        .collect();

    let mut ids: Vec<Uuid> = stale.iter().map(|r| r.id).collect();
    ids.sort();
    trackable.sort();
    assert_eq!(ids, trackable);
    assert!(stale.iter().all(|r| !r.status.is_terminal()));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_query_respects_the_check_cutoff(ctx: &TestHarness) {
    let store = PgApplicationStore::new(ctx.db_pool.clone());
    let user_id = Uuid::new_v4();
    let now = Utc::now();

    let recent = insert_application(
        &ctx.db_pool,
        user_id,
        Platform::Monster,
        ApplicationStatus::Applied,
        now - Duration::days(5),
        Some(now - Duration::hours(3)),
    )
    .await
    .unwrap();
    let old = insert_application(
        &ctx.db_pool,
        user_id,
        Platform::Monster,
        ApplicationStatus::Applied,
        now - Duration::days(5),
        Some(now - Duration::hours(30)),
    )
    .await
    .unwrap();

    let ids: Vec<Uuid> = store
        .find_stale_for_status_check(now - Duration::hours(24), WIDE)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.user_id == user_id)
        .map(|r| r.id)
        .collect();

    assert_eq!(ids, vec![old]);
    assert!(!ids.contains(&recent));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn follow_up_flag_flips_exactly_once(ctx: &TestHarness) {
    let store = PgApplicationStore::new(ctx.db_pool.clone());
    let user_id = Uuid::new_v4();
    let id = insert_application(
        &ctx.db_pool,
        user_id,
        Platform::LinkedIn,
        ApplicationStatus::Applied,
        Utc::now() - Duration::days(4),
        None,
    )
    .await
    .unwrap();

    let due = |records: Vec<ApplicationRecord>| records.into_iter().any(|r| r.id == id);
    let cutoff = Utc::now() - Duration::days(3);
    assert!(due(store.find_due_for_follow_up(cutoff, WIDE).await.unwrap()));

    assert!(store.mark_follow_up_sent(id, Utc::now()).await.unwrap());
    assert!(!store.mark_follow_up_sent(id, Utc::now()).await.unwrap());

    assert!(!due(store.find_due_for_follow_up(cutoff, WIDE).await.unwrap()));
    let record = ApplicationRecord::find_by_id(id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert!(record.follow_up_sent);
    assert!(record.follow_up_sent_at.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn status_update_sets_checked_at(ctx: &TestHarness) {
    let store = PgApplicationStore::new(ctx.db_pool.clone());
    let id = insert_application(
        &ctx.db_pool,
        Uuid::new_v4(),
        Platform::Glassdoor,
        ApplicationStatus::Applied,
        Utc::now() - Duration::days(2),
        None,
    )
    .await
    .unwrap();

    store
        .update_status(id, ApplicationStatus::Closed, Utc::now())
        .await
        .unwrap();

    let record = ApplicationRecord::find_by_id(id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ApplicationStatus::Closed);
    assert!(record.status_checked_at.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn record_attempt_upserts_on_the_unique_triple(ctx: &TestHarness) {
    let store = PgApplicationStore::new(ctx.db_pool.clone());
    let user_id = Uuid::new_v4();

    let failed = store
        .record_attempt(&attempt(user_id, ApplicationStatus::Failed, Some("timeout")))
        .await
        .unwrap();
    let applied = store
        .record_attempt(&attempt(user_id, ApplicationStatus::Applied, None))
        .await
        .unwrap();

    assert_eq!(failed.id, applied.id);
    assert_eq!(failed.retries, 1);
    assert_eq!(applied.retries, 2);
    assert_eq!(applied.status, ApplicationStatus::Applied);
    assert!(applied.last_error.is_none());
    assert_eq!(applied.metadata["taskId"], "task-1");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn record_attempt_never_downgrades_progressed_status(ctx: &TestHarness) {
    let store = PgApplicationStore::new(ctx.db_pool.clone());
    let user_id = Uuid::new_v4();

    let first = store
        .record_attempt(&attempt(user_id, ApplicationStatus::Applied, None))
        .await
        .unwrap();
    store
        .update_status(first.id, ApplicationStatus::Interview, Utc::now())
        .await
        .unwrap();

    let retried = store
        .record_attempt(&attempt(
            user_id,
            ApplicationStatus::Failed,
            Some("quick apply not available for this job"),
        ))
        .await
        .unwrap();

    assert_eq!(retried.status, ApplicationStatus::Interview);
    assert_eq!(retried.retries, 2);
    assert_eq!(retried.applied_at, first.applied_at);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn credentials_resolve_by_reference(ctx: &TestHarness) {
    let store = PgCredentialStore::new(ctx.db_pool.clone());
    let reference = format!("cred-{}", Uuid::new_v4());
    insert_credentials(&ctx.db_pool, &reference, Platform::Naukri)
        .await
        .unwrap();

    let found = store.resolve(&reference).await.unwrap().unwrap();

    assert_eq!(found.email, "applicant@example.com");
    assert_eq!(found.phone.as_deref(), Some("5551234567"));
    assert!(store.resolve("cred-missing").await.unwrap().is_none());
}
