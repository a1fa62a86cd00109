//! Persistence seam for application records.
//!
//! The schedulers and the worker only talk to [`ApplicationStore`]; the
//! Postgres implementation delegates to the queries on [`ApplicationRecord`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{ApplicationRecord, ApplicationStatus, AttemptRecord};

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn find_stale_for_status_check(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ApplicationRecord>>;

    async fn find_due_for_follow_up(
        &self,
        applied_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ApplicationRecord>>;

    async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn touch_status_checked(&self, id: Uuid, checked_at: DateTime<Utc>) -> Result<()>;

    /// Conditional flip; false means another run already set it.
    async fn mark_follow_up_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool>;

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<ApplicationRecord>;
}

#[derive(Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn find_stale_for_status_check(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ApplicationRecord>> {
        ApplicationRecord::find_stale_for_status_check(cutoff, limit, &self.pool).await
    }

    async fn find_due_for_follow_up(
        &self,
        applied_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ApplicationRecord>> {
        ApplicationRecord::find_due_for_follow_up(applied_before, limit, &self.pool).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        ApplicationRecord::update_status(id, status, checked_at, &self.pool).await
    }

    async fn touch_status_checked(&self, id: Uuid, checked_at: DateTime<Utc>) -> Result<()> {
        ApplicationRecord::touch_status_checked(id, checked_at, &self.pool).await
    }

    async fn mark_follow_up_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool> {
        ApplicationRecord::mark_follow_up_sent(id, sent_at, &self.pool).await
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<ApplicationRecord> {
        ApplicationRecord::record_attempt(attempt, &self.pool).await
    }
}
