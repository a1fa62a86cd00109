use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::platforms::Platform;

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Applied,
    Failed,
    Reviewing,
    Interview,
    Offer,
    Rejected,
    Closed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Failed => "failed",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Failed
                | ApplicationStatus::Offer
                | ApplicationStatus::Rejected
                | ApplicationStatus::Closed
        )
    }

    /// Statuses the daily sweep re-checks.
    pub fn is_trackable(&self) -> bool {
        matches!(self, ApplicationStatus::Applied | ApplicationStatus::Reviewing)
    }

    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        match self {
            Pending => matches!(next, Applied | Failed),
            Applied => matches!(next, Reviewing | Interview | Offer | Rejected | Closed),
            Reviewing => matches!(next, Interview | Offer | Rejected | Closed),
            Interview => matches!(next, Offer | Rejected | Closed),
            Failed | Offer | Rejected | Closed => false,
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Record
// ============================================================================

/// Durable record of one application attempt, unique per (user, platform, job).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub platform_job_id: String,
    pub job_title: String,
    pub company: String,
    pub link: String,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub status_checked_at: Option<DateTime<Utc>>,
    pub follow_up_sent: bool,
    pub follow_up_sent_at: Option<DateTime<Utc>>,
    pub retries: i32,
    pub last_error: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one worker attempt, written through [`ApplicationRecord::record_attempt`].
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub user_id: Uuid,
    pub platform: Platform,
    pub platform_job_id: String,
    pub job_title: String,
    pub company: String,
    pub link: String,
    pub status: ApplicationStatus,
    pub last_error: Option<String>,
    pub metadata: serde_json::Value,
}

impl ApplicationRecord {
    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Applications whose status has not been checked within `cutoff`.
    /// Terminal statuses are never returned.
    pub async fn find_stale_for_status_check(
        cutoff: DateTime<Utc>,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM applications
            WHERE status IN ('applied', 'reviewing')
              AND (status_checked_at IS NULL OR status_checked_at < $1)
            ORDER BY status_checked_at ASC NULLS FIRST, applied_at ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_due_for_follow_up(
        applied_before: DateTime<Utc>,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM applications
            WHERE status = 'applied'
              AND follow_up_sent = false
              AND applied_at <= $1
            ORDER BY applied_at ASC
            LIMIT $2
            "#,
        )
        .bind(applied_before)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update_status(
        id: Uuid,
        status: ApplicationStatus,
        checked_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE applications SET status = $2, status_checked_at = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(checked_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn touch_status_checked(
        id: Uuid,
        checked_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE applications SET status_checked_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(checked_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Flip the follow-up flag. Returns false if it was already set.
    pub async fn mark_follow_up_sent(
        id: Uuid,
        sent_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET follow_up_sent = true, follow_up_sent_at = $2, updated_at = NOW()
            WHERE id = $1 AND follow_up_sent = false
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Insert or update the record for a worker attempt. Retries count every attempt;
    /// a record that already progressed past `applied` keeps its status.
    pub async fn record_attempt(attempt: &AttemptRecord, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO applications (
                user_id, platform, platform_job_id, job_title, company, link,
                status, applied_at, retries, last_error, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), 1, $8, $9)
            ON CONFLICT (user_id, platform, platform_job_id) DO UPDATE SET
                status = CASE
                    WHEN applications.status IN ('pending', 'failed') THEN EXCLUDED.status
                    ELSE applications.status
                END,
                applied_at = CASE
                    WHEN applications.status IN ('pending', 'failed')
                         AND EXCLUDED.status = 'applied' THEN NOW()
                    ELSE applications.applied_at
                END,
                retries = applications.retries + 1,
                last_error = EXCLUDED.last_error,
                metadata = applications.metadata || EXCLUDED.metadata,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(attempt.user_id)
        .bind(attempt.platform)
        .bind(&attempt.platform_job_id)
        .bind(&attempt.job_title)
        .bind(&attempt.company)
        .bind(&attempt.link)
        .bind(attempt.status)
        .bind(&attempt.last_error)
        .bind(&attempt.metadata)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses_have_no_outgoing_transitions() {
        let all = [
            ApplicationStatus::Pending,
            ApplicationStatus::Applied,
            ApplicationStatus::Failed,
            ApplicationStatus::Reviewing,
            ApplicationStatus::Interview,
            ApplicationStatus::Offer,
            ApplicationStatus::Rejected,
            ApplicationStatus::Closed,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)), "{}", from);
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(ApplicationStatus::Pending.can_transition_to(ApplicationStatus::Applied));
        assert!(ApplicationStatus::Applied.can_transition_to(ApplicationStatus::Closed));
        assert!(ApplicationStatus::Reviewing.can_transition_to(ApplicationStatus::Interview));
        assert!(!ApplicationStatus::Applied.can_transition_to(ApplicationStatus::Applied));
        assert!(!ApplicationStatus::Reviewing.can_transition_to(ApplicationStatus::Applied));
        assert!(!ApplicationStatus::Pending.can_transition_to(ApplicationStatus::Closed));
    }

    #[test]
    fn test_only_applied_and_reviewing_are_trackable() {
        assert!(ApplicationStatus::Applied.is_trackable());
        assert!(ApplicationStatus::Reviewing.is_trackable());
        assert!(!ApplicationStatus::Interview.is_trackable());
        assert!(!ApplicationStatus::Closed.is_trackable());
    }
}
