// Database fixtures for integration tests

use anyhow::Result;
use chrono::{DateTime, Utc};
use pipeline_core::domains::applications::ApplicationStatus;
use pipeline_core::domains::platforms::Platform;
use sqlx::PgPool;
use uuid::Uuid;

/// Insert an application row and return its id.
pub async fn insert_application(
    pool: &PgPool,
    user_id: Uuid,
    platform: Platform,
    status: ApplicationStatus,
    applied_at: DateTime<Utc>,
    status_checked_at: Option<DateTime<Utc>>,
) -> Result<Uuid> {
    let job_id = Uuid::new_v4().simple().to_string();
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO applications (
            user_id, platform, platform_job_id, job_title, company, link,
            status, applied_at, status_checked_at, retries
        )
        VALUES ($1, $2, $3, 'Backend Engineer', 'Acme', $4, $5, $6, $7, 1)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(platform)
    .bind(&job_id)
    .bind(format!("https://jobs.example.com/{}/{}", platform, job_id))
    .bind(status)
    .bind(applied_at)
    .bind(status_checked_at)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn insert_credentials(pool: &PgPool, reference: &str, platform: Platform) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO platform_credentials (id, user_id, platform, email, password, phone)
        VALUES ($1, $2, $3, 'applicant@example.com', 'correct horse', '5551234567')
        "#,
    )
    .bind(reference)
    .bind(Uuid::new_v4())
    .bind(platform)
    .execute(pool)
    .await?;
    Ok(())
}
