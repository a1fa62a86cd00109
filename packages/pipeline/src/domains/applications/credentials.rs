use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Login and applicant details for one platform account.
#[derive(Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCredentials {
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub resume_path: Option<String>,
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Resolves the `credentialsRef` carried by a task.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<Option<PlatformCredentials>>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn resolve(&self, reference: &str) -> Result<Option<PlatformCredentials>> {
        sqlx::query_as::<_, PlatformCredentials>(
            r#"
            SELECT email, password, phone, first_name, last_name, resume_path
            FROM platform_credentials
            WHERE id = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }
}
