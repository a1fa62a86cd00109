//! Capability set every job site implements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Platform;
use crate::common::{ApplyError, AuthError, BrowserError};
use crate::domains::applications::{
    ApplicationRecord, ApplicationStatus, JobDetails, PlatformCredentials,
};
use crate::kernel::BasePage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub platform: Platform,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub applied_at: DateTime<Utc>,
    pub method: String,
    pub steps: u32,
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Sign in on `page`. Secondary verification is reported, never bypassed.
    async fn login(
        &self,
        page: &dyn BasePage,
        credentials: &PlatformCredentials,
    ) -> Result<LoginResult, AuthError>;

    /// Drive the site's quick-apply flow for one posting.
    async fn apply_to_job(
        &self,
        page: &dyn BasePage,
        job: &JobDetails,
        applicant: &PlatformCredentials,
    ) -> Result<ApplyResult, ApplyError>;

    /// Re-derive the status of a submitted application from its posting.
    /// `None` means the page told us nothing.
    async fn probe_status(
        &self,
        page: &dyn BasePage,
        application: &ApplicationRecord,
    ) -> Result<Option<ApplicationStatus>, BrowserError>;

    /// The site's own identifier for a posting URL. Defaults to the last path segment.
    fn platform_job_id(&self, url: &str) -> Option<String> {
        last_path_segment(url)
    }
}

pub fn last_path_segment(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}
