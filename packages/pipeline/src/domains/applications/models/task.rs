//! Queue and handoff payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domains::platforms::ApplyResult;

/// One application request pulled from the task queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationTask {
    /// Older producers send this as `jobId`.
    #[serde(alias = "jobId")]
    pub task_id: String,
    /// Kept as sent so an unknown value fails the task, not the decode.
    pub platform: String,
    pub credentials_ref: String,
    pub job_details: JobDetails,
    #[serde(default)]
    pub enqueued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    pub url: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub platform_job_id: Option<String>,
}

/// Result blob stored at `job_result:{taskId}` for the API to collect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskResult {
    #[serde(rename_all = "camelCase")]
    Success {
        platform: String,
        applied_at: DateTime<Utc>,
        result: ApplyResult,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        platform: String,
        failed_at: DateTime<Utc>,
        error: String,
        reason: String,
    },
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Success { .. })
    }
}
