//! Messages published for the email service and the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domains::applications::{ApplicationRecord, ApplicationStatus};
use crate::domains::platforms::Platform;

pub const STATUS_UPDATE_TYPE: &str = "status-update";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicant_email: Option<String>,
    pub application_id: Uuid,
    pub user_id: Uuid,
    pub job_title: String,
    pub company_name: String,
    pub old_status: ApplicationStatus,
    pub new_status: ApplicationStatus,
    pub platform: Platform,
    pub updated_date: DateTime<Utc>,
}

/// Envelope on `email_notifications`: `{"type": "status-update", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeNotification {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: StatusChange,
}

impl StatusChangeNotification {
    pub fn new(
        application: &ApplicationRecord,
        new_status: ApplicationStatus,
        updated_date: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: STATUS_UPDATE_TYPE.to_string(),
            data: StatusChange {
                applicant_email: None,
                application_id: application.id,
                user_id: application.user_id,
                job_title: application.job_title.clone(),
                company_name: application.company.clone(),
                old_status: application.status,
                new_status,
                platform: application.platform,
                updated_date,
            },
        }
    }
}

/// Published on `follow_up_emails`, once per application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    pub application_id: Uuid,
    pub user_id: Uuid,
    pub job_title: String,
    pub company_name: String,
    pub applied_date: DateTime<Utc>,
    pub platform: Platform,
}

impl From<&ApplicationRecord> for FollowUpRequest {
    fn from(application: &ApplicationRecord) -> Self {
        Self {
            application_id: application.id,
            user_id: application.user_id,
            job_title: application.job_title.clone(),
            company_name: application.company.clone(),
            applied_date: application.applied_at,
            platform: application.platform,
        }
    }
}
