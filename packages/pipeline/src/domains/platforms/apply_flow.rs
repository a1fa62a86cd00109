//! Multi-step quick-apply state machine.
//!
//! ```text
//! NotStarted ─► FormOpen ─► FillStep(1) ─► ... ─► FillStep(n) ─► Submitting ─► Submitted
//!     │                         │                                    │
//!     └─ no quick apply         └─► Aborted (dialog gone,            └─ no success marker
//!        = NotEligible              no control, step limit)             = SubmissionFailed
//! ```
//!
//! Every step is bounded by `ApplyLimits::max_steps`; a flow that keeps asking
//! for more input is abandoned, never retried.

use std::time::Duration;

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::adapter::ApplyResult;
use super::interaction::{scroll_randomly, type_like_human};
use crate::common::{AbortReason, ApplyError, BrowserError, Pacer, PauseBand};
use crate::domains::applications::{JobDetails, PlatformCredentials};
use crate::kernel::BasePage;

lazy_static! {
    /// Progression control labels that mean "this click submits".
    pub static ref SUBMIT_PATTERN: Regex = Regex::new(r"(?i)\bsubmit\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicantField {
    Phone,
    FirstName,
    LastName,
}

impl ApplicantField {
    fn value(self, applicant: &PlatformCredentials) -> Option<&str> {
        match self {
            ApplicantField::Phone => applicant.phone.as_deref(),
            ApplicantField::FirstName => applicant.first_name.as_deref(),
            ApplicantField::LastName => applicant.last_name.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSelector {
    pub selector: &'static str,
    pub field: ApplicantField,
}

#[derive(Debug, Clone, Copy)]
pub struct ApplySelectors {
    pub quick_apply: &'static str,
    pub dialog: &'static str,
    /// Matches both "continue" and "submit" controls.
    pub progression: &'static str,
    pub success: &'static str,
    pub fields: &'static [FieldSelector],
    pub resume_upload: Option<&'static str>,
    /// Reported back in [`ApplyResult::method`].
    pub method: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyLimits {
    pub max_steps: u32,
    pub navigation_timeout: Duration,
    pub submit_timeout: Duration,
}

impl Default for ApplyLimits {
    fn default() -> Self {
        Self {
            max_steps: 5,
            navigation_timeout: Duration::from_secs(30),
            submit_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    NotStarted,
    FormOpen,
    FillStep(u32),
    Submitting(u32),
    Submitted(u32),
    Aborted { reason: AbortReason, steps: u32 },
}

pub async fn run(
    page: &dyn BasePage,
    selectors: &ApplySelectors,
    job: &JobDetails,
    applicant: &PlatformCredentials,
    limits: &ApplyLimits,
    pacer: &Pacer,
) -> Result<ApplyResult, ApplyError> {
    let mut state = ApplyState::NotStarted;

    loop {
        debug!(?state, url = %job.url, "apply flow");
        state = match state {
            ApplyState::NotStarted => {
                page.goto(&job.url, limits.navigation_timeout).await?;
                pacer.pause(PauseBand::PAGE_SETTLE).await;
                scroll_randomly(page, pacer).await;

                let Some(quick_apply) = page.query(selectors.quick_apply).await? else {
                    return Err(ApplyError::NotEligible);
                };
                page.click(&quick_apply).await?;
                pacer.pause(PauseBand::PAGE_SETTLE).await;
                ApplyState::FormOpen
            }

            ApplyState::FormOpen => ApplyState::FillStep(1),

            ApplyState::FillStep(step) if step > limits.max_steps => ApplyState::Aborted {
                reason: AbortReason::StepLimitReached,
                steps: limits.max_steps,
            },

            ApplyState::FillStep(step) => fill_step(page, selectors, applicant, pacer, step).await?,

            ApplyState::Submitting(step) => {
                match page.wait_for(selectors.success, limits.submit_timeout).await {
                    Ok(_) => ApplyState::Submitted(step),
                    Err(BrowserError::Timeout { after, .. }) => {
                        return Err(ApplyError::SubmissionFailed(format!(
                            "no confirmation within {:?} of submitting",
                            after
                        )));
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            ApplyState::Submitted(steps) => {
                return Ok(ApplyResult {
                    applied_at: Utc::now(),
                    method: selectors.method.to_string(),
                    steps,
                });
            }

            ApplyState::Aborted { reason, steps } => {
                return Err(ApplyError::Aborted { reason, steps });
            }
        };
    }
}

/// One dialog page: fill what we recognize, then continue or submit.
async fn fill_step(
    page: &dyn BasePage,
    selectors: &ApplySelectors,
    applicant: &PlatformCredentials,
    pacer: &Pacer,
    step: u32,
) -> Result<ApplyState, ApplyError> {
    if page.query(selectors.dialog).await?.is_none() {
        return Ok(ApplyState::Aborted {
            reason: AbortReason::DialogClosed,
            steps: step,
        });
    }

    fill_fields(page, selectors, applicant, pacer).await;

    let Some(control) = page.query(selectors.progression).await? else {
        return Ok(ApplyState::Aborted {
            reason: AbortReason::NoProgressionControl,
            steps: step,
        });
    };
    let label = page.text(&control).await?;
    page.click(&control).await?;

    if SUBMIT_PATTERN.is_match(&label) {
        Ok(ApplyState::Submitting(step))
    } else {
        pacer.pause(PauseBand::STEP).await;
        Ok(ApplyState::FillStep(step + 1))
    }
}

/// Individual field failures never fail the step.
async fn fill_fields(
    page: &dyn BasePage,
    selectors: &ApplySelectors,
    applicant: &PlatformCredentials,
    pacer: &Pacer,
) {
    for field in selectors.fields {
        let Some(value) = field.field.value(applicant) else {
            continue;
        };
        let filled = async {
            if let Some(element) = page.query(field.selector).await? {
                page.clear(&element).await?;
                type_like_human(page, &element, value, pacer).await?;
            }
            Ok::<_, BrowserError>(())
        }
        .await;
        if let Err(e) = filled {
            debug!(selector = field.selector, error = %e, "skipping field");
        }
    }

    if let (Some(selector), Some(path)) = (selectors.resume_upload, applicant.resume_path.as_deref()) {
        let uploaded = async {
            if let Some(element) = page.query(selector).await? {
                page.set_input_file(&element, path).await?;
                pacer.pause(PauseBand::PAGE_SETTLE).await;
            }
            Ok::<_, BrowserError>(())
        }
        .await;
        if let Err(e) = uploaded {
            debug!(error = %e, "skipping resume upload");
        }
    }

    pacer.pause(PauseBand::ACTION).await;
}
