use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domains::platforms::Platform;

/// Page-level failures raised by the browser session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("browser driver error: {0}")]
    Driver(String),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        BrowserError::Timeout {
            what: what.into(),
            after,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

/// Login failures. Always fatal for the task.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{platform} requires additional verification ({url})")]
    VerificationRequired { platform: Platform, url: String },

    #[error("{platform} login rejected: {reason}")]
    Rejected { platform: Platform, reason: String },

    #[error("{platform} login failed: {source}")]
    Browser {
        platform: Platform,
        #[source]
        source: BrowserError,
    },
}

impl AuthError {
    pub fn requires_verification(&self) -> bool {
        matches!(self, AuthError::VerificationRequired { .. })
    }
}

/// Why the submission state machine stopped short of `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    DialogClosed,
    NoProgressionControl,
    StepLimitReached,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AbortReason::DialogClosed => "application dialog closed before submission",
            AbortReason::NoProgressionControl => "no continue or submit control found",
            AbortReason::StepLimitReached => "step limit reached",
        };
        f.write_str(text)
    }
}

/// Business outcomes of an application attempt that did not submit.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("quick apply not available for this job")]
    NotEligible,

    #[error("application aborted after {steps} step(s): {reason}")]
    Aborted { reason: AbortReason, steps: u32 },

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Everything that can fail a task at the orchestrator boundary.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Rate limit exceeded for {platform} ({count}/{limit} in the current window)")]
    RateLimitExceeded {
        platform: String,
        count: i64,
        limit: i64,
    },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("No credentials found for reference {0}")]
    CredentialsUnavailable(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TaskError {
    /// Stable reason code stored alongside failed results.
    pub fn reason(&self) -> &'static str {
        match self {
            TaskError::RateLimitExceeded { .. } => "rate-limited",
            TaskError::UnsupportedPlatform(_) => "unsupported-platform",
            TaskError::CredentialsUnavailable(_) => "credentials",
            TaskError::Auth(AuthError::VerificationRequired { .. }) => "verification-required",
            TaskError::Auth(AuthError::Browser { source, .. }) if source.is_timeout() => "timeout",
            TaskError::Auth(_) => "auth",
            TaskError::Apply(ApplyError::NotEligible) => "not-eligible",
            TaskError::Apply(ApplyError::Aborted { .. }) => "aborted",
            TaskError::Apply(ApplyError::SubmissionFailed(_)) => "submission-failed",
            TaskError::Apply(ApplyError::Browser(e)) if e.is_timeout() => "timeout",
            TaskError::Apply(ApplyError::Browser(_)) => "browser",
            TaskError::Internal(_) => "internal",
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.reason() == "timeout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        let limited = TaskError::RateLimitExceeded {
            platform: "linkedin".to_string(),
            count: 5,
            limit: 5,
        };
        assert_eq!(limited.reason(), "rate-limited");
        assert!(limited.to_string().contains("Rate limit exceeded for linkedin"));

        let verification = TaskError::from(AuthError::VerificationRequired {
            platform: Platform::LinkedIn,
            url: "https://www.linkedin.com/checkpoint/challenge".to_string(),
        });
        assert_eq!(verification.reason(), "verification-required");

        let aborted = TaskError::from(ApplyError::Aborted {
            reason: AbortReason::StepLimitReached,
            steps: 5,
        });
        assert_eq!(aborted.reason(), "aborted");
    }

    #[test]
    fn test_timeouts_are_classified_wherever_they_surface() {
        let during_login = TaskError::from(AuthError::Browser {
            platform: Platform::Indeed,
            source: BrowserError::timeout("navigation", Duration::from_secs(30)),
        });
        let during_apply = TaskError::from(ApplyError::Browser(BrowserError::timeout(
            "selector",
            Duration::from_secs(10),
        )));

        assert!(during_login.is_timeout());
        assert!(during_apply.is_timeout());
        assert!(!TaskError::from(ApplyError::NotEligible).is_timeout());
    }
}
