//! Follow-up scheduler: one follow-up request per applied application.
//!
//! The flag flip is a conditional update, so however often this runs an
//! application is marked exactly once. Whether the publish or the flip comes
//! first is a delivery choice:
//!
//! - `AtLeastOnce`: publish, then flip. A crash in between republishes next run.
//! - `AtMostOnce`: flip, then publish. A crash in between loses the request.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info, info_span, Instrument, Span};

use super::notifications::FollowUpRequest;
use crate::domains::applications::{ApplicationRecord, ApplicationStore};
use crate::kernel::nats::{publish_json, NatsPublisher, FOLLOW_UP_SUBJECT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowUpDelivery {
    #[default]
    AtLeastOnce,
    AtMostOnce,
}

impl fmt::Display for FollowUpDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FollowUpDelivery::AtLeastOnce => f.write_str("at-least-once"),
            FollowUpDelivery::AtMostOnce => f.write_str("at-most-once"),
        }
    }
}

impl FromStr for FollowUpDelivery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "at-least-once" => Ok(FollowUpDelivery::AtLeastOnce),
            "at-most-once" => Ok(FollowUpDelivery::AtMostOnce),
            other => Err(format!(
                "unknown follow-up delivery {} (expected at-least-once or at-most-once)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FollowUpConfig {
    /// How long after applying a follow-up becomes due
    pub delay: chrono::Duration,
    pub batch_size: i64,
    pub delivery: FollowUpDelivery,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            delay: chrono::Duration::days(3),
            batch_size: 20,
            delivery: FollowUpDelivery::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowUpReport {
    pub sent: usize,
    /// Already flipped by a concurrent run.
    pub skipped: usize,
    pub failed: usize,
}

enum ItemOutcome {
    Sent,
    AlreadySent,
}

pub struct FollowUpScheduler {
    applications: Arc<dyn ApplicationStore>,
    publisher: Arc<dyn NatsPublisher>,
    config: FollowUpConfig,
    span: Span,
}

impl FollowUpScheduler {
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        publisher: Arc<dyn NatsPublisher>,
        config: FollowUpConfig,
    ) -> Self {
        let span = info_span!("follow_up", delivery = %config.delivery);
        Self {
            applications,
            publisher,
            config,
            span,
        }
    }

    pub async fn run(&self) -> Result<FollowUpReport> {
        async {
            let applied_before = Utc::now() - self.config.delay;
            let due = self
                .applications
                .find_due_for_follow_up(applied_before, self.config.batch_size)
                .await?;

            if due.is_empty() {
                debug!("no follow-ups due");
                return Ok(FollowUpReport::default());
            }
            info!(count = due.len(), "scheduling follow-ups");

            let mut report = FollowUpReport::default();
            for application in &due {
                match self.follow_up(application).await {
                    Ok(ItemOutcome::Sent) => report.sent += 1,
                    Ok(ItemOutcome::AlreadySent) => report.skipped += 1,
                    Err(e) => {
                        report.failed += 1;
                        error!(application_id = %application.id, error = %e, "follow-up failed");
                    }
                }
            }

            info!(
                sent = report.sent,
                skipped = report.skipped,
                failed = report.failed,
                "follow-up run complete"
            );
            Ok(report)
        }
        .instrument(self.span.clone())
        .await
    }

    async fn follow_up(&self, application: &ApplicationRecord) -> Result<ItemOutcome> {
        let request = FollowUpRequest::from(application);

        match self.config.delivery {
            FollowUpDelivery::AtLeastOnce => {
                publish_json(self.publisher.as_ref(), FOLLOW_UP_SUBJECT, &request).await?;
                let flipped = self
                    .applications
                    .mark_follow_up_sent(application.id, Utc::now())
                    .await?;
                if !flipped {
                    debug!(application_id = %application.id, "follow-up flag already set");
                }
                // The request went out either way.
                Ok(ItemOutcome::Sent)
            }
            FollowUpDelivery::AtMostOnce => {
                let flipped = self
                    .applications
                    .mark_follow_up_sent(application.id, Utc::now())
                    .await?;
                if !flipped {
                    return Ok(ItemOutcome::AlreadySent);
                }
                publish_json(self.publisher.as_ref(), FOLLOW_UP_SUBJECT, &request).await?;
                Ok(ItemOutcome::Sent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::applications::ApplicationStatus;
    use crate::domains::platforms::Platform;
    use crate::kernel::test_dependencies::{sample_application, TestDependencies};

    fn applied_days_ago(days: i64) -> ApplicationRecord {
        let mut record = sample_application(Platform::LinkedIn, ApplicationStatus::Applied);
        record.applied_at = Utc::now() - chrono::Duration::days(days);
        record
    }

    fn scheduler(deps: &TestDependencies, delivery: FollowUpDelivery) -> FollowUpScheduler {
        FollowUpScheduler::new(
            deps.applications.clone(),
            deps.nats.clone(),
            FollowUpConfig {
                delivery,
                ..FollowUpConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_four_day_old_application_is_followed_up_once() {
        let deps = TestDependencies::new();
        let application = applied_days_ago(4);
        deps.applications.insert(application.clone());
        let scheduler = scheduler(&deps, FollowUpDelivery::AtLeastOnce);

        let first = scheduler.run().await.unwrap();
        let second = scheduler.run().await.unwrap();

        assert_eq!(first.sent, 1);
        assert_eq!(second, FollowUpReport::default());
        assert_eq!(deps.nats.publish_count_for(FOLLOW_UP_SUBJECT), 1);

        let stored = deps.applications.get(application.id).unwrap();
        assert!(stored.follow_up_sent);
        assert!(stored.follow_up_sent_at.is_some());

        let message = &deps.nats.messages_for_subject(FOLLOW_UP_SUBJECT)[0];
        let request: FollowUpRequest = deps.nats.deserialize_message(message).unwrap();
        assert_eq!(request.application_id, application.id);
    }

    #[tokio::test]
    async fn test_recent_and_non_applied_are_not_due() {
        let deps = TestDependencies::new();
        deps.applications.insert(applied_days_ago(1));
        let mut interviewing = applied_days_ago(10);
        interviewing.status = ApplicationStatus::Interview;
        deps.applications.insert(interviewing);

        let report = scheduler(&deps, FollowUpDelivery::AtLeastOnce)
            .run()
            .await
            .unwrap();

        assert_eq!(report, FollowUpReport::default());
        assert_eq!(deps.nats.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_at_least_once_leaves_flag_unset_when_publish_fails() {
        let deps = TestDependencies::new();
        let application = applied_days_ago(5);
        deps.applications.insert(application.clone());
        deps.nats.fail_subject(FOLLOW_UP_SUBJECT);

        let report = scheduler(&deps, FollowUpDelivery::AtLeastOnce)
            .run()
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(!deps.applications.get(application.id).unwrap().follow_up_sent);
    }

    #[tokio::test]
    async fn test_at_most_once_flips_before_publishing() {
        let deps = TestDependencies::new();
        let application = applied_days_ago(5);
        deps.applications.insert(application.clone());
        deps.nats.fail_subject(FOLLOW_UP_SUBJECT);

        let report = scheduler(&deps, FollowUpDelivery::AtMostOnce)
            .run()
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(deps.applications.get(application.id).unwrap().follow_up_sent);
    }

    #[tokio::test]
    async fn test_batch_size_bounds_each_run() {
        let deps = TestDependencies::new();
        for _ in 0..3 {
            deps.applications.insert(applied_days_ago(6));
        }
        let scheduler = FollowUpScheduler::new(
            deps.applications.clone(),
            deps.nats.clone(),
            FollowUpConfig {
                batch_size: 2,
                ..FollowUpConfig::default()
            },
        );

        assert_eq!(scheduler.run().await.unwrap().sent, 2);
        assert_eq!(scheduler.run().await.unwrap().sent, 1);
        assert_eq!(deps.nats.publish_count_for(FOLLOW_UP_SUBJECT), 3);
    }

    #[test]
    fn test_delivery_parses_from_env_values() {
        assert_eq!(
            "at-most-once".parse::<FollowUpDelivery>().unwrap(),
            FollowUpDelivery::AtMostOnce
        );
        assert_eq!(
            " At-Least-Once ".parse::<FollowUpDelivery>().unwrap(),
            FollowUpDelivery::AtLeastOnce
        );
        assert!("exactly-once".parse::<FollowUpDelivery>().is_err());
    }
}
