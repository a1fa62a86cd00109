//! JetStream-backed application task queue.
//!
//! Workers share one durable pull consumer (competing consumers). Each fetch
//! asks for a single message and the worker loop settles it before fetching
//! again, so a worker never holds more than one unacknowledged task. The
//! consumer-wide `max_ack_pending` bounds the whole fleet and must be at least
//! the number of workers.
//!
//! Deliveries are attempted once (`max_deliver = 1`). A task that outlives
//! `ack_wait` is dropped by the server rather than handed to another worker,
//! and workers send `AckKind::Progress` between phases to keep long tasks
//! alive. Rejection terminates the message (`AckKind::Term`).

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, PullConsumer},
    stream::StorageType,
    AckKind,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use super::traits::{BaseTaskQueue, Delivery, DeliveryAcker};

pub const JOB_APPLICATIONS_SUBJECT: &str = "job_applications";
pub const JOB_APPLICATIONS_STREAM: &str = "JOB_APPLICATIONS";
pub const WORKER_CONSUMER: &str = "automation-worker";

/// Settings for the shared worker consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Redelivery deadline for an unacknowledged task. Must exceed the time
    /// between two progress signals.
    pub ack_wait: Duration,
    /// Unacknowledged tasks allowed across all workers.
    pub max_in_flight: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            ack_wait: Duration::from_secs(15 * 60),
            max_in_flight: 64,
        }
    }
}

impl QueueConfig {
    pub fn consumer_config(&self) -> pull::Config {
        pull::Config {
            durable_name: Some(WORKER_CONSUMER.to_string()),
            ack_policy: AckPolicy::Explicit,
            ack_wait: self.ack_wait,
            max_deliver: 1,
            max_ack_pending: self.max_in_flight,
            ..Default::default()
        }
    }
}

pub struct JetStreamTaskQueue {
    consumer: PullConsumer,
}

impl JetStreamTaskQueue {
    /// Bind to (or create) the task stream and create or update the shared
    /// worker consumer so config changes apply on redeploy.
    pub async fn connect(context: &jetstream::Context, config: &QueueConfig) -> Result<Self> {
        let stream = context
            .get_or_create_stream(jetstream::stream::Config {
                name: JOB_APPLICATIONS_STREAM.to_string(),
                subjects: vec![JOB_APPLICATIONS_SUBJECT.to_string()],
                storage: StorageType::File,
                ..Default::default()
            })
            .await
            .context("Failed to create job applications stream")?;

        let consumer = stream
            .create_consumer(config.consumer_config())
            .await
            .context("Failed to create worker consumer")?;

        Ok(Self { consumer })
    }
}

#[async_trait]
impl BaseTaskQueue for JetStreamTaskQueue {
    async fn next_delivery(&self, wait: Duration) -> Result<Option<Delivery>> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(1)
            .expires(wait)
            .messages()
            .await
            .context("Failed to fetch from job applications consumer")?;

        match batch.next().await {
            Some(Ok(message)) => {
                debug!(subject = %message.subject, "received task delivery");
                let payload = message.payload.clone();
                Ok(Some(Delivery::new(
                    payload,
                    Box::new(JetStreamAcker { message }),
                )))
            }
            Some(Err(e)) => Err(anyhow!("Failed to receive task delivery: {}", e)),
            None => Ok(None),
        }
    }
}

struct JetStreamAcker {
    message: jetstream::Message,
}

#[async_trait]
impl DeliveryAcker for JetStreamAcker {
    async fn ack(self: Box<Self>) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| anyhow!("Failed to ack task delivery: {}", e))
    }

    async fn reject(self: Box<Self>) -> Result<()> {
        self.message
            .ack_with(AckKind::Term)
            .await
            .map_err(|e| anyhow!("Failed to reject task delivery: {}", e))
    }

    async fn progress(&self) -> Result<()> {
        self.message
            .ack_with(AckKind::Progress)
            .await
            .map_err(|e| anyhow!("Failed to extend task delivery: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_never_redelivers() {
        let config = QueueConfig::default().consumer_config();

        assert_eq!(config.max_deliver, 1);
        assert_eq!(config.ack_policy, AckPolicy::Explicit);
        assert_eq!(config.durable_name.as_deref(), Some(WORKER_CONSUMER));
    }

    #[test]
    fn test_fleet_is_not_capped_at_one_task() {
        let config = QueueConfig::default();
        let consumer = config.consumer_config();

        assert!(consumer.max_ack_pending > 1);
        assert!(consumer.ack_wait > Duration::from_secs(30));
        assert_eq!(consumer.ack_wait, config.ack_wait);
    }
}
