//! NATS client abstraction for production and testing.
//!
//! Provides a trait-based publisher that allows swapping between a real
//! JetStream context and test mocks. Notifications are published to durable
//! JetStream streams and the publish ack is awaited, so a returned `Ok` means
//! the broker has persisted the message.

use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream::StorageType};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::sync::RwLock;

/// Status-change notifications consumed by the email service.
pub const EMAIL_NOTIFICATIONS_SUBJECT: &str = "email_notifications";
/// Follow-up requests consumed by the email service.
pub const FOLLOW_UP_SUBJECT: &str = "follow_up_emails";
/// Status updates consumed by the API for dashboards.
pub const STATUS_UPDATES_SUBJECT: &str = "status_updates";

pub const NOTIFICATIONS_STREAM: &str = "NOTIFICATIONS";

/// A published message.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

/// Trait for NATS publish operations.
///
/// This allows swapping between real NATS and test mocks.
#[async_trait]
pub trait NatsPublisher: Send + Sync {
    /// Publish a message to a subject.
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()>;
}

/// Serialize `message` as JSON and publish it.
pub async fn publish_json<T: Serialize + Sync>(
    publisher: &dyn NatsPublisher,
    subject: &str,
    message: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(message).context("Failed to serialize message")?;
    publisher
        .publish(subject.to_string(), Bytes::from(payload))
        .await
        .with_context(|| format!("Failed to publish to {}", subject))
}

/// JetStream-backed publisher with file storage.
pub struct JetStreamPublisher {
    context: jetstream::Context,
}

impl JetStreamPublisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }

    /// Make sure the notification stream exists before publishing into it.
    pub async fn ensure_stream(&self) -> Result<()> {
        self.context
            .get_or_create_stream(jetstream::stream::Config {
                name: NOTIFICATIONS_STREAM.to_string(),
                subjects: vec![
                    EMAIL_NOTIFICATIONS_SUBJECT.to_string(),
                    FOLLOW_UP_SUBJECT.to_string(),
                    STATUS_UPDATES_SUBJECT.to_string(),
                ],
                storage: StorageType::File,
                ..Default::default()
            })
            .await
            .context("Failed to create notifications stream")?;
        Ok(())
    }
}

#[async_trait]
impl NatsPublisher for JetStreamPublisher {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        let ack = self
            .context
            .publish(subject, payload)
            .await
            .context("JetStream publish failed")?;
        ack.await.context("JetStream publish was not acknowledged")?;
        Ok(())
    }
}

/// In-memory publisher for notification and follow-up tests. Subjects
/// registered with [`TestNats::fail_subject`] reject publishes.
#[derive(Default)]
pub struct TestNats {
    published: RwLock<Vec<PublishedMessage>>,
    /// Subjects whose publishes fail.
    failing: RwLock<Vec<String>>,
}

impl TestNats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish to `subject` fail.
    pub fn fail_subject(&self, subject: &str) {
        self.failing
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(subject.to_string());
    }

    /// Get published messages for a specific subject.
    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Get the count of published messages.
    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Get the count of messages published to a specific subject.
    pub fn publish_count_for(&self, subject: &str) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .count()
    }

    /// Deserialize a published message payload as JSON.
    pub fn deserialize_message<T: serde::de::DeserializeOwned>(
        &self,
        msg: &PublishedMessage,
    ) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&msg.payload)
    }
}

#[async_trait]
impl NatsPublisher for TestNats {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        let failing = self
            .failing
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&subject);
        if failing {
            anyhow::bail!("publish to {} rejected by test broker", subject);
        }
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage { subject, payload });
        Ok(())
    }
}
