//! Process dependencies shared by the worker and the scheduler.
//!
//! Every external service is held behind its kernel trait so the domain code
//! never sees a concrete client.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::jetstream;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use super::nats::{JetStreamPublisher, NatsPublisher};
use super::redis_cache::RedisCache;
use super::traits::BaseCache;
use crate::domains::applications::{
    ApplicationStore, CredentialStore, PgApplicationStore, PgCredentialStore,
};
use crate::Config;

#[derive(Clone)]
pub struct PipelineDeps {
    pub db_pool: PgPool,
    pub cache: Arc<dyn BaseCache>,
    pub nats: async_nats::Client,
    pub jetstream: jetstream::Context,
    pub publisher: Arc<dyn NatsPublisher>,
    pub applications: Arc<dyn ApplicationStore>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl PipelineDeps {
    /// Connect to Postgres, Redis and NATS.
    pub async fn connect(config: &Config) -> Result<Self> {
        info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.database_url)
            .await
            .context("Failed to connect to database")?;
        info!("Database connected");

        let cache = RedisCache::connect(&config.redis_url).await?;
        info!("Redis connected");

        let nats = async_nats::connect(&config.nats_url)
            .await
            .context("Failed to connect to NATS")?;
        let jetstream = jetstream::new(nats.clone());
        let publisher = JetStreamPublisher::new(jetstream.clone());
        publisher.ensure_stream().await?;
        info!("NATS connected");

        Ok(Self {
            applications: Arc::new(PgApplicationStore::new(db_pool.clone())),
            credentials: Arc::new(PgCredentialStore::new(db_pool.clone())),
            db_pool,
            cache: Arc::new(cache),
            nats,
            jetstream,
            publisher: Arc::new(publisher),
        })
    }

    /// Flush pending publishes and close the pool.
    pub async fn close(&self) {
        if let Err(e) = self.nats.flush().await {
            warn!(error = %e, "failed to flush NATS connection");
        }
        self.db_pool.close().await;
        info!("Connections closed");
    }
}
