//! Redis implementation of [`BaseCache`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ExistenceCheck, SetExpiry, SetOptions};

use super::traits::BaseCache;

/// Cheaply cloneable handle; the connection manager reconnects on its own.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid REDIS_URL")?;
        let connection = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { connection })
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl BaseCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .get(key)
            .await
            .with_context(|| format!("GET {} failed", key))
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.conn()
            .incr(key, 1)
            .await
            .with_context(|| format!("INCR {} failed", key))
    }

    async fn decr(&self, key: &str) -> Result<i64> {
        self.conn()
            .decr(key, 1)
            .await
            .with_context(|| format!("DECR {} failed", key))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let _: bool = self
            .conn()
            .expire(key, ttl_secs(ttl) as i64)
            .await
            .with_context(|| format!("EXPIRE {} failed", key))?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let _: () = self
            .conn()
            .set_ex(key, value, ttl_secs(ttl))
            .await
            .with_context(|| format!("SETEX {} failed", key))?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .with_expiration(SetExpiry::EX(ttl_secs(ttl)));
        let reply: Option<String> = self
            .conn()
            .set_options(key, value, options)
            .await
            .with_context(|| format!("SET {} NX EX failed", key))?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let _: i64 = self
            .conn()
            .del(key)
            .await
            .with_context(|| format!("DEL {} failed", key))?;
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64> {
        self.conn()
            .lpush(key, value)
            .await
            .with_context(|| format!("LPUSH {} failed", key))
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        let _: () = self
            .conn()
            .ltrim(key, start, stop)
            .await
            .with_context(|| format!("LTRIM {} failed", key))?;
        Ok(())
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        self.conn()
            .llen(key)
            .await
            .with_context(|| format!("LLEN {} failed", key))
    }
}
