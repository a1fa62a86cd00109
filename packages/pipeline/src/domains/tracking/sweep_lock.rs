//! Cross-process mutex for the daily status sweep.
//!
//! `SET status_check_lock 1 NX EX 3600`. A process that dies mid-sweep leaves
//! the key to expire; nothing else ever clears it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::kernel::BaseCache;

pub const SWEEP_LOCK_KEY: &str = "status_check_lock";
pub const SWEEP_LOCK_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct SweepLock {
    cache: Arc<dyn BaseCache>,
    ttl: Duration,
}

impl SweepLock {
    pub fn new(cache: Arc<dyn BaseCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// `None` when another process holds the lock.
    pub async fn try_acquire(&self) -> Result<Option<SweepLockGuard>> {
        let acquired = self.cache.set_nx_ex(SWEEP_LOCK_KEY, "1", self.ttl).await?;
        Ok(acquired.then(|| SweepLockGuard {
            cache: self.cache.clone(),
        }))
    }
}

/// Held for the duration of one sweep. Release explicitly; dropping leaves the TTL in charge.
#[must_use]
pub struct SweepLockGuard {
    cache: Arc<dyn BaseCache>,
}

impl SweepLockGuard {
    pub async fn release(self) {
        if let Err(e) = self.cache.del(SWEEP_LOCK_KEY).await {
            warn!(error = %e, "failed to release sweep lock, leaving it to expire");
        }
    }
}
