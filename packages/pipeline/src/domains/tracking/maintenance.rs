//! Weekly trim of the email history list.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::kernel::BaseCache;

pub const EMAIL_HISTORY_KEY: &str = "email_history";
pub const EMAIL_HISTORY_CAP: isize = 500;

pub struct HistoryMaintenance {
    cache: Arc<dyn BaseCache>,
    cap: isize,
}

impl HistoryMaintenance {
    pub fn new(cache: Arc<dyn BaseCache>, cap: isize) -> Self {
        Self { cache, cap }
    }

    /// Keep the `cap` most recent entries. Returns the resulting length.
    pub async fn run(&self) -> Result<i64> {
        let before = self.cache.llen(EMAIL_HISTORY_KEY).await?;
        self.cache
            .ltrim(EMAIL_HISTORY_KEY, 0, self.cap.max(1) - 1)
            .await?;
        let after = self.cache.llen(EMAIL_HISTORY_KEY).await?;

        info!(before, after, "email history trimmed");
        Ok(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::MemoryCache;

    #[tokio::test]
    async fn test_keeps_most_recent_entries() {
        let cache = Arc::new(MemoryCache::new());
        for i in 0..8 {
            cache.lpush(EMAIL_HISTORY_KEY, &format!("email-{}", i)).await.unwrap();
        }

        let remaining = HistoryMaintenance::new(cache.clone(), 5).run().await.unwrap();

        assert_eq!(remaining, 5);
        let kept = cache.list(EMAIL_HISTORY_KEY);
        assert_eq!(kept.first().map(String::as_str), Some("email-7"));
        assert_eq!(kept.last().map(String::as_str), Some("email-3"));
    }

    #[tokio::test]
    async fn test_short_history_is_untouched() {
        let cache = Arc::new(MemoryCache::new());
        cache.lpush(EMAIL_HISTORY_KEY, "only").await.unwrap();

        let remaining = HistoryMaintenance::new(cache.clone(), EMAIL_HISTORY_CAP)
            .run()
            .await
            .unwrap();

        assert_eq!(remaining, 1);
    }
}
