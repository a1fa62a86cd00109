//! Result handoff to the API: one short-lived blob per task.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::domains::applications::TaskResult;
use crate::kernel::BaseCache;

pub const RESULT_TTL: Duration = Duration::from_secs(3600);

pub fn result_key(task_id: &str) -> String {
    format!("job_result:{}", task_id)
}

#[derive(Clone)]
pub struct ResultStore {
    cache: Arc<dyn BaseCache>,
    ttl: Duration,
}

impl ResultStore {
    pub fn new(cache: Arc<dyn BaseCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub async fn store(&self, task_id: &str, result: &TaskResult) -> Result<()> {
        let payload = serde_json::to_string(result).context("Failed to serialize task result")?;
        self.cache
            .set_ex(&result_key(task_id), &payload, self.ttl)
            .await
    }

    pub async fn fetch(&self, task_id: &str) -> Result<Option<TaskResult>> {
        let Some(raw) = self.cache.get(&result_key(task_id)).await? else {
            return Ok(None);
        };
        let result = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed result for task {}", task_id))?;
        Ok(Some(result))
    }
}
