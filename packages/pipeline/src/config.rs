use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::automation::{RateLimitMode, WorkerConfig};
use crate::domains::tracking::{FollowUpConfig, FollowUpDelivery, SweepConfig};
use crate::kernel::{BrowserProfile, QueueConfig, Schedules};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub nats_url: String,
    pub webdriver_url: String,
    pub browser_headless: bool,
    pub worker_id: Option<String>,
    pub rate_limit_per_hour: i64,
    pub rate_limit_mode: RateLimitMode,
    pub max_apply_steps: u32,
    pub task_pacing_min_secs: u64,
    pub task_pacing_max_secs: u64,
    pub result_ttl_secs: u64,
    pub task_ack_wait_secs: u64,
    pub worker_max_in_flight: i64,
    pub cron_daily_status: String,
    pub cron_follow_up: String,
    pub cron_weekly_cleanup: String,
    pub status_sweep_batch_size: i64,
    pub follow_up_delay_days: i64,
    pub follow_up_batch_size: i64,
    pub follow_up_delivery: FollowUpDelivery,
    pub email_history_cap: isize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            webdriver_url: env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
            browser_headless: parse_or("BROWSER_HEADLESS", true)?,
            worker_id: env::var("WORKER_ID").ok(),
            rate_limit_per_hour: parse_or("RATE_LIMIT_PER_HOUR", 5)?,
            rate_limit_mode: parse_or("RATE_LIMIT_MODE", RateLimitMode::default())?,
            max_apply_steps: parse_or("MAX_APPLY_STEPS", 5)?,
            task_pacing_min_secs: parse_or("TASK_PACING_MIN_SECS", 30)?,
            task_pacing_max_secs: parse_or("TASK_PACING_MAX_SECS", 180)?,
            result_ttl_secs: parse_or("RESULT_TTL_SECS", 3600)?,
            task_ack_wait_secs: parse_or("TASK_ACK_WAIT_SECS", 900)?,
            worker_max_in_flight: parse_or("WORKER_MAX_IN_FLIGHT", 64)?,
            cron_daily_status: env::var("CRON_DAILY_STATUS")
                .unwrap_or_else(|_| "0 0 6 * * *".to_string()),
            cron_follow_up: env::var("CRON_FOLLOW_UP")
                .unwrap_or_else(|_| "0 0 */6 * * *".to_string()),
            cron_weekly_cleanup: env::var("CRON_WEEKLY_CLEANUP")
                .unwrap_or_else(|_| "0 0 2 * * SUN".to_string()),
            status_sweep_batch_size: parse_or("STATUS_SWEEP_BATCH_SIZE", 100)?,
            follow_up_delay_days: parse_or("FOLLOW_UP_DELAY_DAYS", 3)?,
            follow_up_batch_size: parse_or("FOLLOW_UP_BATCH_SIZE", 20)?,
            follow_up_delivery: parse_or("FOLLOW_UP_DELIVERY", FollowUpDelivery::default())?,
            email_history_cap: parse_or("EMAIL_HISTORY_CAP", 500)?,
        })
    }

    /// Worker loop settings derived from the environment.
    pub fn worker(&self) -> WorkerConfig {
        let defaults = match &self.worker_id {
            Some(id) => WorkerConfig::with_worker_id(id.clone()),
            None => WorkerConfig::default(),
        };

        WorkerConfig {
            rate_limit: self.rate_limit_per_hour,
            rate_limit_mode: self.rate_limit_mode,
            max_apply_steps: self.max_apply_steps,
            pacing_min: Duration::from_secs(self.task_pacing_min_secs),
            pacing_max: Duration::from_secs(self.task_pacing_max_secs),
            result_ttl: Duration::from_secs(self.result_ttl_secs),
            ..defaults
        }
    }

    /// Shared consumer settings. `max_in_flight` must cover every worker replica.
    pub fn queue(&self) -> QueueConfig {
        QueueConfig {
            ack_wait: Duration::from_secs(self.task_ack_wait_secs),
            max_in_flight: self.worker_max_in_flight,
        }
    }

    pub fn sweep(&self) -> SweepConfig {
        SweepConfig {
            batch_size: self.status_sweep_batch_size,
            ..SweepConfig::default()
        }
    }

    pub fn schedules(&self) -> Schedules {
        Schedules {
            daily_status: self.cron_daily_status.clone(),
            follow_up: self.cron_follow_up.clone(),
            weekly_cleanup: self.cron_weekly_cleanup.clone(),
        }
    }

    pub fn browser_profile(&self) -> BrowserProfile {
        BrowserProfile {
            headless: self.browser_headless,
            ..BrowserProfile::default()
        }
    }

    pub fn follow_up(&self) -> FollowUpConfig {
        FollowUpConfig {
            delay: chrono::Duration::days(self.follow_up_delay_days),
            batch_size: self.follow_up_batch_size,
            delivery: self.follow_up_delivery,
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be valid: {}", key, e)),
        Err(_) => Ok(default),
    }
}
