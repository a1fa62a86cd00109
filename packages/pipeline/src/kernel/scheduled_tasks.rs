//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Schedules are six-field cron expressions evaluated in UTC.
//!
//! ```text
//! Scheduler
//!     ├─► daily status sweep     (CRON_DAILY_STATUS,   default 06:00)
//!     ├─► follow-up run          (CRON_FOLLOW_UP,      default every 6 hours)
//!     └─► email history trim     (CRON_WEEKLY_CLEANUP, default Sunday 02:00)
//! ```
//!
//! Each job only logs its own failure; a failed run never stops the scheduler.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::domains::tracking::{
    FollowUpScheduler, HistoryMaintenance, StatusSweep, SweepOutcome,
};

/// Cron expressions for the three jobs.
#[derive(Debug, Clone)]
pub struct Schedules {
    pub daily_status: String,
    pub follow_up: String,
    pub weekly_cleanup: String,
}

impl Default for Schedules {
    fn default() -> Self {
        Self {
            daily_status: "0 0 6 * * *".to_string(),
            follow_up: "0 0 */6 * * *".to_string(),
            weekly_cleanup: "0 0 2 * * SUN".to_string(),
        }
    }
}

/// Start all scheduled tasks
pub async fn start_scheduler(
    schedules: &Schedules,
    sweep: Arc<StatusSweep>,
    follow_up: Arc<FollowUpScheduler>,
    maintenance: Arc<HistoryMaintenance>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sweep_job = Job::new_async(schedules.daily_status.as_str(), move |_uuid, _lock| {
        let sweep = sweep.clone();
        Box::pin(async move {
            match sweep.run().await {
                Ok(SweepOutcome::Completed(report)) => {
                    info!(updated = report.updated, "Daily status sweep finished")
                }
                Ok(_) => {}
                Err(e) => error!("Daily status sweep failed: {}", e),
            }
        })
    })?;
    scheduler.add(sweep_job).await?;

    let follow_up_job = Job::new_async(schedules.follow_up.as_str(), move |_uuid, _lock| {
        let follow_up = follow_up.clone();
        Box::pin(async move {
            if let Err(e) = follow_up.run().await {
                error!("Follow-up task failed: {}", e);
            }
        })
    })?;
    scheduler.add(follow_up_job).await?;

    let cleanup_job = Job::new_async(schedules.weekly_cleanup.as_str(), move |_uuid, _lock| {
        let maintenance = maintenance.clone();
        Box::pin(async move {
            if let Err(e) = maintenance.run().await {
                error!("Email history cleanup failed: {}", e);
            }
        })
    })?;
    scheduler.add(cleanup_job).await?;

    scheduler.start().await?;

    info!(
        daily_status = %schedules.daily_status,
        follow_up = %schedules.follow_up,
        weekly_cleanup = %schedules.weekly_cleanup,
        "Scheduled tasks started"
    );
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_schedules_are_valid_cron() {
        let schedules = Schedules::default();
        for expression in [
            &schedules.daily_status,
            &schedules.follow_up,
            &schedules.weekly_cleanup,
        ] {
            assert!(
                Job::new_async(expression.as_str(), |_uuid, _lock| Box::pin(async {})).is_ok(),
                "invalid cron expression {}",
                expression
            );
        }
    }
}
