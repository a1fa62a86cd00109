//! Daily status sweep.
//!
//! ```text
//! run()
//!     ├─► local running flag (skip overlapping triggers)
//!     ├─► SweepLock (skip if another process sweeps)
//!     ├─► find_stale_for_status_check(now - 24h, batch)
//!     │       └─► for each: new_page → probe_status → close_page
//!     │               ├─► legal change → update_status + notify
//!     │               └─► otherwise   → touch status_checked_at
//!     └─► release lock
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use super::notifications::StatusChangeNotification;
use super::sweep_lock::{SweepLock, SWEEP_LOCK_TTL};
use crate::common::{Pacer, PauseBand};
use crate::domains::applications::{ApplicationRecord, ApplicationStatus, ApplicationStore};
use crate::domains::platforms::AdapterRegistry;
use crate::kernel::nats::{
    publish_json, NatsPublisher, EMAIL_NOTIFICATIONS_SUBJECT, STATUS_UPDATES_SUBJECT,
};
use crate::kernel::{BaseBrowser, BaseCache};

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub batch_size: i64,
    /// Applications checked more recently than this are left alone.
    pub stale_after: chrono::Duration,
    pub lock_ttl: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            stale_after: chrono::Duration::hours(24),
            lock_ttl: SWEEP_LOCK_TTL,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// A previous local trigger is still sweeping.
    AlreadyRunning,
    /// Another process holds the sweep lock.
    LockHeld,
}

enum ItemOutcome {
    Updated,
    Unchanged,
}

/// Clears the running flag however the sweep ends.
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct StatusSweep {
    applications: Arc<dyn ApplicationStore>,
    browser: Arc<dyn BaseBrowser>,
    registry: AdapterRegistry,
    lock: SweepLock,
    publisher: Arc<dyn NatsPublisher>,
    pacer: Pacer,
    config: SweepConfig,
    running: AtomicBool,
    span: Span,
}

impl StatusSweep {
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        browser: Arc<dyn BaseBrowser>,
        registry: AdapterRegistry,
        cache: Arc<dyn BaseCache>,
        publisher: Arc<dyn NatsPublisher>,
        pacer: Pacer,
        config: SweepConfig,
    ) -> Self {
        Self {
            applications,
            browser,
            registry,
            lock: SweepLock::new(cache, config.lock_ttl),
            publisher,
            pacer,
            config,
            running: AtomicBool::new(false),
            span: info_span!("status_sweep"),
        }
    }

    pub async fn run(&self) -> Result<SweepOutcome> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!(parent: &self.span, "status sweep already running, skipping trigger");
            return Ok(SweepOutcome::AlreadyRunning);
        }
        let _running = RunningFlag(&self.running);

        async {
            let Some(guard) = self.lock.try_acquire().await? else {
                info!("status sweep lock held elsewhere, skipping");
                return Ok(SweepOutcome::LockHeld);
            };

            let result = self.sweep().await;
            guard.release().await;
            result.map(SweepOutcome::Completed)
        }
        .instrument(self.span.clone())
        .await
    }

    async fn sweep(&self) -> Result<SweepReport> {
        let cutoff = Utc::now() - self.config.stale_after;
        let stale = self
            .applications
            .find_stale_for_status_check(cutoff, self.config.batch_size)
            .await?;

        info!(count = stale.len(), "checking application statuses");

        let mut report = SweepReport::default();
        let total = stale.len();
        for (index, application) in stale.into_iter().enumerate() {
            let item_span = info_span!(
                "status_check",
                application_id = %application.id,
                platform = %application.platform
            );
            match self.check(&application).instrument(item_span).await {
                Ok(ItemOutcome::Updated) => {
                    report.checked += 1;
                    report.updated += 1;
                }
                Ok(ItemOutcome::Unchanged) => report.checked += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(application_id = %application.id, error = %e, "status check failed");
                }
            }

            if index + 1 < total {
                self.pacer.pause(PauseBand::PROBE).await;
            }
        }

        info!(
            checked = report.checked,
            updated = report.updated,
            failed = report.failed,
            "status sweep complete"
        );
        Ok(report)
    }

    async fn check(&self, application: &ApplicationRecord) -> Result<ItemOutcome> {
        let adapter = self
            .registry
            .get(application.platform)
            .ok_or_else(|| anyhow!("no adapter registered for {}", application.platform))?;

        let page = self.browser.new_page().await?;
        let probed = adapter.probe_status(page.as_ref(), application).await;
        if let Err(e) = self.browser.close_page(page).await {
            warn!(error = %e, "failed to close status page");
        }
        let probed = probed?;

        let now = Utc::now();
        match probed {
            Some(next) if next != application.status => {
                if !application.status.can_transition_to(next) {
                    warn!(from = %application.status, to = %next, "ignoring illegal status transition");
                    self.applications
                        .touch_status_checked(application.id, now)
                        .await?;
                    return Ok(ItemOutcome::Unchanged);
                }

                self.applications
                    .update_status(application.id, next, now)
                    .await?;
                info!(from = %application.status, to = %next, "application status changed");
                self.notify(application, next).await;
                Ok(ItemOutcome::Updated)
            }
            _ => {
                debug!("status unchanged");
                self.applications
                    .touch_status_checked(application.id, now)
                    .await?;
                Ok(ItemOutcome::Unchanged)
            }
        }
    }

    /// The status is already persisted, so publish failures are only logged.
    async fn notify(&self, application: &ApplicationRecord, next: ApplicationStatus) {
        let notification = StatusChangeNotification::new(application, next, Utc::now());

        if let Err(e) = publish_json(
            self.publisher.as_ref(),
            EMAIL_NOTIFICATIONS_SUBJECT,
            &notification,
        )
        .await
        {
            error!(error = %e, "failed to publish status notification");
        }
        if let Err(e) = publish_json(
            self.publisher.as_ref(),
            STATUS_UPDATES_SUBJECT,
            &notification.data,
        )
        .await
        {
            error!(error = %e, "failed to publish status update");
        }
    }
}
