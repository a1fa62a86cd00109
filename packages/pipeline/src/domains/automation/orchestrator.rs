//! Worker orchestrator: the single-flight consumption loop.
//!
//! ```text
//! Idle ─► Reserving ─► Authenticating ─► Submitting ─► Persisting ─► Pacing ─► Idle
//!            │               │                │             ▲
//!            └───────────────┴────────────────┴─── failure ─┘
//! ```
//!
//! One delivery is pulled, processed end to end, settled, and followed by a
//! randomized pause before the next pull. The broker is told the task is still
//! in progress before each browser phase. Every failure is persisted as a
//! `failed` result and the delivery is rejected without redelivery.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::rate_limiter::{RateLimitMode, RateLimiter};
use super::results::{ResultStore, RESULT_TTL};
use crate::common::{Pacer, PauseBand, TaskError};
use crate::domains::applications::{
    ApplicationStatus, ApplicationStore, ApplicationTask, AttemptRecord, CredentialStore,
    TaskResult,
};
use crate::domains::platforms::{AdapterRegistry, ApplyLimits, ApplyResult, Platform};
use crate::kernel::{BaseCache, BasePage, BaseTaskQueue, Delivery};

/// Configuration for the automation worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker ID for this instance
    pub worker_id: String,
    /// How long one queue pull waits for a task
    pub poll_wait: Duration,
    /// Back-off after a failed pull
    pub error_backoff: Duration,
    /// Submissions per platform per hour
    pub rate_limit: i64,
    pub rate_limit_mode: RateLimitMode,
    pub max_apply_steps: u32,
    /// Bounds of the pause between tasks
    pub pacing_min: Duration,
    pub pacing_max: Duration,
    pub result_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::new_v4()),
            poll_wait: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
            rate_limit: 5,
            rate_limit_mode: RateLimitMode::default(),
            max_apply_steps: 5,
            pacing_min: PauseBand::BETWEEN_TASKS.min,
            pacing_max: PauseBand::BETWEEN_TASKS.max,
            result_ttl: RESULT_TTL,
        }
    }
}

impl WorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    pub fn pacing_band(&self) -> PauseBand {
        PauseBand {
            min: self.pacing_min,
            max: self.pacing_max.max(self.pacing_min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Reserving,
    Authenticating,
    Submitting,
    Persisting,
    Pacing,
}

/// Everything the worker talks to.
#[derive(TypedBuilder)]
pub struct WorkerDeps {
    pub queue: Arc<dyn BaseTaskQueue>,
    /// The session's page; the worker drives it for every task.
    pub page: Arc<dyn BasePage>,
    pub cache: Arc<dyn BaseCache>,
    pub credentials: Arc<dyn CredentialStore>,
    pub applications: Arc<dyn ApplicationStore>,
    pub pacer: Pacer,
    /// Defaults to every built-in site.
    #[builder(default, setter(strip_option))]
    pub registry: Option<AdapterRegistry>,
}

pub struct WorkerOrchestrator {
    queue: Arc<dyn BaseTaskQueue>,
    page: Arc<dyn BasePage>,
    registry: AdapterRegistry,
    rate_limiter: RateLimiter,
    results: ResultStore,
    credentials: Arc<dyn CredentialStore>,
    applications: Arc<dyn ApplicationStore>,
    pacer: Pacer,
    config: WorkerConfig,
    state: watch::Sender<WorkerState>,
    span: Span,
}

impl WorkerOrchestrator {
    pub fn new(deps: WorkerDeps, config: WorkerConfig) -> Self {
        let limits = ApplyLimits {
            max_steps: config.max_apply_steps,
            ..ApplyLimits::default()
        };
        let registry = deps
            .registry
            .unwrap_or_else(|| AdapterRegistry::with_defaults(limits, deps.pacer.clone()));
        let (state, _) = watch::channel(WorkerState::Idle);
        let span = info_span!("worker", worker_id = %config.worker_id);

        Self {
            queue: deps.queue,
            page: deps.page,
            registry,
            rate_limiter: RateLimiter::new(
                deps.cache.clone(),
                config.rate_limit,
                config.rate_limit_mode,
            ),
            results: ResultStore::new(deps.cache, config.result_ttl),
            credentials: deps.credentials,
            applications: deps.applications,
            pacer: deps.pacer,
            config,
            state,
            span,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }

    /// Consume until `shutdown` is cancelled. An in-flight task always runs to completion.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        async {
            info!(
                rate_limit = self.config.rate_limit,
                max_steps = self.config.max_apply_steps,
                "automation worker starting"
            );

            loop {
                if shutdown.is_cancelled() {
                    break;
                }

                let next = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = self.queue.next_delivery(self.config.poll_wait) => next,
                };

                let delivery = match next {
                    Ok(Some(delivery)) => delivery,
                    Ok(None) => continue,
                    Err(e) => {
                        error!(error = %e, "failed to pull task");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(self.config.error_backoff) => {}
                        }
                        continue;
                    }
                };

                self.handle_delivery(delivery).await;

                if shutdown.is_cancelled() {
                    break;
                }
                self.pace(&shutdown).await;
            }

            self.set_state(WorkerState::Idle);
            info!("automation worker stopped");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Process and settle one delivery. Returns the persisted result, if the
    /// payload could be decoded at all.
    pub async fn handle_delivery(&self, delivery: Delivery) -> Option<TaskResult> {
        let task: ApplicationTask = match serde_json::from_slice(&delivery.payload) {
            Ok(task) => task,
            Err(e) => {
                warn!(error = %e, "rejecting malformed task");
                if let Err(e) = delivery.reject().await {
                    error!(error = %e, "failed to reject malformed task");
                }
                return None;
            }
        };

        let platform = Platform::canonical_name(&task.platform);
        let span = info_span!(
            parent: &self.span,
            "task",
            task_id = %task.task_id,
            platform = %platform
        );

        async {
            info!(title = %task.job_details.title, company = %task.job_details.company, "processing application");
            let outcome = self.process_task(&task, &platform, &delivery).await;

            self.set_state(WorkerState::Persisting);
            let result = match &outcome {
                Ok(applied) => {
                    info!(steps = applied.steps, "application submitted");
                    TaskResult::Success {
                        platform: platform.clone(),
                        applied_at: applied.applied_at,
                        result: applied.clone(),
                    }
                }
                Err(e) => {
                    warn!(reason = e.reason(), error = %e, "application failed");
                    TaskResult::Failed {
                        platform: platform.clone(),
                        failed_at: Utc::now(),
                        error: e.to_string(),
                        reason: e.reason().to_string(),
                    }
                }
            };

            if let Err(e) = self.results.store(&task.task_id, &result).await {
                error!(error = %e, "failed to store task result");
            }
            self.record_attempt(&task, &outcome).await;

            let settled = match outcome {
                Ok(_) => delivery.ack().await,
                Err(_) => delivery.reject().await,
            };
            if let Err(e) = settled {
                error!(error = %e, "failed to settle delivery");
            }

            Some(result)
        }
        .instrument(span)
        .await
    }

    async fn process_task(
        &self,
        task: &ApplicationTask,
        platform: &str,
        delivery: &Delivery,
    ) -> Result<ApplyResult, TaskError> {
        self.set_state(WorkerState::Reserving);
        self.rate_limiter.check_and_reserve(platform).await?;

        let adapter = self.registry.resolve(platform)?;
        let credentials = self
            .credentials
            .resolve(&task.credentials_ref)
            .await?
            .ok_or_else(|| TaskError::CredentialsUnavailable(task.credentials_ref.clone()))?;

        self.set_state(WorkerState::Authenticating);
        extend(delivery).await;
        let login = adapter.login(self.page.as_ref(), &credentials).await?;
        debug!(message = %login.message, "logged in");

        self.set_state(WorkerState::Submitting);
        extend(delivery).await;
        let applied = adapter
            .apply_to_job(self.page.as_ref(), &task.job_details, &credentials)
            .await?;
        Ok(applied)
    }

    /// Upsert the durable record for tasks that carry a user.
    async fn record_attempt(&self, task: &ApplicationTask, outcome: &Result<ApplyResult, TaskError>) {
        let Some(user_id) = task.user_id else {
            return;
        };
        let Ok(platform) = task.platform.parse::<Platform>() else {
            debug!("not recording attempt for unknown platform");
            return;
        };

        let job = &task.job_details;
        let platform_job_id = job
            .platform_job_id
            .clone()
            .or_else(|| {
                self.registry
                    .get(platform)
                    .and_then(|adapter| adapter.platform_job_id(&job.url))
            })
            .unwrap_or_else(|| job.url.clone());

        let (status, last_error, metadata) = match outcome {
            Ok(applied) => (
                ApplicationStatus::Applied,
                None,
                json!({ "taskId": task.task_id, "method": applied.method, "steps": applied.steps }),
            ),
            Err(e) => (
                ApplicationStatus::Failed,
                Some(e.to_string()),
                json!({ "taskId": task.task_id, "reason": e.reason() }),
            ),
        };

        let attempt = AttemptRecord {
            user_id,
            platform,
            platform_job_id,
            job_title: job.title.clone(),
            company: job.company.clone(),
            link: job.url.clone(),
            status,
            last_error,
            metadata,
        };

        if let Err(e) = self.applications.record_attempt(&attempt).await {
            error!(error = %e, "failed to record application attempt");
        }
    }

    /// Randomized pause between tasks, cut short only by shutdown.
    async fn pace(&self, shutdown: &CancellationToken) {
        self.set_state(WorkerState::Pacing);
        let delay = self.pacer.delay(self.config.pacing_band());
        info!(seconds = delay.as_secs(), "waiting before next application");

        tokio::select! {
            _ = shutdown.cancelled() => debug!("pacing interrupted by shutdown"),
            _ = tokio::time::sleep(delay) => {}
        }
        self.set_state(WorkerState::Idle);
    }
}

/// Push the delivery's redelivery deadline back before a long phase.
async fn extend(delivery: &Delivery) {
    if let Err(e) = delivery.progress().await {
        warn!(error = %e, "failed to signal task progress");
    }
}
