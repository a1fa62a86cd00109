// Scheduler: status sweep, follow-ups and history maintenance on cron.

use std::sync::Arc;

use anyhow::{Context, Result};
use pipeline_core::common::Pacer;
use pipeline_core::domains::platforms::{AdapterRegistry, ApplyLimits};
use pipeline_core::domains::tracking::{FollowUpScheduler, HistoryMaintenance, StatusSweep};
use pipeline_core::kernel::{
    install_shutdown_handler, start_scheduler, BaseBrowser, BrowserSession, PipelineDeps,
};
use pipeline_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pipeline_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting scheduler");

    let config = Config::from_env().context("Failed to load configuration")?;
    let shutdown = install_shutdown_handler();
    let deps = PipelineDeps::connect(&config).await?;

    tracing::info!(webdriver = %config.webdriver_url, "Launching browser session...");
    let browser = Arc::new(
        BrowserSession::launch(&config.webdriver_url, config.browser_profile())
            .await
            .context("Failed to launch browser session")?,
    );

    let pacer = Pacer::human();
    let limits = ApplyLimits {
        max_steps: config.max_apply_steps,
        ..ApplyLimits::default()
    };
    let sweep = Arc::new(StatusSweep::new(
        deps.applications.clone(),
        browser.clone(),
        AdapterRegistry::with_defaults(limits, pacer.clone()),
        deps.cache.clone(),
        deps.publisher.clone(),
        pacer,
        config.sweep(),
    ));
    let follow_up = Arc::new(FollowUpScheduler::new(
        deps.applications.clone(),
        deps.publisher.clone(),
        config.follow_up(),
    ));
    let maintenance = Arc::new(HistoryMaintenance::new(
        deps.cache.clone(),
        config.email_history_cap,
    ));

    let mut scheduler =
        start_scheduler(&config.schedules(), sweep, follow_up, maintenance).await?;

    shutdown.cancelled().await;

    tracing::info!("Shutting down scheduler");
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Failed to stop cron scheduler");
    }
    if let Err(e) = browser.shutdown().await {
        tracing::warn!(error = %e, "Failed to shut down browser session");
    }
    deps.close().await;

    Ok(())
}
