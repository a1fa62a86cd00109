// Automation worker: one browser session, one consumption loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use pipeline_core::common::Pacer;
use pipeline_core::domains::automation::{WorkerDeps, WorkerOrchestrator};
use pipeline_core::kernel::{
    install_shutdown_handler, BaseBrowser, BrowserSession, JetStreamTaskQueue, PipelineDeps,
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

    tracing::info!("Starting automation worker");

    let config = Config::from_env().context("Failed to load configuration")?;
    let worker_config = config.worker();
    tracing::info!(worker_id = %worker_config.worker_id, "Configuration loaded");

    let shutdown = install_shutdown_handler();
    let deps = PipelineDeps::connect(&config).await?;
    let queue = JetStreamTaskQueue::connect(&deps.jetstream, &config.queue()).await?;

    tracing::info!(webdriver = %config.webdriver_url, "Launching browser session...");
    let browser = BrowserSession::launch(&config.webdriver_url, config.browser_profile())
        .await
        .context("Failed to launch browser session")?;
    let page = browser.default_page();

    let worker = WorkerOrchestrator::new(
        WorkerDeps::builder()
            .queue(Arc::new(queue))
            .page(page.clone())
            .cache(deps.cache.clone())
            .credentials(deps.credentials.clone())
            .applications(deps.applications.clone())
            .pacer(Pacer::human())
            .build(),
        worker_config,
    );

    let result = worker.run(shutdown).await;

    tracing::info!("Shutting down worker");
    if let Err(e) = browser.close_page(page).await {
        tracing::warn!(error = %e, "Failed to close page");
    }
    if let Err(e) = browser.shutdown().await {
        tracing::warn!(error = %e, "Failed to shut down browser session");
    }
    deps.close().await;

    result
}
