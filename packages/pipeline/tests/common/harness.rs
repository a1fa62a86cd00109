//! Test harness with testcontainers for integration testing.
//!
//! Uses shared containers across all tests. Containers and migrations are
//! initialized once on first test, then reused; tests isolate themselves with
//! fresh user ids and cache keys.
//!
//! Tests that own a fixed JetStream stream must serialize among themselves
//! (see `task_queue_tests.rs`).

use std::sync::Arc;

use anyhow::{Context, Result};
use async_nats::jetstream;
use pipeline_core::kernel::{BaseCache, RedisCache};
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::{Nats, NatsServerCmd};
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

/// Shared test infrastructure that persists across all tests.
/// Containers are started once and reused, migrations run once.
struct SharedTestInfra {
    db_url: String,
    redis_url: String,
    nats_url: String,
    // Keep containers alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
    _redis: ContainerAsync<Redis>,
    _nats: ContainerAsync<Nats>,
}

/// Global shared infrastructure - initialized once, reused by all tests.
static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    /// Start Postgres, Redis and a JetStream-enabled NATS, then migrate.
    /// Called once, by whichever test gets here first.
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        let redis = Redis::default()
            .start()
            .await
            .context("Failed to start Redis container")?;

        let redis_host = redis.get_host().await?;
        let redis_port = redis.get_host_port_ipv4(6379).await?;
        let redis_url = format!("redis://{}:{}", redis_host, redis_port);

        let nats = Nats::default()
            .with_cmd(&NatsServerCmd::default().with_jetstream())
            .start()
            .await
            .context("Failed to start NATS container")?;

        let nats_host = nats.get_host().await?;
        let nats_port = nats.get_host_port_ipv4(4222).await?;
        let nats_url = format!("nats://{}:{}", nats_host, nats_port);

        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            redis_url,
            nats_url,
            _postgres: postgres,
            _redis: redis,
            _nats: nats,
        })
    }

    /// Get or initialize the shared infrastructure.
    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Per-test handles onto the shared Postgres, Redis and NATS.
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let store = ctx.applications();
/// }
/// ```
pub struct TestHarness {
    pub db_pool: PgPool,
    pub cache: Arc<dyn BaseCache>,
    pub jetstream: jetstream::Context,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    /// Open fresh connections onto the shared containers.
    /// Each test gets its own pool; the database itself is shared.
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;
        let cache = RedisCache::connect(&infra.redis_url).await?;
        let nats = async_nats::connect(&infra.nats_url)
            .await
            .context("Failed to connect to test NATS")?;

        Ok(Self {
            db_pool,
            cache: Arc::new(cache),
            jetstream: jetstream::new(nats),
        })
    }
}
