//! Kernel module - process infrastructure and dependencies.

pub mod browser;
pub mod deps;
pub mod nats;
pub mod redis_cache;
pub mod scheduled_tasks;
pub mod shutdown;
pub mod task_queue;
pub mod test_dependencies;
pub mod traits;

pub use browser::{BrowserProfile, BrowserSession, WebDriverPage};
pub use deps::PipelineDeps;
pub use nats::{JetStreamPublisher, NatsPublisher, PublishedMessage, TestNats};
pub use redis_cache::RedisCache;
pub use scheduled_tasks::{start_scheduler, Schedules};
pub use shutdown::install_shutdown_handler;
pub use task_queue::{JetStreamTaskQueue, QueueConfig};
pub use test_dependencies::TestDependencies;
pub use traits::*;
