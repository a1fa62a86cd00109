pub mod orchestrator;
pub mod rate_limiter;
pub mod results;

pub use orchestrator::{WorkerConfig, WorkerDeps, WorkerOrchestrator, WorkerState};
pub use rate_limiter::{rate_limit_key, RateLimitMode, RateLimiter, RATE_LIMIT_WINDOW};
pub use results::{result_key, ResultStore, RESULT_TTL};
