pub mod errors;
pub mod pacing;

pub use errors::{AbortReason, ApplyError, AuthError, BrowserError, TaskError};
pub use pacing::{DelayStrategy, FixedDelay, Pacer, PauseBand, UniformDelay};
