// Job Application Pipeline - Core
//
// Worker and scheduler processes that submit job applications through
// platform adapters and keep their status current.
//
// Cross-process coordination lives in the shared cache (rate limits, sweep lock)
// and the JetStream queue; everything else is single-flight per process.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
