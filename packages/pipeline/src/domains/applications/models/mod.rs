pub mod application;
pub mod task;

pub use application::{ApplicationRecord, ApplicationStatus, AttemptRecord};
pub use task::{ApplicationTask, JobDetails, TaskResult};
