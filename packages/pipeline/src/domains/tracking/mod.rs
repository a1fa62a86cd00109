pub mod follow_up;
pub mod maintenance;
pub mod notifications;
pub mod status_sweep;
pub mod sweep_lock;

pub use follow_up::{FollowUpConfig, FollowUpDelivery, FollowUpReport, FollowUpScheduler};
pub use maintenance::{HistoryMaintenance, EMAIL_HISTORY_CAP, EMAIL_HISTORY_KEY};
pub use notifications::{FollowUpRequest, StatusChange, StatusChangeNotification};
pub use status_sweep::{StatusSweep, SweepConfig, SweepOutcome, SweepReport};
pub use sweep_lock::{SweepLock, SweepLockGuard, SWEEP_LOCK_KEY, SWEEP_LOCK_TTL};
