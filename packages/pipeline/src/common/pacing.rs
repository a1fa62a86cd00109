//! Randomized pacing for human-looking interaction timing.
//!
//! Every pause in the pipeline goes through a [`Pacer`], which asks an
//! injectable [`DelayStrategy`] for a duration inside a [`PauseBand`].
//! Production uses [`UniformDelay`]; tests swap in [`FixedDelay::zero`] or a
//! recording strategy so nothing actually waits.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// Inclusive bounds for one kind of pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseBand {
    pub min: Duration,
    pub max: Duration,
}

impl PauseBand {
    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub const fn secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    /// Between ordinary form interactions.
    pub const ACTION: PauseBand = PauseBand::millis(1_000, 3_000);
    /// After a navigation or opening the application dialog.
    pub const PAGE_SETTLE: PauseBand = PauseBand::millis(2_000, 4_000);
    /// After advancing the application dialog one step.
    pub const STEP: PauseBand = PauseBand::millis(1_000, 2_000);
    /// Between typed characters.
    pub const KEYSTROKE: PauseBand = PauseBand::millis(100, 150);
    pub const SCROLL: PauseBand = PauseBand::millis(500, 1_500);
    /// Between status probes in a sweep.
    pub const PROBE: PauseBand = PauseBand::millis(4_000, 6_000);
    /// Between tasks on one worker.
    pub const BETWEEN_TASKS: PauseBand = PauseBand::secs(30, 180);
}

/// Picks a concrete delay inside a band.
pub trait DelayStrategy: Send + Sync {
    fn pick(&self, band: PauseBand) -> Duration;
}

/// Uniformly distributed delay, millisecond resolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformDelay;

impl DelayStrategy for UniformDelay {
    fn pick(&self, band: PauseBand) -> Duration {
        let min = band.min.as_millis() as u64;
        let max = band.max.as_millis() as u64;
        if max <= min {
            return band.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Always returns the same delay regardless of band.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl FixedDelay {
    pub fn zero() -> Self {
        Self(Duration::ZERO)
    }
}

impl DelayStrategy for FixedDelay {
    fn pick(&self, _band: PauseBand) -> Duration {
        self.0
    }
}

#[derive(Clone)]
pub struct Pacer {
    strategy: Arc<dyn DelayStrategy>,
}

impl Pacer {
    pub fn new(strategy: Arc<dyn DelayStrategy>) -> Self {
        Self { strategy }
    }

    /// Uniformly randomized pacing.
    pub fn human() -> Self {
        Self::new(Arc::new(UniformDelay))
    }

    /// No waiting at all.
    pub fn instant() -> Self {
        Self::new(Arc::new(FixedDelay::zero()))
    }

    pub fn delay(&self, band: PauseBand) -> Duration {
        self.strategy.pick(band)
    }

    pub async fn pause(&self, band: PauseBand) {
        let delay = self.delay(band);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer").finish_non_exhaustive()
    }
}
