//! The simulation stepping primitive.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

/// Result of advancing the simulation by one timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// The simulator is going away. Terminal for every caller.
    Shutdown,
}

/// Advances simulated time by one fixed timestep.
///
/// Shared by the control loop and every action task; each caller steps
/// independently.
pub trait Stepper: Send + Sync {
    fn step(&self) -> StepOutcome;
    fn timestep(&self) -> Duration;
}

/// Wall-clock paced stepper for the in-process simulator.
///
/// Each `step` sleeps one timestep (a zero timestep never sleeps). Once
/// [`shutdown`](Self::shutdown) is called or `max_ticks` is reached, every
/// call reports [`StepOutcome::Shutdown`].
#[derive(Debug)]
pub struct RealtimeStepper {
    timestep: Duration,
    max_ticks: Option<u64>,
    ticks: AtomicU64,
    shutdown: AtomicBool,
}

impl RealtimeStepper {
    pub fn new(timestep: Duration) -> Self {
        Self {
            timestep,
            max_ticks: None,
            ticks: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            info!(target: "mimic::loop", ticks = self.ticks(), "simulation shutdown requested");
        }
    }

    /// Steps taken by all callers together.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl Stepper for RealtimeStepper {
    fn step(&self) -> StepOutcome {
        if self.shutdown.load(Ordering::SeqCst) {
            return StepOutcome::Shutdown;
        }
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        if self.max_ticks.is_some_and(|max| tick > max) {
            self.shutdown();
            return StepOutcome::Shutdown;
        }
        if !self.timestep.is_zero() {
            std::thread::sleep(self.timestep);
        }
        StepOutcome::Continue
    }

    fn timestep(&self) -> Duration {
        self.timestep
    }
}
