//! The real-time control loop.
//!
//! Every tick: advance the simulation, sample perception, let gesture-follow
//! drive the joints if no voice action holds the arbiter, then poll the manual
//! override. Nothing in a tick waits on voice or I/O.

use crate::actuator::ActuatorBank;
use crate::arbiter::Arbiter;
use crate::mapper::PerceptionMapper;
use crate::perception::PerceptionSource;
use crate::stepper::{StepOutcome, Stepper};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Terminal input polled once per tick.
pub trait OverrideInput: Send {
    fn triggered(&mut self) -> bool;
}

impl<F> OverrideInput for F
where
    F: FnMut() -> bool + Send,
{
    fn triggered(&mut self) -> bool {
        self()
    }
}

/// Never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverride;

impl OverrideInput for NoOverride {
    fn triggered(&mut self) -> bool {
        false
    }
}

/// A flag another thread raises (keypress, Ctrl-C handler).
#[derive(Debug, Clone, Default)]
pub struct OverrideFlag(Arc<AtomicBool>);

impl OverrideFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl OverrideInput for OverrideFlag {
    fn triggered(&mut self) -> bool {
        self.is_set()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Absorbing.
    Terminated,
}

/// Why the loop terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    Shutdown,
    Override,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    /// Frames the perception source returned.
    pub frames: u64,
    /// Ticks on which gesture-follow wrote to the bank.
    pub gesture_ticks: u64,
    /// Ticks skipped for gesture-follow because a voice action held the slot.
    pub gated_ticks: u64,
}

/// Drives the robot from perception while arbitrating with voice actions.
pub struct ControlLoop {
    stepper: Arc<dyn Stepper>,
    perception: Box<dyn PerceptionSource>,
    mapper: PerceptionMapper,
    bank: Arc<ActuatorBank>,
    arbiter: Arc<Arbiter>,
    override_input: Box<dyn OverrideInput>,
    min_visibility: f32,
    state: LoopState,
    cause: Option<TerminationCause>,
    stats: LoopStats,
}

impl ControlLoop {
    pub fn new(
        stepper: Arc<dyn Stepper>,
        perception: Box<dyn PerceptionSource>,
        mapper: PerceptionMapper,
        bank: Arc<ActuatorBank>,
        arbiter: Arc<Arbiter>,
    ) -> Self {
        Self {
            stepper,
            perception,
            mapper,
            bank,
            arbiter,
            override_input: Box::new(NoOverride),
            min_visibility: 0.0,
            state: LoopState::Running,
            cause: None,
            stats: LoopStats::default(),
        }
    }

    pub fn with_override(mut self, input: impl OverrideInput + 'static) -> Self {
        self.override_input = Box::new(input);
        self
    }

    /// Landmarks below `min_visibility` are dropped before mapping.
    pub fn with_min_visibility(mut self, min_visibility: f32) -> Self {
        self.min_visibility = min_visibility;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn termination_cause(&self) -> Option<TerminationCause> {
        self.cause
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    fn terminate(&mut self, cause: TerminationCause) -> LoopState {
        self.state = LoopState::Terminated;
        self.cause = Some(cause);
        info!(target: "mimic::loop", ?cause, ticks = self.stats.ticks, "control loop terminated");
        LoopState::Terminated
    }

    /// Run one tick.
    pub fn tick(&mut self) -> LoopState {
        if self.state == LoopState::Terminated {
            return LoopState::Terminated;
        }

        if self.stepper.step() == StepOutcome::Shutdown {
            return self.terminate(TerminationCause::Shutdown);
        }
        self.stats.ticks += 1;

        let frame = match self.perception.sample() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(target: "mimic::loop", error = %e, "perception sample failed");
                None
            }
        };

        if let Some(frame) = frame {
            self.stats.frames += 1;
            let frame = frame.filtered(self.min_visibility);
            let (mapper, bank) = (&self.mapper, &self.bank);
            let written = self.arbiter.run_if_idle(|| {
                let targets = mapper.map(&frame, bank);
                bank.apply(&targets)
            });
            match written {
                Some(n) => {
                    self.stats.gesture_ticks += 1;
                    debug!(target: "mimic::loop", targets = n, "gesture-follow applied");
                }
                None => self.stats.gated_ticks += 1,
            }
        }

        if self.override_input.triggered() {
            return self.terminate(TerminationCause::Override);
        }
        LoopState::Running
    }

    /// Tick until terminated.
    pub fn run(&mut self) -> LoopStats {
        info!(
            target: "mimic::loop",
            timestep_ms = self.stepper.timestep().as_millis() as u64,
            joints = self.bank.len(),
            "▶ control loop running"
        );
        while self.tick() == LoopState::Running {}
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::Joint;
    use crate::perception::{Landmark, PerceptionFrame, PoseSample};
    use crate::stepper::RealtimeStepper;
    use crate::error::{CoreError, CoreResult};
    use std::time::Duration;

    struct Frames(Vec<CoreResult<Option<PerceptionFrame>>>);

    impl PerceptionSource for Frames {
        fn sample(&mut self) -> CoreResult<Option<PerceptionFrame>> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                self.0.remove(0)
            }
        }
    }

    fn nose_frame(x: f32) -> PerceptionFrame {
        PerceptionFrame::with_pose(PoseSample {
            nose: Some(Landmark::new(x, 0.5)),
            ..PoseSample::default()
        })
    }

    fn control(frames: Frames, max_ticks: u64) -> (ControlLoop, Arc<ActuatorBank>) {
        let bank = Arc::new(ActuatorBank::simulated_nao());
        let stepper = Arc::new(RealtimeStepper::new(Duration::ZERO).with_max_ticks(max_ticks));
        let control = ControlLoop::new(
            stepper,
            Box::new(frames),
            PerceptionMapper::default(),
            Arc::clone(&bank),
            Arc::new(Arbiter::new()),
        );
        (control, bank)
    }

    #[test]
    fn failed_sample_is_a_no_op_tick() {
        let frames = Frames(vec![
            Err(CoreError::Perception("camera busy".into())),
            Ok(Some(nose_frame(0.25))),
        ]);
        let (mut control, bank) = control(frames, 10);
        assert_eq!(control.tick(), LoopState::Running);
        assert_eq!(bank.position(Joint::HeadYaw), Some(0.0));
        assert_eq!(control.tick(), LoopState::Running);
        assert!(bank.position(Joint::HeadYaw).unwrap() > 0.0);
        assert_eq!(control.stats().frames, 1);
    }

    #[test]
    fn shutdown_terminates_and_stays_terminated() {
        let (mut control, _) = control(Frames(Vec::new()), 2);
        let stats = control.run();
        assert_eq!(stats.ticks, 2);
        assert_eq!(control.termination_cause(), Some(TerminationCause::Shutdown));
        assert_eq!(control.tick(), LoopState::Terminated);
        assert_eq!(control.stats().ticks, 2);
    }

    #[test]
    fn override_flag_ends_the_loop() {
        let flag = OverrideFlag::new();
        let (control, _) = control(Frames(Vec::new()), 100);
        let mut control = control.with_override(flag.clone());
        assert_eq!(control.tick(), LoopState::Running);
        flag.trigger();
        assert_eq!(control.tick(), LoopState::Terminated);
        assert_eq!(control.termination_cause(), Some(TerminationCause::Override));
    }
}
