//! Named motions and the player that steps one of them per tick.

use crate::actuator::ActuatorBank;
use crate::arbiter::ActionLease;
use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, time-indexed joint trajectory. Each `play` advances it one frame
/// and writes the resulting pose through the bank.
pub trait Trajectory: Send {
    fn name(&self) -> &str;
    fn play(&mut self, bank: &ActuatorBank) -> CoreResult<()>;
}

/// Every motion a voice command can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionKind {
    Dance,
    Stop,
    TurnLeft,
    Stand,
    TurnRight,
    Forward,
    Backward,
    SideStepLeft,
    SideStepRight,
    WipeForehead,
    Wave,
}

impl MotionKind {
    pub const ALL: [MotionKind; 11] = [
        MotionKind::Dance,
        MotionKind::Stop,
        MotionKind::TurnLeft,
        MotionKind::Stand,
        MotionKind::TurnRight,
        MotionKind::Forward,
        MotionKind::Backward,
        MotionKind::SideStepLeft,
        MotionKind::SideStepRight,
        MotionKind::WipeForehead,
        MotionKind::Wave,
    ];

    /// Clip file played for this motion. `Stop` has none.
    pub fn clip_file(self) -> Option<&'static str> {
        let file = match self {
            MotionKind::Dance => "TaiChi.motion",
            MotionKind::Stop => return None,
            MotionKind::TurnLeft => "TurnLeft60.motion",
            MotionKind::Stand => "StandUpFromFront.motion",
            MotionKind::TurnRight => "TurnRight60.motion",
            MotionKind::Forward => "Forwards.motion",
            MotionKind::Backward => "Backwards.motion",
            MotionKind::SideStepLeft => "SideStepLeft.motion",
            MotionKind::SideStepRight => "SideStepRight.motion",
            MotionKind::WipeForehead => "WipeForehead.motion",
            MotionKind::Wave => "HandWave.motion",
        };
        Some(file)
    }

    /// What happens to the joints once this motion stops.
    pub fn settle(self) -> Settle {
        match self {
            MotionKind::Stop | MotionKind::Stand => Settle::Neutral,
            _ => Settle::Hold,
        }
    }

    /// Tick budget; `None` runs until preempted.
    pub fn tick_budget(self, stand_ticks: u32) -> Option<u32> {
        match self {
            MotionKind::Stop => Some(0),
            MotionKind::Stand => Some(stand_ticks),
            _ => None,
        }
    }
}

impl fmt::Display for MotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotionKind::Dance => "dance",
            MotionKind::Stop => "stop",
            MotionKind::TurnLeft => "turn_left",
            MotionKind::Stand => "stand",
            MotionKind::TurnRight => "turn_right",
            MotionKind::Forward => "forward",
            MotionKind::Backward => "backward",
            MotionKind::SideStepLeft => "side_step_left",
            MotionKind::SideStepRight => "side_step_right",
            MotionKind::WipeForehead => "wipe_forehead",
            MotionKind::Wave => "wave",
        };
        f.write_str(name)
    }
}

/// Joint policy applied when a motion stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Command head and arms to the neutral pose before releasing.
    Neutral,
    /// Leave every joint at its last commanded pose.
    Hold,
}

/// Why a player stopped advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Preempted,
    BudgetSpent,
}

/// Wraps one trajectory and advances it one frame per tick while it holds the
/// arbiter.
pub struct MotionPlayer {
    kind: MotionKind,
    trajectory: Option<Box<dyn Trajectory>>,
    budget: Option<u32>,
    settle: Settle,
    ticks: u32,
    stopped: Option<StopReason>,
}

impl MotionPlayer {
    pub fn new(kind: MotionKind, trajectory: Option<Box<dyn Trajectory>>, stand_ticks: u32) -> Self {
        Self {
            kind,
            trajectory,
            budget: kind.tick_budget(stand_ticks),
            settle: kind.settle(),
            ticks: 0,
            stopped: None,
        }
    }

    pub fn kind(&self) -> MotionKind {
        self.kind
    }

    /// Frames played so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    /// Advance one tick. Returns whether the motion should keep running:
    /// `false` once the lease is cancelled or the tick budget is spent.
    pub fn step(&mut self, lease: &ActionLease, bank: &ActuatorBank) -> CoreResult<bool> {
        if self.stopped.is_some() {
            return Ok(false);
        }
        if lease.is_cancelled() {
            self.stopped = Some(StopReason::Preempted);
            return Ok(false);
        }
        if self.budget.is_some_and(|b| self.ticks >= b) {
            self.stopped = Some(StopReason::BudgetSpent);
            return Ok(false);
        }
        if let Some(trajectory) = self.trajectory.as_mut() {
            trajectory.play(bank)?;
        }
        self.ticks += 1;
        Ok(true)
    }

    /// Apply the settle policy. Call once, after the last `step`, while still
    /// holding the lease.
    pub fn finish(&mut self, bank: &ActuatorBank) {
        if self.settle == Settle::Neutral {
            bank.set_neutral();
        }
    }
}

impl fmt::Debug for MotionPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionPlayer")
            .field("kind", &self.kind)
            .field("trajectory", &self.trajectory.as_ref().map(|t| t.name().to_string()))
            .field("budget", &self.budget)
            .field("ticks", &self.ticks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stop_and_stand_settle_to_neutral() {
        for kind in MotionKind::ALL {
            let expected = matches!(kind, MotionKind::Stop | MotionKind::Stand);
            assert_eq!(kind.settle() == Settle::Neutral, expected, "{kind}");
        }
    }

    #[test]
    fn budgets() {
        assert_eq!(MotionKind::Stand.tick_budget(110), Some(110));
        assert_eq!(MotionKind::Stop.tick_budget(110), Some(0));
        assert_eq!(MotionKind::Dance.tick_budget(110), None);
        assert!(MotionKind::Stop.clip_file().is_none());
        assert_eq!(MotionKind::Wave.clip_file(), Some("HandWave.motion"));
    }

    struct Nod(f64);

    impl Trajectory for Nod {
        fn name(&self) -> &str {
            "nod"
        }

        fn play(&mut self, bank: &ActuatorBank) -> CoreResult<()> {
            self.0 += 0.1;
            bank.set(crate::joint::Joint::HeadPitch, self.0)?;
            Ok(())
        }
    }

    #[test]
    fn player_stops_on_cancel_and_holds_pose() {
        let bank = ActuatorBank::simulated_nao();
        let arbiter = crate::arbiter::Arbiter::new();
        let lease = arbiter.acquire("wave");
        let mut player = MotionPlayer::new(MotionKind::Wave, Some(Box::new(Nod(0.0))), 110);

        assert!(player.step(&lease, &bank).unwrap());
        assert!(player.step(&lease, &bank).unwrap());
        arbiter.cancel_current();
        assert!(!player.step(&lease, &bank).unwrap());
        assert_eq!(player.stop_reason(), Some(StopReason::Preempted));
        assert_eq!(player.ticks(), 2);

        player.finish(&bank);
        let pitch = bank.position(crate::joint::Joint::HeadPitch).unwrap();
        assert!((pitch - 0.2).abs() < 1e-9);
    }

    #[test]
    fn stand_spends_its_budget_then_settles() {
        let bank = ActuatorBank::simulated_nao();
        let arbiter = crate::arbiter::Arbiter::new();
        let lease = arbiter.acquire("stand");
        let mut player = MotionPlayer::new(MotionKind::Stand, Some(Box::new(Nod(0.0))), 3);

        let mut played = 0;
        while player.step(&lease, &bank).unwrap() {
            played += 1;
        }
        assert_eq!(played, 3);
        assert_eq!(player.stop_reason(), Some(StopReason::BudgetSpent));
        player.finish(&bank);
        assert_eq!(bank.position(crate::joint::Joint::HeadPitch), Some(0.0));
    }
}
