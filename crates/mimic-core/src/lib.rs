//! # Mimic Core - Gesture-Following Robot Control
//!
//! Drives a humanoid's joints from two producers: a per-tick perception stream
//! (gesture-follow) and voice-triggered motions arriving on other threads. The
//! arbiter makes sure only one of them writes at a time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Control Loop                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐    │
//! │  │  Perception  │→ │    Mapper    │→ │ Arbiter (idle?)  │──┐ │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘  │ │
//! │                                                             ↓ │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐    │
//! │  │ Voice Router │→ │  Supervisor  │→ │  Motion Player   │→ Actuator Bank
//! │  └──────────────┘  └──────────────┘  └──────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod actuator;
pub mod arbiter;
pub mod clip;
pub mod config;
pub mod control;
pub mod error;
pub mod joint;
pub mod library;
pub mod mapper;
pub mod motion;
pub mod perception;
pub mod stepper;
pub mod supervisor;

pub use actuator::{Actuator, ActuatorBank, JointLimits, JointTarget, SimActuator};
pub use arbiter::{ActionId, ActionLease, Arbiter};
pub use clip::{ClipPlayer, Keyframe, MotionClip};
pub use crate::config::MimicConfig;
pub use control::{
    ControlLoop, LoopState, LoopStats, NoOverride, OverrideFlag, OverrideInput, TerminationCause,
};
pub use error::{CoreError, CoreResult};
pub use joint::{Joint, Side};
pub use library::MotionLibrary;
pub use mapper::{MapperConfig, PerceptionMapper};
pub use motion::{MotionKind, MotionPlayer, Settle, StopReason, Trajectory};
pub use perception::{
    ArmLandmarks, HandSample, Landmark, NoPerception, PerceptionFrame, PerceptionSource,
    PoseSample, ReplayPerception,
};
pub use stepper::{RealtimeStepper, StepOutcome, Stepper};
pub use supervisor::{
    ActionContext, ActionEvent, ActionOutcome, ActionRequest, ActionSender, ActionSupervisor,
};
