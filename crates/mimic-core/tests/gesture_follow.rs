//! Control loop ticks against scripted perception.

use mimic_core::{
    ActuatorBank, Arbiter, ControlLoop, CoreResult, HandSample, Joint, Landmark, LoopState,
    PerceptionFrame, PerceptionMapper, PerceptionSource, PoseSample, RealtimeStepper,
    ReplayPerception, Side, TerminationCause,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Hands out queued frames, then nothing.
struct Scripted(VecDeque<Option<PerceptionFrame>>);

impl PerceptionSource for Scripted {
    fn sample(&mut self) -> CoreResult<Option<PerceptionFrame>> {
        Ok(self.0.pop_front().flatten())
    }
}

struct Rig {
    control: ControlLoop,
    bank: Arc<ActuatorBank>,
    arbiter: Arc<Arbiter>,
}

fn rig(frames: Vec<Option<PerceptionFrame>>, max_ticks: u64) -> Rig {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let bank = Arc::new(ActuatorBank::simulated_nao());
    let arbiter = Arc::new(Arbiter::new());
    let control = ControlLoop::new(
        Arc::new(RealtimeStepper::new(Duration::ZERO).with_max_ticks(max_ticks)),
        Box::new(Scripted(frames.into())),
        PerceptionMapper::default(),
        Arc::clone(&bank),
        Arc::clone(&arbiter),
    )
    .with_min_visibility(0.5);
    Rig {
        control,
        bank,
        arbiter,
    }
}

fn full_pose() -> PoseSample {
    PoseSample {
        nose: Some(Landmark::new(0.3, 0.4)),
        left_shoulder: Some(Landmark::new(0.6, 0.3)),
        left_elbow: Some(Landmark::new(0.7, 0.45)),
        left_wrist: Some(Landmark::new(0.75, 0.6)),
        right_shoulder: Some(Landmark::new(0.4, 0.3)),
        right_elbow: Some(Landmark::new(0.35, 0.45)),
        right_wrist: Some(Landmark::new(0.3, 0.6)),
    }
}

fn open_hand(wrist_x: f32) -> HandSample {
    HandSample {
        wrist: Landmark::new(wrist_x, 0.8),
        thumb_tip: Landmark::new(wrist_x - 0.1, 0.7),
        index_tip: Landmark::new(wrist_x, 0.65),
        pinky_tip: Landmark::new(wrist_x + 0.1, 0.7),
    }
}

#[test]
fn frame_without_pose_leaves_the_bank_unchanged() {
    let frames = vec![Some(PerceptionFrame::default()), None];
    let mut rig = rig(frames, 10);
    let before = rig.bank.snapshot();

    assert_eq!(rig.control.tick(), LoopState::Running);
    assert_eq!(rig.control.tick(), LoopState::Running);
    assert_eq!(rig.bank.snapshot(), before);
}

#[test]
fn low_visibility_pose_counts_as_absent() {
    let pose = PoseSample {
        nose: Some(Landmark::new(0.1, 0.1).with_visibility(0.2)),
        ..PoseSample::default()
    };
    let mut rig = rig(vec![Some(PerceptionFrame::with_pose(pose))], 10);
    let before = rig.bank.snapshot();
    rig.control.tick();
    assert_eq!(rig.bank.snapshot(), before);
}

#[test]
fn gesture_follow_drives_head_arms_and_hands() {
    let frame = PerceptionFrame {
        pose: Some(full_pose()),
        hands: vec![open_hand(0.7)],
    };
    let mut rig = rig(vec![Some(frame)], 10);
    rig.control.tick();

    assert!(rig.bank.position(Joint::HeadYaw).unwrap() > 0.0);
    // Estimator-left arm drives the robot's right side.
    assert_ne!(rig.bank.position(Joint::ShoulderPitch(Side::Right)), Some(0.0));
    for phalanx in Joint::phalanges(Side::Right) {
        assert_eq!(rig.bank.position(phalanx), Some(1.0));
    }
    for phalanx in Joint::phalanges(Side::Left) {
        assert_eq!(rig.bank.position(phalanx), Some(0.0));
    }
    for joint in rig.bank.joints() {
        let limits = rig.bank.limits(joint).unwrap();
        assert!(limits.contains(rig.bank.position(joint).unwrap()), "{joint} out of range");
    }
}

#[test]
fn held_arbiter_gates_gesture_follow() {
    let nose = |x| {
        Some(PerceptionFrame::with_pose(PoseSample {
            nose: Some(Landmark::new(x, 0.5)),
            ..PoseSample::default()
        }))
    };
    let mut rig = rig(vec![nose(0.2), nose(0.8)], 10);

    let lease = rig.arbiter.acquire("wave");
    rig.control.tick();
    assert_eq!(rig.bank.position(Joint::HeadYaw), Some(0.0));
    assert_eq!(rig.control.stats().gated_ticks, 1);

    drop(lease);
    rig.control.tick();
    assert!(rig.bank.position(Joint::HeadYaw).unwrap() < 0.0);
    assert_eq!(rig.control.stats().gesture_ticks, 1);
}

#[test]
fn override_terminates_the_run() {
    let mut remaining = 3;
    let rig = rig(Vec::new(), 1_000);
    let mut control = rig.control.with_override(move || {
        remaining -= 1;
        remaining == 0
    });
    let stats = control.run();
    assert_eq!(stats.ticks, 3);
    assert_eq!(control.termination_cause(), Some(TerminationCause::Override));
    assert!(rig.arbiter.is_idle());
}

#[test]
fn replayed_recording_drives_the_head() {
    let recording = "\
{\"pose\":{\"nose\":{\"x\":0.25,\"y\":0.5}}}

not json
{\"pose\":{\"nose\":{\"x\":0.75,\"y\":0.5}}}
";
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let bank = Arc::new(ActuatorBank::simulated_nao());
    let perception = ReplayPerception::from_reader(recording.as_bytes(), false).unwrap();
    let mut control = ControlLoop::new(
        Arc::new(RealtimeStepper::new(Duration::ZERO).with_max_ticks(6)),
        Box::new(perception),
        PerceptionMapper::default(),
        Arc::clone(&bank),
        Arc::new(Arbiter::new()),
    );

    control.tick();
    let first = bank.position(Joint::HeadYaw).unwrap();
    assert!(first > 0.0);
    // Blank line, then a malformed one: both leave the head where it was.
    control.tick();
    control.tick();
    assert_eq!(bank.position(Joint::HeadYaw), Some(first));
    control.tick();
    assert!(bank.position(Joint::HeadYaw).unwrap() < 0.0);

    let stats = control.run();
    assert_eq!(stats.ticks, 6);
    assert_eq!(stats.frames, 2);
}
