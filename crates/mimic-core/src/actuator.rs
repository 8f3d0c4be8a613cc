//! Actuator bank: the named joint motors of the robot.
//!
//! Each motor is reached through the [`Actuator`] trait (the simulator's position
//! device). The bank snapshots every motor's limits at registration and clamps
//! every write into them, so nothing upstream can push a joint out of range.

use crate::error::{CoreError, CoreResult};
use crate::joint::{nao_joints, nao_limits, Joint};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Position device of one joint motor.
pub trait Actuator: Send + Sync {
    fn position(&self) -> f64;
    fn set_position(&self, angle: f64);
    fn min_position(&self) -> f64;
    fn max_position(&self) -> f64;
}

/// Closed position range of one actuator. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub min: f64,
    pub max: f64,
}

impl JointLimits {
    pub fn new(min: f64, max: f64) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    /// Saturate `angle` into `[min, max]`. NaN passes through unchanged.
    pub fn clamp(&self, angle: f64) -> f64 {
        angle.clamp(self.min, self.max)
    }

    pub fn contains(&self, angle: f64) -> bool {
        angle >= self.min && angle <= self.max
    }
}

/// A single joint command, produced per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTarget {
    pub joint: Joint,
    pub angle: f64,
}

impl JointTarget {
    pub fn new(joint: Joint, angle: f64) -> Self {
        Self { joint, angle }
    }
}

/// In-memory actuator. Stands in for a simulator motor in the daemon and tests.
#[derive(Debug)]
pub struct SimActuator {
    position: AtomicU64,
    min: f64,
    max: f64,
}

impl SimActuator {
    pub fn new(min: f64, max: f64) -> Self {
        let start = if min <= max { 0.0_f64.clamp(min, max) } else { min };
        Self {
            position: AtomicU64::new(start.to_bits()),
            min,
            max,
        }
    }
}

impl Actuator for SimActuator {
    fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Acquire))
    }

    fn set_position(&self, angle: f64) {
        self.position.store(angle.to_bits(), Ordering::Release);
    }

    fn min_position(&self) -> f64 {
        self.min
    }

    fn max_position(&self) -> f64 {
        self.max
    }
}

struct BankEntry {
    actuator: Arc<dyn Actuator>,
    limits: JointLimits,
}

/// The robot's joint motors, keyed by [`Joint`].
///
/// The bank is shared by every component; only the current holder of the
/// [`Arbiter`](crate::arbiter::Arbiter) writes to it.
#[derive(Default)]
pub struct ActuatorBank {
    joints: BTreeMap<Joint, BankEntry>,
}

impl ActuatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bank of in-memory actuators for every NAO joint, with factory limits.
    pub fn simulated_nao() -> Self {
        let mut bank = Self::new();
        for joint in nao_joints() {
            let (min, max) = nao_limits(joint);
            // Factory table is ordered; see joint tests.
            let _ = bank.register(joint, Arc::new(SimActuator::new(min, max)));
        }
        bank
    }

    /// Add a motor. Its limits are read once here and never re-queried.
    pub fn register(&mut self, joint: Joint, actuator: Arc<dyn Actuator>) -> CoreResult<()> {
        let (min, max) = (actuator.min_position(), actuator.max_position());
        let limits = JointLimits::new(min, max).ok_or(CoreError::InvalidLimits { joint, min, max })?;
        debug!(target: "mimic::actuator", %joint, min, max, "registered actuator");
        self.joints.insert(joint, BankEntry { actuator, limits });
        Ok(())
    }

    pub fn contains(&self, joint: Joint) -> bool {
        self.joints.contains_key(&joint)
    }

    pub fn joints(&self) -> impl Iterator<Item = Joint> + '_ {
        self.joints.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn limits(&self, joint: Joint) -> Option<JointLimits> {
        self.joints.get(&joint).map(|e| e.limits)
    }

    /// Clamp `angle` into the joint's own limits. `None` if the joint is not fitted.
    pub fn clamp(&self, joint: Joint, angle: f64) -> Option<f64> {
        self.limits(joint).map(|l| l.clamp(angle))
    }

    pub fn position(&self, joint: Joint) -> Option<f64> {
        self.joints.get(&joint).map(|e| e.actuator.position())
    }

    /// Command one joint. Returns the angle actually written after clamping.
    pub fn set(&self, joint: Joint, angle: f64) -> CoreResult<f64> {
        let entry = self.joints.get(&joint).ok_or(CoreError::UnknownJoint(joint))?;
        if angle.is_nan() {
            return Err(CoreError::NonFiniteTarget(joint));
        }
        let clamped = entry.limits.clamp(angle);
        entry.actuator.set_position(clamped);
        Ok(clamped)
    }

    /// Apply a batch of targets. Targets for unfitted joints and NaN angles are
    /// skipped. Returns how many were written.
    pub fn apply(&self, targets: &[JointTarget]) -> usize {
        let mut written = 0;
        for target in targets {
            match self.set(target.joint, target.angle) {
                Ok(_) => written += 1,
                Err(CoreError::UnknownJoint(_)) => {}
                Err(e) => warn!(target: "mimic::actuator", error = %e, "dropped joint target"),
            }
        }
        written
    }

    /// Drive the head and arms to zero, clamped per joint.
    pub fn set_neutral(&self) {
        for joint in Joint::neutral_set() {
            if self.contains(joint) {
                let _ = self.set(joint, 0.0);
            }
        }
        debug!(target: "mimic::actuator", "neutral pose commanded");
    }

    /// Current position of every fitted joint.
    pub fn snapshot(&self) -> BTreeMap<Joint, f64> {
        self.joints
            .iter()
            .map(|(j, e)| (*j, e.actuator.position()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::Side;

    #[test]
    fn writes_are_clamped_into_actuator_limits() {
        let bank = ActuatorBank::simulated_nao();
        let joint = Joint::ElbowRoll(Side::Right);
        assert_eq!(bank.set(joint, 10.0).unwrap(), 1.5446);
        assert_eq!(bank.set(joint, -10.0).unwrap(), 0.0349);
        assert_eq!(bank.position(joint), Some(0.0349));
    }

    #[test]
    fn clamping_holds_for_arbitrary_limits_and_angles() {
        let limits = [(-1.0, 1.0), (0.0, 0.0), (0.2, 3.5), (-4.0, -0.5)];
        let angles = [-100.0, -1.0, -0.25, 0.0, 0.1, 3.5, 7.0, f64::INFINITY, f64::NEG_INFINITY];
        for (min, max) in limits {
            let mut bank = ActuatorBank::new();
            bank.register(Joint::HeadYaw, Arc::new(SimActuator::new(min, max))).unwrap();
            for angle in angles {
                let written = bank.set(Joint::HeadYaw, angle).unwrap();
                assert!(written >= min && written <= max, "{angle} -> {written} in [{min}, {max}]");
            }
        }
    }

    #[test]
    fn rejects_inverted_limits() {
        let mut bank = ActuatorBank::new();
        let err = bank
            .register(Joint::HeadPitch, Arc::new(SimActuator::new(1.0, -1.0)))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidLimits { .. }));
    }

    #[test]
    fn nan_targets_are_never_written() {
        let bank = ActuatorBank::simulated_nao();
        bank.set(Joint::HeadYaw, 0.3).unwrap();
        assert!(matches!(
            bank.set(Joint::HeadYaw, f64::NAN),
            Err(CoreError::NonFiniteTarget(_))
        ));
        assert_eq!(bank.position(Joint::HeadYaw), Some(0.3));
    }

    #[test]
    fn apply_skips_unfitted_joints() {
        let mut bank = ActuatorBank::new();
        bank.register(Joint::HeadYaw, Arc::new(SimActuator::new(-1.0, 1.0))).unwrap();
        let written = bank.apply(&[
            JointTarget::new(Joint::HeadYaw, 0.5),
            JointTarget::new(Joint::HeadPitch, 0.5),
        ]);
        assert_eq!(written, 1);
    }

    #[test]
    fn neutral_respects_limits() {
        let bank = ActuatorBank::simulated_nao();
        bank.set(Joint::ShoulderPitch(Side::Left), 1.2).unwrap();
        bank.set_neutral();
        assert_eq!(bank.position(Joint::ShoulderPitch(Side::Left)), Some(0.0));
        // 0 lies outside the left elbow-roll range, so neutral saturates.
        assert_eq!(bank.position(Joint::ElbowRoll(Side::Left)), Some(-0.0349));
    }
}
