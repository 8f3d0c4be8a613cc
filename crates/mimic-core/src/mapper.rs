//! Perception → joint-target mapping.
//!
//! A pure function of one [`PerceptionFrame`] and the actuator limits: no
//! writes, no state. Three independent groups are mapped (head, arms, hands);
//! a group whose landmarks are missing this frame produces nothing, so a stale
//! value is never re-sent as if it were fresh.
//!
//! Known gaps:
//! - Elbow-yaw and wrist-yaw are never assigned an angle.
//! - Hand aperture is one open/closed signal shared by the thumb, index and
//!   pinky groups; fingers are not tracked independently.

use crate::actuator::{ActuatorBank, JointTarget};
use crate::joint::{Joint, Side};
use crate::perception::{ArmLandmarks, HandSample, Landmark, PerceptionFrame};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

fn default_head_gain() -> f64 {
    1.8
}

fn default_head_limit() -> f64 {
    FRAC_PI_2
}

fn default_arm_gain() -> f64 {
    3.0
}

fn default_aperture_threshold() -> f32 {
    0.1
}

fn default_side_split() -> f32 {
    0.5
}

/// Gains and thresholds of the mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// K_yaw: head angle per unit of nose offset from frame center.
    #[serde(default = "default_head_gain")]
    pub head_gain: f64,
    /// Head yaw and pitch saturate at ±this (radians).
    #[serde(default = "default_head_limit")]
    pub head_limit: f64,
    /// Arm angle per unit of landmark offset.
    #[serde(default = "default_arm_gain")]
    pub arm_gain: f64,
    /// Thumb-to-pinky horizontal distance above which a hand counts as open.
    #[serde(default = "default_aperture_threshold")]
    pub aperture_threshold: f32,
    /// Wrist x at or above which a hand drives the right-hand phalanges.
    #[serde(default = "default_side_split")]
    pub side_split: f32,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            head_gain: default_head_gain(),
            head_limit: default_head_limit(),
            arm_gain: default_arm_gain(),
            aperture_threshold: default_aperture_threshold(),
            side_split: default_side_split(),
        }
    }
}

impl MapperConfig {
    /// Reject gains and bounds the mapping cannot use.
    pub fn validate(&self) -> Result<(), String> {
        if !self.head_limit.is_finite() || self.head_limit < 0.0 {
            return Err(format!("mapper.head_limit must be finite and >= 0, got {}", self.head_limit));
        }
        for (key, value) in [
            ("head_gain", self.head_gain),
            ("arm_gain", self.arm_gain),
            ("aperture_threshold", f64::from(self.aperture_threshold)),
            ("side_split", f64::from(self.side_split)),
        ] {
            if !value.is_finite() {
                return Err(format!("mapper.{key} must be finite, got {value}"));
            }
        }
        Ok(())
    }
}

/// Maps perceptual samples onto joint targets.
#[derive(Debug, Clone, Default)]
pub struct PerceptionMapper {
    config: MapperConfig,
}

impl PerceptionMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Every target for this frame, each already inside its actuator's limits.
    /// Joints the bank does not fit are left out.
    pub fn map(&self, frame: &PerceptionFrame, bank: &ActuatorBank) -> Vec<JointTarget> {
        let mut raw = Vec::new();

        if let Some(pose) = &frame.pose {
            if let Some(nose) = pose.nose {
                raw.extend(self.head(nose));
            }
            // Mirrored view: the estimator's left arm is the robot's right.
            if let Some(arm) = pose.left_arm() {
                raw.extend(self.arm(arm, Side::Left.mirrored()));
            }
            if let Some(arm) = pose.right_arm() {
                raw.extend(self.arm(arm, Side::Right.mirrored()));
            }
        }

        for hand in frame.hands.iter().take(2) {
            raw.extend(self.hand(hand));
        }

        raw.into_iter()
            .filter_map(|t| {
                bank.clamp(t.joint, t.angle)
                    .filter(|a| !a.is_nan())
                    .map(|angle| JointTarget::new(t.joint, angle))
            })
            .collect()
    }

    /// Head yaw and pitch from the nose offset to frame center.
    pub fn head(&self, nose: Landmark) -> [JointTarget; 2] {
        let k = self.config.head_gain;
        let limit = self.config.head_limit;
        let yaw = (0.5 - f64::from(nose.x)) * k;
        let pitch = (0.5 - f64::from(nose.y)) * -k;
        [
            JointTarget::new(Joint::HeadYaw, yaw.clamp(-limit, limit)),
            JointTarget::new(Joint::HeadPitch, pitch.clamp(-limit, limit)),
        ]
    }

    /// Shoulder pitch, elbow roll and shoulder roll of the robot's `side` arm.
    /// Unclamped; [`map`](Self::map) clamps against the bank.
    pub fn arm(&self, arm: ArmLandmarks, side: Side) -> [JointTarget; 3] {
        let g = self.config.arm_gain;
        let ArmLandmarks {
            shoulder,
            elbow,
            wrist,
        } = arm;
        [
            JointTarget::new(
                Joint::ShoulderPitch(side),
                f64::from(wrist.y - shoulder.y) * g,
            ),
            JointTarget::new(Joint::ElbowRoll(side), f64::from(elbow.x - wrist.x) * g),
            JointTarget::new(
                Joint::ShoulderRoll(side),
                f64::from(shoulder.x - wrist.x) * g,
            ),
        ]
    }

    /// Which robot hand a detected hand drives.
    pub fn hand_side(&self, hand: &HandSample) -> Side {
        if hand.wrist.x >= self.config.side_split {
            Side::Right
        } else {
            Side::Left
        }
    }

    /// 1.0 when the hand reads as open, 0.0 when closed.
    pub fn aperture(&self, hand: &HandSample) -> f64 {
        if (hand.thumb_tip.x - hand.pinky_tip.x).abs() > self.config.aperture_threshold {
            1.0
        } else {
            0.0
        }
    }

    /// Eight phalanx targets: 1-3 thumb group, 4-6 pinky group, 7-8 index group,
    /// all fed the same aperture.
    pub fn hand(&self, hand: &HandSample) -> Vec<JointTarget> {
        let side = self.hand_side(hand);
        let open = self.aperture(hand);
        let (thumb, pinky, index) = (open, open, open);
        Joint::phalanges(side)
            .map(|joint| {
                let angle = match joint {
                    Joint::Phalanx(_, 1..=3) => thumb,
                    Joint::Phalanx(_, 4..=6) => pinky,
                    _ => index,
                };
                JointTarget::new(joint, angle)
            })
            .collect()
    }
}
