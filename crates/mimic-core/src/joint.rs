//! Joint identifiers for the NAO humanoid.
//!
//! Joints are named the way the simulator names its motor devices
//! (`HeadYaw`, `LShoulderPitch`, `RPhalanx3`, ...). `Joint` parses and prints
//! those names so motion-clip headers and device tables share one vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of phalanx actuators per hand.
pub const PHALANX_COUNT: u8 = 8;

/// Anatomical side of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The opposite side. Camera frames are mirrored, so landmark sides map
    /// onto the robot's opposite side.
    pub fn mirrored(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    fn prefix(self) -> char {
        match self {
            Side::Left => 'L',
            Side::Right => 'R',
        }
    }
}

/// One actuated joint of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Joint {
    HeadYaw,
    HeadPitch,
    ShoulderPitch(Side),
    ShoulderRoll(Side),
    ElbowYaw(Side),
    ElbowRoll(Side),
    WristYaw(Side),
    HipYawPitch(Side),
    HipRoll(Side),
    HipPitch(Side),
    KneePitch(Side),
    AnklePitch(Side),
    AnkleRoll(Side),
    /// Finger phalanx `1..=PHALANX_COUNT`.
    Phalanx(Side, u8),
}

const SIDED: [(&str, fn(Side) -> Joint); 11] = [
    ("ShoulderPitch", Joint::ShoulderPitch),
    ("ShoulderRoll", Joint::ShoulderRoll),
    ("ElbowYaw", Joint::ElbowYaw),
    ("ElbowRoll", Joint::ElbowRoll),
    ("WristYaw", Joint::WristYaw),
    ("HipYawPitch", Joint::HipYawPitch),
    ("HipRoll", Joint::HipRoll),
    ("HipPitch", Joint::HipPitch),
    ("KneePitch", Joint::KneePitch),
    ("AnklePitch", Joint::AnklePitch),
    ("AnkleRoll", Joint::AnkleRoll),
];

impl Joint {
    /// All phalanx joints of one hand, in device order.
    pub fn phalanges(side: Side) -> impl Iterator<Item = Joint> {
        (1..=PHALANX_COUNT).map(move |n| Joint::Phalanx(side, n))
    }

    /// Joints commanded to zero when a motion settles to its neutral pose.
    /// Legs and fingers are left where the last motion put them.
    pub fn neutral_set() -> Vec<Joint> {
        let mut joints = vec![Joint::HeadYaw, Joint::HeadPitch];
        for side in [Side::Right, Side::Left] {
            joints.extend([
                Joint::ShoulderPitch(side),
                Joint::ElbowRoll(side),
                Joint::ElbowYaw(side),
                Joint::ShoulderRoll(side),
                Joint::WristYaw(side),
            ]);
        }
        joints
    }

    fn sided_name(self) -> Option<(Side, &'static str)> {
        let pair = match self {
            Joint::ShoulderPitch(s) => (s, "ShoulderPitch"),
            Joint::ShoulderRoll(s) => (s, "ShoulderRoll"),
            Joint::ElbowYaw(s) => (s, "ElbowYaw"),
            Joint::ElbowRoll(s) => (s, "ElbowRoll"),
            Joint::WristYaw(s) => (s, "WristYaw"),
            Joint::HipYawPitch(s) => (s, "HipYawPitch"),
            Joint::HipRoll(s) => (s, "HipRoll"),
            Joint::HipPitch(s) => (s, "HipPitch"),
            Joint::KneePitch(s) => (s, "KneePitch"),
            Joint::AnklePitch(s) => (s, "AnklePitch"),
            Joint::AnkleRoll(s) => (s, "AnkleRoll"),
            Joint::HeadYaw | Joint::HeadPitch | Joint::Phalanx(..) => return None,
        };
        Some(pair)
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Joint::HeadYaw => f.write_str("HeadYaw"),
            Joint::HeadPitch => f.write_str("HeadPitch"),
            Joint::Phalanx(side, n) => write!(f, "{}Phalanx{}", side.prefix(), n),
            Joint::ShoulderPitch(_)
            | Joint::ShoulderRoll(_)
            | Joint::ElbowYaw(_)
            | Joint::ElbowRoll(_)
            | Joint::WristYaw(_)
            | Joint::HipYawPitch(_)
            | Joint::HipRoll(_)
            | Joint::HipPitch(_)
            | Joint::KneePitch(_)
            | Joint::AnklePitch(_)
            | Joint::AnkleRoll(_) => match self.sided_name() {
                Some((side, name)) => write!(f, "{}{}", side.prefix(), name),
                None => Err(fmt::Error),
            },
        }
    }
}

impl FromStr for Joint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "HeadYaw" => return Ok(Joint::HeadYaw),
            "HeadPitch" => return Ok(Joint::HeadPitch),
            _ => {}
        }
        let side = match s.chars().next() {
            Some('L') => Side::Left,
            Some('R') => Side::Right,
            _ => return Err(format!("unknown joint '{s}'")),
        };
        let rest = &s[1..];
        if let Some(n) = rest.strip_prefix("Phalanx") {
            return match n.parse::<u8>() {
                Ok(n) if (1..=PHALANX_COUNT).contains(&n) => Ok(Joint::Phalanx(side, n)),
                _ => Err(format!("unknown joint '{s}'")),
            };
        }
        SIDED
            .iter()
            .find(|(name, _)| *name == rest)
            .map(|(_, ctor)| ctor(side))
            .ok_or_else(|| format!("unknown joint '{s}'"))
    }
}

/// Factory position limits of the NAO H25 (radians; phalanges are 0..1).
pub fn nao_limits(joint: Joint) -> (f64, f64) {
    use Side::{Left, Right};
    match joint {
        Joint::HeadYaw => (-2.0857, 2.0857),
        Joint::HeadPitch => (-0.6720, 0.5149),
        Joint::ShoulderPitch(_) => (-2.0857, 2.0857),
        Joint::ShoulderRoll(Left) => (-0.3142, 1.3265),
        Joint::ShoulderRoll(Right) => (-1.3265, 0.3142),
        Joint::ElbowYaw(_) => (-2.0857, 2.0857),
        Joint::ElbowRoll(Left) => (-1.5446, -0.0349),
        Joint::ElbowRoll(Right) => (0.0349, 1.5446),
        Joint::WristYaw(_) => (-1.8238, 1.8238),
        Joint::HipYawPitch(_) => (-1.145303, 0.740810),
        Joint::HipRoll(Left) => (-0.379472, 0.790477),
        Joint::HipRoll(Right) => (-0.790477, 0.379472),
        Joint::HipPitch(_) => (-1.535889, 0.484090),
        Joint::KneePitch(Left) => (-0.092346, 2.112528),
        Joint::KneePitch(Right) => (-0.103083, 2.120198),
        Joint::AnklePitch(Left) => (-1.189516, 0.922747),
        Joint::AnklePitch(Right) => (-1.186448, 0.932056),
        Joint::AnkleRoll(Left) => (-0.397880, 0.769001),
        Joint::AnkleRoll(Right) => (-0.768992, 0.397935),
        Joint::Phalanx(..) => (0.0, 1.0),
    }
}

/// Every joint on the NAO body, head first.
pub fn nao_joints() -> Vec<Joint> {
    let mut joints = vec![Joint::HeadYaw, Joint::HeadPitch];
    for side in [Side::Left, Side::Right] {
        joints.extend([
            Joint::ShoulderPitch(side),
            Joint::ShoulderRoll(side),
            Joint::ElbowYaw(side),
            Joint::ElbowRoll(side),
            Joint::WristYaw(side),
            Joint::HipYawPitch(side),
            Joint::HipRoll(side),
            Joint::HipPitch(side),
            Joint::KneePitch(side),
            Joint::AnklePitch(side),
            Joint::AnkleRoll(side),
        ]);
        joints.extend(Joint::phalanges(side));
    }
    joints
}
