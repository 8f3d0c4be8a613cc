//! Perceptual samples consumed by the control loop.
//!
//! Landmarks arrive from an external pose/hand estimator in normalized image
//! coordinates, already mirrored horizontally. Every tracked point is a typed,
//! optional field: a point is present only when the estimator saw it with
//! enough confidence.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;

fn full_visibility() -> f32 {
    1.0
}

/// One tracked body point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility: 1.0,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Shoulder, elbow and wrist of one arm, as labelled by the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmLandmarks {
    pub shoulder: Landmark,
    pub elbow: Landmark,
    pub wrist: Landmark,
}

/// Body pose for one frame. Absent points are `None`, never a sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseSample {
    pub nose: Option<Landmark>,
    pub left_shoulder: Option<Landmark>,
    pub left_elbow: Option<Landmark>,
    pub left_wrist: Option<Landmark>,
    pub right_shoulder: Option<Landmark>,
    pub right_elbow: Option<Landmark>,
    pub right_wrist: Option<Landmark>,
}

impl PoseSample {
    /// Estimator-left arm, if all three points were seen.
    pub fn left_arm(&self) -> Option<ArmLandmarks> {
        Some(ArmLandmarks {
            shoulder: self.left_shoulder?,
            elbow: self.left_elbow?,
            wrist: self.left_wrist?,
        })
    }

    /// Estimator-right arm, if all three points were seen.
    pub fn right_arm(&self) -> Option<ArmLandmarks> {
        Some(ArmLandmarks {
            shoulder: self.right_shoulder?,
            elbow: self.right_elbow?,
            wrist: self.right_wrist?,
        })
    }

    /// Drop every point whose visibility is below `min_visibility`.
    pub fn filtered(mut self, min_visibility: f32) -> Self {
        for point in [
            &mut self.nose,
            &mut self.left_shoulder,
            &mut self.left_elbow,
            &mut self.left_wrist,
            &mut self.right_shoulder,
            &mut self.right_elbow,
            &mut self.right_wrist,
        ] {
            if point.is_some_and(|p| p.visibility < min_visibility) {
                *point = None;
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == PoseSample::default()
    }
}

/// Fingertip and wrist points of one detected hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandSample {
    pub wrist: Landmark,
    pub thumb_tip: Landmark,
    pub index_tip: Landmark,
    pub pinky_tip: Landmark,
}

/// Everything the estimator reported for one camera frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionFrame {
    pub pose: Option<PoseSample>,
    /// Zero to two hands; extra detections are ignored by the mapper.
    pub hands: Vec<HandSample>,
}

impl PerceptionFrame {
    pub fn with_pose(pose: PoseSample) -> Self {
        Self {
            pose: Some(pose),
            hands: Vec::new(),
        }
    }

    /// Apply the visibility gate; a pose left with no points becomes absent.
    pub fn filtered(mut self, min_visibility: f32) -> Self {
        self.pose = self
            .pose
            .map(|p| p.filtered(min_visibility))
            .filter(|p| !p.is_empty());
        self
    }
}

/// Per-tick, non-blocking pull of the latest perceptual sample.
///
/// `Ok(None)` means no frame this tick. Errors are transient: the control loop
/// logs them and carries on.
pub trait PerceptionSource: Send {
    fn sample(&mut self) -> CoreResult<Option<PerceptionFrame>>;
}

/// A source that never sees anything. Keeps the loop ticking without a camera.
#[derive(Debug, Default)]
pub struct NoPerception;

impl PerceptionSource for NoPerception {
    fn sample(&mut self) -> CoreResult<Option<PerceptionFrame>> {
        Ok(None)
    }
}

/// Replays recorded frames, one JSON object per line.
///
/// Blank lines and `null` replay as "no frame". Malformed lines surface as a
/// perception error for that tick only.
#[derive(Debug)]
pub struct ReplayPerception {
    lines: Vec<String>,
    cursor: usize,
    looped: bool,
}

impl ReplayPerception {
    pub fn from_reader(reader: impl BufRead, looped: bool) -> CoreResult<Self> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            lines,
            cursor: 0,
            looped,
        })
    }

    pub fn open(path: &Path, looped: bool) -> CoreResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), looped)
    }

    pub fn remaining(&self) -> usize {
        self.lines.len().saturating_sub(self.cursor)
    }
}

impl PerceptionSource for ReplayPerception {
    fn sample(&mut self) -> CoreResult<Option<PerceptionFrame>> {
        if self.cursor >= self.lines.len() {
            if !self.looped || self.lines.is_empty() {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let line = self.lines[self.cursor].trim();
        self.cursor += 1;
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<Option<PerceptionFrame>>(line)
            .map_err(|e| CoreError::Perception(format!("frame {}: {}", self.cursor, e)))
    }
}
