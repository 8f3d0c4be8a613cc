//! Keyframe motion clips in the simulator's `.motion` text format.
//!
//! ```text
//! #WEBOTS_MOTION,V1.0,HeadYaw,LShoulderPitch,...
//! 00:00:000,Pose1,0.0,1.4,...
//! 00:00:400,Pose2,*,1.2,...
//! ```
//!
//! Times are `mm:ss:mmm`. `*` leaves a joint unspecified at that keyframe.
//! Columns naming joints we do not know are parsed and ignored.

use crate::actuator::ActuatorBank;
use crate::error::{CoreError, CoreResult};
use crate::joint::Joint;
use crate::motion::Trajectory;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const HEADER_TAG: &str = "#WEBOTS_MOTION";
const VERSION: &str = "V1.0";

/// One pose in a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub at_ms: u64,
    pub pose: String,
    /// One entry per clip column; `None` for `*`.
    pub values: Vec<Option<f64>>,
}

/// A parsed motion clip.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionClip {
    name: String,
    columns: Vec<Option<Joint>>,
    keyframes: Vec<Keyframe>,
}

fn parse_time(field: &str, line: usize) -> CoreResult<u64> {
    let parts: Vec<&str> = field.trim().split(':').collect();
    let [m, s, ms] = parts.as_slice() else {
        return Err(CoreError::parse(line, format!("bad time '{field}'")));
    };
    let num = |v: &str| {
        v.parse::<u64>()
            .map_err(|_| CoreError::parse(line, format!("bad time '{field}'")))
    };
    let (m, s, ms) = (num(*m)?, num(*s)?, num(*ms)?);
    m.checked_mul(60_000)
        .and_then(|t| t.checked_add(s.checked_mul(1_000)?))
        .and_then(|t| t.checked_add(ms))
        .ok_or_else(|| CoreError::parse(line, format!("time out of range '{field}'")))
}

impl MotionClip {
    pub fn parse(name: impl Into<String>, text: &str) -> CoreResult<Self> {
        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

        let (_, header) = lines
            .by_ref()
            .find(|(_, l)| !l.is_empty())
            .ok_or_else(|| CoreError::parse(1, "empty clip"))?;
        let mut fields = header.split(',').map(str::trim);
        if fields.next() != Some(HEADER_TAG) {
            return Err(CoreError::parse(1, "missing #WEBOTS_MOTION header"));
        }
        match fields.next() {
            Some(VERSION) => {}
            other => {
                return Err(CoreError::parse(
                    1,
                    format!("unsupported version {:?}", other.unwrap_or("")),
                ))
            }
        }
        let columns: Vec<Option<Joint>> = fields.map(|f| f.parse::<Joint>().ok()).collect();

        let mut keyframes: Vec<Keyframe> = Vec::new();
        for (line, text) in lines {
            if text.is_empty() {
                continue;
            }
            let fields: Vec<&str> = text.split(',').map(str::trim).collect();
            if fields.len() != columns.len() + 2 {
                return Err(CoreError::parse(
                    line,
                    format!("expected {} values, found {}", columns.len(), fields.len().saturating_sub(2)),
                ));
            }
            let at_ms = parse_time(fields[0], line)?;
            if keyframes.last().is_some_and(|k| k.at_ms > at_ms) {
                return Err(CoreError::parse(line, "keyframe times go backwards"));
            }
            let values = fields[2..]
                .iter()
                .map(|v| match *v {
                    "*" => Ok(None),
                    v => match v.parse::<f64>() {
                        Ok(x) if x.is_finite() => Ok(Some(x)),
                        Ok(_) => Err(CoreError::parse(line, format!("non-finite value '{v}'"))),
                        Err(_) => Err(CoreError::parse(line, format!("bad value '{v}'"))),
                    },
                })
                .collect::<CoreResult<Vec<_>>>()?;
            keyframes.push(Keyframe {
                at_ms,
                pose: fields[1].to_string(),
                values,
            });
        }

        Ok(Self {
            name: name.into(),
            columns,
            keyframes,
        })
    }

    /// Read and parse a clip file; the clip is named after the file stem.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let clip = Self::parse(name, &text)?;
        debug!(
            target: "mimic::motion",
            clip = %clip.name,
            keyframes = clip.keyframes.len(),
            ignored_columns = clip.columns.iter().filter(|c| c.is_none()).count(),
            "loaded motion clip"
        );
        Ok(clip)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn joints(&self) -> impl Iterator<Item = Joint> + '_ {
        self.columns.iter().flatten().copied()
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn duration_ms(&self) -> u64 {
        self.keyframes.last().map_or(0, |k| k.at_ms)
    }

    /// Pose at `t_ms`, linearly interpolated per joint between the nearest
    /// keyframes that specify it. Joints with no value at or before `t_ms` are
    /// omitted.
    pub fn pose_at(&self, t_ms: u64) -> Vec<(Joint, f64)> {
        let mut pose = Vec::new();
        for (c, joint) in self.columns.iter().enumerate() {
            let Some(joint) = joint else { continue };
            let specified = self
                .keyframes
                .iter()
                .filter_map(|k| k.values[c].map(|v| (k.at_ms, v)));

            let mut before = None;
            let mut after = None;
            for (at, v) in specified {
                if at <= t_ms {
                    before = Some((at, v));
                } else {
                    after = Some((at, v));
                    break;
                }
            }

            let value = match (before, after) {
                (Some((t0, v0)), Some((t1, v1))) => {
                    let f = (t_ms - t0) as f64 / (t1 - t0) as f64;
                    v0 + (v1 - v0) * f
                }
                (Some((_, v0)), None) => v0,
                (None, _) => continue,
            };
            pose.push((*joint, value));
        }
        pose
    }
}

/// Plays a clip one simulator timestep per `play`.
#[derive(Debug, Clone)]
pub struct ClipPlayer {
    clip: Arc<MotionClip>,
    timestep_ms: u64,
    elapsed_ms: u64,
    looped: bool,
}

impl ClipPlayer {
    pub fn new(clip: Arc<MotionClip>, timestep_ms: u64, looped: bool) -> Self {
        Self {
            clip,
            timestep_ms: timestep_ms.max(1),
            elapsed_ms: 0,
            looped,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// A non-looping clip is over once playback has passed its last keyframe.
    pub fn is_over(&self) -> bool {
        !self.looped && self.elapsed_ms > self.clip.duration_ms()
    }
}

impl Trajectory for ClipPlayer {
    fn name(&self) -> &str {
        self.clip.name()
    }

    fn play(&mut self, bank: &ActuatorBank) -> CoreResult<()> {
        let duration = self.clip.duration_ms();
        let t = self.elapsed_ms.min(duration);
        for (joint, angle) in self.clip.pose_at(t) {
            if bank.contains(joint) {
                bank.set(joint, angle)?;
            }
        }
        self.elapsed_ms += self.timestep_ms;
        if self.looped && duration > 0 && self.elapsed_ms > duration {
            self.elapsed_ms %= duration;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::Side;

    const WAVE: &str = "\
#WEBOTS_MOTION,V1.0,HeadYaw,RShoulderPitch,LToe
00:00:000,Pose1,0.0,*,5
00:00:100,Pose2,*,-1.0,5
00:00:200,Pose3,0.4,-0.5,5
";

    fn value(pose: &[(Joint, f64)], joint: Joint) -> Option<f64> {
        pose.iter().find(|(j, _)| *j == joint).map(|(_, v)| *v)
    }

    #[test]
    fn parses_header_and_keyframes() {
        let clip = MotionClip::parse("wave", WAVE).unwrap();
        assert_eq!(clip.keyframes().len(), 3);
        assert_eq!(clip.duration_ms(), 200);
        assert_eq!(clip.joints().count(), 2);
        assert_eq!(clip.keyframes()[1].values[0], None);
    }

    #[test]
    fn interpolates_across_unspecified_frames() {
        let clip = MotionClip::parse("wave", WAVE).unwrap();
        let pose = clip.pose_at(100);
        assert!((value(&pose, Joint::HeadYaw).unwrap() - 0.2).abs() < 1e-9);
        assert_eq!(value(&pose, Joint::ShoulderPitch(Side::Right)), Some(-1.0));
        // Nothing specified yet for the shoulder at t=0.
        assert_eq!(value(&clip.pose_at(0), Joint::ShoulderPitch(Side::Right)), None);
        assert_eq!(value(&clip.pose_at(500), Joint::HeadYaw), Some(0.4));
    }

    #[test]
    fn rejects_malformed_clips() {
        assert!(MotionClip::parse("x", "").is_err());
        assert!(MotionClip::parse("x", "#WEBOTS_MOTION,V2.0,HeadYaw").is_err());
        assert!(MotionClip::parse("x", "#WEBOTS_MOTION,V1.0,HeadYaw\n00:00:000,P,1,2").is_err());
        assert!(MotionClip::parse("x", "#WEBOTS_MOTION,V1.0,HeadYaw\n00:00:xx,P,1").is_err());
        for value in ["nan", "NaN", "inf", "-inf"] {
            let clip = format!("#WEBOTS_MOTION,V1.0,HeadYaw,HeadPitch\n00:00:000,P,{value},0.3");
            match MotionClip::parse("x", &clip) {
                Err(CoreError::MotionParse { line, message }) => {
                    assert_eq!(line, 2);
                    assert!(message.contains("non-finite"), "{message}");
                }
                other => panic!("{value} accepted: {other:?}"),
            }
        }
        match MotionClip::parse("x", "#WEBOTS_MOTION,V1.0,HeadYaw\n99999999999999999:00:000,P,1") {
            Err(CoreError::MotionParse { message, .. }) => assert!(message.contains("out of range")),
            other => panic!("expected parse error, got {other:?}"),
        }
        let backwards = "#WEBOTS_MOTION,V1.0,HeadYaw\n00:01:000,P,1\n00:00:500,Q,2";
        match MotionClip::parse("x", backwards) {
            Err(CoreError::MotionParse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn player_holds_last_pose_unless_looped() {
        let bank = ActuatorBank::simulated_nao();
        let clip = Arc::new(MotionClip::parse("wave", WAVE).unwrap());

        let mut once = ClipPlayer::new(Arc::clone(&clip), 100, false);
        for _ in 0..5 {
            once.play(&bank).unwrap();
        }
        assert!(once.is_over());
        assert_eq!(bank.position(Joint::HeadYaw), Some(0.4));

        let mut looped = ClipPlayer::new(clip, 100, true);
        for _ in 0..3 {
            looped.play(&bank).unwrap();
        }
        assert!(!looped.is_over());
        assert!(looped.elapsed_ms() <= 200);
    }
}
