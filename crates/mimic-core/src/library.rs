//! Motion library: which trajectory each [`MotionKind`] plays.

use crate::clip::{ClipPlayer, MotionClip};
use crate::error::{CoreError, CoreResult};
use crate::motion::{MotionKind, MotionPlayer, Trajectory};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

type TrajectoryFactory = Box<dyn Fn() -> Box<dyn Trajectory> + Send + Sync>;

/// Builds a fresh player for every request, so each command starts its clip
/// from the first frame.
pub struct MotionLibrary {
    factories: HashMap<MotionKind, TrajectoryFactory>,
    stand_ticks: u32,
}

impl MotionLibrary {
    pub fn new(stand_ticks: u32) -> Self {
        Self {
            factories: HashMap::new(),
            stand_ticks,
        }
    }

    /// Load every clip named by [`MotionKind::clip_file`] from `dir`.
    ///
    /// Missing or broken files are logged and left out; those commands will be
    /// rejected when requested.
    pub fn load_dir(dir: &Path, timestep_ms: u64, stand_ticks: u32) -> Self {
        let mut library = Self::new(stand_ticks);
        for kind in MotionKind::ALL {
            let Some(file) = kind.clip_file() else { continue };
            match MotionClip::load(&dir.join(file)) {
                Ok(clip) => {
                    // Walking and gestures repeat until preempted; stand-up plays once.
                    let looped = kind.tick_budget(stand_ticks).is_none();
                    library.register_clip(kind, clip, timestep_ms, looped);
                }
                Err(e) => warn!(target: "mimic::motion", %kind, file, error = %e, "motion clip unavailable"),
            }
        }
        info!(
            target: "mimic::motion",
            dir = %dir.display(),
            loaded = library.factories.len(),
            "motion library ready"
        );
        library
    }

    pub fn register_clip(&mut self, kind: MotionKind, clip: MotionClip, timestep_ms: u64, looped: bool) {
        let clip = Arc::new(clip);
        self.register(kind, move || {
            Box::new(ClipPlayer::new(Arc::clone(&clip), timestep_ms, looped))
        });
    }

    pub fn register<F>(&mut self, kind: MotionKind, factory: F)
    where
        F: Fn() -> Box<dyn Trajectory> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    pub fn contains(&self, kind: MotionKind) -> bool {
        kind.clip_file().is_none() || self.factories.contains_key(&kind)
    }

    /// A new player for `kind`. `Stop` needs no trajectory.
    pub fn player(&self, kind: MotionKind) -> CoreResult<MotionPlayer> {
        let trajectory = match self.factories.get(&kind) {
            Some(factory) => Some(factory()),
            None if kind.clip_file().is_none() => None,
            None => return Err(CoreError::MissingClip(kind.to_string())),
        };
        Ok(MotionPlayer::new(kind, trajectory, self.stand_ticks))
    }
}
