//! Runtime configuration.
//!
//! Layering, lowest to highest: built-in defaults, the file named by
//! `MIMIC_CONFIG` (default `config/mimic`, extension optional), then
//! `MIMIC__*` environment variables (`MIMIC__MAPPER__ARM_GAIN=2.5`).

use crate::error::{CoreError, CoreResult};
use crate::mapper::MapperConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const CONFIG_PATH_VAR: &str = "MIMIC_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/mimic";
const ENV_PREFIX: &str = "MIMIC";

fn invalid(message: String) -> CoreError {
    CoreError::Config(config::ConfigError::Message(message))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MimicConfig {
    /// Simulation basic timestep in milliseconds.
    pub timestep_ms: u64,
    /// Directory holding the `.motion` clips.
    pub motions_dir: PathBuf,
    /// Ticks the stand-up recovery plays before settling.
    pub stand_ticks: u32,
    /// Landmarks less visible than this are treated as absent.
    pub min_visibility: f32,
    /// JSON-lines perception recording to replay instead of a live camera.
    pub perception_replay: Option<PathBuf>,
    pub mapper: MapperConfig,
}

impl Default for MimicConfig {
    fn default() -> Self {
        Self {
            timestep_ms: 32,
            motions_dir: PathBuf::from("motions"),
            stand_ticks: 110,
            min_visibility: 0.5,
            perception_replay: None,
            mapper: MapperConfig::default(),
        }
    }
}

impl MimicConfig {
    /// Load from file and environment on top of the defaults.
    pub fn load() -> CoreResult<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        debug!(target: "mimic::loop", path = %path, "loading configuration");

        let built = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = built.try_deserialize()?;
        config.validate()
    }

    /// Parse a TOML document; keys it leaves out keep their defaults.
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| invalid(e.to_string()))?;
        config.validate()
    }

    fn validate(self) -> CoreResult<Self> {
        self.mapper.validate().map_err(invalid)?;
        if !self.min_visibility.is_finite() {
            return Err(invalid(format!("min_visibility must be finite, got {}", self.min_visibility)));
        }
        Ok(self)
    }

    pub fn timestep(&self) -> Duration {
        Duration::from_millis(self.timestep_ms)
    }
}
