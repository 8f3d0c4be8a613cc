//! Error types for the mimic core

use crate::joint::Joint;
use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while driving the robot
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown joint: {0}")]
    UnknownJoint(Joint),

    #[error("Invalid limits for {joint}: min {min} > max {max}")]
    InvalidLimits { joint: Joint, min: f64, max: f64 },

    #[error("Non-finite target for {0}")]
    NonFiniteTarget(Joint),

    #[error("Motion parse error at line {line}: {message}")]
    MotionParse { line: usize, message: String },

    #[error("No motion clip registered for {0}")]
    MissingClip(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        CoreError::MotionParse {
            line,
            message: message.into(),
        }
    }
}
