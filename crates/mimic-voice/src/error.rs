//! Error types for the mimic voice front end

use mimic_core::CoreError;
use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur between the recognizer and the action supervisor
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Speech was inaudible")]
    Inaudible,

    #[error("Recognition service error: {0}")]
    Service(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
