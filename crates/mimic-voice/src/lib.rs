//! # Mimic Voice - Spoken Commands for the Robot
//!
//! Recognized speech arrives on a background thread, is matched against an
//! ordered keyword table, and becomes a start request for the action
//! supervisor in `mimic-core`. Audio capture and transcription stay outside:
//! anything implementing [`TranscriptSource`] can feed the listener.
//!
//! ```text
//!   TranscriptSource ──► VoiceListener (thread) ──► VoiceCommandRouter ──► ActionSender
//! ```

pub mod error;
pub mod listener;
pub mod router;

pub use error::{VoiceError, VoiceResult};
pub use listener::{LineTranscripts, ScriptedTranscripts, TranscriptSource, VoiceListener};
pub use router::{CommandDispatch, KeywordRule, KeywordTable, VoiceCommandRouter};
