//! Background listening thread.
//!
//! Speech capture and recognition are external. A [`TranscriptSource`] hands
//! over one recognizer outcome at a time; the listener pushes each into the
//! router on its own OS thread, so recognition latency never reaches the
//! control loop.

use crate::error::{VoiceError, VoiceResult};
use crate::router::{CommandDispatch, VoiceCommandRouter};
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Blocking pull of the next recognizer outcome. `None` once the source is
/// exhausted or closed.
pub trait TranscriptSource: Send {
    fn next_transcript(&mut self) -> Option<VoiceResult<String>>;
}

/// A fixed script of outcomes.
#[derive(Debug, Default)]
pub struct ScriptedTranscripts {
    outcomes: VecDeque<VoiceResult<String>>,
}

impl ScriptedTranscripts {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcomes: phrases.into_iter().map(|p| Ok(p.into())).collect(),
        }
    }

    /// Append a recognizer failure to the script.
    pub fn with_failure(mut self, error: VoiceError) -> Self {
        self.outcomes.push_back(Err(error));
        self
    }
}

impl TranscriptSource for ScriptedTranscripts {
    fn next_transcript(&mut self) -> Option<VoiceResult<String>> {
        self.outcomes.pop_front()
    }
}

/// One transcript per input line (stdin in the daemon). Blank lines count as
/// inaudible.
pub struct LineTranscripts<R> {
    reader: R,
}

impl<R: BufRead + Send> LineTranscripts<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> TranscriptSource for LineTranscripts<R> {
    fn next_transcript(&mut self) -> Option<VoiceResult<String>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                let text = line.trim();
                if text.is_empty() {
                    Some(Err(VoiceError::Inaudible))
                } else {
                    Some(Ok(text.to_string()))
                }
            }
            Err(e) => Some(Err(VoiceError::Io(e))),
        }
    }
}

/// Handle on the listening thread.
pub struct VoiceListener {
    handle: Option<JoinHandle<u64>>,
}

impl VoiceListener {
    /// Start listening. The thread exits when `source` is exhausted.
    pub fn spawn<S, D>(mut source: S, router: Arc<VoiceCommandRouter<D>>) -> VoiceResult<Self>
    where
        S: TranscriptSource + 'static,
        D: CommandDispatch + 'static,
    {
        let handle = thread::Builder::new()
            .name("mimic-voice".to_string())
            .spawn(move || {
                info!(target: "mimic::voice", "👂 listening for commands");
                let mut heard = 0u64;
                while let Some(outcome) = source.next_transcript() {
                    heard += 1;
                    router.on_recognition(outcome);
                }
                debug!(target: "mimic::voice", heard, dispatched = router.dispatched(), "transcript source closed");
                heard
            })?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the source to close. Returns how many outcomes were handled.
    pub fn join(mut self) -> u64 {
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or(0)
    }
}
