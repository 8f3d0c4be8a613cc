//! Transcript → motion routing.
//!
//! Matching is first-match over an ordered keyword table, case-insensitive,
//! on substrings. Order matters: "turn left" sits before the bare "left", and
//! "dance" before "stop", so "please stop dancing" starts the dance.

use crate::error::{VoiceError, VoiceResult};
use mimic_core::{ActionSender, MotionKind};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Where recognized commands go.
pub trait CommandDispatch: Send + Sync {
    fn dispatch(&self, kind: MotionKind) -> VoiceResult<()>;
}

impl CommandDispatch for ActionSender {
    fn dispatch(&self, kind: MotionKind) -> VoiceResult<()> {
        Ok(self.request(kind)?)
    }
}

impl CommandDispatch for mpsc::UnboundedSender<MotionKind> {
    fn dispatch(&self, kind: MotionKind) -> VoiceResult<()> {
        self.send(kind)
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }
}

/// One row of the table: any keyword selects `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub kind: MotionKind,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(kind: MotionKind, keywords: &[&str]) -> Self {
        Self {
            kind,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Ordered keyword rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    rules: Vec<KeywordRule>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl KeywordTable {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }

    /// The robot's command vocabulary, in precedence order.
    pub fn standard() -> Self {
        Self::new(vec![
            KeywordRule::new(MotionKind::Dance, &["dancing", "dance"]),
            KeywordRule::new(MotionKind::Stop, &["stop"]),
            KeywordRule::new(MotionKind::TurnLeft, &["turn left"]),
            KeywordRule::new(MotionKind::Stand, &["stand"]),
            KeywordRule::new(MotionKind::TurnRight, &["turn right"]),
            KeywordRule::new(MotionKind::Forward, &["forward"]),
            KeywordRule::new(MotionKind::Backward, &["backward"]),
            KeywordRule::new(MotionKind::SideStepLeft, &["left"]),
            KeywordRule::new(MotionKind::SideStepRight, &["right"]),
            KeywordRule::new(MotionKind::WipeForehead, &["wipe", "forehead", "exhaust"]),
            KeywordRule::new(MotionKind::Wave, &["hello", "wave"]),
        ])
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// First rule whose keyword occurs in `transcript`.
    pub fn lookup(&self, transcript: &str) -> Option<MotionKind> {
        let lowered = transcript.to_lowercase();
        self.rules.iter().find(|r| r.matches(&lowered)).map(|r| r.kind)
    }
}

/// Turns transcripts into action requests.
///
/// Called from the listener thread, never from the control loop. Nothing here
/// is fatal: failures are logged and the next utterance is a fresh attempt.
pub struct VoiceCommandRouter<D> {
    table: KeywordTable,
    dispatch: D,
    dispatched: AtomicU64,
}

impl<D: CommandDispatch> VoiceCommandRouter<D> {
    pub fn new(dispatch: D) -> Self {
        Self::with_table(KeywordTable::standard(), dispatch)
    }

    pub fn with_table(table: KeywordTable, dispatch: D) -> Self {
        Self {
            table,
            dispatch,
            dispatched: AtomicU64::new(0),
        }
    }

    /// Pure lookup, no dispatch.
    pub fn route(&self, transcript: &str) -> Option<MotionKind> {
        self.table.lookup(transcript)
    }

    /// Route and dispatch one transcript. `Ok(None)` for unrecognized phrases.
    pub fn on_transcript(&self, transcript: &str) -> VoiceResult<Option<MotionKind>> {
        info!(target: "mimic::voice", transcript, "🎤 heard");
        let Some(kind) = self.route(transcript) else {
            info!(target: "mimic::voice", transcript, "no command in phrase");
            return Ok(None);
        };
        self.dispatch.dispatch(kind)?;
        let count = self.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
        info!(target: "mimic::voice", %kind, dispatched = count, "command dispatched");
        Ok(Some(kind))
    }

    /// Handle one recognizer outcome. Never fails.
    pub fn on_recognition(&self, outcome: VoiceResult<String>) -> Option<MotionKind> {
        let result = outcome.and_then(|text| self.on_transcript(&text));
        match result {
            Ok(kind) => kind,
            Err(VoiceError::Inaudible) => {
                warn!(target: "mimic::voice", "could not understand the audio");
                None
            }
            Err(e) => {
                warn!(target: "mimic::voice", error = %e, "voice command dropped");
                None
            }
        }
    }

    /// Commands dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> (
        VoiceCommandRouter<mpsc::UnboundedSender<MotionKind>>,
        mpsc::UnboundedReceiver<MotionKind>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (VoiceCommandRouter::new(tx), rx)
    }

    #[test]
    fn turn_left_beats_bare_left() {
        let (router, _) = router();
        assert_eq!(router.route("turn left now"), Some(MotionKind::TurnLeft));
        assert_eq!(router.route("step to the left"), Some(MotionKind::SideStepLeft));
        assert_eq!(router.route("Turn Right please"), Some(MotionKind::TurnRight));
    }

    #[test]
    fn stop_dancing_is_a_dance() {
        let (router, _) = router();
        assert_eq!(router.route("please stop dancing"), Some(MotionKind::Dance));
        assert_eq!(router.route("STOP"), Some(MotionKind::Stop));
    }

    #[test]
    fn every_rule_is_reachable() {
        let table = KeywordTable::standard();
        let phrases = [
            ("let's dance", MotionKind::Dance),
            ("stand up", MotionKind::Stand),
            ("walk forward", MotionKind::Forward),
            ("go backward", MotionKind::Backward),
            ("move right", MotionKind::SideStepRight),
            ("I'm exhausted", MotionKind::WipeForehead),
            ("hello robot", MotionKind::Wave),
        ];
        for (phrase, kind) in phrases {
            assert_eq!(table.lookup(phrase), Some(kind), "{phrase}");
        }
        let order: Vec<MotionKind> = table.rules().iter().map(|r| r.kind).collect();
        assert_eq!(order, MotionKind::ALL);
        assert_eq!(table.lookup("what time is it"), None);
    }

    #[test]
    fn unrecognized_and_failed_recognitions_dispatch_nothing() {
        let (router, mut rx) = router();
        assert_eq!(router.on_transcript("good morning").unwrap(), None);
        assert_eq!(router.on_recognition(Err(VoiceError::Inaudible)), None);
        assert_eq!(
            router.on_recognition(Err(VoiceError::Service("offline".into()))),
            None
        );
        assert_eq!(router.dispatched(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dispatch_counts_commands() {
        let (router, mut rx) = router();
        router.on_recognition(Ok("wave hello".into()));
        router.on_recognition(Ok("stop".into()));
        assert_eq!(router.dispatched(), 2);
        assert_eq!(rx.try_recv().unwrap(), MotionKind::Wave);
        assert_eq!(rx.try_recv().unwrap(), MotionKind::Stop);
    }

    #[test]
    fn closed_dispatch_is_reported_not_fatal() {
        let (router, rx) = router();
        drop(rx);
        assert!(matches!(
            router.on_transcript("dance"),
            Err(VoiceError::ChannelSend(_))
        ));
        assert_eq!(router.on_recognition(Ok("dance".into())), None);
        assert_eq!(router.dispatched(), 0);
    }
}
