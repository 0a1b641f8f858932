use super::alert::{LedState, SpeechLine};
use crate::events::AlertKind;

/// Work item for the actuation worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuationCommand {
    Led(LedState),
    Speak(Utterance),
}

/// Speech for one accepted alert, valid while its epoch is current
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub kind: AlertKind,
    pub epoch: u64,
    pub lines: Vec<SpeechLine>,
}

impl Utterance {
    /// Text of the first line, for logging
    pub fn headline(&self) -> &str {
        self.lines.first().map(|l| l.text.as_str()).unwrap_or("")
    }
}
