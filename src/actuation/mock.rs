use super::panel::LedPanel;
use super::speech::{cancellable_pause, SpeechEngine, SpeechOutcome};
use crate::arbiter::{CancelToken, LedState};
use crate::error::{Result, StationError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Panel that records every token, for tests and dry runs
#[derive(Default)]
pub struct RecordingPanel {
    shown: Mutex<Vec<LedState>>,
    failing: AtomicBool,
}

impl RecordingPanel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent writes fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn shown(&self) -> Vec<LedState> {
        self.shown.lock().clone()
    }
}

#[async_trait::async_trait]
impl LedPanel for RecordingPanel {
    async fn show(&self, state: LedState) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StationError::actuation("recording_panel", "simulated failure"));
        }
        self.shown.lock().push(state);
        Ok(())
    }

    fn panel_name(&self) -> &str {
        "recording"
    }
}

/// Speech engine that records lines and takes `line_duration` to "say" each
pub struct RecordingSpeech {
    line_duration: Duration,
    spoken: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn new(line_duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            line_duration,
            spoken: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        })
    }

    /// Lines that started playing
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    /// Lines cut short by cancellation
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }
}

#[async_trait::async_trait]
impl SpeechEngine for RecordingSpeech {
    async fn speak(&self, text: &str, cancel: &CancelToken, epoch: u64) -> Result<SpeechOutcome> {
        self.spoken.lock().push(text.to_string());

        if cancellable_pause(self.line_duration, cancel, epoch).await {
            Ok(SpeechOutcome::Finished)
        } else {
            self.cancelled.lock().push(text.to_string());
            Ok(SpeechOutcome::Cancelled)
        }
    }

    fn engine_name(&self) -> &str {
        "recording"
    }
}
