//! LED panel and speech output.
//!
//! The arbiter produces [`ActuationCommand`](crate::arbiter::ActuationCommand)s;
//! the [`ActuationWorker`] is the only thing that touches hardware.

mod mock;
mod panel;
mod speech;
mod worker;


pub use mock::{RecordingPanel, RecordingSpeech};
pub use panel::{ConsolePanel, LedPanel, SerialPanel};
pub use speech::{cancellable_pause, CommandSpeech, ConsoleSpeech, SpeechEngine, SpeechOutcome};
pub use worker::ActuationWorker;

use crate::config::ActuationConfig;
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// Serial panel when a device is configured, console otherwise
pub fn panel_from_config(config: &ActuationConfig) -> Result<Arc<dyn LedPanel>> {
    match &config.serial_device {
        Some(device) => Ok(Arc::new(SerialPanel::open(device)?)),
        None => {
            info!("No serial device configured, LED tokens go to the log");
            Ok(Arc::new(ConsolePanel))
        }
    }
}

pub fn speech_from_config(config: &ActuationConfig) -> Arc<dyn SpeechEngine> {
    match &config.speech_command {
        Some(program) => Arc::new(CommandSpeech::new(
            program.clone(),
            config.speech_rate_flag.clone(),
            config.speech_rate,
        )),
        None => {
            info!("No speech command configured, utterances go to the log");
            Arc::new(ConsoleSpeech)
        }
    }
}
