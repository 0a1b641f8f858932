use crate::arbiter::CancelToken;
use crate::error::{Result, StationError};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    Finished,
    Cancelled,
}

/// Text-to-speech backend
#[async_trait::async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speak one line. Must return promptly with `Cancelled` once `epoch`
    /// stops being current (see [`CancelToken::stale`]).
    async fn speak(&self, text: &str, cancel: &CancelToken, epoch: u64) -> Result<SpeechOutcome>;

    /// Get the name of this engine for logging
    fn engine_name(&self) -> &str;
}

/// External speech program such as `say` or `espeak`
pub struct CommandSpeech {
    program: String,
    rate_flag: String,
    rate: u32,
}

impl CommandSpeech {
    pub fn new<S: Into<String>>(program: S, rate_flag: S, rate: u32) -> Self {
        Self {
            program: program.into(),
            rate_flag: rate_flag.into(),
            rate,
        }
    }

    fn command(&self, text: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        if !self.rate_flag.is_empty() {
            cmd.arg(&self.rate_flag).arg(self.rate.to_string());
        }
        cmd.arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait::async_trait]
impl SpeechEngine for CommandSpeech {
    async fn speak(&self, text: &str, cancel: &CancelToken, epoch: u64) -> Result<SpeechOutcome> {
        let mut child = self.command(text).spawn().map_err(|e| {
            StationError::actuation(
                "speech".to_string(),
                format!("failed to spawn {}: {}", self.program, e),
            )
        })?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if !status.success() {
                    warn!("{} exited with {:?}", self.program, status.code());
                }
                Ok(SpeechOutcome::Finished)
            }
            _ = cancel.stale(epoch) => {
                debug!("Stopping {} mid-utterance", self.program);
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop {}: {}", self.program, e);
                }
                Ok(SpeechOutcome::Cancelled)
            }
        }
    }

    fn engine_name(&self) -> &str {
        &self.program
    }
}

/// Logs utterances instead of speaking them
pub struct ConsoleSpeech;

#[async_trait::async_trait]
impl SpeechEngine for ConsoleSpeech {
    async fn speak(&self, text: &str, _cancel: &CancelToken, _epoch: u64) -> Result<SpeechOutcome> {
        info!("[TTS] {}", text);
        Ok(SpeechOutcome::Finished)
    }

    fn engine_name(&self) -> &str {
        "console"
    }
}

/// Sleep for `duration` unless `epoch` goes stale first. Returns whether the
/// pause ran to completion.
pub async fn cancellable_pause(duration: Duration, cancel: &CancelToken, epoch: u64) -> bool {
    if !cancel.is_current(epoch) {
        return false;
    }

    tokio::select! {
        _ = sleep(duration) => cancel.is_current(epoch),
        _ = cancel.stale(epoch) => false,
    }
}
