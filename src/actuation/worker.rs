use super::panel::LedPanel;
use super::speech::{cancellable_pause, SpeechEngine, SpeechOutcome};
use crate::arbiter::{ActuationCommand, CancelToken, LedState, Utterance};
use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Single consumer of the actuation queue.
///
/// LED commands are written as they arrive. Utterances play one at a time in
/// the background of the loop, so a long countdown never delays the next LED
/// command; anything whose epoch has gone stale is skipped or cut short.
pub struct ActuationWorker {
    panel: Arc<dyn LedPanel>,
    speech: Arc<dyn SpeechEngine>,
    cancel: CancelToken,
    last_led: Option<LedState>,
}

impl ActuationWorker {
    pub fn new(panel: Arc<dyn LedPanel>, speech: Arc<dyn SpeechEngine>, cancel: CancelToken) -> Self {
        Self {
            panel,
            speech,
            cancel,
            last_led: None,
        }
    }

    /// Drain `commands` until the sender side closes or `shutdown` fires
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ActuationCommand>,
        shutdown: CancellationToken,
    ) {
        info!(
            "Actuation worker started (panel: {}, speech: {})",
            self.panel.panel_name(),
            self.speech.engine_name()
        );

        let mut queue: VecDeque<Utterance> = VecDeque::new();
        let mut playing: Option<BoxFuture<'static, ()>> = None;

        loop {
            if playing.is_none() {
                playing = self.next_playback(&mut queue);
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Actuation worker cancelled");
                    break;
                }
                command = commands.recv() => match command {
                    Some(ActuationCommand::Led(state)) => self.show(state).await,
                    Some(ActuationCommand::Speak(utterance)) => queue.push_back(utterance),
                    None => {
                        debug!("Actuation queue closed");
                        break;
                    }
                },
                _ = async {
                    if let Some(playback) = playing.as_mut() {
                        playback.await;
                    }
                }, if playing.is_some() => {
                    playing = None;
                }
            }
        }

        info!("Actuation worker stopped");
    }

    async fn show(&mut self, state: LedState) {
        if state == LedState::Default && self.last_led == Some(LedState::Default) {
            debug!("Panel already neutral");
            return;
        }

        match self.panel.show(state).await {
            Ok(()) => {
                debug!("Panel -> {}", state);
                self.last_led = Some(state);
            }
            Err(e) => {
                warn!("Failed to update {} panel: {}", self.panel.panel_name(), e);
                self.last_led = None;
            }
        }
    }

    fn next_playback(&self, queue: &mut VecDeque<Utterance>) -> Option<BoxFuture<'static, ()>> {
        while let Some(utterance) = queue.pop_front() {
            if self.cancel.is_current(utterance.epoch) {
                return Some(
                    play(
                        Arc::clone(&self.speech),
                        self.cancel.clone(),
                        utterance,
                    )
                    .boxed(),
                );
            }
            debug!("Skipping stale {} utterance", utterance.kind);
        }
        None
    }
}

async fn play(speech: Arc<dyn SpeechEngine>, cancel: CancelToken, utterance: Utterance) {
    debug!("Speaking {}: {}", utterance.kind, utterance.headline());

    for line in &utterance.lines {
        if !cancel.is_current(utterance.epoch) {
            debug!("{} speech cancelled", utterance.kind);
            return;
        }

        match speech.speak(&line.text, &cancel, utterance.epoch).await {
            Ok(SpeechOutcome::Finished) => {}
            Ok(SpeechOutcome::Cancelled) => {
                debug!("{} speech cancelled mid-line", utterance.kind);
                return;
            }
            Err(e) => {
                warn!("Speech engine {} failed: {}", speech.engine_name(), e);
                return;
            }
        }

        if !line.pause_after.is_zero()
            && !cancellable_pause(line.pause_after, &cancel, utterance.epoch).await
        {
            debug!("{} speech cancelled during pause", utterance.kind);
            return;
        }
    }
}
