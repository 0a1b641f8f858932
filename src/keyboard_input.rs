use crate::error::Result;
use crate::events::{AlertKind, EventBus, StationEvent};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press stands for in the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Publish(AlertKind),
    Quit,
}

/// Key bindings of the station simulator
pub fn map_key(code: KeyCode) -> Option<KeyAction> {
    let kind = match code {
        KeyCode::Char('1') => AlertKind::HardOut,
        KeyCode::Char('2') => AlertKind::MessyOn,
        KeyCode::Char('3') => AlertKind::MessyOff,
        KeyCode::Char('4') => AlertKind::NoisyOn,
        KeyCode::Char('5') => AlertKind::NoisyOff,
        KeyCode::Char('6') => AlertKind::QuietOn,
        KeyCode::Char('s') | KeyCode::Char('S') => AlertKind::Start,
        KeyCode::Char('e') | KeyCode::Char('E') => AlertKind::End,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return Some(KeyAction::Quit),
        _ => return None,
    };
    Some(KeyAction::Publish(kind))
}

/// Keyboard simulator standing in for the camera and audio producers
pub struct KeyboardInputHandler {
    event_bus: EventBus,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting keyboard simulator - 1 HARD_OUT, 2 MESSY_ON, 3 MESSY_OFF, \
             4 NOISY_ON, 5 NOISY_OFF, 6 QUIET_ON, s START, e END, q quit"
        );

        let event_bus = self.event_bus.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard simulator active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Only handle key press events (not release)
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match map_key(key_event.code) {
                            Some(KeyAction::Publish(kind)) => {
                                info!("Key {:?} -> {}", key_event.code, kind);
                                if let Err(e) = event_bus.publish(StationEvent::alert(kind)) {
                                    warn!("Failed to publish {}: {}", kind, e);
                                    break;
                                }
                            }
                            Some(KeyAction::Quit) => {
                                info!("Quit key pressed - requesting shutdown");
                                let request = StationEvent::ShutdownRequested {
                                    reason: "User requested via keyboard".to_string(),
                                };
                                if let Err(e) = event_bus.publish(request) {
                                    warn!("Failed to publish shutdown request: {}", e);
                                }
                                break;
                            }
                            None => debug!("Key pressed: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }

            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        let expected = [
            ('1', AlertKind::HardOut),
            ('2', AlertKind::MessyOn),
            ('3', AlertKind::MessyOff),
            ('4', AlertKind::NoisyOn),
            ('5', AlertKind::NoisyOff),
            ('6', AlertKind::QuietOn),
            ('s', AlertKind::Start),
            ('e', AlertKind::End),
        ];
        for (key, kind) in expected {
            assert_eq!(map_key(KeyCode::Char(key)), Some(KeyAction::Publish(kind)));
        }

        assert_eq!(map_key(KeyCode::Char('q')), Some(KeyAction::Quit));
        assert_eq!(map_key(KeyCode::Esc), Some(KeyAction::Quit));
        assert_eq!(map_key(KeyCode::Char('7')), None);
        assert_eq!(map_key(KeyCode::Enter), None);
    }

    #[tokio::test]
    async fn test_keyboard_handler_creation() {
        let (event_bus, _events) = EventBus::channel();
        let handler = KeyboardInputHandler::new(event_bus);

        assert!(!handler.cancellation_token.is_cancelled());
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let (event_bus, _events) = EventBus::channel();
        let handler = KeyboardInputHandler::new(event_bus);

        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}
