use crate::error::{Result, StationError};
use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Identifier printed on a tracked object's fiducial marker
pub type MarkerId = u32;

/// Closed vocabulary of alert and session tokens exchanged with producers
/// and forwarded toward the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    HardOut,
    MessyOn,
    MessyOff,
    NoisyOn,
    NoisyOff,
    QuietOn,
    AlarmWarning,
    AlarmOn,
    Start,
    End,
}

impl AlertKind {
    pub const ALL: [AlertKind; 10] = [
        AlertKind::HardOut,
        AlertKind::MessyOn,
        AlertKind::MessyOff,
        AlertKind::NoisyOn,
        AlertKind::NoisyOff,
        AlertKind::QuietOn,
        AlertKind::AlarmWarning,
        AlertKind::AlarmOn,
        AlertKind::Start,
        AlertKind::End,
    ];

    /// Wire token used over the transport
    pub fn token(&self) -> &'static str {
        match self {
            AlertKind::HardOut => "HARD_OUT",
            AlertKind::MessyOn => "MESSY_ON",
            AlertKind::MessyOff => "MESSY_OFF",
            AlertKind::NoisyOn => "NOISY_ON",
            AlertKind::NoisyOff => "NOISY_OFF",
            AlertKind::QuietOn => "QUIET_ON",
            AlertKind::AlarmWarning => "ALARM_WARNING",
            AlertKind::AlarmOn => "ALARM_ON",
            AlertKind::Start => "START",
            AlertKind::End => "END",
        }
    }

    /// True for tokens that compete for the panel; false for clears and session control
    pub fn is_request(&self) -> bool {
        !matches!(
            self,
            AlertKind::MessyOff | AlertKind::NoisyOff | AlertKind::Start
        )
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for AlertKind {
    type Err = StationError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        AlertKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.token().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StationError::Transport {
                details: format!("unknown event token '{}'", wanted),
            })
    }
}

/// Everything the station runtime consumes, from any producer
#[derive(Debug, Clone)]
pub enum StationEvent {
    /// One marker sighting in reference-frame pixels
    Observation {
        marker: MarkerId,
        point: Point,
        at: Instant,
    },
    /// One audio block level reading
    Level { dbfs: f64, at: Instant },
    /// A ready-made token (zone event from a remote tracker, noise, session control)
    Alert { kind: AlertKind, at: Instant },
    /// Stop request from an interactive producer
    ShutdownRequested { reason: String },
}

impl StationEvent {
    pub fn alert(kind: AlertKind) -> Self {
        StationEvent::Alert {
            kind,
            at: Instant::now(),
        }
    }

    pub fn observation(marker: MarkerId, point: Point) -> Self {
        StationEvent::Observation {
            marker,
            point,
            at: Instant::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            StationEvent::Observation { marker, point, .. } => {
                format!("Marker {} at ({}, {})", marker, point.x, point.y)
            }
            StationEvent::Level { dbfs, .. } => format!("Level {:.1} dBFS", dbfs),
            StationEvent::Alert { kind, .. } => format!("Token {}", kind),
            StationEvent::ShutdownRequested { reason } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }
}

/// Multi-producer, single-consumer queue feeding the station runtime.
/// Publishing never blocks.
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<StationEvent>,
    debug_logging: bool,
}

/// The single consuming end of an [`EventBus`]
pub struct EventReceiver {
    receiver: mpsc::UnboundedReceiver<StationEvent>,
}

impl EventBus {
    /// Create a new event bus and its receiver
    pub fn channel() -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                debug_logging: false,
            },
            EventReceiver { receiver },
        )
    }

    /// Create a new event bus with per-event debug logging
    pub fn with_debug_logging() -> (Self, EventReceiver) {
        let (mut bus, receiver) = Self::channel();
        bus.debug_logging = true;
        (bus, receiver)
    }

    /// Enqueue an event for the runtime
    pub fn publish(&self, event: StationEvent) -> Result<()> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        if let StationEvent::ShutdownRequested { reason } = &event {
            info!("Shutdown requested: {}", reason);
        }

        self.sender
            .send(event)
            .map_err(|_| StationError::system("event bus closed"))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl EventReceiver {
    /// Receive the next event; `None` once every publisher is gone
    pub async fn recv(&mut self) -> Option<StationEvent> {
        self.receiver.recv().await
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<StationEvent> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[test]
    fn test_token_round_trip_is_case_insensitive() {
        for kind in AlertKind::ALL {
            assert_eq!(kind.token().parse::<AlertKind>().unwrap(), kind);
        }
        assert_eq!(" messy_on\n".parse::<AlertKind>().unwrap(), AlertKind::MessyOn);
        assert!("BEEP".parse::<AlertKind>().is_err());
    }

    #[test]
    fn test_requests_exclude_clears_and_start() {
        assert!(AlertKind::HardOut.is_request());
        assert!(AlertKind::End.is_request());
        assert!(!AlertKind::MessyOff.is_request());
        assert!(!AlertKind::NoisyOff.is_request());
        assert!(!AlertKind::Start.is_request());
    }

    #[tokio::test]
    async fn test_publish_from_several_producers() {
        let (bus, mut receiver) = EventBus::channel();
        let other = bus.clone();

        bus.publish(StationEvent::alert(AlertKind::NoisyOn)).unwrap();
        other
            .publish(StationEvent::observation(3, Point::new(10, 20)))
            .unwrap();

        let first = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            first,
            StationEvent::Alert {
                kind: AlertKind::NoisyOn,
                ..
            }
        ));

        let second = receiver.try_recv().unwrap();
        match second {
            StationEvent::Observation { marker, point, .. } => {
                assert_eq!(marker, 3);
                assert_eq!(point, Point::new(10, 20));
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(receiver.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_publish_fails_after_receiver_dropped() {
        let (bus, receiver) = EventBus::channel();
        drop(receiver);
        assert!(bus.is_closed());
        assert!(bus.publish(StationEvent::alert(AlertKind::Start)).is_err());
    }
}
