use crate::config::TransportConfig;
use crate::error::{Result, StationError};
use crate::events::{AlertKind, EventBus, MarkerId, StationEvent};
use crate::geometry::Point;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// JSON payloads a producer may send instead of a bare token
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireMessage {
    Observation { id: MarkerId, x: f64, y: f64 },
    Level { dbfs: f64 },
}

/// Decode one datagram. Returns `None` for anything that is not a known
/// token or JSON message.
pub fn parse_datagram(data: &[u8]) -> Option<StationEvent> {
    let text = String::from_utf8_lossy(data);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let at = Instant::now();

    if text.starts_with('{') {
        return match serde_json::from_str::<WireMessage>(text) {
            Ok(WireMessage::Observation { id, x, y }) => Some(StationEvent::Observation {
                marker: id,
                point: Point::new(x as i32, y as i32),
                at,
            }),
            Ok(WireMessage::Level { dbfs }) if dbfs.is_finite() => {
                Some(StationEvent::Level { dbfs, at })
            }
            Ok(WireMessage::Level { dbfs }) => {
                debug!("Ignoring non-finite level {}", dbfs);
                None
            }
            Err(e) => {
                debug!("Ignoring malformed datagram {:?}: {}", text, e);
                None
            }
        };
    }

    match text.parse::<AlertKind>() {
        Ok(kind) => Some(StationEvent::Alert { kind, at }),
        Err(e) => {
            debug!("Ignoring datagram: {}", e);
            None
        }
    }
}

/// UDP listener feeding producer datagrams into the event bus
pub struct EventListener {
    socket: UdpSocket,
    max_datagram_bytes: usize,
    event_bus: EventBus,
}

impl EventListener {
    /// Bind the configured address; failure is fatal at startup
    pub async fn bind(config: &TransportConfig, event_bus: EventBus) -> Result<Self> {
        let socket = UdpSocket::bind(&config.bind)
            .await
            .map_err(|e| StationError::Transport {
                details: format!("failed to bind {}: {}", config.bind, e),
            })?;

        info!("Listening for events on udp://{}", socket.local_addr()?);

        Ok(Self {
            socket,
            max_datagram_bytes: config.max_datagram_bytes.max(1),
            event_bus,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until cancelled or until the event bus closes
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; self.max_datagram_bytes];
        let mut received: u64 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Event listener cancelled");
                    break;
                }
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((len, peer)) => {
                        received += 1;
                        let Some(event) = parse_datagram(&buf[..len]) else {
                            continue;
                        };
                        debug!("{} from {}", event.description(), peer);

                        if self.event_bus.publish(event).is_err() {
                            info!("Event bus closed, stopping event listener");
                            break;
                        }
                    }
                    Err(e) => {
                        // Transient on some platforms (e.g. ICMP port unreachable)
                        warn!("UDP receive failed: {}", e);
                    }
                },
            }
        }

        info!("Event listener stopped after {} datagrams", received);
    }
}
