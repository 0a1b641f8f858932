pub mod actuation;
pub mod app;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod keyboard_input;
pub mod noise;
pub mod tracking;
pub mod transport;

pub use actuation::{
    ActuationWorker, CommandSpeech, ConsolePanel, ConsoleSpeech, LedPanel, SerialPanel,
    SpeechEngine,
};
pub use app::{ComponentState, ShutdownReason, StationOrchestrator};
pub use arbiter::{
    ActuationCommand, AlertPolicy, ArbiterService, ArbiterSnapshot, Arbitrator, CancelToken,
    LedState, PolicyTable, Priority, RotationTimer,
};
pub use config::StationConfig;
pub use error::{Result, StationError};
pub use events::{AlertKind, EventBus, EventReceiver, MarkerId, StationEvent};
pub use geometry::{classify, AllowList, Classification, Point, Polygon, TableStatus, ZoneSet};
pub use noise::NoiseMonitor;
pub use tracking::{Debounce, ObjectTracker, TrackingPolicy, ZoneEvent};
pub use transport::{parse_datagram, EventListener};
