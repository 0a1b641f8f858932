mod alert;
mod arbitrator;
mod cancel;
mod command;
mod rotation;
mod service;

pub use alert::{AlertPolicy, LedState, PolicyTable, Priority, SpeechLine};
pub use arbitrator::{ActiveAlert, Arbitrator, ArbiterSnapshot, ArbiterStats};
pub use cancel::CancelToken;
pub use command::{ActuationCommand, Utterance};
pub use rotation::{Milestone, RotationTimer};
pub use service::ArbiterService;
