mod debounce;
mod tracker;

pub use debounce::{Debounce, Edge};
pub use tracker::{ObjectTracker, TrackedObject, TrackingPolicy, ZoneEvent};
