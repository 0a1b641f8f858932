use super::debounce::{Debounce, Edge};
use crate::config::TrackingConfig;
use crate::events::{AlertKind, MarkerId};
use crate::geometry::{classify, AllowList, Point, ZoneSet};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Confirmed zone transition for one marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneEvent {
    pub marker: MarkerId,
    /// One of `HardOut`, `MessyOn`, `MessyOff`
    pub kind: AlertKind,
    pub at: Instant,
}

/// Debounce thresholds and timeouts
#[derive(Debug, Clone, Copy)]
pub struct TrackingPolicy {
    pub hard_out_on: Duration,
    pub hard_out_off: Duration,
    pub messy_on: Duration,
    pub messy_off: Duration,
    pub missing_timeout: Duration,
    pub occlusion_grace: Duration,
}

impl From<&TrackingConfig> for TrackingPolicy {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            hard_out_on: config.hard_out_on(),
            hard_out_off: config.hard_out_off(),
            messy_on: config.messy_on(),
            messy_off: config.messy_off(),
            missing_timeout: config.missing_timeout(),
            occlusion_grace: config.occlusion_grace(),
        }
    }
}

/// Per-marker debounce state
#[derive(Debug, Clone)]
pub struct TrackedObject {
    last_seen: Instant,
    hard_out: Debounce,
    messy: Debounce,
    stale: bool,
}

impl TrackedObject {
    fn new(policy: &TrackingPolicy, now: Instant) -> Self {
        Self {
            last_seen: now,
            hard_out: Debounce::new(policy.hard_out_on, policy.hard_out_off),
            messy: Debounce::new(policy.messy_on, policy.messy_off),
            stale: false,
        }
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn hard_out_active(&self) -> bool {
        self.hard_out.is_confirmed()
    }

    pub fn messy_active(&self) -> bool {
        self.messy.is_confirmed()
    }

    /// Set once the missing-timeout reset has run; cleared by the next sighting
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

/// Turns per-frame marker positions into confirmed zone transitions.
///
/// Owns every marker's state; the runtime is its only writer.
pub struct ObjectTracker {
    zones: Arc<ZoneSet>,
    allow: Arc<AllowList>,
    policy: TrackingPolicy,
    objects: HashMap<MarkerId, TrackedObject>,
}

impl ObjectTracker {
    pub fn new(zones: Arc<ZoneSet>, allow: Arc<AllowList>, policy: TrackingPolicy) -> Self {
        Self {
            zones,
            allow,
            policy,
            objects: HashMap::new(),
        }
    }

    /// Process one sighting of `marker` at `point`
    pub fn observe(&mut self, marker: MarkerId, point: Point, now: Instant) -> Vec<ZoneEvent> {
        let classification = classify(point, &self.zones, self.allow.allowed_for(marker));
        let policy = self.policy;
        let object = self
            .objects
            .entry(marker)
            .or_insert_with(|| TrackedObject::new(&policy, now));

        if now < object.last_seen {
            debug!("Ignoring out-of-order sighting of marker {}", marker);
            return Vec::new();
        }

        if now.duration_since(object.last_seen) > policy.occlusion_grace {
            object.hard_out.break_run();
            object.messy.break_run();
        }
        object.last_seen = now;
        object.stale = false;

        let mut events = Vec::new();
        let outside_table = classification.table.is_outside();

        match object.hard_out.update(outside_table, now) {
            Some(Edge::Rose) => {
                info!("Marker {} confirmed outside the table", marker);
                events.push(ZoneEvent {
                    marker,
                    kind: AlertKind::HardOut,
                    at: now,
                });
            }
            Some(Edge::Fell) => debug!("Marker {} back on the table", marker),
            None => {}
        }

        // Outside the table takes precedence over misplacement within it
        if outside_table || object.hard_out.is_confirmed() {
            object.messy.break_run();
            return events;
        }

        match object.messy.update(!classification.inside_allowed, now) {
            Some(Edge::Rose) => {
                info!("Marker {} confirmed outside its allowed regions", marker);
                events.push(ZoneEvent {
                    marker,
                    kind: AlertKind::MessyOn,
                    at: now,
                });
            }
            Some(Edge::Fell) => {
                info!("Marker {} back in an allowed region", marker);
                events.push(ZoneEvent {
                    marker,
                    kind: AlertKind::MessyOff,
                    at: now,
                });
            }
            None => {}
        }

        events
    }

    /// Reset markers unseen for longer than the missing timeout. A marker
    /// that was confirmed messy yields one final `MessyOff`.
    pub fn sweep(&mut self, now: Instant) -> Vec<ZoneEvent> {
        let timeout = self.policy.missing_timeout;
        let mut events = Vec::new();

        for (marker, object) in self.objects.iter_mut() {
            if object.stale || now.saturating_duration_since(object.last_seen) <= timeout {
                continue;
            }

            info!(
                "Marker {} missing for more than {:.1}s, clearing its state",
                marker,
                timeout.as_secs_f64()
            );

            if object.messy.reset() {
                events.push(ZoneEvent {
                    marker: *marker,
                    kind: AlertKind::MessyOff,
                    at: now,
                });
            }
            object.hard_out.reset();
            object.stale = true;
        }

        events
    }

    pub fn object(&self, marker: MarkerId) -> Option<&TrackedObject> {
        self.objects.get(&marker)
    }

    /// Number of markers currently tracked (not stale)
    pub fn active_count(&self) -> usize {
        self.objects.values().filter(|o| !o.stale).count()
    }
}
