//! Strict debounce latch with asymmetric confirmation thresholds.
//!
//! ```text
//!                raw true for >= on_threshold
//!  CONFIRMED_FALSE ─────────────────────────────► CONFIRMED_TRUE
//!        ▲                                              │
//!        └──────────────────────────────────────────────┘
//!                raw false for >= off_threshold
//! ```
//!
//! The candidate run starts at the first observation that disagrees with the
//! confirmed state. Any observation that agrees with the confirmed state
//! clears the run completely; there is no averaging.

use std::time::{Duration, Instant};

/// Confirmed transition reported by [`Debounce::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rose,
    Fell,
}

#[derive(Debug, Clone)]
pub struct Debounce {
    on_threshold: Duration,
    off_threshold: Duration,
    confirmed: bool,
    candidate_since: Option<Instant>,
}

impl Debounce {
    pub fn new(on_threshold: Duration, off_threshold: Duration) -> Self {
        Self {
            on_threshold,
            off_threshold,
            confirmed: false,
            candidate_since: None,
        }
    }

    /// Feed one raw observation taken at `now`.
    ///
    /// Returns an edge exactly once per confirmed run; re-observing the
    /// confirmed value is a no-op.
    pub fn update(&mut self, raw: bool, now: Instant) -> Option<Edge> {
        if raw == self.confirmed {
            self.candidate_since = None;
            return None;
        }

        let since = *self.candidate_since.get_or_insert(now);
        let threshold = if self.confirmed {
            self.off_threshold
        } else {
            self.on_threshold
        };

        if now.saturating_duration_since(since) < threshold {
            return None;
        }

        self.confirmed = raw;
        self.candidate_since = None;
        Some(if raw { Edge::Rose } else { Edge::Fell })
    }

    /// Discard the candidate run without touching the confirmed state
    pub fn break_run(&mut self) {
        self.candidate_since = None;
    }

    /// Force back to confirmed-false. Returns whether the latch was confirmed true.
    pub fn reset(&mut self) -> bool {
        self.candidate_since = None;
        std::mem::replace(&mut self.confirmed, false)
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn candidate_since(&self) -> Option<Instant> {
        self.candidate_since
    }
}
