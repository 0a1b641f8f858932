use super::alert::{AlertPolicy, LedState, PolicyTable, Priority};
use super::cancel::CancelToken;
use super::command::{ActuationCommand, Utterance};
use super::rotation::RotationTimer;
use crate::config::StationConfig;
use crate::events::AlertKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// The alert that currently owns the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveAlert {
    pub kind: AlertKind,
    pub priority: Priority,
    pub epoch: u64,
    pub hold_until: Instant,
}

/// Counters over the lifetime of the arbitrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArbiterStats {
    pub accepted: u64,
    pub refreshed: u64,
    pub dropped: u64,
    pub muted: u64,
    pub released: u64,
    pub sessions: u64,
}

/// Point-in-time view of the arbitrator for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbiterSnapshot {
    pub session_id: Uuid,
    pub session_started: DateTime<Utc>,
    pub active: Option<AlertKind>,
    pub led: LedState,
    pub noisy: bool,
    pub round: u32,
    pub timer_running: bool,
    pub stats: ArbiterStats,
}

/// Single-slot owner of the LED and speech channel.
///
/// ```text
///          request P accepted (P <= active priority)
///   IDLE ───────────────────────────────────────────► ACTIVE(kind, epoch)
///    ▲                                                   │   │
///    │      hold expired / owning condition cleared      │   │ preempted:
///    └───────────────────────────────────────────────────┘   │ bump epoch
///                          START (from any state)            ▼
/// ```
///
/// Every method is synchronous and returns the commands to forward; the
/// caller owns delivery.
pub struct Arbitrator {
    policies: PolicyTable,
    cancel: CancelToken,
    timer: RotationTimer,
    active: Option<ActiveAlert>,
    led: LedState,
    noisy: bool,
    last_spoken: HashMap<AlertKind, Instant>,
    session_id: Uuid,
    session_started: DateTime<Utc>,
    stats: ArbiterStats,
}

impl Arbitrator {
    pub fn new(config: &StationConfig, cancel: CancelToken, now: Instant) -> Self {
        Self {
            policies: PolicyTable::from_config(&config.alerts),
            cancel,
            timer: RotationTimer::new(&config.timer, now),
            active: None,
            led: LedState::Default,
            noisy: false,
            last_spoken: HashMap::new(),
            session_id: Uuid::new_v4(),
            session_started: Utc::now(),
            stats: ArbiterStats::default(),
        }
    }

    /// Apply one incoming token
    pub fn handle(&mut self, kind: AlertKind, now: Instant) -> Vec<ActuationCommand> {
        match kind {
            AlertKind::Start => self.start_session(now),
            AlertKind::MessyOff => self.clear(AlertKind::MessyOn, false),
            AlertKind::NoisyOff => {
                if self.noisy {
                    info!("Noise suppression lifted");
                }
                self.noisy = false;
                self.clear(AlertKind::NoisyOn, true)
            }
            request => self.request(request, now),
        }
    }

    /// Periodic housekeeping: hold expiry, then rotation milestones
    pub fn tick(&mut self, now: Instant) -> Vec<ActuationCommand> {
        let mut commands = Vec::new();

        if let Some(active) = self.active {
            if now >= active.hold_until {
                debug!("{} hold expired", active.kind);
                self.active = None;
                self.stats.released += 1;
                commands.extend(self.neutral_led());
            }
        }

        if let Some(milestone) = self.timer.poll(now) {
            info!(
                "Rotation milestone {:?} (round {})",
                milestone,
                self.timer.round()
            );
            commands.extend(self.request(milestone.alert(), now));
        }

        commands
    }

    /// Cancel everything in flight and blank the panel
    pub fn shutdown(&mut self) -> Vec<ActuationCommand> {
        self.cancel.bump();
        self.active = None;
        self.led = LedState::Off;
        vec![ActuationCommand::Led(LedState::Off)]
    }

    fn start_session(&mut self, now: Instant) -> Vec<ActuationCommand> {
        self.cancel.bump();
        self.active = None;
        self.noisy = false;
        self.last_spoken.clear();
        self.timer.restart(now);
        self.session_id = Uuid::new_v4();
        self.session_started = Utc::now();
        self.stats.sessions += 1;
        info!("Session {} started", self.session_id);

        self.led = LedState::Default;
        vec![ActuationCommand::Led(LedState::Default)]
    }

    fn request(&mut self, kind: AlertKind, now: Instant) -> Vec<ActuationCommand> {
        let Some(policy) = self.policies.get(kind).cloned() else {
            debug!("No policy for {}, ignoring", kind);
            return Vec::new();
        };

        // Session-level side effects apply whether or not the request wins
        match kind {
            AlertKind::NoisyOn => {
                if !self.noisy {
                    info!("Noise suppression engaged");
                }
                self.noisy = true;
            }
            AlertKind::End => self.timer.pause(),
            _ => {}
        }

        if let Some(active) = self.active {
            if policy.priority.is_less_urgent_than(active.priority) {
                debug!(
                    "Dropping {} ({}) while {} ({}) holds the panel",
                    kind, policy.priority, active.kind, active.priority
                );
                self.stats.dropped += 1;
                return Vec::new();
            }

            if active.kind == kind && self.in_cooldown(&policy, now) && !policy.safety_override {
                debug!("Refreshing {} within its cooldown", kind);
                self.stats.refreshed += 1;
                if let Some(active) = self.active.as_mut() {
                    active.hold_until = now + policy.hold;
                }
                self.led = policy.led;
                return vec![ActuationCommand::Led(policy.led)];
            }
        }

        self.accept(&policy, now)
    }

    fn accept(&mut self, policy: &AlertPolicy, now: Instant) -> Vec<ActuationCommand> {
        let epoch = self.cancel.bump();
        self.active = Some(ActiveAlert {
            kind: policy.kind,
            priority: policy.priority,
            epoch,
            hold_until: now + policy.hold,
        });
        self.led = policy.led;
        self.stats.accepted += 1;

        let mut commands = vec![ActuationCommand::Led(policy.led)];

        let muted = !policy.safety_override
            && ((self.noisy && policy.muted_while_noisy) || self.in_cooldown(policy, now));

        if muted {
            info!("{} accepted, speech muted", policy.kind);
            self.stats.muted += 1;
        } else if !policy.script.is_empty() {
            info!("{} accepted", policy.kind);
            self.last_spoken.insert(policy.kind, now);
            commands.push(ActuationCommand::Speak(Utterance {
                kind: policy.kind,
                epoch,
                lines: policy.script.clone(),
            }));
        }

        commands
    }

    /// Release the active alert if `owner` holds it
    fn clear(&mut self, owner: AlertKind, cancel_speech: bool) -> Vec<ActuationCommand> {
        match self.active {
            Some(active) if active.kind == owner => {
                info!("{} cleared", owner);
                if cancel_speech {
                    self.cancel.bump();
                }
                self.active = None;
                self.stats.released += 1;
                self.neutral_led().into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    fn neutral_led(&mut self) -> Option<ActuationCommand> {
        if self.active.is_some() || self.led == LedState::Default {
            return None;
        }
        self.led = LedState::Default;
        Some(ActuationCommand::Led(LedState::Default))
    }

    fn in_cooldown(&self, policy: &AlertPolicy, now: Instant) -> bool {
        match (policy.cooldown, self.last_spoken.get(&policy.kind)) {
            (Some(cooldown), Some(spoken)) => now.saturating_duration_since(*spoken) < cooldown,
            _ => false,
        }
    }

    pub fn active(&self) -> Option<&ActiveAlert> {
        self.active.as_ref()
    }

    pub fn led(&self) -> LedState {
        self.led
    }

    pub fn is_noisy(&self) -> bool {
        self.noisy
    }

    pub fn round(&self) -> u32 {
        self.timer.round()
    }

    pub fn warn_at(&self) -> std::time::Duration {
        self.timer.warn_at()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn stats(&self) -> &ArbiterStats {
        &self.stats
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        ArbiterSnapshot {
            session_id: self.session_id,
            session_started: self.session_started,
            active: self.active.map(|a| a.kind),
            led: self.led,
            noisy: self.noisy,
            round: self.timer.round(),
            timer_running: self.timer.is_running(),
            stats: self.stats.clone(),
        }
    }
}
