use crate::config::{secs, AlertsConfig};
use crate::events::AlertKind;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Alert urgency; a lower value is more urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Priority(pub u8);

impl Priority {
    pub const SAFETY: Priority = Priority(0);

    pub fn is_less_urgent_than(self, other: Priority) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Panel state tokens understood by the LED/buzzer firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LedState {
    Default,
    AlarmOn,
    SwitchTask,
    YellowBlink,
    PinkBlink,
    WhiteBlink,
    Off,
}

impl LedState {
    pub fn code(&self) -> &'static str {
        match self {
            LedState::Default => "DEFAULT_GREEN",
            LedState::AlarmOn => "ALARM_ON",
            LedState::SwitchTask => "SWITCH_TASK",
            LedState::YellowBlink => "YELLOW_BLINK",
            LedState::PinkBlink => "PINK_BLINK",
            LedState::WhiteBlink => "WHITE_BLINK",
            LedState::Off => "OFF",
        }
    }
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One spoken sentence followed by an optional silence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechLine {
    pub text: String,
    pub pause_after: Duration,
}

impl SpeechLine {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            pause_after: Duration::ZERO,
        }
    }

    pub fn with_pause<S: Into<String>>(text: S, pause_after: Duration) -> Self {
        Self {
            text: text.into(),
            pause_after,
        }
    }
}

/// Everything the arbitrator needs to know about one request kind
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    pub kind: AlertKind,
    pub priority: Priority,
    pub led: LedState,
    pub script: Vec<SpeechLine>,
    /// How long the alert owns the channel without preemption
    pub hold: Duration,
    /// Minimum spacing between two utterances of this kind
    pub cooldown: Option<Duration>,
    /// Delivered even when muting or cooldown rules would apply
    pub safety_override: bool,
    pub muted_while_noisy: bool,
}

impl AlertPolicy {
    fn new(kind: AlertKind, priority: u8, led: LedState, hold: Duration) -> Self {
        Self {
            kind,
            priority: Priority(priority),
            led,
            script: Vec::new(),
            hold,
            cooldown: None,
            safety_override: false,
            muted_while_noisy: false,
        }
    }

    fn says<S: Into<String>>(mut self, text: S) -> Self {
        self.script.push(SpeechLine::new(text));
        self
    }

    fn muted_while_noisy(mut self) -> Self {
        self.muted_while_noisy = true;
        self
    }
}

/// Policies for every request kind of [`AlertKind`]
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<AlertKind, AlertPolicy>,
}

impl PolicyTable {
    pub fn from_config(config: &AlertsConfig) -> Self {
        let step = Duration::from_millis(config.countdown_step_ms);

        let mut hard_out = AlertPolicy::new(
            AlertKind::HardOut,
            0,
            LedState::AlarmOn,
            secs(config.hard_out_hold_seconds),
        )
        .says("Object left the work area.");
        hard_out.safety_override = true;

        let mut warning = AlertPolicy::new(
            AlertKind::AlarmWarning,
            1,
            LedState::SwitchTask,
            step * config.countdown_from + Duration::from_secs(2),
        )
        .muted_while_noisy();
        warning.script.push(SpeechLine::new("Switching tasks soon."));
        warning.script.extend(
            (1..=config.countdown_from)
                .rev()
                .map(|n| SpeechLine::with_pause(n.to_string(), step)),
        );

        let alarm_on = AlertPolicy::new(
            AlertKind::AlarmOn,
            1,
            LedState::SwitchTask,
            secs(config.alarm_on_hold_seconds),
        )
        .says("Switch tasks now.")
        .muted_while_noisy();

        let end = AlertPolicy::new(
            AlertKind::End,
            1,
            LedState::WhiteBlink,
            secs(config.end_hold_seconds),
        )
        .says("Task finished!");

        let messy = AlertPolicy::new(
            AlertKind::MessyOn,
            2,
            LedState::PinkBlink,
            secs(config.messy_hold_seconds),
        )
        .says("Please return items to the shared tray or final plate.")
        .muted_while_noisy();

        let mut noisy = AlertPolicy::new(
            AlertKind::NoisyOn,
            3,
            LedState::YellowBlink,
            secs(config.noisy_hold_seconds),
        )
        .says("Too noisy, pause and take turns.");
        noisy.cooldown = Some(secs(config.noise_cooldown_seconds));

        let quiet = AlertPolicy::new(
            AlertKind::QuietOn,
            4,
            LedState::YellowBlink,
            secs(config.quiet_hold_seconds),
        )
        .says("Too quiet, say the next step together.")
        .muted_while_noisy();

        let policies = [hard_out, warning, alarm_on, end, messy, noisy, quiet]
            .into_iter()
            .map(|policy| (policy.kind, policy))
            .collect();

        Self { policies }
    }

    /// `None` for clears and session control, which never compete
    pub fn get(&self, kind: AlertKind) -> Option<&AlertPolicy> {
        self.policies.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;

    #[test]
    fn test_every_request_has_a_policy() {
        let table = PolicyTable::from_config(&StationConfig::default().alerts);
        for kind in AlertKind::ALL {
            assert_eq!(table.get(kind).is_some(), kind.is_request(), "{}", kind);
        }
    }

    #[test]
    fn test_countdown_script() {
        let table = PolicyTable::from_config(&StationConfig::default().alerts);
        let warning = table.get(AlertKind::AlarmWarning).unwrap();

        let texts: Vec<&str> = warning.script.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Switching tasks soon.", "5", "4", "3", "2", "1"]);
        assert_eq!(warning.script[1].pause_after, Duration::from_secs(1));
        assert_eq!(warning.hold, Duration::from_secs(7));
    }

    #[test]
    fn test_only_hard_out_overrides() {
        let table = PolicyTable::from_config(&StationConfig::default().alerts);
        let hard_out = table.get(AlertKind::HardOut).unwrap();

        assert!(hard_out.safety_override);
        assert_eq!(hard_out.priority, Priority::SAFETY);
        assert!(!hard_out.muted_while_noisy);
        assert!(AlertKind::ALL
            .iter()
            .filter_map(|kind| table.get(*kind))
            .filter(|policy| policy.safety_override)
            .all(|policy| policy.kind == AlertKind::HardOut));
        assert_eq!(
            table.get(AlertKind::NoisyOn).unwrap().cooldown,
            Some(Duration::from_secs(4))
        );
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority(3).is_less_urgent_than(Priority(2)));
        assert!(!Priority(2).is_less_urgent_than(Priority(2)));
        assert!(!Priority::SAFETY.is_less_urgent_than(Priority(4)));
        assert_eq!(LedState::Default.to_string(), "DEFAULT_GREEN");
    }
}
