use crate::config::TimerConfig;
use crate::events::AlertKind;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Point in a rotation round worth announcing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Warning,
    /// Carries the round counter after the swap
    Swap { round: u32 },
}

impl Milestone {
    pub fn alert(&self) -> AlertKind {
        match self {
            Milestone::Warning => AlertKind::AlarmWarning,
            Milestone::Swap { .. } => AlertKind::AlarmOn,
        }
    }
}

/// Fixed-length task rotation rounds.
///
/// Polled from the arbitration tick; each milestone fires at most once per
/// round. The warning offset depends on how many swaps have happened so far,
/// so the first `early_rounds` rounds get a longer preparation window.
#[derive(Debug, Clone)]
pub struct RotationTimer {
    enabled: bool,
    cycle: Duration,
    swap_at: Duration,
    early_warn_at: Duration,
    late_warn_at: Duration,
    early_rounds: u32,

    round: u32,
    cycle_start: Instant,
    warned: bool,
    swapped: bool,
    paused: bool,
}

impl RotationTimer {
    pub fn new(config: &TimerConfig, now: Instant) -> Self {
        Self {
            enabled: config.enabled,
            cycle: config.cycle(),
            swap_at: config.swap_at(),
            early_warn_at: config.early_warn_at(),
            late_warn_at: config.late_warn_at(),
            early_rounds: config.early_rounds,
            round: 0,
            cycle_start: now,
            warned: false,
            swapped: false,
            paused: false,
        }
    }

    /// Begin round zero at `now` and resume if paused
    pub fn restart(&mut self, now: Instant) {
        self.round = 0;
        self.cycle_start = now;
        self.warned = false;
        self.swapped = false;
        self.paused = false;
        debug!("Rotation timer restarted");
    }

    pub fn pause(&mut self) {
        if !self.paused {
            info!("Rotation timer paused after round {}", self.round);
        }
        self.paused = true;
    }

    pub fn poll(&mut self, now: Instant) -> Option<Milestone> {
        if !self.enabled || self.paused || self.cycle.is_zero() {
            return None;
        }

        let mut elapsed = now.saturating_duration_since(self.cycle_start);
        while elapsed >= self.cycle {
            self.cycle_start += self.cycle;
            elapsed -= self.cycle;
            self.warned = false;
            self.swapped = false;
        }

        // A late poll past the swap skips the now pointless warning
        if !self.swapped && elapsed >= self.swap_at {
            self.swapped = true;
            self.warned = true;
            self.round += 1;
            return Some(Milestone::Swap { round: self.round });
        }

        if !self.warned && elapsed >= self.warn_at() {
            self.warned = true;
            return Some(Milestone::Warning);
        }

        None
    }

    /// Warning offset for the round in progress
    pub fn warn_at(&self) -> Duration {
        if self.round < self.early_rounds {
            self.early_warn_at
        } else {
            self.late_warn_at
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_running(&self) -> bool {
        self.enabled && !self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    /// Poll every 50ms over `[from, to)` seconds
    fn collect(timer: &mut RotationTimer, t0: Instant, from: u64, to: u64) -> Vec<(u64, Milestone)> {
        (from * 20..to * 20)
            .filter_map(|step| {
                let at = Duration::from_millis(step * 50);
                timer.poll(t0 + at).map(|m| (at.as_millis() as u64, m))
            })
            .collect()
    }

    #[test]
    fn test_first_round_milestones() {
        let t0 = Instant::now();
        let mut timer = RotationTimer::new(&StationConfig::default().timer, t0);

        assert_eq!(
            collect(&mut timer, t0, 0, 70),
            vec![
                (50_000, Milestone::Warning),
                (60_000, Milestone::Swap { round: 1 }),
            ]
        );
        assert_eq!(timer.round(), 1);
    }

    #[test]
    fn test_warning_window_shrinks_after_early_rounds() {
        let t0 = Instant::now();
        let mut timer = RotationTimer::new(&StationConfig::default().timer, t0);

        let events = collect(&mut timer, t0, 0, 280);
        let warnings: Vec<u64> = events
            .iter()
            .filter(|(_, m)| *m == Milestone::Warning)
            .map(|(at, _)| *at)
            .collect();

        assert_eq!(warnings, vec![50_000, 120_000, 190_000, 265_000]);
        assert_eq!(timer.round(), 4);
        assert_eq!(timer.warn_at(), secs(55));
    }

    #[test]
    fn test_restart_resets_round_mid_cycle() {
        let t0 = Instant::now();
        let mut timer = RotationTimer::new(&StationConfig::default().timer, t0);

        collect(&mut timer, t0, 0, 230);
        assert_eq!(timer.round(), 3);
        assert_eq!(timer.warn_at(), secs(55));

        let restart_at = t0 + Duration::from_millis(230_500);
        timer.restart(restart_at);
        assert_eq!(timer.round(), 0);
        assert_eq!(timer.warn_at(), secs(50));

        assert_eq!(timer.poll(restart_at + secs(49)), None);
        assert_eq!(timer.poll(restart_at + secs(50)), Some(Milestone::Warning));
    }

    #[test]
    fn test_late_poll_skips_stale_warning() {
        let t0 = Instant::now();
        let mut timer = RotationTimer::new(&StationConfig::default().timer, t0);

        assert_eq!(timer.poll(t0 + secs(61)), Some(Milestone::Swap { round: 1 }));
        assert_eq!(timer.poll(t0 + secs(62)), None);
        assert_eq!(timer.poll(t0 + secs(120)), Some(Milestone::Warning));
    }

    #[test]
    fn test_pause_and_disable() {
        let t0 = Instant::now();
        let mut timer = RotationTimer::new(&StationConfig::default().timer, t0);

        timer.pause();
        assert!(!timer.is_running());
        assert_eq!(timer.poll(t0 + secs(50)), None);

        timer.restart(t0 + secs(100));
        assert!(timer.is_running());
        assert_eq!(timer.poll(t0 + secs(150)), Some(Milestone::Warning));

        let mut config = StationConfig::default().timer;
        config.enabled = false;
        let mut disabled = RotationTimer::new(&config, t0);
        assert!(collect(&mut disabled, t0, 0, 140).is_empty());
    }
}
