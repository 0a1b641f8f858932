//! Loudness detection over a stream of audio block levels.
//!
//! A single loud block never fires: the detector averages the last
//! `hold_seconds` worth of blocks and applies a trigger/release band so the
//! state only flips on a sustained change.

use crate::config::{secs, NoiseConfig};
use crate::events::AlertKind;
use std::f64::consts::PI;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// RMS level of one block of samples in dBFS (full scale = 1.0)
pub fn block_dbfs(samples: &[f32]) -> f64 {
    let mean_square = if samples.is_empty() {
        0.0
    } else {
        samples
            .iter()
            .map(|s| f64::from(*s) * f64::from(*s))
            .sum::<f64>()
            / samples.len() as f64
    };
    let rms = (mean_square + 1e-12).sqrt();
    20.0 * (rms + 1e-12).log10()
}

/// First-order high-pass filter for removing table rumble and handling noise
#[derive(Debug, Clone)]
pub struct HighPass {
    alpha: f64,
    prev_input: f64,
    prev_output: f64,
}

impl HighPass {
    /// Returns `None` when the cutoff or sample rate is not positive
    pub fn new(sample_rate: f64, cutoff_hz: f64) -> Option<Self> {
        if !(sample_rate > 0.0 && cutoff_hz > 0.0) {
            return None;
        }

        let dt = 1.0 / sample_rate;
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        Some(Self {
            alpha: rc / (rc + dt),
            prev_input: 0.0,
            prev_output: 0.0,
        })
    }

    /// Filter a block in place; state carries over to the next block
    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let input = f64::from(*sample);
            let output = self.alpha * (self.prev_output + input - self.prev_input);
            self.prev_input = input;
            self.prev_output = output;
            *sample = output as f32;
        }
    }
}

/// Moving-average loudness detector with hysteresis
pub struct NoiseMonitor {
    ring: Vec<f64>,
    position: usize,
    trigger_dbfs: f64,
    release_dbfs: f64,
    repeat: Duration,
    loud: bool,
    last_emitted: Option<Instant>,
}

impl NoiseMonitor {
    pub fn new(config: &NoiseConfig) -> Self {
        let blocks = if config.block_seconds > 0.0 {
            (config.hold_seconds / config.block_seconds) as usize
        } else {
            1
        };
        let blocks = blocks.max(1);

        debug!(
            "Noise monitor averaging over {} blocks (trigger {:.1} dBFS, release {:.1} dBFS)",
            blocks, config.trigger_dbfs, config.release_dbfs
        );

        Self {
            ring: vec![config.release_dbfs - 20.0; blocks],
            position: 0,
            trigger_dbfs: config.trigger_dbfs,
            release_dbfs: config.release_dbfs,
            repeat: secs(config.repeat_seconds),
            loud: false,
            last_emitted: None,
        }
    }

    /// Record one block level. Returns `NoisyOn` on entering the loud state
    /// (and again every `repeat_seconds` while it lasts) and `NoisyOff` on
    /// returning to quiet.
    pub fn record(&mut self, dbfs: f64, now: Instant) -> Option<AlertKind> {
        if !dbfs.is_finite() {
            debug!("Ignoring non-finite level reading");
            return None;
        }

        self.ring[self.position] = dbfs;
        self.position = (self.position + 1) % self.ring.len();
        let average = self.average();

        if self.loud {
            if average <= self.release_dbfs {
                info!("Room quiet again ({:.1} dBFS)", average);
                self.loud = false;
                self.last_emitted = None;
                return Some(AlertKind::NoisyOff);
            }

            let due = self
                .last_emitted
                .map_or(true, |at| now.saturating_duration_since(at) >= self.repeat);
            if due {
                self.last_emitted = Some(now);
                return Some(AlertKind::NoisyOn);
            }
            return None;
        }

        if average >= self.trigger_dbfs {
            info!("Sustained noise detected ({:.1} dBFS)", average);
            self.loud = true;
            self.last_emitted = Some(now);
            return Some(AlertKind::NoisyOn);
        }

        None
    }

    pub fn average(&self) -> f64 {
        self.ring.iter().sum::<f64>() / self.ring.len() as f64
    }

    pub fn is_loud(&self) -> bool {
        self.loud
    }

    pub fn window_blocks(&self) -> usize {
        self.ring.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;

    fn short_window() -> NoiseConfig {
        NoiseConfig {
            trigger_dbfs: -28.0,
            release_dbfs: -32.0,
            hold_seconds: 1.0,
            block_seconds: 0.25,
            repeat_seconds: 1.0,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_block_level() {
        assert!(block_dbfs(&[]) < -100.0);
        assert!(block_dbfs(&[0.0; 64]) < -100.0);
        assert!(block_dbfs(&[1.0, -1.0, 1.0, -1.0]).abs() < 1e-6);

        let half = block_dbfs(&[0.5; 128]);
        assert!((half - (-6.0206)).abs() < 1e-3, "got {}", half);
    }

    #[test]
    fn test_high_pass_removes_dc() {
        assert!(HighPass::new(48_000.0, 0.0).is_none());

        let mut filter = HighPass::new(48_000.0, 100.0).unwrap();
        let mut block = vec![0.5f32; 4800];
        filter.process(&mut block);

        assert!(block[0] > 0.49);
        assert!(block[4799].abs() < 0.01, "tail {}", block[4799]);
        assert!(block_dbfs(&block[2400..]) < -40.0);
    }

    #[test]
    fn test_default_window_size() {
        let monitor = NoiseMonitor::new(&StationConfig::default().noise);
        assert_eq!(monitor.window_blocks(), 37);
        assert!(!monitor.is_loud());
        assert!((monitor.average() - (-52.0)).abs() < 1e-9);
    }

    #[test]
    fn test_single_loud_block_does_not_fire() {
        let mut monitor = NoiseMonitor::new(&StationConfig::default().noise);
        let t0 = Instant::now();

        assert_eq!(monitor.record(0.0, t0), None);
        for i in 1..20u64 {
            assert_eq!(monitor.record(-60.0, t0 + ms(i * 21)), None);
        }
        assert!(!monitor.is_loud());
    }

    #[test]
    fn test_sustained_noise_fires_after_average_crosses() {
        let mut monitor = NoiseMonitor::new(&StationConfig::default().noise);
        let t0 = Instant::now();

        let fired: Vec<usize> = (0..30usize)
            .filter(|i| monitor.record(-10.0, t0 + ms(*i as u64 * 21)).is_some())
            .collect();

        // 21 blocks leave the average at -28.2; the 22nd crosses
        assert_eq!(fired, vec![21]);
        assert!(monitor.is_loud());
    }

    #[test]
    fn test_hysteresis_and_release() {
        let mut monitor = NoiseMonitor::new(&short_window());
        let t0 = Instant::now();

        assert_eq!(monitor.record(-10.0, t0), None);
        assert_eq!(monitor.record(-10.0, t0 + ms(25)), None);
        assert_eq!(monitor.record(-10.0, t0 + ms(50)), Some(AlertKind::NoisyOn));

        // Average -22.5: still loud, repeat not yet due
        assert_eq!(monitor.record(-60.0, t0 + ms(75)), None);
        assert!(monitor.is_loud());

        // Average -35.0 drops below release
        assert_eq!(monitor.record(-60.0, t0 + ms(100)), Some(AlertKind::NoisyOff));
        assert!(!monitor.is_loud());

        // Average -30.0 sits inside the band: stays quiet
        let mut band = NoiseMonitor::new(&short_window());
        for (i, level) in [-30.0, -30.0, -30.0, -30.0].into_iter().enumerate() {
            assert_eq!(band.record(level, t0 + ms(i as u64 * 25)), None);
        }
        assert!(!band.is_loud());
    }

    #[test]
    fn test_repeats_while_loud() {
        let mut monitor = NoiseMonitor::new(&short_window());
        let t0 = Instant::now();

        let emitted: Vec<u64> = (0..=84u64)
            .filter_map(|i| {
                let at = i * 25;
                monitor.record(-10.0, t0 + ms(at)).map(|kind| {
                    assert_eq!(kind, AlertKind::NoisyOn);
                    at
                })
            })
            .collect();

        assert_eq!(emitted, vec![50, 1050, 2050]);
    }
}
