use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StationConfig {
    pub zones: ZonesConfig,
    pub tracking: TrackingConfig,
    pub noise: NoiseConfig,
    pub alerts: AlertsConfig,
    pub timer: TimerConfig,
    pub transport: TransportConfig,
    pub actuation: ActuationConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ZonesConfig {
    /// Zone polygon file written by the calibration tool
    #[serde(default = "default_zones_path")]
    pub zones_path: String,

    /// Marker id -> allowed region names
    #[serde(default = "default_allow_path")]
    pub allow_path: String,

    /// Region name that denotes the outer table boundary
    #[serde(default = "default_table_zone")]
    pub table_zone: String,

    /// Allowed regions for markers missing from the allow list
    #[serde(default = "default_allowed")]
    pub default_allowed: Vec<String>,

    /// Live camera frame width; zones are rescaled when it differs from the recorded frame
    #[serde(default)]
    pub frame_width: Option<u32>,

    /// Live camera frame height
    #[serde(default)]
    pub frame_height: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrackingConfig {
    /// Seconds outside the table before HARD_OUT is confirmed
    #[serde(default = "default_hard_out_on")]
    pub hard_out_on_seconds: f64,

    /// Seconds back on the table before hard-out clears
    #[serde(default = "default_hard_out_off")]
    pub hard_out_off_seconds: f64,

    /// Seconds outside every allowed region before MESSY_ON
    #[serde(default = "default_messy_on")]
    pub messy_on_seconds: f64,

    /// Seconds back inside an allowed region before MESSY_OFF
    #[serde(default = "default_messy_off")]
    pub messy_off_seconds: f64,

    /// Unseen for longer than this and the object is reset
    #[serde(default = "default_missing_timeout")]
    pub missing_timeout_seconds: f64,

    /// Observation gaps longer than this break a candidate run
    #[serde(default = "default_occlusion_grace")]
    pub occlusion_grace_seconds: f64,

    /// Missing-object sweep period
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NoiseConfig {
    /// Moving average at or above this level is loud
    #[serde(default = "default_trigger_dbfs")]
    pub trigger_dbfs: f64,

    /// Moving average at or below this level is quiet again
    #[serde(default = "default_release_dbfs")]
    pub release_dbfs: f64,

    /// Length of the moving-average window
    #[serde(default = "default_noise_hold")]
    pub hold_seconds: f64,

    /// Duration of one level reading (audio block)
    #[serde(default = "default_block_seconds")]
    pub block_seconds: f64,

    /// Minimum spacing between repeated NOISY_ON while loud
    #[serde(default = "default_repeat_seconds")]
    pub repeat_seconds: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AlertsConfig {
    /// Minimum spacing between two noise utterances
    #[serde(default = "default_noise_cooldown")]
    pub noise_cooldown_seconds: f64,

    #[serde(default = "default_hard_out_hold")]
    pub hard_out_hold_seconds: f64,

    #[serde(default = "default_messy_hold")]
    pub messy_hold_seconds: f64,

    #[serde(default = "default_noisy_hold")]
    pub noisy_hold_seconds: f64,

    #[serde(default = "default_quiet_hold")]
    pub quiet_hold_seconds: f64,

    #[serde(default = "default_alarm_on_hold")]
    pub alarm_on_hold_seconds: f64,

    #[serde(default = "default_end_hold")]
    pub end_hold_seconds: f64,

    /// First number spoken by the rotation countdown
    #[serde(default = "default_countdown_from")]
    pub countdown_from: u32,

    /// Pause between countdown numbers
    #[serde(default = "default_countdown_step")]
    pub countdown_step_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TimerConfig {
    /// Enable the task-rotation timer
    #[serde(default = "default_timer_enabled")]
    pub enabled: bool,

    /// Length of one rotation round
    #[serde(default = "default_cycle")]
    pub cycle_seconds: f64,

    /// Offset within the round at which tasks are swapped
    #[serde(default = "default_swap_at")]
    pub swap_at_seconds: f64,

    /// Warning offset used for the first `early_rounds` rounds
    #[serde(default = "default_early_warn_at")]
    pub early_warn_at_seconds: f64,

    /// Warning offset used afterwards
    #[serde(default = "default_late_warn_at")]
    pub late_warn_at_seconds: f64,

    /// Number of rounds that get the longer preparation window
    #[serde(default = "default_early_rounds")]
    pub early_rounds: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TransportConfig {
    /// UDP address the event hub listens on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest datagram accepted
    #[serde(default = "default_max_datagram")]
    pub max_datagram_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ActuationConfig {
    /// Serial device node of the LED/buzzer panel
    #[serde(default)]
    pub serial_device: Option<String>,

    /// Text-to-speech executable (e.g. "say", "espeak")
    #[serde(default)]
    pub speech_command: Option<String>,

    /// Speaking rate passed to the speech command
    #[serde(default = "default_speech_rate")]
    pub speech_rate: u32,

    /// Flag that precedes the rate argument
    #[serde(default = "default_speech_rate_flag")]
    pub speech_rate_flag: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Arbitration tick period (hold expiry, rotation timer)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Time allowed for each component to stop
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl StationConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("stationwatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("zones.zones_path", default_zones_path())?
            .set_default("zones.allow_path", default_allow_path())?
            .set_default("zones.table_zone", default_table_zone())?
            .set_default("zones.default_allowed", default_allowed())?
            .set_default("tracking.hard_out_on_seconds", default_hard_out_on())?
            .set_default("tracking.hard_out_off_seconds", default_hard_out_off())?
            .set_default("tracking.messy_on_seconds", default_messy_on())?
            .set_default("tracking.messy_off_seconds", default_messy_off())?
            .set_default(
                "tracking.missing_timeout_seconds",
                default_missing_timeout(),
            )?
            .set_default(
                "tracking.occlusion_grace_seconds",
                default_occlusion_grace(),
            )?
            .set_default("tracking.sweep_interval_ms", default_sweep_interval())?
            .set_default("noise.trigger_dbfs", default_trigger_dbfs())?
            .set_default("noise.release_dbfs", default_release_dbfs())?
            .set_default("noise.hold_seconds", default_noise_hold())?
            .set_default("noise.block_seconds", default_block_seconds())?
            .set_default("noise.repeat_seconds", default_repeat_seconds())?
            .set_default("alerts.noise_cooldown_seconds", default_noise_cooldown())?
            .set_default("alerts.hard_out_hold_seconds", default_hard_out_hold())?
            .set_default("alerts.messy_hold_seconds", default_messy_hold())?
            .set_default("alerts.noisy_hold_seconds", default_noisy_hold())?
            .set_default("alerts.quiet_hold_seconds", default_quiet_hold())?
            .set_default("alerts.alarm_on_hold_seconds", default_alarm_on_hold())?
            .set_default("alerts.end_hold_seconds", default_end_hold())?
            .set_default("alerts.countdown_from", default_countdown_from())?
            .set_default("alerts.countdown_step_ms", default_countdown_step())?
            .set_default("timer.enabled", default_timer_enabled())?
            .set_default("timer.cycle_seconds", default_cycle())?
            .set_default("timer.swap_at_seconds", default_swap_at())?
            .set_default("timer.early_warn_at_seconds", default_early_warn_at())?
            .set_default("timer.late_warn_at_seconds", default_late_warn_at())?
            .set_default("timer.early_rounds", default_early_rounds())?
            .set_default("transport.bind", default_bind())?
            .set_default(
                "transport.max_datagram_bytes",
                default_max_datagram() as i64,
            )?
            .set_default("actuation.speech_rate", default_speech_rate())?
            .set_default("actuation.speech_rate_flag", default_speech_rate_flag())?
            .set_default("system.tick_interval_ms", default_tick_interval())?
            .set_default(
                "system.shutdown_timeout_seconds",
                default_shutdown_timeout(),
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with STATIONWATCH_ prefix
            .add_source(
                Environment::with_prefix("STATIONWATCH")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("zones.default_allowed")
                    .try_parsing(true),
            )
            .build()?;

        let config: StationConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("tracking.messy_on_seconds", self.tracking.messy_on_seconds),
            ("tracking.hard_out_on_seconds", self.tracking.hard_out_on_seconds),
            (
                "tracking.missing_timeout_seconds",
                self.tracking.missing_timeout_seconds,
            ),
            ("noise.hold_seconds", self.noise.hold_seconds),
            ("noise.block_seconds", self.noise.block_seconds),
            ("timer.cycle_seconds", self.timer.cycle_seconds),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::Message(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        let non_negative = [
            ("tracking.hard_out_off_seconds", self.tracking.hard_out_off_seconds),
            ("tracking.messy_off_seconds", self.tracking.messy_off_seconds),
            (
                "tracking.occlusion_grace_seconds",
                self.tracking.occlusion_grace_seconds,
            ),
            ("noise.repeat_seconds", self.noise.repeat_seconds),
            ("alerts.noise_cooldown_seconds", self.alerts.noise_cooldown_seconds),
            ("alerts.hard_out_hold_seconds", self.alerts.hard_out_hold_seconds),
            ("alerts.messy_hold_seconds", self.alerts.messy_hold_seconds),
            ("alerts.noisy_hold_seconds", self.alerts.noisy_hold_seconds),
            ("alerts.quiet_hold_seconds", self.alerts.quiet_hold_seconds),
            ("alerts.alarm_on_hold_seconds", self.alerts.alarm_on_hold_seconds),
            ("alerts.end_hold_seconds", self.alerts.end_hold_seconds),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::Message(format!(
                    "{} must not be negative",
                    name
                )));
            }
        }

        if self.tracking.sweep_interval_ms == 0 || self.system.tick_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Sweep and tick intervals must be greater than 0".to_string(),
            ));
        }

        if self.timer.swap_at_seconds <= 0.0 || self.timer.swap_at_seconds >= self.timer.cycle_seconds
        {
            return Err(ConfigError::Message(
                "timer.swap_at_seconds must lie inside the rotation cycle".to_string(),
            ));
        }

        for warn_at in [
            self.timer.early_warn_at_seconds,
            self.timer.late_warn_at_seconds,
        ] {
            if warn_at < 0.0 || warn_at >= self.timer.swap_at_seconds {
                return Err(ConfigError::Message(
                    "Timer warning offsets must come before the swap offset".to_string(),
                ));
            }
        }

        if self.noise.release_dbfs > self.noise.trigger_dbfs {
            return Err(ConfigError::Message(
                "noise.release_dbfs must not exceed noise.trigger_dbfs".to_string(),
            ));
        }

        if self.zones.default_allowed.is_empty() {
            return Err(ConfigError::Message(
                "zones.default_allowed must name at least one region".to_string(),
            ));
        }

        if self.transport.max_datagram_bytes == 0 {
            return Err(ConfigError::Message(
                "transport.max_datagram_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl TrackingConfig {
    pub fn hard_out_on(&self) -> Duration {
        secs(self.hard_out_on_seconds)
    }

    pub fn hard_out_off(&self) -> Duration {
        secs(self.hard_out_off_seconds)
    }

    pub fn messy_on(&self) -> Duration {
        secs(self.messy_on_seconds)
    }

    pub fn messy_off(&self) -> Duration {
        secs(self.messy_off_seconds)
    }

    pub fn missing_timeout(&self) -> Duration {
        secs(self.missing_timeout_seconds)
    }

    pub fn occlusion_grace(&self) -> Duration {
        secs(self.occlusion_grace_seconds)
    }
}

impl TimerConfig {
    pub fn cycle(&self) -> Duration {
        secs(self.cycle_seconds)
    }

    pub fn swap_at(&self) -> Duration {
        secs(self.swap_at_seconds)
    }

    pub fn early_warn_at(&self) -> Duration {
        secs(self.early_warn_at_seconds)
    }

    pub fn late_warn_at(&self) -> Duration {
        secs(self.late_warn_at_seconds)
    }
}

/// Seconds from configuration; negative and NaN values clamp to zero
pub(crate) fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            zones: ZonesConfig {
                zones_path: default_zones_path(),
                allow_path: default_allow_path(),
                table_zone: default_table_zone(),
                default_allowed: default_allowed(),
                frame_width: None,
                frame_height: None,
            },
            tracking: TrackingConfig {
                hard_out_on_seconds: default_hard_out_on(),
                hard_out_off_seconds: default_hard_out_off(),
                messy_on_seconds: default_messy_on(),
                messy_off_seconds: default_messy_off(),
                missing_timeout_seconds: default_missing_timeout(),
                occlusion_grace_seconds: default_occlusion_grace(),
                sweep_interval_ms: default_sweep_interval(),
            },
            noise: NoiseConfig {
                trigger_dbfs: default_trigger_dbfs(),
                release_dbfs: default_release_dbfs(),
                hold_seconds: default_noise_hold(),
                block_seconds: default_block_seconds(),
                repeat_seconds: default_repeat_seconds(),
            },
            alerts: AlertsConfig {
                noise_cooldown_seconds: default_noise_cooldown(),
                hard_out_hold_seconds: default_hard_out_hold(),
                messy_hold_seconds: default_messy_hold(),
                noisy_hold_seconds: default_noisy_hold(),
                quiet_hold_seconds: default_quiet_hold(),
                alarm_on_hold_seconds: default_alarm_on_hold(),
                end_hold_seconds: default_end_hold(),
                countdown_from: default_countdown_from(),
                countdown_step_ms: default_countdown_step(),
            },
            timer: TimerConfig {
                enabled: default_timer_enabled(),
                cycle_seconds: default_cycle(),
                swap_at_seconds: default_swap_at(),
                early_warn_at_seconds: default_early_warn_at(),
                late_warn_at_seconds: default_late_warn_at(),
                early_rounds: default_early_rounds(),
            },
            transport: TransportConfig {
                bind: default_bind(),
                max_datagram_bytes: default_max_datagram(),
            },
            actuation: ActuationConfig {
                serial_device: None,
                speech_command: None,
                speech_rate: default_speech_rate(),
                speech_rate_flag: default_speech_rate_flag(),
            },
            system: SystemConfig {
                tick_interval_ms: default_tick_interval(),
                shutdown_timeout_seconds: default_shutdown_timeout(),
            },
        }
    }
}

// Default value functions
fn default_zones_path() -> String {
    "zones.json".to_string()
}
fn default_allow_path() -> String {
    "allow.json".to_string()
}
fn default_table_zone() -> String {
    "TABLE".to_string()
}
fn default_allowed() -> Vec<String> {
    vec!["TRAY".to_string(), "PLATE".to_string()]
}

fn default_hard_out_on() -> f64 {
    0.4
}
fn default_hard_out_off() -> f64 {
    0.0
}
fn default_messy_on() -> f64 {
    1.0
}
fn default_messy_off() -> f64 {
    0.8
}
fn default_missing_timeout() -> f64 {
    5.0
}
fn default_occlusion_grace() -> f64 {
    0.5
}
fn default_sweep_interval() -> u64 {
    100
}

fn default_trigger_dbfs() -> f64 {
    -28.0
}
fn default_release_dbfs() -> f64 {
    -32.0
}
fn default_noise_hold() -> f64 {
    0.8
}
fn default_block_seconds() -> f64 {
    1024.0 / 48000.0
} // One 1024-sample block at 48 kHz
fn default_repeat_seconds() -> f64 {
    1.0
}

fn default_noise_cooldown() -> f64 {
    4.0
}
fn default_hard_out_hold() -> f64 {
    4.2
}
fn default_messy_hold() -> f64 {
    4.2
}
fn default_noisy_hold() -> f64 {
    3.5
}
fn default_quiet_hold() -> f64 {
    3.5
}
fn default_alarm_on_hold() -> f64 {
    3.0
}
fn default_end_hold() -> f64 {
    4.8
}
fn default_countdown_from() -> u32 {
    5
}
fn default_countdown_step() -> u64 {
    1000
}

fn default_timer_enabled() -> bool {
    true
}
fn default_cycle() -> f64 {
    70.0
}
fn default_swap_at() -> f64 {
    60.0
}
fn default_early_warn_at() -> f64 {
    50.0
}
fn default_late_warn_at() -> f64 {
    55.0
}
fn default_early_rounds() -> u32 {
    3
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}
fn default_max_datagram() -> usize {
    1024
}

fn default_speech_rate() -> u32 {
    190
}
fn default_speech_rate_flag() -> String {
    "-r".to_string()
}

fn default_tick_interval() -> u64 {
    50
}
fn default_shutdown_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tracking.messy_on(), Duration::from_secs(1));
        assert_eq!(config.zones.default_allowed, vec!["TRAY", "PLATE"]);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[tracking]\nmessy_on_seconds = 2.5\n\n[timer]\nenabled = false\n\n[actuation]\nserial_device = \"/dev/ttyACM0\""
        )
        .unwrap();

        let config = StationConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.tracking.messy_on_seconds, 2.5);
        assert_eq!(config.tracking.messy_off_seconds, default_messy_off());
        assert!(!config.timer.enabled);
        assert_eq!(
            config.actuation.serial_device.as_deref(),
            Some("/dev/ttyACM0")
        );
        assert_eq!(config.transport.bind, "127.0.0.1:8787");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = StationConfig::load_from_file("/nonexistent/stationwatch.toml").unwrap();
        assert_eq!(config.alerts.noise_cooldown_seconds, 4.0);
        assert_eq!(config.timer.early_rounds, 3);
    }

    #[test]
    fn test_config_validation() {
        let mut config = StationConfig::default();

        config.timer.swap_at_seconds = 80.0;
        assert!(config.validate().is_err());
        config.timer.swap_at_seconds = 60.0;

        config.timer.late_warn_at_seconds = 61.0;
        assert!(config.validate().is_err());
        config.timer.late_warn_at_seconds = 55.0;

        config.noise.release_dbfs = -20.0;
        assert!(config.validate().is_err());
        config.noise.release_dbfs = -32.0;

        config.tracking.messy_on_seconds = 0.0;
        assert!(config.validate().is_err());
        config.tracking.messy_on_seconds = 1.0;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&StationConfig::default()).unwrap();
        assert!(rendered.contains("[tracking]"));
        assert!(rendered.contains("messy_on_seconds = 1.0"));
    }
}
