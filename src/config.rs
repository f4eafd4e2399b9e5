//! Monitor configuration
//!
//! Loaded from a TOML file with two optional tables:
//!
//! ```toml
//! [device]
//! bus_address = 0x53
//! data_register = 0x32
//! sensitivity_g_per_lsb = 0.0039
//! rpm_threshold = 3000.0
//! conversion_factor = 100.0
//! poll_interval_seconds = 0.1
//!
//! [output]
//! csv_path = "rpm_data.csv"
//! history_capacity = 600
//! ```
//!
//! Every key has a default, so an empty file is a valid configuration.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIN_POLL_INTERVAL_SECS: f64 = 0.001;
const MAX_POLL_INTERVAL_SECS: f64 = 60.0;

mod defaults {
    use std::path::PathBuf;

    pub fn bus_address() -> u8 {
        0x53
    }
    pub fn data_register() -> u8 {
        0x32
    }
    pub fn sensitivity_g_per_lsb() -> f64 {
        0.0039
    }
    pub fn rpm_threshold() -> f64 {
        3000.0
    }
    pub fn conversion_factor() -> f64 {
        100.0
    }
    pub fn poll_interval_seconds() -> f64 {
        0.1
    }
    pub fn csv_path() -> PathBuf {
        PathBuf::from("rpm_data.csv")
    }
    pub fn history_capacity() -> usize {
        600 // one minute at the default 10 Hz
    }
    pub fn plot_queue_capacity() -> usize {
        64
    }
    pub fn log_queue_capacity() -> usize {
        1024
    }
}

/// Sensor and conversion constants, fixed for the lifetime of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// 7-bit bus address of the accelerometer
    #[serde(default = "defaults::bus_address")]
    pub bus_address: u8,

    /// First register of the X/Y/Z data block
    #[serde(default = "defaults::data_register")]
    pub data_register: u8,

    /// Scale factor, g per LSB
    #[serde(default = "defaults::sensitivity_g_per_lsb")]
    pub sensitivity_g_per_lsb: f64,

    /// Upper clamp for the RPM estimate, also the alarm level
    #[serde(default = "defaults::rpm_threshold")]
    pub rpm_threshold: f64,

    /// RPM per g of vibration magnitude
    #[serde(default = "defaults::conversion_factor")]
    pub conversion_factor: f64,

    /// Time between tick starts
    #[serde(default = "defaults::poll_interval_seconds")]
    pub poll_interval_seconds: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bus_address: defaults::bus_address(),
            data_register: defaults::data_register(),
            sensitivity_g_per_lsb: defaults::sensitivity_g_per_lsb(),
            rpm_threshold: defaults::rpm_threshold(),
            conversion_factor: defaults::conversion_factor(),
            poll_interval_seconds: defaults::poll_interval_seconds(),
        }
    }
}

impl DeviceConfig {
    /// Poll interval as a `Duration`
    ///
    /// Call [`validate`](Self::validate) first; out-of-range values are
    /// clamped here rather than panicking.
    pub fn poll_interval(&self) -> Duration {
        let secs = if self.poll_interval_seconds.is_finite() {
            self.poll_interval_seconds
                .clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS)
        } else {
            defaults::poll_interval_seconds()
        };
        Duration::from_secs_f64(secs)
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("sensitivity_g_per_lsb", self.sensitivity_g_per_lsb)?;
        check_positive("rpm_threshold", self.rpm_threshold)?;
        check_positive("conversion_factor", self.conversion_factor)?;
        check_positive("poll_interval_seconds", self.poll_interval_seconds)?;

        if !(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&self.poll_interval_seconds)
        {
            return Err(MonitorError::InvalidParameter(format!(
                "poll_interval_seconds must be between {} and {}, got {}",
                MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS, self.poll_interval_seconds
            )));
        }

        if self.bus_address > 0x7F {
            return Err(MonitorError::InvalidParameter(format!(
                "bus_address must be a 7-bit address, got 0x{:02X}",
                self.bus_address
            )));
        }

        Ok(())
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MonitorError::InvalidParameter(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

/// Where records go and how much is buffered on the way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// CSV log file, appended to across runs
    #[serde(default = "defaults::csv_path")]
    pub csv_path: PathBuf,

    /// Records kept in memory for the run summary and late-joining viewers
    #[serde(default = "defaults::history_capacity")]
    pub history_capacity: usize,

    /// Plot queue length; oldest entries are dropped when full
    #[serde(default = "defaults::plot_queue_capacity")]
    pub plot_queue_capacity: usize,

    /// Log queue length; the sampler waits when full, nothing is dropped
    #[serde(default = "defaults::log_queue_capacity")]
    pub log_queue_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: defaults::csv_path(),
            history_capacity: defaults::history_capacity(),
            plot_queue_capacity: defaults::plot_queue_capacity(),
            log_queue_capacity: defaults::log_queue_capacity(),
        }
    }
}

impl OutputConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("history_capacity", self.history_capacity),
            ("plot_queue_capacity", self.plot_queue_capacity),
            ("log_queue_capacity", self.log_queue_capacity),
        ] {
            if value == 0 {
                return Err(MonitorError::InvalidParameter(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl MonitorConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use adxl345_rpm_monitor::MonitorConfig;
    ///
    /// let config = MonitorConfig::from_file("rpm-monitor.toml")?;
    /// println!("Polling every {:?}", config.device.poll_interval());
    /// # Ok::<(), adxl345_rpm_monitor::MonitorError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;
        self.output.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.bus_address, 0x53);
        assert_eq!(config.data_register, 0x32);
        assert_eq!(config.sensitivity_g_per_lsb, 0.0039);
        assert_eq!(config.rpm_threshold, 3000.0);
        assert_eq!(config.conversion_factor, 100.0);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = MonitorConfig::from_toml_str("").unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_partial_device_table() {
        let config = MonitorConfig::from_toml_str(
            r#"
[device]
bus_address = 0x1D
poll_interval_seconds = 0.02

[output]
csv_path = "/tmp/spindle.csv"
"#,
        )
        .unwrap();

        assert_eq!(config.device.bus_address, 0x1D);
        assert_eq!(config.device.data_register, 0x32);
        assert_eq!(config.device.poll_interval(), Duration::from_millis(20));
        assert_eq!(config.output.csv_path, PathBuf::from("/tmp/spindle.csv"));
        assert_eq!(config.output.history_capacity, 600);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = MonitorConfig::from_toml_str("[device]\nbus_address = \"x\"").unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = DeviceConfig::default();
        config.conversion_factor = 0.0;
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::default();
        config.poll_interval_seconds = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::default();
        config.poll_interval_seconds = 120.0;
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::default();
        config.bus_address = 0x80;
        assert!(config.validate().is_err());

        let mut output = OutputConfig::default();
        output.plot_queue_capacity = 0;
        assert!(output.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");

        let mut config = MonitorConfig::default();
        config.device.rpm_threshold = 4500.0;
        config.to_file(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[device]"));
        assert!(contents.contains("[output]"));

        let loaded = MonitorConfig::from_file(&path).unwrap();
        assert_eq!(loaded.device.rpm_threshold, 4500.0);
    }
}
