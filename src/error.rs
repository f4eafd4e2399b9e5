//! Error types for the RPM monitor

use thiserror::Error;

#[cfg(feature = "ft232h")]
use crate::bus::ffi::{status_to_string, FT_OK, FT_STATUS};

/// Transport-level fault reported by a [`BusTransport`](crate::bus::BusTransport)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    /// Nothing acknowledged the address (device missing or wired wrong)
    #[error("No acknowledge from device at 0x{address:02X}")]
    NoAcknowledge { address: u8 },

    /// Bus transaction timed out
    #[error("Bus timeout")]
    Timeout,

    /// Any other transport failure
    #[error("Bus transport error: {0}")]
    Transport(String),

    /// FTDI driver error
    #[cfg(feature = "ft232h")]
    #[error("FTDI error: {status} ({description})")]
    Ftdi {
        status: FT_STATUS,
        description: String,
    },
}

#[cfg(feature = "ft232h")]
impl From<FT_STATUS> for BusError {
    fn from(status: FT_STATUS) -> Self {
        debug_assert!(status != FT_OK, "FT_OK is not an error");
        BusError::Ftdi {
            status,
            description: status_to_string(status).to_string(),
        }
    }
}

/// Error type for accelerometer operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The underlying transport reported a fault
    #[error("Bus failure: {0}")]
    BusFailure(#[from] BusError),

    /// Fewer bytes came back than the sample block needs
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// DEVID register did not read back the ADXL345 signature
    #[error("Unexpected device id: expected 0xE5, got 0x{0:02X}")]
    UnexpectedDeviceId(u8),
}

/// Top-level error for the monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Sensor error
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// File I/O error (CSV log, config file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed or serialized
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// `run` was called on a loop that already ran
    #[error("Sampling loop already started")]
    AlreadyStarted,
}

impl From<BusError> for MonitorError {
    fn from(err: BusError) -> Self {
        MonitorError::Device(DeviceError::BusFailure(err))
    }
}

impl From<toml::de::Error> for MonitorError {
    fn from(err: toml::de::Error) -> Self {
        MonitorError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MonitorError {
    fn from(err: toml::ser::Error) -> Self {
        MonitorError::Config(err.to_string())
    }
}

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;
