//! Linux i2c-dev bus (`/dev/i2c-N`)

use super::I2cBus;
use crate::error::BusError;
use linux_embedded_hal::I2cdev;
use std::path::Path;

/// Default adapter on a Raspberry Pi
pub const DEFAULT_I2C_DEVICE: &str = "/dev/i2c-1";

/// [`I2cBus`] over a Linux i2c-dev adapter
pub type LinuxI2cBus = I2cBus<I2cdev>;

/// Open a Linux I2C adapter such as `/dev/i2c-1`
pub fn open_linux_i2c<P: AsRef<Path>>(device: P) -> Result<LinuxI2cBus, BusError> {
    let device = device.as_ref();
    let i2c = I2cdev::new(device)
        .map_err(|e| BusError::Transport(format!("{}: {}", device.display(), e)))?;

    log::info!("Opened I2C adapter {}", device.display());
    Ok(I2cBus::new(i2c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_adapter_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("i2c-99");

        match open_linux_i2c(&missing) {
            Err(BusError::Transport(message)) => assert!(message.contains("i2c-99")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("opened a nonexistent adapter"),
        }
    }
}
