//! `embedded-hal` I2C adapter

use super::BusTransport;
use crate::error::BusError;
use embedded_hal::i2c::{ErrorKind, I2c};

/// [`BusTransport`] over any blocking `embedded-hal` 1.0 I2C controller
///
/// # Example
/// ```ignore
/// let i2c = linux_embedded_hal::I2cdev::new("/dev/i2c-1")?;
/// let bus = I2cBus::new(i2c);
/// ```
pub struct I2cBus<I2C> {
    i2c: I2C,
}

impl<I2C> I2cBus<I2C> {
    pub const fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Consume the adapter and return the I2C peripheral
    pub fn release(self) -> I2C {
        self.i2c
    }
}

fn map_error<E: embedded_hal::i2c::Error>(address: u8, err: E) -> BusError {
    match err.kind() {
        ErrorKind::NoAcknowledge(_) => BusError::NoAcknowledge { address },
        kind => BusError::Transport(format!("{:?}", kind)),
    }
}

impl<I2C: I2c> BusTransport for I2cBus<I2C> {
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusError> {
        self.i2c
            .write(address, &[register, value])
            .map_err(|e| map_error(address, e))
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, BusError> {
        // Register pointer write, repeated START, then the burst read
        let mut data = vec![0u8; length];
        self.i2c
            .write_read(address, &[register], &mut data)
            .map_err(|e| map_error(address, e))?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorType, NoAcknowledgeSource, Operation};

    /// Controller with a flat register file behind a single address
    struct FakeController {
        address: u8,
        registers: [u8; 64],
        pointer: usize,
        fail_with: Option<ErrorKind>,
    }

    impl FakeController {
        fn new(address: u8) -> Self {
            Self {
                address,
                registers: [0; 64],
                pointer: 0,
                fail_with: None,
            }
        }
    }

    impl ErrorType for FakeController {
        type Error = ErrorKind;
    }

    impl I2c for FakeController {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if let Some(kind) = self.fail_with {
                return Err(kind);
            }
            if address != self.address {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.pointer = bytes[0] as usize;
                        for (i, b) in bytes[1..].iter().enumerate() {
                            self.registers[self.pointer + i] = *b;
                        }
                    }
                    Operation::Read(buf) => {
                        for (i, b) in buf.iter_mut().enumerate() {
                            *b = self.registers[self.pointer + i];
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_write_then_read_block() {
        let mut bus = I2cBus::new(FakeController::new(0x53));
        bus.write_register(0x53, 0x32, 0x10).unwrap();
        bus.write_register(0x53, 0x33, 0x20).unwrap();

        let data = bus.read_block(0x53, 0x32, 2).unwrap();
        assert_eq!(data, vec![0x10, 0x20]);
    }

    #[test]
    fn test_missing_device_maps_to_no_acknowledge() {
        let mut bus = I2cBus::new(FakeController::new(0x53));
        let err = bus.read_block(0x1D, 0x32, 6).unwrap_err();
        assert_eq!(err, BusError::NoAcknowledge { address: 0x1D });
    }

    #[test]
    fn test_other_faults_map_to_transport() {
        let mut controller = FakeController::new(0x53);
        controller.fail_with = Some(ErrorKind::ArbitrationLoss);
        let mut bus = I2cBus::new(controller);

        let err = bus.write_register(0x53, 0x2D, 0x08).unwrap_err();
        assert!(matches!(err, BusError::Transport(_)));
    }
}
