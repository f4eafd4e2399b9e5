//! Register-level bus access
//!
//! The sensor driver only ever talks to a [`BusTransport`]. Three transports
//! ship with the crate:
//!
//! - [`I2cBus`] wraps any `embedded-hal` 1.0 I2C controller (Linux i2cdev,
//!   MCU HALs, ...)
//! - [`SimulatedBus`] models an ADXL345 on a vibrating mount, used by the
//!   demo mode and the tests
//! - `LinuxI2cBus` is an [`I2cBus`] over `/dev/i2c-N`, opened with
//!   `open_linux_i2c` (Linux only)
//! - `Ft232hBus` drives an FTDI FT232H through libMPSSE (feature `ft232h`)

use crate::error::BusError;

#[cfg(feature = "ft232h")]
pub(crate) mod ffi;
#[cfg(feature = "ft232h")]
mod ft232h;
mod i2c;
#[cfg(target_os = "linux")]
mod linux;
mod sim;

#[cfg(feature = "ft232h")]
pub use ft232h::Ft232hBus;
pub use i2c::I2cBus;
#[cfg(target_os = "linux")]
pub use linux::{open_linux_i2c, LinuxI2cBus, DEFAULT_I2C_DEVICE};
pub use sim::{SimFault, SimulatedBus};

/// Byte-level register access to a peripheral at a 7-bit bus address
///
/// Implementations are driven from a single thread; no transport is expected
/// to tolerate interleaved transactions.
pub trait BusTransport {
    /// Write one byte to `register` of the device at `address`
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusError>;

    /// Read up to `length` consecutive bytes starting at `register`
    ///
    /// A transport may return fewer bytes than requested; callers decide
    /// whether that is an error.
    fn read_block(&mut self, address: u8, register: u8, length: usize)
        -> Result<Vec<u8>, BusError>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusError> {
        (**self).write_register(address, register, value)
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, BusError> {
        (**self).read_block(address, register, length)
    }
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusError> {
        (**self).write_register(address, register, value)
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, BusError> {
        (**self).read_block(address, register, length)
    }
}
