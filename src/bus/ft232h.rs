//! FTDI FT232H USB-to-I2C bridge via libMPSSE

use super::ffi::*;
use super::BusTransport;
use crate::error::BusError;
use std::ptr;

/// I2C channel of an FT232H
///
/// The handle is not `Send`; open the bus on the thread that will run the
/// sampling loop.
pub struct Ft232hBus {
    handle: FT_HANDLE,
}

impl Ft232hBus {
    /// Open and configure I2C channel `channel_index` (usually 0)
    pub fn open(channel_index: u32) -> Result<Self, BusError> {
        let mut num_channels: DWORD = 0;
        let status = unsafe { I2C_GetNumChannels(&mut num_channels) };
        if status != FT_OK {
            return Err(status.into());
        }

        if num_channels == 0 {
            return Err(BusError::Transport("no FT232H I2C channels found".to_string()));
        }

        if channel_index >= num_channels {
            return Err(BusError::Transport(format!(
                "invalid channel index {} ({} available)",
                channel_index, num_channels
            )));
        }

        let mut handle: FT_HANDLE = ptr::null_mut();
        let status = unsafe { I2C_OpenChannel(channel_index, &mut handle) };
        if status != FT_OK {
            return Err(status.into());
        }

        let mut config = ChannelConfig {
            ClockRate: I2C_CLOCK_FAST_MODE,
            LatencyTimer: 1, // 1ms, lowest stable value
            Options: 0,
            Pin: 0,
            currentPinState: 0,
        };

        let status = unsafe { I2C_InitChannel(handle, &mut config) };
        if status != FT_OK {
            unsafe { I2C_CloseChannel(handle) };
            return Err(status.into());
        }

        log::info!("FT232H channel {} open at {} Hz", channel_index, I2C_CLOCK_FAST_MODE);
        Ok(Self { handle })
    }

    fn device_write(&mut self, address: u8, bytes: &[u8], options: DWORD) -> Result<(), BusError> {
        let mut transferred: DWORD = 0;
        let status = unsafe {
            I2C_DeviceWrite(
                self.handle,
                address,
                bytes.len() as DWORD,
                bytes.as_ptr(),
                &mut transferred,
                options,
            )
        };

        match status {
            FT_OK => Ok(()),
            FT_DEVICE_NOT_FOUND => Err(BusError::NoAcknowledge { address }),
            other => Err(other.into()),
        }
    }
}

impl BusTransport for Ft232hBus {
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusError> {
        let options = I2C_TRANSFER_OPTIONS_START_BIT
            | I2C_TRANSFER_OPTIONS_STOP_BIT
            | I2C_TRANSFER_OPTIONS_FAST_TRANSFER_BYTES;

        // With FAST_TRANSFER_BYTES the transferred count is in bits; status is authoritative
        self.device_write(address, &[register, value], options)
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, BusError> {
        // Register pointer without STOP, keeping the bus for the repeated START
        let options = I2C_TRANSFER_OPTIONS_START_BIT
            | I2C_TRANSFER_OPTIONS_BREAK_ON_NACK
            | I2C_TRANSFER_OPTIONS_FAST_TRANSFER_BYTES;
        self.device_write(address, &[register], options)?;

        let mut data = vec![0u8; length];
        let mut transferred: DWORD = 0;
        let options = I2C_TRANSFER_OPTIONS_START_BIT
            | I2C_TRANSFER_OPTIONS_STOP_BIT
            | I2C_TRANSFER_OPTIONS_NACK_LAST_BYTE
            | I2C_TRANSFER_OPTIONS_FAST_TRANSFER_BYTES;

        let status = unsafe {
            I2C_DeviceRead(
                self.handle,
                address,
                length as DWORD,
                data.as_mut_ptr(),
                &mut transferred,
                options,
            )
        };

        if status != FT_OK {
            return Err(status.into());
        }

        Ok(data)
    }
}

impl Drop for Ft232hBus {
    fn drop(&mut self) {
        unsafe {
            I2C_CloseChannel(self.handle);
        }
    }
}
