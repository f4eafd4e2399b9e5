//! Bindings for the subset of FTDI libMPSSE used by [`Ft232hBus`](super::Ft232hBus)
//!
//! Declarations follow `libmpsse_i2c.h` and `ftd2xx.h`.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::ffi::c_void;

pub type DWORD = u32;
pub type UCHAR = u8;
pub type USHORT = u16;
pub type LPDWORD = *mut DWORD;

pub type FT_STATUS = DWORD;
pub type FT_HANDLE = *mut c_void;

// FT_STATUS codes
pub const FT_OK: FT_STATUS = 0;
pub const FT_INVALID_HANDLE: FT_STATUS = 1;
pub const FT_DEVICE_NOT_FOUND: FT_STATUS = 2;
pub const FT_DEVICE_NOT_OPENED: FT_STATUS = 3;
pub const FT_IO_ERROR: FT_STATUS = 4;
pub const FT_INSUFFICIENT_RESOURCES: FT_STATUS = 5;
pub const FT_INVALID_PARAMETER: FT_STATUS = 6;
pub const FT_FAILED_TO_WRITE_DEVICE: FT_STATUS = 10;
pub const FT_INVALID_ARGS: FT_STATUS = 16;
pub const FT_NOT_SUPPORTED: FT_STATUS = 17;
pub const FT_OTHER_ERROR: FT_STATUS = 18;
// libMPSSE reports a missing ACK as FT_DEVICE_NOT_FOUND on I2C_DeviceWrite

pub const I2C_TRANSFER_OPTIONS_START_BIT: DWORD = 0x0000_0001;
pub const I2C_TRANSFER_OPTIONS_STOP_BIT: DWORD = 0x0000_0002;
pub const I2C_TRANSFER_OPTIONS_BREAK_ON_NACK: DWORD = 0x0000_0004;
pub const I2C_TRANSFER_OPTIONS_NACK_LAST_BYTE: DWORD = 0x0000_0008;
pub const I2C_TRANSFER_OPTIONS_FAST_TRANSFER_BYTES: DWORD = 0x0000_0010;

/// ADXL345 is a fast-mode (400 kHz) part
pub const I2C_CLOCK_FAST_MODE: DWORD = 400_000;

#[repr(C)]
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub ClockRate: DWORD,
    pub LatencyTimer: UCHAR,
    pub Options: DWORD,
    pub Pin: DWORD,
    pub currentPinState: USHORT,
}

#[link(name = "libmpsse")]
extern "C" {
    pub fn I2C_GetNumChannels(numChannels: *mut DWORD) -> FT_STATUS;

    pub fn I2C_OpenChannel(index: DWORD, handle: *mut FT_HANDLE) -> FT_STATUS;

    pub fn I2C_InitChannel(handle: FT_HANDLE, config: *mut ChannelConfig) -> FT_STATUS;

    pub fn I2C_CloseChannel(handle: FT_HANDLE) -> FT_STATUS;

    pub fn I2C_DeviceRead(
        handle: FT_HANDLE,
        deviceAddress: UCHAR,
        sizeToTransfer: DWORD,
        buffer: *mut UCHAR,
        sizeTransfered: LPDWORD,
        options: DWORD,
    ) -> FT_STATUS;

    pub fn I2C_DeviceWrite(
        handle: FT_HANDLE,
        deviceAddress: UCHAR,
        sizeToTransfer: DWORD,
        buffer: *const UCHAR,
        sizeTransfered: LPDWORD,
        options: DWORD,
    ) -> FT_STATUS;
}

/// Name of an FT_STATUS code for error messages
pub fn status_to_string(status: FT_STATUS) -> &'static str {
    match status {
        FT_OK => "FT_OK",
        FT_INVALID_HANDLE => "FT_INVALID_HANDLE",
        FT_DEVICE_NOT_FOUND => "FT_DEVICE_NOT_FOUND",
        FT_DEVICE_NOT_OPENED => "FT_DEVICE_NOT_OPENED",
        FT_IO_ERROR => "FT_IO_ERROR",
        FT_INSUFFICIENT_RESOURCES => "FT_INSUFFICIENT_RESOURCES",
        FT_INVALID_PARAMETER => "FT_INVALID_PARAMETER",
        FT_FAILED_TO_WRITE_DEVICE => "FT_FAILED_TO_WRITE_DEVICE",
        FT_INVALID_ARGS => "FT_INVALID_ARGS",
        FT_NOT_SUPPORTED => "FT_NOT_SUPPORTED",
        FT_OTHER_ERROR => "FT_OTHER_ERROR",
        _ => "UNKNOWN_ERROR",
    }
}
