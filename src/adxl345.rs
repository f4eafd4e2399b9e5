//! ADXL345 accelerometer driver over a [`BusTransport`]

use crate::bus::BusTransport;
use crate::config::DeviceConfig;
use crate::error::DeviceError;

// ADXL345 register addresses
pub const REG_DEVID: u8 = 0x00;
pub const REG_POWER_CTL: u8 = 0x2D;
pub const REG_DATA_FORMAT: u8 = 0x31;
pub const REG_DATAX0: u8 = 0x32; // DATAX0..DATAZ1, little-endian pairs

/// Expected DEVID value
pub const DEVID_VALUE: u8 = 0xE5;

/// POWER_CTL: measure bit (standby -> continuous measurement)
pub const POWER_CTL_MEASURE: u8 = 0x08;

/// DATA_FORMAT: FULL_RES | range ±16g (3.9 mg/LSB at every range)
pub const DATA_FORMAT_FULL_RES_16G: u8 = 0x0B;

/// Bytes in one X/Y/Z sample block
pub const SAMPLE_BLOCK_LEN: usize = 6;

/// One 3-axis reading in g
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelerationSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelerationSample {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Decode a DATAX0..DATAZ1 block into g
///
/// Each axis is a little-endian two's-complement pair scaled by
/// `sensitivity` (g per LSB). Bytes past the sixth are ignored.
pub fn decode_sample(data: &[u8], sensitivity: f64) -> Result<AccelerationSample, DeviceError> {
    if data.len() < SAMPLE_BLOCK_LEN {
        return Err(DeviceError::ShortRead {
            expected: SAMPLE_BLOCK_LEN,
            actual: data.len(),
        });
    }

    let x = i16::from_le_bytes([data[0], data[1]]);
    let y = i16::from_le_bytes([data[2], data[3]]);
    let z = i16::from_le_bytes([data[4], data[5]]);

    Ok(AccelerationSample {
        x: f64::from(x) * sensitivity,
        y: f64::from(y) * sensitivity,
        z: f64::from(z) * sensitivity,
    })
}

/// ADXL345 sensor interface
///
/// Owns the bus exclusively; all device traffic goes through it.
pub struct Adxl345<B> {
    bus: B,
}

impl<B: BusTransport> Adxl345<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Put the device into continuous measurement at full resolution
    ///
    /// Issues exactly two register writes: POWER_CTL then DATA_FORMAT.
    pub fn initialize(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        self.bus
            .write_register(config.bus_address, REG_POWER_CTL, POWER_CTL_MEASURE)?;
        self.bus
            .write_register(config.bus_address, REG_DATA_FORMAT, DATA_FORMAT_FULL_RES_16G)?;
        log::debug!(
            "ADXL345 at 0x{:02X}: measurement mode, full resolution ±16g",
            config.bus_address
        );
        Ok(())
    }

    /// Read one sample from the data register
    pub fn read_sample(&mut self, config: &DeviceConfig) -> Result<AccelerationSample, DeviceError> {
        let data = self
            .bus
            .read_block(config.bus_address, config.data_register, SAMPLE_BLOCK_LEN)?;
        decode_sample(&data, config.sensitivity_g_per_lsb)
    }

    /// Check that the device at the configured address is an ADXL345
    ///
    /// Returns the DEVID byte on success.
    pub fn probe(&mut self, config: &DeviceConfig) -> Result<u8, DeviceError> {
        let data = self.bus.read_block(config.bus_address, REG_DEVID, 1)?;
        let id = *data.first().ok_or(DeviceError::ShortRead {
            expected: 1,
            actual: 0,
        })?;

        if id != DEVID_VALUE {
            return Err(DeviceError::UnexpectedDeviceId(id));
        }
        Ok(id)
    }

    /// Consume the driver and return the bus
    pub fn release(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{SimFault, SimulatedBus};
    use crate::error::BusError;
    use std::collections::VecDeque;

    /// Records writes and replays queued read results
    #[derive(Default)]
    struct ScriptedBus {
        writes: Vec<(u8, u8, u8)>,
        reads: VecDeque<Result<Vec<u8>, BusError>>,
        fail_writes: bool,
    }

    impl BusTransport for ScriptedBus {
        fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusError> {
            if self.fail_writes {
                return Err(BusError::NoAcknowledge { address });
            }
            self.writes.push((address, register, value));
            Ok(())
        }

        fn read_block(
            &mut self,
            _address: u8,
            _register: u8,
            _length: usize,
        ) -> Result<Vec<u8>, BusError> {
            self.reads
                .pop_front()
                .unwrap_or_else(|| Err(BusError::Timeout))
        }
    }

    #[test]
    fn test_initialize_writes_power_ctl_then_data_format() {
        let config = DeviceConfig::default();
        let mut sensor = Adxl345::new(ScriptedBus::default());
        sensor.initialize(&config).unwrap();

        let bus = sensor.release();
        assert_eq!(
            bus.writes,
            vec![(0x53, 0x2D, 0x08), (0x53, 0x31, 0x0B)]
        );
    }

    #[test]
    fn test_initialize_surfaces_bus_failure() {
        let bus = ScriptedBus {
            fail_writes: true,
            ..Default::default()
        };
        let mut sensor = Adxl345::new(bus);
        let err = sensor.initialize(&DeviceConfig::default()).unwrap_err();
        assert!(matches!(err, DeviceError::BusFailure(BusError::NoAcknowledge { .. })));
    }

    #[test]
    fn test_decode_zero_block() {
        let sample = decode_sample(&[0, 0, 0, 0, 0, 0], 0.0039).unwrap();
        assert_eq!(sample, AccelerationSample::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_decode_little_endian_per_axis() {
        // x = 256 (lo=0, hi=1), y = -1, z = 0x1234
        let sample = decode_sample(&[0x00, 0x01, 0xFF, 0xFF, 0x34, 0x12], 0.0039).unwrap();
        assert!((sample.x - 256.0 * 0.0039).abs() < 1e-12);
        assert!((sample.y + 0.0039).abs() < 1e-12);
        assert!((sample.z - f64::from(0x1234_i16) * 0.0039).abs() < 1e-12);
    }

    #[test]
    fn test_decode_extremes() {
        let sample = decode_sample(&[0x00, 0x80, 0xFF, 0x7F, 0, 0], 1.0).unwrap();
        assert_eq!(sample.x, -32768.0);
        assert_eq!(sample.y, 32767.0);
    }

    #[test]
    fn test_short_block_is_rejected() {
        let err = decode_sample(&[1, 2, 3, 4], 0.0039).unwrap_err();
        assert_eq!(
            err,
            DeviceError::ShortRead {
                expected: 6,
                actual: 4
            }
        );
    }

    #[test]
    fn test_read_sample_scales_by_configured_sensitivity() {
        let mut bus = ScriptedBus::default();
        bus.reads.push_back(Ok(vec![0x00, 0x01, 0, 0, 0, 0]));
        let mut sensor = Adxl345::new(bus);

        let sample = sensor.read_sample(&DeviceConfig::default()).unwrap();
        assert!((sample.x - 0.9984).abs() < 1e-9);
        assert_eq!(sample.y, 0.0);
        assert_eq!(sample.z, 0.0);
    }

    #[test]
    fn test_read_sample_propagates_transport_fault() {
        let mut bus = ScriptedBus::default();
        bus.reads.push_back(Err(BusError::Timeout));
        let mut sensor = Adxl345::new(bus);

        assert_eq!(
            sensor.read_sample(&DeviceConfig::default()),
            Err(DeviceError::BusFailure(BusError::Timeout))
        );
    }

    #[test]
    fn test_short_read_from_simulated_bus() {
        let config = DeviceConfig::default();
        let mut bus = SimulatedBus::new(config.bus_address, 30.0, 0.5);
        bus.inject_fault(SimFault::Short(3));
        let mut sensor = Adxl345::new(bus);
        sensor.initialize(&config).unwrap();

        assert_eq!(
            sensor.read_sample(&config),
            Err(DeviceError::ShortRead {
                expected: 6,
                actual: 3
            })
        );
    }

    #[test]
    fn test_probe_accepts_adxl345() {
        let config = DeviceConfig::default();
        let mut sensor = Adxl345::new(SimulatedBus::new(config.bus_address, 30.0, 0.5));
        assert_eq!(sensor.probe(&config).unwrap(), DEVID_VALUE);
    }

    #[test]
    fn test_probe_rejects_other_parts() {
        let mut bus = ScriptedBus::default();
        bus.reads.push_back(Ok(vec![0x68]));
        let mut sensor = Adxl345::new(bus);
        assert_eq!(
            sensor.probe(&DeviceConfig::default()),
            Err(DeviceError::UnexpectedDeviceId(0x68))
        );
    }
}
