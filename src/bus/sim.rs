//! Simulated ADXL345 on a vibrating mount

use super::BusTransport;
use crate::adxl345::{
    DEVID_VALUE, POWER_CTL_MEASURE, REG_DATAX0, REG_DEVID, REG_POWER_CTL, SAMPLE_BLOCK_LEN,
};
use crate::error::BusError;
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::time::Instant;

const REGISTER_COUNT: usize = 0x40;

/// Full-resolution scale factor of the simulated part (g per LSB)
const SIM_SCALE_G_PER_LSB: f64 = 0.0039;

/// Fault to inject into the next sample read
#[derive(Debug, Clone, PartialEq)]
pub enum SimFault {
    /// Fail the read with this transport error
    Bus(BusError),
    /// Return only this many bytes
    Short(usize),
}

/// In-process stand-in for an ADXL345 behind a bus
///
/// Reports 1 g on Z plus a sinusoidal vibration on X/Y once the measure bit
/// is set in POWER_CTL. Until then the data registers read zero, as they do
/// on the real part after power-up.
pub struct SimulatedBus {
    address: u8,
    registers: [u8; REGISTER_COUNT],
    frequency_hz: f64,
    amplitude_g: f64,
    start: Instant,
    faults: VecDeque<SimFault>,
    sample_reads: u64,
}

impl SimulatedBus {
    /// Create a device at `address` vibrating at `frequency_hz` with peak `amplitude_g`
    pub fn new(address: u8, frequency_hz: f64, amplitude_g: f64) -> Self {
        let mut registers = [0u8; REGISTER_COUNT];
        registers[REG_DEVID as usize] = DEVID_VALUE;

        Self {
            address,
            registers,
            frequency_hz,
            amplitude_g,
            start: Instant::now(),
            faults: VecDeque::new(),
            sample_reads: 0,
        }
    }

    /// Queue a fault for an upcoming sample read (FIFO order)
    pub fn inject_fault(&mut self, fault: SimFault) {
        self.faults.push_back(fault);
    }

    /// Current value of a register
    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize % REGISTER_COUNT]
    }

    /// Number of sample block reads served, including failed ones
    pub fn sample_reads(&self) -> u64 {
        self.sample_reads
    }

    fn measuring(&self) -> bool {
        self.registers[REG_POWER_CTL as usize] & POWER_CTL_MEASURE != 0
    }

    fn refresh_data_registers(&mut self) {
        let (x, y, z) = if self.measuring() {
            let phase = TAU * self.frequency_hz * self.start.elapsed().as_secs_f64();
            (
                self.amplitude_g * phase.sin(),
                0.5 * self.amplitude_g * phase.cos(),
                1.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let base = REG_DATAX0 as usize;
        for (i, g) in [x, y, z].into_iter().enumerate() {
            let counts = (g / SIM_SCALE_G_PER_LSB).round() as i16;
            let [lo, hi] = counts.to_le_bytes();
            self.registers[base + 2 * i] = lo;
            self.registers[base + 2 * i + 1] = hi;
        }
    }
}

impl BusTransport for SimulatedBus {
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusError> {
        if address != self.address {
            return Err(BusError::NoAcknowledge { address });
        }
        self.registers[register as usize % REGISTER_COUNT] = value;
        Ok(())
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, BusError> {
        if address != self.address {
            return Err(BusError::NoAcknowledge { address });
        }

        let mut length = length;
        if register == REG_DATAX0 && length == SAMPLE_BLOCK_LEN {
            self.sample_reads += 1;
            match self.faults.pop_front() {
                Some(SimFault::Bus(err)) => return Err(err),
                Some(SimFault::Short(n)) => length = n.min(length),
                None => {}
            }
            self.refresh_data_registers();
        }

        let start = (register as usize).min(REGISTER_COUNT);
        let end = (start + length).min(REGISTER_COUNT);
        Ok(self.registers[start..end].to_vec())
    }
}
