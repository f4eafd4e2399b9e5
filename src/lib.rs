//! Vibration-based RPM monitor for the ADXL345 accelerometer
//!
//! Polls an ADXL345 over a register bus at a fixed cadence, reduces each
//! 3-axis sample to a vibration magnitude, maps that to a clamped RPM
//! estimate and hands the resulting records to a live plot and a CSV log.
//!
//! ```text
//! BusTransport ─► Adxl345 ─► vibration_magnitude ─► to_rpm ─► SamplingLoop ─┬─► PlotConsumer
//!                                                                            └─► LogConsumer
//! ```
//!
//! # Quick Start
//!
//! ## Reading a Sample
//! ```no_run
//! use adxl345_rpm_monitor::{vibration_magnitude, Adxl345, DeviceConfig, SimulatedBus};
//!
//! let config = DeviceConfig::default();
//! let mut sensor = Adxl345::new(SimulatedBus::new(config.bus_address, 25.0, 1.0));
//! sensor.initialize(&config)?;
//!
//! let sample = sensor.read_sample(&config)?;
//! println!("Vibration: {:.3}g", vibration_magnitude(&sample));
//! # Ok::<(), adxl345_rpm_monitor::DeviceError>(())
//! ```
//!
//! ## Monitoring Until Interrupted
//! ```no_run
//! use adxl345_rpm_monitor::{ConsolePlot, CsvLog, Dispatcher, MonitorConfig, SamplingLoop, SimulatedBus};
//!
//! let config = MonitorConfig::default();
//! let dispatcher = Dispatcher::new()
//!     .with_plot(ConsolePlot::stdout(config.device.rpm_threshold), config.output.plot_queue_capacity)?
//!     .with_log(CsvLog::open(&config.output.csv_path)?, config.output.log_queue_capacity)?;
//!
//! let bus = SimulatedBus::new(config.device.bus_address, 25.0, 1.0);
//! let mut sampler = SamplingLoop::new(bus, config.device.clone());
//!
//! let stop = sampler.stop_handle();
//! ctrlc::set_handler(move || stop.stop())?;
//!
//! let summary = sampler.run(dispatcher)?;
//! println!("{} records at {:.1} Hz", summary.records, summary.record_rate());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Hardware
//! Any `embedded-hal` 1.0 I2C controller works through [`I2cBus`]. On Linux,
//! `open_linux_i2c("/dev/i2c-1")` opens the board's adapter. With the
//! `ft232h` feature, `Ft232hBus` drives an FTDI FT232H via libMPSSE.

pub mod adxl345;
pub mod bus;
pub mod config;
pub mod console;
pub mod consumer;
pub mod csv_log;
pub mod error;
pub mod record;
pub mod sampler;
pub mod vibration;

// Re-export public API
pub use adxl345::{decode_sample, AccelerationSample, Adxl345};
#[cfg(feature = "ft232h")]
pub use bus::Ft232hBus;
pub use bus::{BusTransport, I2cBus, SimFault, SimulatedBus};
#[cfg(target_os = "linux")]
pub use bus::{open_linux_i2c, LinuxI2cBus, DEFAULT_I2C_DEVICE};
pub use config::{DeviceConfig, MonitorConfig, OutputConfig};
pub use console::{create_bar, ConsolePlot};
pub use consumer::{ChannelPlot, DeliveryStats, Dispatcher, LogConsumer, PlotConsumer, PlotEvent};
pub use csv_log::CsvLog;
pub use error::{BusError, DeviceError, MonitorError, Result};
pub use record::{AlarmEvent, RecordHistory, SampleRecord, TimeKeeper};
pub use sampler::{LoopState, RunSummary, SamplingLoop, StopHandle};
pub use vibration::{raw_rpm, to_rpm, vibration_magnitude, Estimate};
