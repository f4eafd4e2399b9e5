//! ADXL345 RPM monitor - live vibration and RPM estimate with CSV logging
//!
//! Usage:
//!   rpm-monitor --output spindle.csv --interval 0.1
//!   rpm-monitor --config monitor.toml --bus ft232h --probe
//!   rpm-monitor --bus linux --i2c-device /dev/i2c-1 --duration 2.5
//!   RUST_LOG=debug rpm-monitor --duration 30 --quiet

use adxl345_rpm_monitor::{
    Adxl345, BusError, BusTransport, ConsolePlot, CsvLog, DeviceError, Dispatcher, MonitorConfig,
    MonitorError, RunSummary, SamplingLoop, SimulatedBus,
};
use clap::{Parser, ValueEnum};
use env_logger::{Builder, Env};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BusKind {
    /// Built-in simulated ADXL345
    Sim,
    /// Linux i2c-dev adapter
    Linux,
    /// FTDI FT232H USB-to-I2C bridge
    Ft232h,
}

#[derive(Parser, Debug)]
#[command(name = "rpm-monitor")]
#[command(about = "Estimate RPM from ADXL345 vibration and log it to CSV", long_about = None)]
struct Args {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bus transport
    #[arg(long, value_enum, default_value = "sim")]
    bus: BusKind,

    /// FT232H channel index
    #[arg(long, default_value = "0")]
    channel: u32,

    /// Linux I2C adapter device
    #[arg(long, default_value = "/dev/i2c-1")]
    i2c_device: PathBuf,

    /// 7-bit device address (e.g. 0x53)
    #[arg(long, value_parser = parse_u8)]
    bus_address: Option<u8>,

    /// First data register (e.g. 0x32)
    #[arg(long, value_parser = parse_u8)]
    data_register: Option<u8>,

    /// Sensitivity in g per LSB
    #[arg(long)]
    sensitivity: Option<f64>,

    /// RPM clamp and alarm threshold
    #[arg(long)]
    rpm_threshold: Option<f64>,

    /// RPM per g of vibration magnitude
    #[arg(long)]
    conversion_factor: Option<f64>,

    /// Poll interval in seconds
    #[arg(short, long)]
    interval: Option<f64>,

    /// CSV output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Duration in seconds (optional, runs until Ctrl+C if omitted)
    #[arg(short, long, value_parser = parse_duration_secs)]
    duration: Option<f64>,

    /// Simulated vibration frequency in Hz
    #[arg(long, default_value = "25.0")]
    sim_frequency: f64,

    /// Simulated vibration amplitude in g
    #[arg(long, default_value = "1.0")]
    sim_amplitude: f64,

    /// Only print alarms, not every record
    #[arg(short, long)]
    quiet: bool,

    /// Check the device id before sampling
    #[arg(long)]
    probe: bool,
}

/// Parse a byte given as decimal or `0x`-prefixed hex
fn parse_u8(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("'{}' is not a byte value: {}", s, e))
}

/// Parse a run duration: finite and greater than zero
fn parse_duration_secs(s: &str) -> Result<f64, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", s, e))?;
    if !secs.is_finite() || secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
        return Err(format!("duration must be a positive number of seconds, got {}", s));
    }
    Ok(secs)
}

fn load_config(args: &Args) -> Result<MonitorConfig, MonitorError> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };

    let device = &mut config.device;
    if let Some(v) = args.bus_address {
        device.bus_address = v;
    }
    if let Some(v) = args.data_register {
        device.data_register = v;
    }
    if let Some(v) = args.sensitivity {
        device.sensitivity_g_per_lsb = v;
    }
    if let Some(v) = args.rpm_threshold {
        device.rpm_threshold = v;
    }
    if let Some(v) = args.conversion_factor {
        device.conversion_factor = v;
    }
    if let Some(v) = args.interval {
        device.poll_interval_seconds = v;
    }
    if let Some(path) = &args.output {
        config.output.csv_path = path.clone();
    }

    config.validate()?;
    Ok(config)
}

fn probe<B: BusTransport>(bus: &mut B, config: &MonitorConfig) -> Result<(), MonitorError> {
    let mut sensor = Adxl345::new(bus);
    let id = sensor.probe(&config.device)?;
    println!(
        "Found ADXL345 at 0x{:02X} (DEVID 0x{:02X})",
        config.device.bus_address, id
    );
    Ok(())
}

fn monitor<B: BusTransport>(
    mut bus: B,
    args: &Args,
    config: &MonitorConfig,
) -> Result<RunSummary, MonitorError> {
    if args.probe {
        probe(&mut bus, config)?;
    }

    let plot = ConsolePlot::stdout(config.device.rpm_threshold).quiet(args.quiet);
    let log = CsvLog::open(&config.output.csv_path)?;
    let dispatcher = Dispatcher::new()
        .with_plot(plot, config.output.plot_queue_capacity)?
        .with_log(log, config.output.log_queue_capacity)?;

    let mut sampler = SamplingLoop::new(bus, config.device.clone())
        .with_history_capacity(config.output.history_capacity)
        .with_max_duration(args.duration.map(Duration::from_secs_f64));

    // Setup Ctrl+C handler
    let stop = sampler.stop_handle();
    ctrlc::set_handler(move || stop.stop())
        .map_err(|e| MonitorError::InvalidParameter(format!("Ctrl+C handler: {}", e)))?;

    sampler.run(dispatcher)
}

fn report_error(err: &MonitorError) {
    eprintln!("\nError: {}", err);
    if let MonitorError::Device(DeviceError::BusFailure(BusError::NoAcknowledge { address })) = err {
        eprintln!("Nothing answered at 0x{:02X}. Please check:", address);
        eprintln!("  1. ADXL345 is connected to the I2C pins (SDA/SCL)");
        eprintln!("  2. SDO/ALT ADDRESS selects 0x53 (low) or 0x1D (high)");
        eprintln!("  3. Pull-up resistors are present on SDA/SCL lines");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e);
            std::process::exit(2);
        }
    };

    println!("ADXL345 RPM Monitor");
    println!("===================");
    match args.bus {
        BusKind::Sim => println!(
            "Bus: simulated ({:.1} Hz, {:.2} g)",
            args.sim_frequency, args.sim_amplitude
        ),
        BusKind::Linux => println!("Bus: Linux I2C {}", args.i2c_device.display()),
        BusKind::Ft232h => println!("Bus: FT232H channel {}", args.channel),
    }
    println!("Device address: 0x{:02X}", config.device.bus_address);
    println!("Poll interval: {:.3} s", config.device.poll_interval_seconds);
    println!("RPM threshold: {}", config.device.rpm_threshold);
    println!("Output file: {}", config.output.csv_path.display());
    if let Some(duration) = args.duration {
        println!("Duration: {} seconds", duration);
    } else {
        println!("Duration: continuous (Ctrl+C to stop)");
    }
    println!();

    let result = match args.bus {
        BusKind::Sim => {
            let bus = SimulatedBus::new(
                config.device.bus_address,
                args.sim_frequency,
                args.sim_amplitude,
            );
            monitor(bus, &args, &config)
        }
        #[cfg(target_os = "linux")]
        BusKind::Linux => match adxl345_rpm_monitor::open_linux_i2c(&args.i2c_device) {
            Ok(bus) => monitor(bus, &args, &config),
            Err(e) => Err(e.into()),
        },
        #[cfg(not(target_os = "linux"))]
        BusKind::Linux => Err(MonitorError::InvalidParameter(
            "the linux bus needs i2c-dev and is only available on Linux".to_string(),
        )),
        #[cfg(feature = "ft232h")]
        BusKind::Ft232h => match adxl345_rpm_monitor::Ft232hBus::open(args.channel) {
            Ok(bus) => monitor(bus, &args, &config),
            Err(e) => Err(e.into()),
        },
        #[cfg(not(feature = "ft232h"))]
        BusKind::Ft232h => Err(MonitorError::InvalidParameter(
            "FT232H support not compiled in; rebuild with --features ft232h".to_string(),
        )),
    };

    match result {
        Ok(summary) => {
            println!("\nRun complete!");
            println!("Records: {}", summary.records);
            println!("Failed reads: {}", summary.failed_ticks);
            println!("Alarms: {}", summary.alarms);
            println!("Elapsed time: {:.2} seconds", summary.elapsed.as_secs_f64());
            println!("Actual rate: {:.1} Hz", summary.record_rate());
            if summary.log_failures > 0 {
                println!("Unlogged records: {}", summary.log_failures);
            }
            println!("File: {}", config.output.csv_path.display());
            Ok(())
        }
        Err(e) => {
            report_error(&e);
            std::process::exit(1);
        }
    }
}
