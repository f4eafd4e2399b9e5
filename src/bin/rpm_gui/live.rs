//! Sampling thread management

use crate::state::{BusChoice, MonitorHandle};
use adxl345_rpm_monitor::{
    BusTransport, ChannelPlot, CsvLog, Dispatcher, MonitorConfig, MonitorError, RunSummary,
    SamplingLoop, SimulatedBus, StopHandle,
};
use crossbeam_channel::{bounded, Sender};
use std::thread;

/// Result of attempting to start a run
pub enum StartResult {
    Success(MonitorHandle),
    Error(String),
}

/// Start a sampling run on its own thread
///
/// The bus is opened on the sampling thread, since the FT232H handle cannot
/// move between threads. We wait for the thread to report that the bus and
/// log are ready so the user gets immediate error feedback.
///
/// The event channel holds at most `plot_queue_capacity` events; when the
/// UI falls behind, the oldest are discarded.
pub fn start_monitor(config: MonitorConfig, bus: BusChoice) -> StartResult {
    let (plot, events_rx) = ChannelPlot::bounded(config.output.plot_queue_capacity);
    let plot_dropped = plot.drop_counter();
    let (ready_tx, ready_rx) = bounded::<Result<StopHandle, String>>(1);

    let spawned = thread::Builder::new()
        .name("sampler".to_string())
        .spawn(move || run_sampler_thread(config, bus, plot, ready_tx));

    let thread = match spawned {
        Ok(thread) => thread,
        Err(e) => return StartResult::Error(format!("Failed to start sampler: {}", e)),
    };

    match ready_rx.recv() {
        Ok(Ok(stop)) => StartResult::Success(MonitorHandle::new(events_rx, plot_dropped, stop, thread)),
        Ok(Err(e)) => {
            let _ = thread.join();
            StartResult::Error(e)
        }
        Err(_) => {
            let _ = thread.join();
            StartResult::Error("Sampler thread exited during startup".to_string())
        }
    }
}

/// Sampler thread main
fn run_sampler_thread(
    config: MonitorConfig,
    bus: BusChoice,
    plot: ChannelPlot,
    ready: Sender<Result<StopHandle, String>>,
) -> Result<RunSummary, MonitorError> {
    match bus {
        BusChoice::Simulated {
            frequency_hz,
            amplitude_g,
        } => {
            let bus = SimulatedBus::new(config.device.bus_address, frequency_hz, amplitude_g);
            run_on_bus(bus, config, plot, ready)
        }
        #[cfg(target_os = "linux")]
        BusChoice::LinuxI2c { device } => match adxl345_rpm_monitor::open_linux_i2c(&device) {
            Ok(bus) => run_on_bus(bus, config, plot, ready),
            Err(e) => {
                let _ = ready.send(Err(format!("Failed to open {}: {}", device, e)));
                Err(e.into())
            }
        },
        #[cfg(feature = "ft232h")]
        BusChoice::Ft232h { channel } => match adxl345_rpm_monitor::Ft232hBus::open(channel) {
            Ok(bus) => run_on_bus(bus, config, plot, ready),
            Err(e) => {
                let _ = ready.send(Err(format!("Failed to open FT232H: {}", e)));
                Err(e.into())
            }
        },
    }
}

fn run_on_bus<B: BusTransport>(
    bus: B,
    config: MonitorConfig,
    plot: ChannelPlot,
    ready: Sender<Result<StopHandle, String>>,
) -> Result<RunSummary, MonitorError> {
    let dispatcher = match build_dispatcher(&config, plot) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            let _ = ready.send(Err(format!("Failed to open log: {}", e)));
            return Err(e);
        }
    };

    let mut sampler = SamplingLoop::new(bus, config.device.clone())
        .with_history_capacity(config.output.history_capacity);

    // Initialization errors arrive later through the event stream and join
    let _ = ready.send(Ok(sampler.stop_handle()));
    sampler.run(dispatcher)
}

fn build_dispatcher(config: &MonitorConfig, plot: ChannelPlot) -> Result<Dispatcher, MonitorError> {
    let log = CsvLog::open(&config.output.csv_path)?;
    Dispatcher::new()
        .with_plot(plot, config.output.plot_queue_capacity)?
        .with_log(log, config.output.log_queue_capacity)
}
