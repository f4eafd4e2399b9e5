//! Application state management

use adxl345_rpm_monitor::{
    AlarmEvent, MonitorConfig, MonitorError, PlotEvent, RecordHistory, RunSummary, StopHandle,
};
use crossbeam_channel::Receiver;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Alarm markers kept for the plot
const MAX_ALARM_MARKERS: usize = 500;

/// Which bus the next run uses
#[derive(Debug, Clone, PartialEq)]
pub enum BusChoice {
    Simulated { frequency_hz: f64, amplitude_g: f64 },
    #[cfg(target_os = "linux")]
    LinuxI2c { device: String },
    #[cfg(feature = "ft232h")]
    Ft232h { channel: u32 },
}

impl Default for BusChoice {
    fn default() -> Self {
        BusChoice::Simulated {
            frequency_hz: 25.0,
            amplitude_g: 1.0,
        }
    }
}

/// Main application state
pub struct AppState {
    /// Settings for the next run; locked while running
    pub config: MonitorConfig,
    pub bus: BusChoice,

    /// Running sampler, if any
    pub handle: Option<MonitorHandle>,

    /// Records received from the plot channel
    pub history: RecordHistory,
    pub alarms: VecDeque<AlarmEvent>,
    pub alarm_count: u64,

    /// Outcome of the last finished run
    pub last_summary: Option<RunSummary>,

    /// Display is paused (history still fills)
    pub paused: bool,

    /// Time window to display (seconds)
    pub time_window: f64,

    /// CSV path as typed in the sidebar
    pub csv_path_text: String,

    /// Status message
    pub status: String,

    /// Error message
    pub error: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        let config = MonitorConfig::default();
        Self {
            csv_path_text: config.output.csv_path.display().to_string(),
            history: RecordHistory::new(config.output.history_capacity),
            config,
            bus: BusChoice::default(),
            handle: None,
            alarms: VecDeque::new(),
            alarm_count: 0,
            last_summary: None,
            paused: false,
            time_window: 30.0,
            status: String::from("Ready"),
            error: None,
        }
    }
}

impl AppState {
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Clear plot data before a new run
    pub fn reset_run(&mut self) {
        self.history = RecordHistory::new(self.config.output.history_capacity);
        self.alarms.clear();
        self.alarm_count = 0;
        self.last_summary = None;
    }

    pub fn push_alarm(&mut self, alarm: AlarmEvent) {
        if self.alarms.len() >= MAX_ALARM_MARKERS {
            self.alarms.pop_front();
        }
        self.alarms.push_back(alarm);
        self.alarm_count += 1;
    }
}

/// Handle to the sampling thread
pub struct MonitorHandle {
    pub rx: Receiver<PlotEvent>,
    /// Events the plot channel discarded while the UI lagged
    pub plot_dropped: Arc<AtomicU64>,
    pub stop: StopHandle,
    pub thread: Option<JoinHandle<Result<RunSummary, MonitorError>>>,
    pub start_time: Instant,
}

impl MonitorHandle {
    pub fn new(
        rx: Receiver<PlotEvent>,
        plot_dropped: Arc<AtomicU64>,
        stop: StopHandle,
        thread: JoinHandle<Result<RunSummary, MonitorError>>,
    ) -> Self {
        Self {
            rx,
            plot_dropped,
            stop,
            thread: Some(thread),
            start_time: Instant::now(),
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.plot_dropped.load(Ordering::Relaxed)
    }

    /// Signal the thread to stop
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Wait for the thread and return its result
    pub fn join(mut self) -> Result<RunSummary, String> {
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(result)) => result.map_err(|e| e.to_string()),
            Some(Err(_)) => Err("Sampler thread panicked".to_string()),
            None => Err("Sampler already joined".to_string()),
        }
    }
}
