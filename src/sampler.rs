//! Sampling loop
//!
//! Drives the pipeline at a fixed cadence:
//!
//! ```text
//! Idle ──run()──► Initializing ──ok──► Running ──stop / duration──► Stopped
//!                      │                                              ▲
//!                      └───────────────── init error ─────────────────┘
//! ```
//!
//! Ticks are scheduled on absolute deadlines (`next = previous + interval`)
//! so processing time never accumulates as drift. The wait between ticks is
//! the only suspension point and wakes as soon as [`StopHandle::stop`] is
//! called.

use crate::adxl345::Adxl345;
use crate::bus::BusTransport;
use crate::config::DeviceConfig;
use crate::consumer::Dispatcher;
use crate::error::{MonitorError, Result};
use crate::record::{AlarmEvent, RecordHistory, SampleRecord, TimeKeeper};
use crate::vibration::Estimate;
use chrono::Local;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_HISTORY_CAPACITY: usize = 600;

/// Lifecycle of a [`SamplingLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Initializing,
    Running,
    Stopped,
}

/// Cancels a running loop from any thread
///
/// Cloneable and idempotent; stopping a loop that has not started yet makes
/// it finish right after initialization.
#[derive(Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            // Capacity 1: a pending wake-up is as good as a new one
            let _ = self.wake.try_send(());
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    /// Records produced
    pub records: u64,
    /// Ticks skipped because the sensor read failed
    pub failed_ticks: u64,
    /// Over-threshold alarms raised
    pub alarms: u64,
    /// Records the log consumer failed to persist
    pub log_failures: u64,
    /// Plot events dropped on queue overflow
    pub plot_dropped: u64,
    /// Time spent in `Running`
    pub elapsed: Duration,
}

impl RunSummary {
    /// Achieved record rate in Hz
    pub fn record_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.records as f64 / secs
        } else {
            0.0
        }
    }
}

/// Periodic acquisition from one ADXL345
///
/// Owns the sensor, and so the bus, for its whole life; nothing else touches
/// the bus while the loop runs.
///
/// # Example
/// ```no_run
/// use adxl345_rpm_monitor::{ConsolePlot, DeviceConfig, Dispatcher, SamplingLoop, SimulatedBus};
/// use std::time::Duration;
///
/// let config = DeviceConfig::default();
/// let bus = SimulatedBus::new(config.bus_address, 25.0, 2.0);
/// let dispatcher = Dispatcher::new().with_plot(ConsolePlot::stdout(config.rpm_threshold), 64)?;
///
/// let mut sampler = SamplingLoop::new(bus, config).with_max_duration(Some(Duration::from_secs(5)));
/// let summary = sampler.run(dispatcher)?;
/// println!("{} records", summary.records);
/// # Ok::<(), adxl345_rpm_monitor::MonitorError>(())
/// ```
pub struct SamplingLoop<B> {
    sensor: Adxl345<B>,
    config: DeviceConfig,
    state: LoopState,
    history: RecordHistory,
    max_duration: Option<Duration>,
    stop: StopHandle,
    wake: Receiver<()>,
}

impl<B: BusTransport> SamplingLoop<B> {
    pub fn new(bus: B, config: DeviceConfig) -> Self {
        let (tx, rx) = bounded(1);
        Self {
            sensor: Adxl345::new(bus),
            config,
            state: LoopState::Idle,
            history: RecordHistory::new(DEFAULT_HISTORY_CAPACITY),
            max_duration: None,
            stop: StopHandle {
                stopped: Arc::new(AtomicBool::new(false)),
                wake: tx,
            },
            wake: rx,
        }
    }

    /// Number of recent records kept in memory
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = RecordHistory::new(capacity);
        self
    }

    /// Stop on our own after `duration`; `None` runs until stopped
    pub fn with_max_duration(mut self, duration: Option<Duration>) -> Self {
        self.max_duration = duration;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Most recent records of the run
    pub fn history(&self) -> &RecordHistory {
        &self.history
    }

    /// Consume the loop and return the bus
    pub fn release(self) -> B {
        self.sensor.release()
    }

    /// Initialize the sensor and sample until stopped
    ///
    /// Blocks the calling thread. Consumers behind `dispatcher` are notified
    /// of completion before this returns, on success and on failure.
    ///
    /// # Errors
    /// * `MonitorError::AlreadyStarted` - the loop has already run
    /// * `MonitorError::Device` - initialization failed; no tick was run
    pub fn run(&mut self, dispatcher: Dispatcher) -> Result<RunSummary> {
        if self.state != LoopState::Idle {
            return Err(MonitorError::AlreadyStarted);
        }

        self.state = LoopState::Initializing;
        info!(
            "Initializing ADXL345 at 0x{:02X}",
            self.config.bus_address
        );
        if let Err(e) = self.sensor.initialize(&self.config) {
            self.state = LoopState::Stopped;
            error!("Initialization failed: {}", e);
            dispatcher.finish();
            return Err(e.into());
        }

        self.state = LoopState::Running;
        let interval = self.config.poll_interval();
        info!(
            "Sampling every {:.3}s (threshold {} RPM)",
            interval.as_secs_f64(),
            self.config.rpm_threshold
        );

        let summary = self.sample(dispatcher, interval);

        self.state = LoopState::Stopped;
        info!(
            "Stopped after {:.2}s: {} records, {} failed ticks, {} alarms",
            summary.elapsed.as_secs_f64(),
            summary.records,
            summary.failed_ticks,
            summary.alarms
        );
        if summary.log_failures > 0 {
            warn!("{} records were not logged", summary.log_failures);
        }
        Ok(summary)
    }

    fn sample(&mut self, mut dispatcher: Dispatcher, interval: Duration) -> RunSummary {
        let clock = TimeKeeper::new();
        let end = self.max_duration.map(|d| clock.start() + d);
        let threshold = self.config.rpm_threshold;
        let factor = self.config.conversion_factor;

        let mut summary = RunSummary::default();
        let mut next_tick = clock.start();
        let mut tick = 0u64;

        loop {
            if self.stop.is_stopped() {
                info!("Stop requested");
                break;
            }
            if end.is_some_and(|end| Instant::now() >= end) {
                info!("Run duration reached");
                break;
            }

            let tick_start = Instant::now();
            let timestamp = Local::now();
            tick += 1;

            match self.sensor.read_sample(&self.config) {
                Ok(sample) => {
                    let estimate = Estimate::from_sample(&sample, factor, threshold);
                    let record = SampleRecord {
                        timestamp,
                        elapsed_secs: clock.secs_at(tick_start),
                        rpm: estimate.rpm,
                        vibration: estimate.vibration,
                    };

                    dispatcher.record(&record);
                    if estimate.exceeds(threshold) {
                        summary.alarms += 1;
                        dispatcher.alarm(AlarmEvent {
                            threshold,
                            raw_rpm: estimate.raw_rpm,
                            elapsed_secs: record.elapsed_secs,
                        });
                    }
                    self.history.push(record);
                    summary.records += 1;
                }
                Err(e) => {
                    summary.failed_ticks += 1;
                    warn!("Tick {}: read failed, retrying next interval: {}", tick, e);
                }
            }

            next_tick += interval;
            let now = Instant::now();
            if next_tick <= now {
                // Running behind: no wait. Resync after a long stall instead of bursting.
                if now - next_tick > interval {
                    debug!("Tick {} overran by {:?}, resyncing", tick, now - next_tick);
                    next_tick = now;
                }
                continue;
            }

            let deadline = match end {
                Some(end) => next_tick.min(end),
                None => next_tick,
            };
            // Woken early only by a stop request; checked at the top of the loop
            let _ = self.wake.recv_deadline(deadline);
        }

        summary.elapsed = clock.start().elapsed();
        let delivery = dispatcher.finish();
        summary.log_failures = delivery.log_failures;
        summary.plot_dropped = delivery.plot_dropped;
        summary
    }
}
