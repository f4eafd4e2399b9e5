//! Downstream consumers and the queues that feed them
//!
//! Each consumer runs on its own thread behind a bounded queue so a slow
//! renderer or disk never stretches a sampling tick:
//!
//! - plot: lock-free ring (`ArrayQueue`), **drops the oldest** event when full
//! - log: bounded channel, **never drops**; the sampler waits if it fills up
//!
//! Both queues are FIFO, so consumers see records in tick order.

use crate::error::Result;
use crate::record::{AlarmEvent, SampleRecord};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use crossbeam_queue::ArrayQueue;
use log::{debug, error, warn};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Live view of the run (terminal, GUI, ...)
pub trait PlotConsumer: Send {
    fn on_record(&mut self, record: &SampleRecord);

    fn on_alarm(&mut self, alarm: &AlarmEvent);

    /// Run is over; no more events follow
    fn on_finish(&mut self) {}
}

/// Durable sink for every record
pub trait LogConsumer: Send {
    fn on_record(&mut self, record: &SampleRecord) -> io::Result<()>;

    /// Run is over; flush and close
    fn on_finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Event delivered to a [`PlotConsumer`]
#[derive(Debug, Clone, PartialEq)]
pub enum PlotEvent {
    Record(SampleRecord),
    Alarm(AlarmEvent),
    Finished,
}

/// [`PlotConsumer`] that forwards events over a bounded channel
///
/// Used to feed consumers that own their own event loop, like the GUI. When
/// the reader falls behind, the oldest queued event is discarded so the
/// channel never holds more than `capacity` events.
pub struct ChannelPlot {
    tx: Sender<PlotEvent>,
    // Kept to evict the oldest event when full
    rx: Receiver<PlotEvent>,
    dropped: Arc<AtomicU64>,
}

impl ChannelPlot {
    /// Create the consumer and the receiving end of its channel
    pub fn bounded(capacity: usize) -> (Self, Receiver<PlotEvent>) {
        let (tx, rx) = bounded(capacity.max(1));
        let plot = Self {
            tx,
            rx: rx.clone(),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (plot, rx)
    }

    /// Shared count of events discarded because the reader fell behind
    pub fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    fn forward(&self, mut event: PlotEvent) {
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    event = rejected;
                    if self.rx.try_recv().is_ok() {
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!("Plot channel full, dropped oldest event ({} total)", total);
                    }
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

impl PlotConsumer for ChannelPlot {
    fn on_record(&mut self, record: &SampleRecord) {
        self.forward(PlotEvent::Record(record.clone()));
    }

    fn on_alarm(&mut self, alarm: &AlarmEvent) {
        self.forward(PlotEvent::Alarm(*alarm));
    }

    fn on_finish(&mut self) {
        self.forward(PlotEvent::Finished);
    }
}

/// Counters from the delivery side of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Plot events discarded because the plot queue was full
    pub plot_dropped: u64,
    /// Records the log consumer failed to write
    pub log_failures: u64,
}

/// Idle wait of the plot worker between unparks
const PLOT_WORKER_PARK: Duration = Duration::from_millis(50);

struct PlotChannel {
    queue: Arc<ArrayQueue<PlotEvent>>,
    finished: Arc<AtomicBool>,
    worker: JoinHandle<()>,
    dropped: u64,
}

impl PlotChannel {
    fn spawn(mut consumer: Box<dyn PlotConsumer>, capacity: usize) -> io::Result<Self> {
        let queue = Arc::new(ArrayQueue::new(capacity.max(1)));
        let finished = Arc::new(AtomicBool::new(false));
        let queue_clone = Arc::clone(&queue);
        let finished_clone = Arc::clone(&finished);

        let worker = thread::Builder::new()
            .name("plot-consumer".to_string())
            .spawn(move || {
                loop {
                    // Read the flag before draining so nothing pushed before finish is missed
                    let done = finished_clone.load(Ordering::Acquire);
                    while let Some(event) = queue_clone.pop() {
                        match event {
                            PlotEvent::Record(record) => consumer.on_record(&record),
                            PlotEvent::Alarm(alarm) => consumer.on_alarm(&alarm),
                            PlotEvent::Finished => {}
                        }
                    }
                    if done {
                        break;
                    }
                    thread::park_timeout(PLOT_WORKER_PARK);
                }
                consumer.on_finish();
            })?;

        Ok(Self {
            queue,
            finished,
            worker,
            dropped: 0,
        })
    }

    fn send(&mut self, event: PlotEvent) {
        if self.queue.force_push(event).is_some() {
            self.dropped += 1;
            debug!("Plot queue full, dropped oldest event ({} total)", self.dropped);
        }
        self.worker.thread().unpark();
    }

    fn finish(self) -> u64 {
        self.finished.store(true, Ordering::Release);
        self.worker.thread().unpark();
        if self.worker.join().is_err() {
            error!("Plot consumer thread panicked");
        }
        self.dropped
    }
}

struct LogChannel {
    tx: Sender<SampleRecord>,
    failures: Arc<AtomicU64>,
    worker: JoinHandle<()>,
}

impl LogChannel {
    fn spawn(mut consumer: Box<dyn LogConsumer>, capacity: usize) -> io::Result<Self> {
        let (tx, rx): (Sender<SampleRecord>, Receiver<SampleRecord>) = bounded(capacity.max(1));
        let failures = Arc::new(AtomicU64::new(0));
        let failures_clone = Arc::clone(&failures);

        let worker = thread::Builder::new()
            .name("log-consumer".to_string())
            .spawn(move || {
                // Ends once the sender side is dropped and the queue is drained
                for record in rx.iter() {
                    if let Err(e) = consumer.on_record(&record) {
                        let total = failures_clone.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            "Log write failed at t={:.3}s: {} ({} failures)",
                            record.elapsed_secs, e, total
                        );
                    }
                }
                if let Err(e) = consumer.on_finish() {
                    warn!("Log close failed: {}", e);
                }
            })?;

        Ok(Self {
            tx,
            failures,
            worker,
        })
    }

    fn send(&self, record: SampleRecord) {
        // Blocks while the queue is full
        if self.tx.send(record).is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
            error!("Log consumer is gone, record not logged");
        }
    }

    fn finish(self) -> u64 {
        drop(self.tx);
        if self.worker.join().is_err() {
            error!("Log consumer thread panicked");
        }
        self.failures.load(Ordering::Relaxed)
    }
}

/// Fan-out from the sampling loop to the plot and log consumers
#[derive(Default)]
pub struct Dispatcher {
    plot: Option<PlotChannel>,
    log: Option<LogChannel>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a plot consumer behind a drop-oldest queue of `capacity` events
    pub fn with_plot<P: PlotConsumer + 'static>(mut self, consumer: P, capacity: usize) -> Result<Self> {
        self.plot = Some(PlotChannel::spawn(Box::new(consumer), capacity)?);
        Ok(self)
    }

    /// Attach a log consumer behind a block-on-full queue of `capacity` records
    pub fn with_log<L: LogConsumer + 'static>(mut self, consumer: L, capacity: usize) -> Result<Self> {
        self.log = Some(LogChannel::spawn(Box::new(consumer), capacity)?);
        Ok(self)
    }

    pub(crate) fn record(&mut self, record: &SampleRecord) {
        if let Some(plot) = self.plot.as_mut() {
            plot.send(PlotEvent::Record(record.clone()));
        }
        if let Some(log) = self.log.as_ref() {
            log.send(record.clone());
        }
    }

    pub(crate) fn alarm(&mut self, alarm: AlarmEvent) {
        if let Some(plot) = self.plot.as_mut() {
            plot.send(PlotEvent::Alarm(alarm));
        }
    }

    /// Drain both queues, notify consumers of completion and join workers
    pub(crate) fn finish(self) -> DeliveryStats {
        let plot_dropped = self.plot.map(PlotChannel::finish).unwrap_or(0);
        let log_failures = self.log.map(LogChannel::finish).unwrap_or(0);
        DeliveryStats {
            plot_dropped,
            log_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::sync::Mutex;

    fn record(i: u32) -> SampleRecord {
        SampleRecord {
            timestamp: Local::now(),
            elapsed_secs: f64::from(i) * 0.1,
            rpm: f64::from(i),
            vibration: f64::from(i) / 100.0,
        }
    }

    /// Log consumer that collects into shared memory, optionally failing some writes
    struct SharedLog {
        rows: Arc<Mutex<Vec<f64>>>,
        fail_every: Option<u32>,
        seen: u32,
        delay: Duration,
        finished: Arc<AtomicBool>,
    }

    impl LogConsumer for SharedLog {
        fn on_record(&mut self, record: &SampleRecord) -> io::Result<()> {
            self.seen += 1;
            thread::sleep(self.delay);
            if let Some(n) = self.fail_every {
                if self.seen % n == 0 {
                    return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
                }
            }
            self.rows.lock().unwrap().push(record.rpm);
            Ok(())
        }

        fn on_finish(&mut self) -> io::Result<()> {
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Plot consumer that blocks until released, to force queue overflow
    struct GatedPlot {
        gate: Receiver<()>,
        seen: Arc<Mutex<Vec<PlotEvent>>>,
    }

    impl PlotConsumer for GatedPlot {
        fn on_record(&mut self, record: &SampleRecord) {
            let _ = self.gate.recv();
            self.seen.lock().unwrap().push(PlotEvent::Record(record.clone()));
        }

        fn on_alarm(&mut self, alarm: &AlarmEvent) {
            self.seen.lock().unwrap().push(PlotEvent::Alarm(*alarm));
        }

        fn on_finish(&mut self) {
            self.seen.lock().unwrap().push(PlotEvent::Finished);
        }
    }

    #[test]
    fn test_log_receives_every_record_in_order() {
        let rows = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(AtomicBool::new(false));
        let log = SharedLog {
            rows: Arc::clone(&rows),
            fail_every: None,
            seen: 0,
            delay: Duration::from_millis(1),
            finished: Arc::clone(&finished),
        };

        // Queue of 2 with a slow consumer: sender must wait, never drop
        let mut dispatcher = Dispatcher::new().with_log(log, 2).unwrap();
        for i in 0..20 {
            dispatcher.record(&record(i));
        }
        let stats = dispatcher.finish();

        let expected: Vec<f64> = (0..20u32).map(f64::from).collect();
        assert_eq!(*rows.lock().unwrap(), expected);
        assert_eq!(stats.log_failures, 0);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_log_failures_are_counted_not_fatal() {
        let rows = Arc::new(Mutex::new(Vec::new()));
        let log = SharedLog {
            rows: Arc::clone(&rows),
            fail_every: Some(3),
            seen: 0,
            delay: Duration::ZERO,
            finished: Arc::new(AtomicBool::new(false)),
        };

        let mut dispatcher = Dispatcher::new().with_log(log, 16).unwrap();
        for i in 0..9 {
            dispatcher.record(&record(i));
        }
        let stats = dispatcher.finish();

        assert_eq!(stats.log_failures, 3);
        assert_eq!(rows.lock().unwrap().len(), 6);
    }

    #[test]
    fn test_plot_drops_oldest_when_full() {
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let plot = GatedPlot {
            gate: gate_rx,
            seen: Arc::clone(&seen),
        };

        let mut dispatcher = Dispatcher::new().with_plot(plot, 2).unwrap();

        // First record is picked up by the worker, which then blocks on the gate
        dispatcher.record(&record(0));
        thread::sleep(Duration::from_millis(100));

        for i in 1..=5 {
            dispatcher.record(&record(i));
        }

        // Release the gate for every record that can still arrive
        let releaser = thread::spawn(move || while gate_tx.send(()).is_ok() {});
        let stats = dispatcher.finish();
        releaser.join().unwrap();

        assert_eq!(stats.plot_dropped, 3);
        let rpms: Vec<f64> = seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                PlotEvent::Record(r) => Some(r.rpm),
                _ => None,
            })
            .collect();
        assert_eq!(rpms, vec![0.0, 4.0, 5.0]);
        assert_eq!(seen.lock().unwrap().last(), Some(&PlotEvent::Finished));
    }

    #[test]
    fn test_channel_plot_forwards_alarm_and_finish() {
        let (plot, rx) = ChannelPlot::bounded(8);
        let mut dispatcher = Dispatcher::new().with_plot(plot, 8).unwrap();

        dispatcher.record(&record(1));
        let alarm = AlarmEvent {
            threshold: 3000.0,
            raw_rpm: 5000.0,
            elapsed_secs: 0.1,
        };
        dispatcher.alarm(alarm);
        dispatcher.finish();

        let events: Vec<PlotEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], PlotEvent::Record(_)));
        assert_eq!(events[1], PlotEvent::Alarm(alarm));
        assert_eq!(events[2], PlotEvent::Finished);
    }

    #[test]
    fn test_channel_plot_stays_within_capacity_without_reader() {
        let (mut plot, rx) = ChannelPlot::bounded(4);
        let dropped = plot.drop_counter();

        for i in 0..10 {
            plot.on_record(&record(i));
        }

        assert_eq!(rx.len(), 4);
        assert_eq!(dropped.load(Ordering::Relaxed), 6);

        let rpms: Vec<f64> = rx
            .try_iter()
            .filter_map(|e| match e {
                PlotEvent::Record(r) => Some(r.rpm),
                _ => None,
            })
            .collect();
        assert_eq!(rpms, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_channel_plot_finish_survives_full_channel() {
        let (plot, rx) = ChannelPlot::bounded(3);
        let dropped = plot.drop_counter();
        let mut dispatcher = Dispatcher::new().with_plot(plot, 64).unwrap();

        for i in 0..20 {
            dispatcher.record(&record(i));
        }
        dispatcher.finish();

        let events: Vec<PlotEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events.last(), Some(&PlotEvent::Finished));
        let rpms: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                PlotEvent::Record(r) => Some(r.rpm),
                _ => None,
            })
            .collect();
        assert_eq!(rpms, vec![18.0, 19.0]);
        assert_eq!(dropped.load(Ordering::Relaxed), 18);
    }
}
