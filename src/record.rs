//! Output records and the in-memory run history

use chrono::{DateTime, Local, SecondsFormat};
use std::collections::VecDeque;
use std::time::Instant;

/// One output row: timestamps plus the estimate
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// Wall-clock time at the start of the tick
    pub timestamp: DateTime<Local>,
    /// Seconds since the run started (monotonic clock)
    pub elapsed_secs: f64,
    /// Clamped RPM estimate
    pub rpm: f64,
    /// Vibration magnitude in g
    pub vibration: f64,
}

impl SampleRecord {
    /// Timestamp as ISO-8601 with millisecond precision and UTC offset
    pub fn iso_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false)
    }
}

/// Raised when the unclamped RPM goes above the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmEvent {
    pub threshold: f64,
    pub raw_rpm: f64,
    pub elapsed_secs: f64,
}

/// Bounded, append-only view of the most recent records
///
/// Old records fall off the front once `capacity` is reached; the durable
/// copy of every record is the CSV log.
pub struct RecordHistory {
    records: VecDeque<SampleRecord>,
    capacity: usize,
    total: u64,
}

impl RecordHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    pub fn push(&mut self, record: SampleRecord) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        self.total += 1;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records appended over the whole run, including evicted ones
    pub fn total_appended(&self) -> u64 {
        self.total
    }

    pub fn latest(&self) -> Option<&SampleRecord> {
        self.records.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleRecord> {
        self.records.iter()
    }

    /// Records within the last `window_secs` of the latest one
    pub fn window(&self, window_secs: f64) -> Vec<&SampleRecord> {
        let Some(latest) = self.records.back() else {
            return Vec::new();
        };
        let cutoff = latest.elapsed_secs - window_secs;
        self.records
            .iter()
            .filter(|r| r.elapsed_secs >= cutoff)
            .collect()
    }
}

/// Tracks elapsed time since creation
pub struct TimeKeeper {
    start: Instant,
}

impl TimeKeeper {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    /// Seconds from the start to `at`
    pub fn secs_at(&self, at: Instant) -> f64 {
        at.saturating_duration_since(self.start).as_secs_f64()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for TimeKeeper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(elapsed_secs: f64) -> SampleRecord {
        SampleRecord {
            timestamp: Local::now(),
            elapsed_secs,
            rpm: 100.0 * elapsed_secs,
            vibration: elapsed_secs,
        }
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = RecordHistory::new(3);
        for i in 0..5 {
            history.push(record(i as f64));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.total_appended(), 5);
        let kept: Vec<f64> = history.iter().map(|r| r.elapsed_secs).collect();
        assert_eq!(kept, vec![2.0, 3.0, 4.0]);
        assert_eq!(history.latest().map(|r| r.elapsed_secs), Some(4.0));
    }

    #[test]
    fn test_history_window() {
        let mut history = RecordHistory::new(100);
        assert!(history.window(1.0).is_empty());

        for i in 0..10 {
            history.push(record(i as f64 * 0.5));
        }
        // latest is 4.5, so 3.5..=4.5
        assert_eq!(history.window(1.0).len(), 3);
    }

    #[test]
    fn test_iso_timestamp_format() {
        let timestamp = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let record = SampleRecord {
            timestamp,
            elapsed_secs: 0.0,
            rpm: 0.0,
            vibration: 0.0,
        };
        let iso = record.iso_timestamp();
        assert!(iso.starts_with("2024-03-09T14:05:07.000"), "{}", iso);
    }

    #[test]
    fn test_timekeeper() {
        let keeper = TimeKeeper::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = keeper.elapsed_secs();
        assert!(elapsed >= 0.01);
        assert!(elapsed < 1.0);
        assert_eq!(keeper.secs_at(keeper.start()), 0.0);
    }
}
