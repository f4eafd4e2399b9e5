//! Terminal plot consumer
//!
//! Prints one line per record with a bar gauge scaled to the RPM threshold:
//!
//! ```text
//! 2024-03-09T14:05:07.100+01:00  Vibration:   0.9984 g  Scaled RPM:    99.84  [█                             |]
//! ```

use crate::consumer::PlotConsumer;
use crate::record::{AlarmEvent, SampleRecord};
use log::warn;
use std::io::{self, Stdout, Write};

const DEFAULT_BAR_WIDTH: usize = 30;

/// Horizontal gauge for a non-negative value on a `0..=max_value` scale
///
/// Returns `width` cells followed by a `|` marking `max_value`. Values outside
/// the scale (and NaN) are pinned to the nearest end.
///
/// # Example
/// ```
/// use adxl345_rpm_monitor::create_bar;
///
/// // 1500 RPM against a 3000 RPM threshold, 20 cells wide
/// let bar = create_bar(1500.0, 3000.0, 20);
/// assert_eq!(bar.chars().filter(|&c| c == '█').count(), 10);
/// ```
pub fn create_bar(value: f64, max_value: f64, width: usize) -> String {
    let normalized = if max_value > 0.0 && !value.is_nan() {
        (value / max_value).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = ((normalized * width as f64).round() as usize).min(width);

    let mut bar = String::with_capacity(width + 1);
    bar.push_str(&"█".repeat(filled));
    bar.push_str(&" ".repeat(width - filled));
    bar.push('|');
    bar
}

/// [`PlotConsumer`] writing a scrolling text plot
pub struct ConsolePlot<W: Write + Send = Stdout> {
    out: W,
    threshold: f64,
    bar_width: usize,
    quiet: bool,
    write_failed: bool,
}

impl ConsolePlot<Stdout> {
    /// Plot to stdout, gauge scaled to `threshold`
    pub fn stdout(threshold: f64) -> Self {
        Self::new(io::stdout(), threshold)
    }
}

impl<W: Write + Send> ConsolePlot<W> {
    pub fn new(out: W, threshold: f64) -> Self {
        Self {
            out,
            threshold,
            bar_width: DEFAULT_BAR_WIDTH,
            quiet: false,
            write_failed: false,
        }
    }

    pub fn with_bar_width(mut self, width: usize) -> Self {
        self.bar_width = width;
        self
    }

    /// Suppress per-record lines; alarms and the exit message still print
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            // Warn once; a closed terminal should not flood the log
            if !self.write_failed {
                warn!("Console output failed: {}", e);
                self.write_failed = true;
            }
        }
    }
}

impl<W: Write + Send> PlotConsumer for ConsolePlot<W> {
    fn on_record(&mut self, record: &SampleRecord) {
        if self.quiet {
            return;
        }
        let line = format!(
            "{}  Vibration: {:8.4} g  Scaled RPM: {:8.2}  [{}]",
            record.iso_timestamp(),
            record.vibration,
            record.rpm,
            create_bar(record.rpm, self.threshold, self.bar_width)
        );
        self.emit(&line);
    }

    fn on_alarm(&mut self, alarm: &AlarmEvent) {
        let line = format!(
            ">>> t={:.2}s  RPM {:.1} above threshold {:.1}",
            alarm.elapsed_secs, alarm.raw_rpm, alarm.threshold
        );
        self.emit(&line);
    }

    fn on_finish(&mut self) {
        self.emit("Exiting the program.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn filled(bar: &str) -> usize {
        bar.chars().filter(|&c| c == '█').count()
    }

    #[test]
    fn test_create_bar_zero() {
        let bar = create_bar(0.0, 3000.0, 40);
        assert_eq!(bar.chars().count(), 41); // 40 cells + threshold marker
        assert_eq!(filled(&bar), 0);
        assert!(bar.ends_with('|'));
    }

    #[test]
    fn test_create_bar_partial() {
        let bar = create_bar(750.0, 3000.0, 40);
        assert_eq!(bar.chars().count(), 41);
        assert_eq!(filled(&bar), 10);
    }

    #[test]
    fn test_create_bar_pins_out_of_range() {
        assert_eq!(filled(&create_bar(9000.0, 3000.0, 40)), 40);
        assert_eq!(filled(&create_bar(-5.0, 3000.0, 40)), 0);
        assert_eq!(filled(&create_bar(f64::NAN, 3000.0, 40)), 0);
        assert_eq!(filled(&create_bar(10.0, 0.0, 40)), 0);
    }

    fn record(rpm: f64) -> SampleRecord {
        SampleRecord {
            timestamp: Local::now(),
            elapsed_secs: 0.1,
            rpm,
            vibration: rpm / 100.0,
        }
    }

    #[test]
    fn test_record_line() {
        let mut plot = ConsolePlot::new(Vec::new(), 3000.0).with_bar_width(10);
        plot.on_record(&record(99.84));
        plot.on_finish();

        let text = String::from_utf8(plot.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Vibration:   0.9984 g"));
        assert!(lines[0].contains("Scaled RPM:    99.84"));
        assert_eq!(lines[1], "Exiting the program.");
    }

    #[test]
    fn test_quiet_still_reports_alarms() {
        let mut plot = ConsolePlot::new(Vec::new(), 3000.0).quiet(true);
        plot.on_record(&record(10.0));
        plot.on_alarm(&AlarmEvent {
            threshold: 3000.0,
            raw_rpm: 5000.0,
            elapsed_secs: 1.5,
        });

        let text = String::from_utf8(plot.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("RPM 5000.0 above threshold 3000.0"));
    }
}
