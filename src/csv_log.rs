//! CSV log of sample records
//!
//! One row per record, appended and flushed as it arrives:
//!
//! ```text
//! DateTime,Time,RPM,Vibration
//! 2024-03-09T14:05:07.100+01:00,0.100213,99.8400,0.998400
//! ```
//!
//! `Time` is seconds since the run started. The header is written once, when
//! the file is new or empty, so successive runs append to the same file.

use crate::consumer::LogConsumer;
use crate::record::SampleRecord;
use log::{info, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Header row
pub const CSV_HEADER: &str = "DateTime,Time,RPM,Vibration";

/// Format a record as one CSV row (no trailing newline)
pub fn format_row(record: &SampleRecord) -> String {
    format!(
        "{},{:.6},{:.4},{:.6}",
        record.iso_timestamp(),
        record.elapsed_secs,
        record.rpm,
        record.vibration
    )
}

/// Append-only CSV [`LogConsumer`]
///
/// A failed write closes the file; the next record reopens it, so a
/// transient fault (disk full, NFS hiccup) costs only the rows written
/// while it lasted.
pub struct CsvLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    rows_written: u64,
}

impl CsvLog {
    /// Open (or create) the log at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = Self::open_writer(&path)?;
        info!("Logging records to {}", path.display());

        Ok(Self {
            path,
            writer: Some(writer),
            rows_written: 0,
        })
    }

    fn open_writer(path: &Path) -> io::Result<BufWriter<File>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = BufWriter::new(file);
        if is_empty {
            writeln!(writer, "{}", CSV_HEADER)?;
            writer.flush()?;
        }
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written by this instance
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn write_row(&mut self, record: &SampleRecord) -> io::Result<()> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => {
                let writer = Self::open_writer(&self.path)?;
                info!("Reopened log file {}", self.path.display());
                self.writer.insert(writer)
            }
        };

        writeln!(writer, "{}", format_row(record))?;
        writer.flush()
    }
}

impl LogConsumer for CsvLog {
    fn on_record(&mut self, record: &SampleRecord) -> io::Result<()> {
        match self.write_row(record) {
            Ok(()) => {
                self.rows_written += 1;
                Ok(())
            }
            Err(e) => {
                // Drop the handle; reopened on the next record
                self.writer = None;
                Err(e)
            }
        }
    }

    fn on_finish(&mut self) -> io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        if self.rows_written == 0 {
            warn!("No records written to {}", self.path.display());
        } else {
            info!("Wrote {} rows to {}", self.rows_written, self.path.display());
        }
        Ok(())
    }
}
