use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::metrics::Metrics;
use crate::parser;
use crate::reader::open_gzip_lines;
use crate::writer::Writer;

/// Files at or above this share of failed lines are reported as a failed load.
pub const NORMAL_ERR_RATE: f64 = 0.01;

/// Line counters for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOutcome {
    pub processed: u64,
    /// Parse and write failures alike.
    pub failed: u64,
    pub written: u64,
    pub skipped_apps: u64,
}

impl FileOutcome {
    pub fn error_rate(&self) -> f64 {
        if self.processed == 0 { 0.0 } else { self.failed as f64 / self.processed as f64 }
    }

    pub fn is_acceptable(&self) -> bool { self.error_rate() < NORMAL_ERR_RATE }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    /// Every line was scanned; the file gets the completion marker whatever its error rate.
    Completed(FileOutcome),
    /// Shutdown was requested mid-file.
    Interrupted(FileOutcome),
    /// Could not open or decompress the file.
    Failed(String),
    /// Shutdown was requested before the file was started.
    Skipped,
}

pub struct FileProcessor {
    writer: Writer,
    metrics: Arc<Metrics>,
    shutdown: Arc<AtomicBool>,
}

impl FileProcessor {
    pub fn new(writer: Writer, metrics: Arc<Metrics>, shutdown: Arc<AtomicBool>) -> Self {
        Self { writer, metrics, shutdown }
    }

    pub fn process(&self, path: &Path) -> FileStatus {
        self.metrics.inc_files(1);
        if let Ok(meta) = fs::metadata(path) {
            self.metrics.inc_input_bytes(meta.len());
        }
        tracing::info!(file = %path.display(), "processing");

        let mut outcome = FileOutcome::default();
        let finished = match self.scan(path, &mut outcome) {
            Ok(finished) => finished,
            Err(e) => {
                self.metrics.inc_files_failed(1);
                tracing::error!(file = %path.display(), processed = outcome.processed, error = format!("{:#}", e).as_str(), "couldn't read file");
                return FileStatus::Failed(format!("{:#}", e));
            }
        };

        if !finished {
            tracing::warn!(file = %path.display(), processed = outcome.processed, failed = outcome.failed, "interrupted before end of file");
            return FileStatus::Interrupted(outcome);
        }

        let rate = outcome.error_rate();
        if outcome.is_acceptable() {
            tracing::info!(file = %path.display(), processed = outcome.processed, "Acceptable error rate ({:.6}). Successful load", rate);
        } else {
            tracing::error!(file = %path.display(), processed = outcome.processed, "High error rate ({:.6} >= {}). Failed load", rate, NORMAL_ERR_RATE);
        }
        FileStatus::Completed(outcome)
    }

    /// Returns `false` when stopped by shutdown before end of file.
    fn scan(&self, path: &Path, outcome: &mut FileOutcome) -> Result<bool> {
        let mut lines = open_gzip_lines(path)?;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(false);
            }
            let raw = match lines.next_line().with_context(|| format!("decompress {:?} after line {}", path, outcome.processed))? {
                Some(raw) => raw,
                None => return Ok(true),
            };
            let line = String::from_utf8_lossy(raw);
            outcome.processed += 1;
            self.metrics.inc_lines(1);

            let parsed = match parser::parse(&line) {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(file = %path.display(), line = %line, error = %e, "error at parsing line");
                    outcome.failed += 1;
                    self.metrics.inc_lines_failed(1);
                    continue;
                }
            };
            if parsed.skipped_apps > 0 {
                outcome.skipped_apps += parsed.skipped_apps as u64;
                self.metrics.inc_apps_skipped(parsed.skipped_apps as u64);
            }

            match self.writer.write(&parsed.event) {
                Ok(_) => {
                    outcome.written += 1;
                    self.metrics.inc_records_written(1);
                }
                Err(_) => {
                    // already logged by the writer
                    outcome.failed += 1;
                    self.metrics.inc_lines_failed(1);
                }
            }
        }
    }
}
