use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use crossbeam_channel::{tick, Receiver};

pub struct Metrics {
    start: Instant,
    pub files_total: AtomicU64,
    pub files_failed: AtomicU64,
    pub input_bytes_total: AtomicU64,
    pub lines_total: AtomicU64,
    pub lines_failed: AtomicU64,
    pub records_written: AtomicU64,
    pub apps_skipped: AtomicU64,
    pub write_attempts: AtomicU64,
    pub write_retries: AtomicU64,
    // Store write wall time (ns)
    pub write_ns_total: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self { Self::new() }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            files_total: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            input_bytes_total: AtomicU64::new(0),
            lines_total: AtomicU64::new(0),
            lines_failed: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            apps_skipped: AtomicU64::new(0),
            write_attempts: AtomicU64::new(0),
            write_retries: AtomicU64::new(0),
            write_ns_total: AtomicU64::new(0),
        }
    }

    pub fn uptime_secs(&self) -> u64 { self.start.elapsed().as_secs() }

    pub fn elapsed_precise(&self) -> f64 { self.start.elapsed().as_secs_f64() }

    pub fn inc_files(&self, v: u64) { self.files_total.fetch_add(v, Ordering::Relaxed); }
    pub fn inc_files_failed(&self, v: u64) { self.files_failed.fetch_add(v, Ordering::Relaxed); }
    pub fn inc_input_bytes(&self, v: u64) { self.input_bytes_total.fetch_add(v, Ordering::Relaxed); }
    pub fn inc_lines(&self, v: u64) { self.lines_total.fetch_add(v, Ordering::Relaxed); }
    pub fn inc_lines_failed(&self, v: u64) { self.lines_failed.fetch_add(v, Ordering::Relaxed); }
    pub fn inc_records_written(&self, v: u64) { self.records_written.fetch_add(v, Ordering::Relaxed); }
    pub fn inc_apps_skipped(&self, v: u64) { self.apps_skipped.fetch_add(v, Ordering::Relaxed); }
    pub fn inc_write_attempts(&self, v: u64) { self.write_attempts.fetch_add(v, Ordering::Relaxed); }
    pub fn inc_write_retries(&self, v: u64) { self.write_retries.fetch_add(v, Ordering::Relaxed); }

    pub fn add_write_time(&self, ns: u64) { self.write_ns_total.fetch_add(ns, Ordering::Relaxed); }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            files_total: self.files_total.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            input_bytes_total: self.input_bytes_total.load(Ordering::Relaxed),
            lines_total: self.lines_total.load(Ordering::Relaxed),
            lines_failed: self.lines_failed.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            apps_skipped: self.apps_skipped.load(Ordering::Relaxed),
            write_attempts: self.write_attempts.load(Ordering::Relaxed),
            write_retries: self.write_retries.load(Ordering::Relaxed),
            write_ns_total: self.write_ns_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub files_total: u64,
    pub files_failed: u64,
    pub input_bytes_total: u64,
    pub lines_total: u64,
    pub lines_failed: u64,
    pub records_written: u64,
    pub apps_skipped: u64,
    pub write_attempts: u64,
    pub write_retries: u64,
    pub write_ns_total: u64,
}

pub fn spawn_stdout_reporter(metrics: Arc<Metrics>, interval: Duration, shutdown_rx: Receiver<()>) -> std::thread::JoinHandle<()> {
    let ticker = tick(interval);
    std::thread::spawn(move || {
        let mut prev_lines: u64 = 0;
        let mut prev_written: u64 = 0;
        loop {
            crossbeam_channel::select! {
                recv(shutdown_rx) -> _ => break,
                recv(ticker) -> _ => {
                    let s = metrics.snapshot();
                    let delta_lines = s.lines_total.saturating_sub(prev_lines);
                    let delta_written = s.records_written.saturating_sub(prev_written);
                    prev_lines = s.lines_total;
                    prev_written = s.records_written;

                    let secs = interval.as_secs().max(1) as f64;
                    tracing::info!(
                        component = "metrics",
                        uptime_secs = metrics.uptime_secs(),
                        files_total = s.files_total,
                        files_failed = s.files_failed,
                        lines_total = s.lines_total,
                        lines_failed = s.lines_failed,
                        records_written = s.records_written,
                        write_retries = s.write_retries,
                        interval_lines_per_sec = format!("{:.0}", delta_lines as f64 / secs).as_str(),
                        interval_writes_per_sec = format!("{:.0}", delta_written as f64 / secs).as_str(),
                        "metrics snapshot"
                    );
                }
            }
        }
    })
}

pub fn print_final_summary(metrics: &Metrics) {
    let elapsed = metrics.elapsed_precise();
    let s = metrics.snapshot();
    let per_sec = |v: u64| if elapsed > 0.0 { v as f64 / elapsed } else { 0.0 };
    let avg_write_us = if s.write_attempts > 0 { s.write_ns_total as f64 / s.write_attempts as f64 / 1000.0 } else { 0.0 };

    tracing::info!(
        component = "summary",
        elapsed_secs = format!("{:.3}", elapsed).as_str(),
        files_total = s.files_total,
        files_failed = s.files_failed,
        input_bytes_total = s.input_bytes_total,
        lines_total = s.lines_total,
        lines_failed = s.lines_failed,
        records_written = s.records_written,
        apps_skipped = s.apps_skipped,
        write_attempts = s.write_attempts,
        write_retries = s.write_retries,
        avg_write_us = format!("{:.1}", avg_write_us).as_str(),
        overall_lines_per_sec = format!("{:.0}", per_sec(s.lines_total)).as_str(),
        "run summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let m = Metrics::new();
        m.inc_lines(10);
        m.inc_lines_failed(2);
        m.inc_records_written(8);
        m.inc_write_attempts(9);
        m.inc_write_retries(1);
        let s = m.snapshot();
        assert_eq!(s.lines_total, 10);
        assert_eq!(s.lines_failed, 2);
        assert_eq!(s.records_written, 8);
        assert_eq!(s.write_attempts, 9);
        assert_eq!(s.write_retries, 1);
        assert_eq!(s.files_total, 0);
    }

    #[test]
    fn reporter_stops_on_shutdown() {
        let m = Arc::new(Metrics::new());
        let (tx, rx) = crossbeam_channel::bounded::<()>(1);
        let h = spawn_stdout_reporter(m, Duration::from_millis(10), rx);
        std::thread::sleep(Duration::from_millis(30));
        tx.send(()).unwrap();
        h.join().unwrap();
    }
}
