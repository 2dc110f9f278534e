use anyhow::{bail, Result};
use crossbeam_channel::bounded;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

mod processor;

pub use processor::{FileOutcome, FileProcessor, FileStatus, NORMAL_ERR_RATE};

use crate::config::Config;
use crate::metrics::{print_final_summary, spawn_stdout_reporter, Metrics};
use crate::store::StoreRouter;
use crate::writer::{RetryPolicy, Writer};

/// One unit of work: a file and its position in the batch.
#[derive(Debug, Clone)]
pub struct Job {
    pub path: PathBuf,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub index: usize,
    pub path: PathBuf,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    pub interrupted: usize,
    pub skipped: usize,
    pub renamed: usize,
}

pub fn run(cfg: &Config, files: Vec<PathBuf>, router: Arc<StoreRouter>, shutdown: Arc<AtomicBool>) -> Result<RunSummary> {
    let metrics = Arc::new(Metrics::new());
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let reporter_handle = if cfg.metrics_interval > 0 {
        Some(spawn_stdout_reporter(metrics.clone(), Duration::from_secs(cfg.metrics_interval), shutdown_rx))
    } else {
        None
    };

    let policy = RetryPolicy { max_attempts: cfg.max_attempts, delay: cfg.retry_delay() };
    let writer = Writer::new(router, policy, cfg.dry, metrics.clone(), shutdown.clone());
    let processor = Arc::new(FileProcessor::new(writer, metrics.clone(), shutdown.clone()));

    let res = run_with(processor, files, cfg.workers, cfg.queue_cap, shutdown);

    if let Some(h) = reporter_handle {
        let _ = shutdown_tx.send(());
        let _ = h.join();
    }
    print_final_summary(&metrics);
    res
}

/// Fan `files` out to a pool of `workers` threads over a bounded job queue and
/// mark each fully scanned file as processed once its report arrives.
pub fn run_with(
    processor: Arc<FileProcessor>,
    files: Vec<PathBuf>,
    workers: usize,
    queue_cap: usize,
    shutdown: Arc<AtomicBool>,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    if files.is_empty() {
        tracing::info!("no files to process");
        return Ok(summary);
    }
    let workers = workers.min(files.len()).max(1);
    let qcap = queue_cap.max(1);
    tracing::info!(workers, queue_cap = qcap, files_count = files.len(), "starting worker pool");

    let (job_tx, job_rx) = bounded::<Job>(qcap);
    let (report_tx, report_rx) = bounded::<FileReport>(qcap);

    let worker_handles: Vec<_> = (0..workers)
        .map(|worker_id| {
            let job_rx = job_rx.clone();
            let report_tx = report_tx.clone();
            let processor = processor.clone();
            let shutdown = shutdown.clone();

            std::thread::spawn(move || {
                tracing::debug!("Worker {} started", worker_id);
                while let Ok(job) = job_rx.recv() {
                    let status = if shutdown.load(Ordering::Relaxed) {
                        FileStatus::Skipped
                    } else {
                        processor.process(&job.path)
                    };
                    if report_tx.send(FileReport { index: job.index, path: job.path, status }).is_err() {
                        break;
                    }
                }
                tracing::debug!("Worker {} finished", worker_id);
            })
        })
        .collect();
    drop(job_rx);
    drop(report_tx);

    // Feed from a separate thread so reports can be drained while the queue is full.
    let feeder = std::thread::spawn(move || {
        let mut submitted = 0;
        for (index, path) in files.into_iter().enumerate() {
            if job_tx.send(Job { path, index }).is_err() {
                break;
            }
            submitted += 1;
        }
        submitted
    });

    for report in report_rx.iter() {
        match report.status {
            FileStatus::Completed(_) => {
                summary.completed += 1;
                if mark_processed(&report.path).is_ok() {
                    summary.renamed += 1;
                }
            }
            FileStatus::Failed(reason) => {
                summary.failed += 1;
                tracing::error!(file = %report.path.display(), index = report.index, reason = reason.as_str(), "file not loaded, left in place");
            }
            FileStatus::Interrupted(outcome) => {
                summary.interrupted += 1;
                tracing::warn!(file = %report.path.display(), processed = outcome.processed, "file interrupted, left in place");
            }
            FileStatus::Skipped => {
                summary.skipped += 1;
                tracing::debug!(file = %report.path.display(), "skipped on shutdown");
            }
        }
    }

    summary.submitted = match feeder.join() {
        Ok(n) => n,
        Err(_) => bail!("job feeder panicked"),
    };
    for h in worker_handles {
        if h.join().is_err() {
            bail!("file worker panicked");
        }
    }
    let reported = summary.completed + summary.failed + summary.interrupted + summary.skipped;
    if reported != summary.submitted {
        bail!("received {} reports for {} submitted files", reported, summary.submitted);
    }

    tracing::info!(
        submitted = summary.submitted,
        completed = summary.completed,
        failed = summary.failed,
        interrupted = summary.interrupted,
        skipped = summary.skipped,
        renamed = summary.renamed,
        "batch finished"
    );
    Ok(summary)
}

/// Completion marker: `dir/name.ext` -> `dir/.name.ext`.
pub fn dot_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    Some(path.with_file_name(format!(".{}", name)))
}

pub fn mark_processed(path: &Path) -> std::io::Result<PathBuf> {
    let target = dot_path(path)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("no file name: {:?}", path)))?;
    match std::fs::rename(path, &target) {
        Ok(()) => {
            tracing::debug!("File renamed: {} -> {}", path.display(), target.display());
            Ok(target)
        }
        Err(e) => {
            tracing::error!(file = %path.display(), error = %e, "error renaming file");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::testing::write_gz;
    use crate::store::testing::{router_with, StubStore};
    use std::time::Duration;
    use tempfile::TempDir;

    fn processor(store: Arc<StubStore>, shutdown: Arc<AtomicBool>) -> Arc<FileProcessor> {
        let metrics = Arc::new(Metrics::new());
        let policy = RetryPolicy { max_attempts: 1, delay: Duration::from_millis(1) };
        let writer = Writer::new(Arc::new(router_with("idfa", store)), policy, false, metrics.clone(), shutdown.clone());
        Arc::new(FileProcessor::new(writer, metrics, shutdown))
    }

    #[test]
    fn dot_path_prefixes_base_name() {
        assert_eq!(dot_path(Path::new("/data/a/20170929.tsv.gz")), Some(PathBuf::from("/data/a/.20170929.tsv.gz")));
        assert_eq!(dot_path(Path::new("x.gz")), Some(PathBuf::from(".x.gz")));
        assert_eq!(dot_path(Path::new("/")), None);
    }

    #[test]
    fn marks_every_file_in_concurrent_batch() {
        let tmp = TempDir::new().unwrap();
        let k = 7;
        let files: Vec<PathBuf> = (0..k)
            .map(|i| {
                let lines: Vec<String> = (0..20).map(|j| format!("idfa\tD{}_{}\t1.0\t2.0\t{}", i, j, j)).collect();
                let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
                write_gz(tmp.path(), &format!("f{}.tsv.gz", i), &refs)
            })
            .collect();

        let store = Arc::new(StubStore::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let summary = run_with(processor(store.clone(), shutdown.clone()), files.clone(), 3, 2, shutdown).unwrap();

        assert_eq!(summary, RunSummary { submitted: k, completed: k, renamed: k, ..Default::default() });
        for f in &files {
            assert!(!f.exists());
            assert!(dot_path(f).unwrap().exists());
        }
        assert_eq!(store.values.lock().unwrap().len(), k * 20);
    }

    #[test]
    fn high_error_rate_file_is_still_marked() {
        let tmp = TempDir::new().unwrap();
        let f = write_gz(tmp.path(), "bad.tsv.gz", &["garbage", "idfa\tA\t1\t2\t3"]);
        let shutdown = Arc::new(AtomicBool::new(false));
        let summary = run_with(processor(Arc::new(StubStore::new(0)), shutdown.clone()), vec![f.clone()], 4, 4, shutdown).unwrap();
        assert_eq!(summary.completed, 1);
        assert!(dot_path(&f).unwrap().exists());
    }

    #[test]
    fn unreadable_file_is_isolated_and_not_marked() {
        let tmp = TempDir::new().unwrap();
        let good = write_gz(tmp.path(), "good.tsv.gz", &["idfa\tA\t1\t2\t3"]);
        let bad = tmp.path().join("bad.tsv.gz");
        std::fs::write(&bad, b"not gzip at all").unwrap();
        let missing = tmp.path().join("gone.tsv.gz");

        let shutdown = Arc::new(AtomicBool::new(false));
        let files = vec![bad.clone(), good.clone(), missing.clone()];
        let summary = run_with(processor(Arc::new(StubStore::new(0)), shutdown.clone()), files, 2, 1, shutdown).unwrap();

        assert_eq!(summary, RunSummary { submitted: 3, completed: 1, failed: 2, renamed: 1, ..Default::default() });
        assert!(bad.exists());
        assert!(!dot_path(&bad).unwrap().exists());
        assert!(dot_path(&good).unwrap().exists());
    }

    #[test]
    fn shutdown_skips_and_leaves_files() {
        let tmp = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..3).map(|i| write_gz(tmp.path(), &format!("f{}.gz", i), &["idfa\tA\t1\t2\t3"])).collect();
        let store = Arc::new(StubStore::new(0));
        let shutdown = Arc::new(AtomicBool::new(true));
        let summary = run_with(processor(store.clone(), shutdown.clone()), files.clone(), 2, 8, shutdown).unwrap();

        assert_eq!(summary, RunSummary { submitted: 3, skipped: 3, ..Default::default() });
        assert!(files.iter().all(|f| f.exists()));
        assert_eq!(store.attempts(), 0);
    }

    #[test]
    fn empty_batch_is_noop() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let summary = run_with(processor(Arc::new(StubStore::new(0)), shutdown.clone()), Vec::new(), 4, 4, shutdown).unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn rename_failure_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        assert!(mark_processed(&tmp.path().join("missing.gz")).is_err());
    }
}
