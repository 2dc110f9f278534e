use anyhow::{Context, Result};
use memc_load::{cli, config, pipeline, scanner, store::StoreRouter};
use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

fn init_tracing(cfg: &config::Config) -> Result<()> {
    let default_level = if cfg.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let writer = match &cfg.log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file: {}", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .with_level(true)
        .with_ansi(false)
        .compact()
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = cli::parse();
    let cfg = config::Config::from_args(&args)?;
    init_tracing(&cfg)?;
    tracing::info!(?cfg, "memc loader started");

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, finishing current lines...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let files = scanner::scan_inputs(&cfg)?;
    tracing::info!(count = %files.len(), pattern = cfg.pattern.as_str(), "files matched");

    let router = Arc::new(StoreRouter::memcache(&cfg.stores, cfg.store_timeout()));
    tracing::debug!(?router, "store routing table");
    tracing::info!(device_types = ?router.device_types().collect::<Vec<_>>(), "store routes ready");

    pipeline::run(&cfg, files, router, shutdown)?;
    Ok(())
}
