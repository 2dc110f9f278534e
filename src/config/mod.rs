use crate::cli::Args;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Device types served by a dedicated memcached shard.
pub const DEVICE_TYPES: [&str; 4] = ["idfa", "gaid", "adid", "dvid"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pattern: String,
    /// device type -> memcached address
    pub stores: BTreeMap<String, String>,
    pub dry: bool,
    pub debug: bool,
    pub log: Option<String>,
    pub workers: usize,
    pub queue_cap: usize,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub store_timeout_ms: u64,
    pub metrics_interval: u64,
}

impl Config {
    pub fn from_args(a: &Args) -> Result<Self> {
        if a.pattern.trim().is_empty() { bail!("--pattern must be set"); }
        if let Some(w) = a.workers {
            if w == 0 { bail!("--workers must be greater than 0"); }
        }
        if a.max_attempts == 0 { bail!("--max-attempts must be greater than 0"); }
        if a.store_timeout_ms == 0 { bail!("--store-timeout-ms must be greater than 0"); }

        let mut stores = BTreeMap::new();
        for (dev_type, addr) in DEVICE_TYPES.iter().zip([&a.idfa, &a.gaid, &a.adid, &a.dvid]) {
            if addr.trim().is_empty() { bail!("--{} address must not be empty", dev_type); }
            stores.insert(dev_type.to_string(), addr.trim().to_string());
        }

        Ok(Self {
            pattern: a.pattern.clone(),
            stores,
            dry: a.dry,
            debug: a.debug,
            log: a.log.clone(),
            workers: a.workers.unwrap_or_else(num_cpus::get).max(1),
            queue_cap: a.queue_cap.max(1),
            max_attempts: a.max_attempts,
            retry_delay_ms: a.retry_delay_ms,
            store_timeout_ms: a.store_timeout_ms,
            metrics_interval: a.metrics_interval,
        })
    }

    pub fn retry_delay(&self) -> Duration { Duration::from_millis(self.retry_delay_ms) }

    pub fn store_timeout(&self) -> Duration { Duration::from_millis(self.store_timeout_ms) }
}
