use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::codec::{self, CodecError, UserApps};
use crate::metrics::Metrics;
use crate::parser::AppsInstalled;
use crate::store::{RouteError, StoreError, StoreRouter};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Store write retry settings. `delay` is slept between attempts, never after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, delay: DEFAULT_RETRY_DELAY }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored { attempts: u32 },
    DryRun,
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("couldn't serialize record {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    UnknownDeviceType(#[from] RouteError),

    #[error("memcache connection failed for {dev_type} after {attempts} attempts: {last}")]
    StoreConnect {
        dev_type: String,
        attempts: u32,
        #[source]
        last: StoreError,
    },
}

/// Serializes events and commits them to the shard selected by the router.
pub struct Writer {
    router: Arc<StoreRouter>,
    policy: RetryPolicy,
    dry: bool,
    metrics: Arc<Metrics>,
    shutdown: Arc<AtomicBool>,
}

impl Writer {
    pub fn new(router: Arc<StoreRouter>, policy: RetryPolicy, dry: bool, metrics: Arc<Metrics>, shutdown: Arc<AtomicBool>) -> Self {
        Self { router, policy, dry, metrics, shutdown }
    }

    pub fn write(&self, ev: &AppsInstalled) -> Result<WriteOutcome, WriteError> {
        let key = ev.storage_key();
        let msg = UserApps::from(ev);

        if self.dry {
            match codec::render_diagnostic(&msg) {
                Ok(json) => tracing::debug!("{} - {} -> {}", ev.dev_type, key, json),
                Err(e) => tracing::warn!(key = %key, error = %e, "couldn't render dry-run payload"),
            }
            return Ok(WriteOutcome::DryRun);
        }

        let payload = codec::encode(&msg).map_err(|source| {
            tracing::error!(key = %key, error = %source, "couldn't serialize record");
            WriteError::Encode { key: key.clone(), source }
        })?;

        let store = self.router.resolve(&ev.dev_type).map_err(|e| {
            tracing::error!(dev_type = %ev.dev_type, "invalid device type");
            e
        })?;

        let mut attempts = 0;
        let last = loop {
            attempts += 1;
            let t0 = Instant::now();
            let res = store.set(&key, &payload);
            self.metrics.add_write_time(t0.elapsed().as_nanos() as u64);
            self.metrics.inc_write_attempts(1);

            let err = match res {
                Ok(()) => return Ok(WriteOutcome::Stored { attempts }),
                Err(e) => e,
            };
            tracing::debug!(dev_type = %ev.dev_type, attempt = attempts, max_attempts = self.policy.max_attempts, error = %err, "failed inserting in memcache");

            if attempts >= self.policy.max_attempts || self.shutdown.load(Ordering::Relaxed) {
                break err;
            }
            self.metrics.inc_write_retries(1);
            std::thread::sleep(self.policy.delay);
        };

        tracing::error!(dev_type = %ev.dev_type, endpoint = store.endpoint(), attempts, "failed to connect to memcache");
        Err(WriteError::StoreConnect { dev_type: ev.dev_type.clone(), attempts, last })
    }
}
