//! Key/value stores and the device-type routing table.

mod memcached;

pub use self::memcached::MemcacheStore;

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("set on {endpoint} failed: {reason}")]
    Set { endpoint: String, reason: String },
}

/// A single key/value backend. Implementations are shared by every worker
/// thread and must tolerate concurrent `set` calls.
pub trait Store: Send + Sync {
    fn endpoint(&self) -> &str;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no store for device type {0:?}")]
    NotFound(String),
}

/// Immutable device type -> store mapping, built once before processing.
#[derive(Default)]
pub struct StoreRouter {
    stores: HashMap<String, Arc<dyn Store>>,
}

impl StoreRouter {
    pub fn new(stores: HashMap<String, Arc<dyn Store>>) -> Self {
        Self { stores }
    }

    /// One lazily connected memcached client per configured device type.
    pub fn memcache(endpoints: &std::collections::BTreeMap<String, String>, timeout: std::time::Duration) -> Self {
        let stores = endpoints
            .iter()
            .map(|(dev_type, addr)| {
                let store: Arc<dyn Store> = Arc::new(MemcacheStore::new(addr, timeout));
                (dev_type.clone(), store)
            })
            .collect();
        Self { stores }
    }

    pub fn resolve(&self, dev_type: &str) -> Result<&Arc<dyn Store>, RouteError> {
        self.stores.get(dev_type).ok_or_else(|| RouteError::NotFound(dev_type.to_string()))
    }

    pub fn device_types(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for StoreRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut m = f.debug_map();
        for (k, v) in &self.stores {
            m.entry(k, &v.endpoint());
        }
        m.finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails the first `fail_first` calls, then stores values in memory.
    pub struct StubStore {
        fail_first: usize,
        pub attempts: AtomicUsize,
        pub values: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl StubStore {
        pub fn new(fail_first: usize) -> Self {
            Self { fail_first, attempts: AtomicUsize::new(0), values: Mutex::new(HashMap::new()) }
        }

        pub fn always_failing() -> Self { Self::new(usize::MAX) }

        pub fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }
    }

    impl Store for StubStore {
        fn endpoint(&self) -> &str { "stub" }

        fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(StoreError::Set { endpoint: "stub".into(), reason: "unavailable".into() });
            }
            self.values.lock().unwrap().insert(key.to_string(), value.to_vec());
            Ok(())
        }
    }

    pub fn router_with(dev_type: &str, store: Arc<StubStore>) -> StoreRouter {
        let mut stores: HashMap<String, Arc<dyn Store>> = HashMap::new();
        stores.insert(dev_type.to_string(), store);
        StoreRouter::new(stores)
    }
}
