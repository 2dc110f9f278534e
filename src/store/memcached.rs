use std::sync::Mutex;
use std::time::Duration;

use super::{Store, StoreError};

const SCHEME: &str = "memcache://";

/// memcached shard behind the `memcache` crate's pooled client.
///
/// The client is created on first use so an unreachable shard only affects
/// records routed to it. A failed connect is not cached; the next `set`
/// tries again. Socket I/O and pool checkout are both bounded by the
/// `timeout` and `connect_timeout` URL options.
pub struct MemcacheStore {
    url: String,
    client: Mutex<Option<::memcache::Client>>,
}

impl MemcacheStore {
    /// `addr` is `host:port` or a full `memcache://` URL. Timeout options
    /// already present in the URL win over `timeout`.
    pub fn new(addr: &str, timeout: Duration) -> Self {
        let base = if addr.contains("://") { addr.to_string() } else { format!("{}{}", SCHEME, addr) };
        Self { url: with_timeouts(base, timeout), client: Mutex::new(None) }
    }

    fn connect_err(&self, reason: impl ToString) -> StoreError {
        StoreError::Connect { endpoint: self.url.clone(), reason: reason.to_string() }
    }

    fn cached(&self) -> Result<Option<::memcache::Client>, StoreError> {
        let guard = self.client.lock().map_err(|_| self.connect_err("client lock poisoned"))?;
        Ok(guard.clone())
    }

    // Connect runs without the lock held; a stalled shard must not queue
    // other callers behind it.
    fn client(&self) -> Result<::memcache::Client, StoreError> {
        if let Some(c) = self.cached()? {
            return Ok(c);
        }
        let c = ::memcache::Client::connect(self.url.clone()).map_err(|e| self.connect_err(e))?;
        let mut guard = self.client.lock().map_err(|_| self.connect_err("client lock poisoned"))?;
        match guard.as_ref() {
            Some(existing) => Ok(existing.clone()),
            None => {
                tracing::debug!(endpoint = %self.url, "memcache client connected");
                *guard = Some(c.clone());
                Ok(c)
            }
        }
    }
}

fn has_query_key(url: &str, key: &str) -> bool {
    url.split_once('?')
        .map(|(_, q)| q.split('&').any(|kv| kv.split('=').next() == Some(key)))
        .unwrap_or(false)
}

fn with_timeouts(mut url: String, timeout: Duration) -> String {
    let secs = timeout.as_secs_f64();
    for key in ["timeout", "connect_timeout"] {
        if has_query_key(&url, key) {
            continue;
        }
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&format!("{}={}", key, secs));
    }
    url
}

impl Store for MemcacheStore {
    fn endpoint(&self) -> &str { &self.url }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let client = self.client()?;
        client
            .set(key, value, 0)
            .map_err(|e| StoreError::Set { endpoint: self.url.clone(), reason: e.to_string() })
    }
}
