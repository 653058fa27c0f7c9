use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::trace;

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    fetched_at: Instant,
}

/// Response bodies keyed by URL, each with the TTL chosen at lookup time.
/// Owned by whoever talks to the network; the core never sees it.
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached body if younger than `ttl`, otherwise runs `fetch` and stores
    /// its output. Errors are passed through and never cached.
    pub fn get_or_fetch<F>(&self, key: &str, ttl: Duration, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        if let Some(body) = self.fresh(key, ttl) {
            trace!(key, "cache hit");
            return Ok(body);
        }

        let body = fetch()?;
        self.lock().insert(
            key.to_string(),
            CacheEntry {
                body: body.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(body)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn fresh(&self, key: &str, ttl: Duration) -> Option<String> {
        let guard = self.lock();
        let entry = guard.get(key)?;
        (entry.fetched_at.elapsed() < ttl).then(|| entry.body.clone())
    }

    // A panic while holding the lock cannot leave an entry half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
