//! Time-boxed memoization of presence snapshots.
//!
//! Sits in front of the event store's aggregation to bound database
//! load under bursty polling. A snapshot younger than the TTL is served
//! as-is; anything older is recomputed synchronously by the caller.
//! Concurrent misses on the same key may each recompute - aggregation
//! is a pure function of store state, so the last writer's snapshot
//! wins and both are valid.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use herenow_core::error::HereNowError;
use herenow_core::types::PresenceSnapshot;

/// Cache key separator. A unit separator cannot appear in a hostname or
/// URL path, so ("ab","c") and ("a","bc") never collide.
const KEY_SEPARATOR: char = '\u{1f}';

struct CacheEntry {
    snapshot: PresenceSnapshot,
    stored_at: Instant,
}

/// TTL-bounded snapshot cache, shared across request handlers.
///
/// The mutex guards only map reads/writes; aggregation runs outside it.
pub struct StatsCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl StatsCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn key(domain: &str, path: &str) -> String {
        format!("{}{}{}", domain, KEY_SEPARATOR, path)
    }

    /// Return the cached snapshot for a page if it is younger than the
    /// TTL.
    pub fn get_fresh(&self, domain: &str, path: &str) -> Option<PresenceSnapshot> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(&Self::key(domain, path))?;
        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.snapshot.clone())
        } else {
            None
        }
    }

    /// Store a freshly computed snapshot, sweeping stale entries when
    /// the soft ceiling is exceeded.
    pub fn store(&self, snapshot: PresenceSnapshot) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        let key = Self::key(&snapshot.domain, &snapshot.path);
        entries.insert(
            key,
            CacheEntry {
                snapshot,
                stored_at: Instant::now(),
            },
        );

        // Lazy sweep, not a background timer: drop entries stale beyond
        // twice the TTL once the map grows past the ceiling.
        if entries.len() > self.max_entries {
            let cutoff = self.ttl * 2;
            entries.retain(|_, e| e.stored_at.elapsed() < cutoff);
        }
    }

    /// Serve from cache or recompute via `compute` and remember the
    /// result. Computation runs with the lock released.
    pub fn get_or_compute<F>(
        &self,
        domain: &str,
        path: &str,
        compute: F,
    ) -> Result<PresenceSnapshot, HereNowError>
    where
        F: FnOnce() -> Result<PresenceSnapshot, HereNowError>,
    {
        if let Some(snapshot) = self.get_fresh(domain, path) {
            return Ok(snapshot);
        }
        let snapshot = compute()?;
        self.store(snapshot.clone());
        Ok(snapshot)
    }

    /// Number of cached entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
