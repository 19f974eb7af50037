use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::{debug, error, warn};

use crate::ports::cache::ReportCache;

const FALLBACK_CAPACITY: NonZeroUsize = NonZeroUsize::new(100).unwrap();

struct CachedReport {
    json: String,
    expires_at: Instant,
}

impl CachedReport {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process LRU of serialized intelligence reports, keyed
/// `intel:{property}:...` so one property's reports can be dropped together.
pub struct MemoryCache {
    reports: Mutex<LruCache<String, CachedReport>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or_else(|| {
            warn!("cache.max_entries is 0, using {FALLBACK_CAPACITY}");
            FALLBACK_CAPACITY
        });
        Self {
            reports: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Live and expired entries currently held.
    pub fn len(&self) -> usize {
        self.lock("len").map_or(0, |reports| reports.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self, op: &str) -> Option<MutexGuard<'_, LruCache<String, CachedReport>>> {
        match self.reports.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                error!(op, "Report cache lock poisoned, bypassing cache");
                None
            }
        }
    }
}

impl ReportCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut reports = self.lock("get")?;
        let now = Instant::now();
        match reports.get(key) {
            Some(report) if report.is_fresh(now) => Some(report.json.clone()),
            Some(_) => {
                reports.pop(key);
                debug!(key, "Cached report expired");
                None
            }
            None => None,
        }
    }

    /// A zero `ttl` stores nothing.
    fn set(&self, key: &str, value: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let Some(mut reports) = self.lock("set") else {
            return;
        };
        let evicted = reports.push(
            key.to_string(),
            CachedReport {
                json: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        if let Some((old_key, _)) = evicted.filter(|(k, _)| k != key) {
            debug!(evicted = %old_key, "Report cache full, evicted least recently used");
        }
    }

    /// Also sweeps expired entries of other properties while the lock is held.
    fn invalidate_prefix(&self, prefix: &str) -> usize {
        let Some(mut reports) = self.lock("invalidate") else {
            return 0;
        };
        let now = Instant::now();
        let mut dropped = 0;
        let doomed: Vec<(String, bool)> = reports
            .iter()
            .filter_map(|(key, report)| {
                let matches = key.starts_with(prefix);
                (matches || !report.is_fresh(now)).then(|| (key.clone(), matches))
            })
            .collect();
        for (key, matches) in doomed {
            reports.pop(&key);
            if matches {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(prefix, dropped, "Invalidated cached reports");
        }
        dropped
    }
}
