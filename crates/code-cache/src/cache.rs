//! Concurrency-safe code-to-token map with age-based eviction

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

/// One exchanged code. Entries are created on first successful exchange
/// and never updated afterwards.
#[derive(Debug, Clone)]
struct CacheEntry {
    token: String,
    inserted_at: Instant,
}

/// Time-bounded deduplication store mapping an authorization code to the
/// token it was exchanged for.
///
/// Keyed on the raw code string exactly as received — no trimming or case
/// folding. Lookups, inserts, and sweeps share one `RwLock`; contention is
/// low (one insert per login, one sweep per minute), so a single lock
/// domain is sufficient.
///
/// A lookup that misses because it raced the sweep falls through to a
/// re-exchange, which fails provider-side if the code was truly consumed.
/// That is degraded behavior, not a correctness bug.
pub struct CodeCache {
    retention: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CodeCache {
    /// Create a cache that retains entries for `retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached token for `code`, if present.
    pub async fn lookup(&self, code: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(code).map(|e| e.token.clone())
    }

    /// Record the token obtained for `code`.
    ///
    /// If the code is already present the existing entry wins; entries are
    /// never updated after insertion.
    pub async fn store(&self, code: String, token: String) {
        let mut entries = self.entries.write().await;
        entries.entry(code).or_insert(CacheEntry {
            token,
            inserted_at: Instant::now(),
        });
    }

    /// Remove every entry older than the retention window as of `now`.
    ///
    /// `now` is a parameter rather than read internally so tests can drive
    /// the clock. Returns the number of entries removed.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.inserted_at) <= self.retention);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "swept expired codes");
        }
        removed
    }

    /// Number of cached codes.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no codes.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
