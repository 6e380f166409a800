//! Counter storage.
//!
//! [`CounterStore`] is the seam between the admission algorithm and where the
//! counters live. [`MemoryStore`] keeps them in process; a store backed by a
//! shared key-value service with atomic increment and expiry can implement the
//! same trait so every replica enforces one shared limit.

use dashmap::DashMap;
use tracing::debug;

use super::counter::{CounterEntry, RateLimitResult};
use super::key::CounterKey;
use super::rules::RoutePolicy;

/// Storage for fixed-window counters.
pub trait CounterStore: Send + Sync {
    /// Evaluate one request against the counter for `key`, creating it if needed.
    ///
    /// The read-modify-write must be atomic with respect to other calls for
    /// the same key.
    fn hit(&self, key: &CounterKey, policy: &RoutePolicy, now_ms: u64) -> RateLimitResult;

    /// Snapshot of the counter for `key`, if one exists.
    fn get(&self, key: &CounterKey) -> Option<CounterEntry>;

    /// Remove counters whose window closed at least `idle_windows` windows ago.
    ///
    /// Returns the number of counters removed.
    fn evict_idle(&self, now_ms: u64, idle_windows: u64) -> usize;

    /// Number of live counters.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every counter.
    fn clear(&self);
}

/// In-process counter store.
///
/// Each key's entry is updated under its shard's write lock, so concurrent
/// requests against one key are serialized while unrelated keys in other shards
/// proceed in parallel.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: DashMap<CounterKey, CounterEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryStore {
    fn hit(&self, key: &CounterKey, policy: &RoutePolicy, now_ms: u64) -> RateLimitResult {
        let mut entry = self.counters.entry(key.clone()).or_insert_with(|| {
            debug!(
                key = %key,
                limit = policy.limit,
                window_ms = policy.window_ms,
                "Creating new rate limit counter"
            );
            CounterEntry::new(now_ms, policy.window_ms)
        });

        entry.admit(policy, now_ms)
    }

    fn get(&self, key: &CounterKey) -> Option<CounterEntry> {
        self.counters.get(key).map(|e| *e)
    }

    fn evict_idle(&self, now_ms: u64, idle_windows: u64) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, entry| !entry.is_idle(now_ms, idle_windows));
        before.saturating_sub(self.counters.len())
    }

    fn len(&self) -> usize {
        self.counters.len()
    }

    fn clear(&self) {
        self.counters.clear();
    }
}
