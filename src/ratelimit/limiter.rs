//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, Request};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::clock::{Clock, MonotonicClock};
use super::counter::{CounterEntry, RateLimitResult};
use super::identity::IdentifierResolver;
use super::key::CounterKey;
use super::rules::{RoutePolicy, RouteTable};
use super::store::{CounterStore, MemoryStore};

/// Default number of full windows a counter may sit idle before it is evicted.
pub const DEFAULT_IDLE_WINDOWS: u64 = 2;
/// Shortest period accepted by [`RateLimiter::spawn_sweeper`].
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// The rate limiter that ties identity, route policy and counter storage together.
///
/// This struct is thread-safe and can be shared across request handlers behind
/// an `Arc`. Checks never block on I/O and never fail.
pub struct RateLimiter {
    /// Route table, fixed for the limiter's lifetime
    routes: RouteTable,
    identity: IdentifierResolver,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    idle_windows: u64,
}

impl RateLimiter {
    /// Create a limiter over `routes` with an in-memory store and monotonic clock.
    pub fn new(routes: RouteTable) -> Self {
        Self {
            routes,
            identity: IdentifierResolver::new(),
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(MonotonicClock::new()),
            idle_windows: DEFAULT_IDLE_WINDOWS,
        }
    }

    /// Replace the counter store.
    pub fn with_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the identity resolver.
    pub fn with_identity(mut self, identity: IdentifierResolver) -> Self {
        self.identity = identity;
        self
    }

    /// Set how many windows a counter may stay idle before [`RateLimiter::sweep`] drops it.
    pub fn with_idle_windows(mut self, idle_windows: u64) -> Self {
        self.idle_windows = idle_windows;
        self
    }

    /// Check the rate limit for an HTTP request.
    ///
    /// `explicit` overrides header based identity, e.g. with an authenticated
    /// user id, giving that caller a bucket separate from its network address.
    pub fn apply<B>(&self, request: &Request<B>, explicit: Option<&str>) -> RateLimitResult {
        self.check(request.uri().path(), request.headers(), explicit)
    }

    /// Check the rate limit for a request path and its headers.
    ///
    /// This method counts the request and returns the decision.
    pub fn check(
        &self,
        path: &str,
        headers: &HeaderMap,
        explicit: Option<&str>,
    ) -> RateLimitResult {
        let identifier = self.identity.resolve(headers, explicit);
        let matched = self.routes.resolve(path);
        let key = CounterKey::new(matched.route, identifier);

        self.check_key(&key, &matched.policy)
    }

    /// Check the rate limit for an already resolved key and policy.
    pub fn check_key(&self, key: &CounterKey, policy: &RoutePolicy) -> RateLimitResult {
        let now = self.clock.now_millis();

        trace!(
            key = %key,
            limit = policy.limit,
            window_ms = policy.window_ms,
            "Checking rate limit"
        );

        let result = self.store.hit(key, policy, now);
        if !result.success {
            debug!(
                key = %key,
                limit = result.limit,
                reset = result.reset,
                "Rate limit exceeded"
            );
        }
        result
    }

    /// The route table this limiter was built with.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Remove counters that have been idle past their window lifetime.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let evicted = self.store.evict_idle(now, self.idle_windows);
        if evicted > 0 {
            debug!(evicted, remaining = self.store.len(), "Evicted idle rate limit counters");
        }
        evicted
    }

    /// Run [`RateLimiter::sweep`] every `interval` on the tokio runtime.
    ///
    /// Must be called from within a tokio runtime. The task runs until aborted.
    /// Intervals shorter than [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        })
    }

    /// Get the counter for a route and identifier.
    ///
    /// Returns `None` if no counter exists for the key.
    pub fn counter(&self, route: &str, identifier: &str) -> Option<CounterEntry> {
        self.store.get(&CounterKey::new(route, identifier))
    }

    /// Clear all counters.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Get the number of active counters.
    pub fn counter_count(&self) -> usize {
        self.store.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RouteTable::builtin())
    }
}
