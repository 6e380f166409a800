//! Fixed-window counter implementation.

use super::rules::RoutePolicy;

/// Outcome of evaluating one request against its counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request is admitted
    pub success: bool,
    /// The configured limit for the route
    pub limit: u64,
    /// Requests left in the current window after this one
    pub remaining: u64,
    /// Epoch milliseconds at which the current window ends
    pub reset: u64,
    /// Human readable denial message, only set when denied
    pub error: Option<String>,
    /// Whole seconds until `reset`, only set when denied
    pub retry_after: Option<u64>,
}

impl RateLimitResult {
    fn allowed(limit: u64, remaining: u64, reset: u64) -> Self {
        Self {
            success: true,
            limit,
            remaining,
            reset,
            error: None,
            retry_after: None,
        }
    }

    fn denied(limit: u64, reset: u64, now_ms: u64) -> Self {
        let retry_after = reset.saturating_sub(now_ms).div_ceil(1000);
        Self {
            success: false,
            limit,
            remaining: 0,
            reset,
            error: Some(format!("Rate limit exceeded. Try again in {}s", retry_after)),
            retry_after: Some(retry_after),
        }
    }
}

/// Counter state for one `(route, identifier)` key.
///
/// This type holds no lock of its own; the owning store must serialize calls to
/// [`CounterEntry::admit`] for a given key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEntry {
    /// Requests admitted in the current window. Never exceeds the limit.
    count: u64,
    /// When the current window began, epoch ms
    window_start: u64,
    /// Window length seen on the most recent request, used for eviction
    window_ms: u64,
}

impl CounterEntry {
    /// Create an empty counter whose first window starts at `now_ms`.
    pub fn new(now_ms: u64, window_ms: u64) -> Self {
        Self {
            count: 0,
            window_start: now_ms,
            window_ms,
        }
    }

    /// Evaluate one request at `now_ms`.
    ///
    /// Rolls the window when `now_ms` has reached its end, then admits and counts
    /// the request if capacity remains. Denied requests are not counted.
    pub fn admit(&mut self, policy: &RoutePolicy, now_ms: u64) -> RateLimitResult {
        self.window_ms = policy.window_ms;

        if now_ms >= self.window_end() {
            self.window_start = now_ms;
            self.count = 0;
        }

        let reset = self.window_end();

        if self.count < policy.limit {
            self.count += 1;
            RateLimitResult::allowed(policy.limit, policy.limit - self.count, reset)
        } else {
            RateLimitResult::denied(policy.limit, reset, now_ms)
        }
    }

    /// Whether this entry has seen no window for `idle_windows` full windows
    /// after its last one closed.
    pub fn is_idle(&self, now_ms: u64, idle_windows: u64) -> bool {
        let grace = self.window_ms.saturating_mul(idle_windows);
        now_ms >= self.window_end().saturating_add(grace)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn window_start(&self) -> u64 {
        self.window_start
    }

    /// Epoch ms at which the current window closes.
    pub fn window_end(&self) -> u64 {
        self.window_start.saturating_add(self.window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    #[test]
    fn test_admit_within_limit() {
        let policy = RoutePolicy::new(10, 1_000);
        let mut entry = CounterEntry::new(T0, policy.window_ms);

        let result = entry.admit(&policy, T0);
        assert!(result.success);
        assert_eq!(result.limit, 10);
        assert_eq!(result.remaining, 9);
        assert_eq!(result.reset, T0 + 1_000);
        assert_eq!(result.error, None);
        assert_eq!(entry.count(), 1);
    }

    #[test]
    fn test_admit_exceeds_limit() {
        let policy = RoutePolicy::new(5, 900_000);
        let mut entry = CounterEntry::new(T0, policy.window_ms);

        let remaining: Vec<u64> = (0..5).map(|_| entry.admit(&policy, T0).remaining).collect();
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        // The 6th request should be rejected
        let result = entry.admit(&policy, T0 + 1);
        assert!(!result.success);
        assert_eq!(result.remaining, 0);
        assert_eq!(result.reset, T0 + 900_000);
        assert_eq!(result.retry_after, Some(900));
        assert_eq!(result.error.as_deref(), Some("Rate limit exceeded. Try again in 900s"));
    }

    #[test]
    fn test_denials_do_not_grow_count() {
        let policy = RoutePolicy::new(2, 1_000);
        let mut entry = CounterEntry::new(T0, policy.window_ms);

        for _ in 0..50 {
            entry.admit(&policy, T0);
        }
        assert_eq!(entry.count(), 2);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let policy = RoutePolicy::new(1, 10_000);
        let mut entry = CounterEntry::new(T0, policy.window_ms);
        entry.admit(&policy, T0);

        let result = entry.admit(&policy, T0 + 8_001);
        assert_eq!(result.retry_after, Some(2));
        assert!(result.error.unwrap().contains("Try again in 2s"));
    }

    #[test]
    fn test_window_resets_at_boundary() {
        let policy = RoutePolicy::new(2, 1_000);
        let mut entry = CounterEntry::new(T0, policy.window_ms);

        entry.admit(&policy, T0);
        entry.admit(&policy, T0 + 500);
        assert!(!entry.admit(&policy, T0 + 999).success);

        // Exactly at windowStart + windowMs the window has elapsed
        let result = entry.admit(&policy, T0 + 1_000);
        assert!(result.success);
        assert_eq!(result.remaining, 1);
        assert_eq!(result.reset, T0 + 2_000);
        assert_eq!(entry.window_start(), T0 + 1_000);
    }

    #[test]
    fn test_new_window_starts_at_request_time() {
        let policy = RoutePolicy::new(3, 1_000);
        let mut entry = CounterEntry::new(T0, policy.window_ms);
        entry.admit(&policy, T0);

        // Not aligned to window multiples: the reset is relative to this request
        let result = entry.admit(&policy, T0 + 5_250);
        assert_eq!(result.reset, T0 + 6_250);
    }

    #[test]
    fn test_zero_limit_always_denies() {
        let policy = RoutePolicy::new(0, 1_000);
        let mut entry = CounterEntry::new(T0, policy.window_ms);

        let result = entry.admit(&policy, T0);
        assert!(!result.success);
        assert_eq!(result.remaining, 0);
        assert_eq!(entry.count(), 0);
    }

    #[test]
    fn test_backwards_clock_keeps_window_open() {
        let policy = RoutePolicy::new(1, 1_000);
        let mut entry = CounterEntry::new(T0, policy.window_ms);
        entry.admit(&policy, T0);

        let result = entry.admit(&policy, T0 - 10_000);
        assert!(!result.success);
        assert_eq!(result.reset, T0 + 1_000);
    }

    #[test]
    fn test_is_idle() {
        let policy = RoutePolicy::new(1, 1_000);
        let mut entry = CounterEntry::new(T0, policy.window_ms);
        entry.admit(&policy, T0);

        assert!(!entry.is_idle(T0 + 2_999, 2));
        assert!(entry.is_idle(T0 + 3_000, 2));
        assert!(entry.is_idle(T0 + 1_000, 0));
    }
}
