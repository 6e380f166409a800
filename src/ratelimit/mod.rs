//! Rate limiting logic and state management.

mod clock;
mod counter;
mod identity;
mod key;
mod limiter;
mod rules;
mod store;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use counter::{CounterEntry, RateLimitResult};
pub use identity::{IdentifierResolver, FALLBACK_IDENTIFIER};
pub use key::CounterKey;
pub use limiter::{RateLimiter, DEFAULT_IDLE_WINDOWS, MIN_SWEEP_INTERVAL};
pub use rules::{
    MatchKind, RouteMatch, RoutePolicy, RouteRule, RouteRulesFile, RouteTable, DEFAULT_LIMIT,
    DEFAULT_WINDOW_MS,
};
pub use store::{CounterStore, MemoryStore};
