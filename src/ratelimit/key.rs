//! Counter key generation and handling.

/// A key that uniquely identifies one fixed-window counter.
///
/// The key is composed of the logical route and the resolved caller identity.
/// Two callers on the same route, or one caller on two routes, never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// The route (or route prefix) the counter belongs to
    pub route: String,
    /// The caller identity, either explicit or resolved from headers
    pub identifier: String,
}

impl CounterKey {
    /// Create a new counter key from a route and identifier.
    pub fn new(route: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            identifier: identifier.into(),
        }
    }

    /// Convert the key to a string representation.
    ///
    /// This matches the key format a shared key-value store would use.
    pub fn to_string_key(&self) -> String {
        format!("{}:{}", self.route, self.identifier)
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}
