//! Caller identity resolution.

use axum::http::HeaderMap;
use tracing::warn;

/// Identity used when no identity header is present.
pub const FALLBACK_IDENTIFIER: &str = "unknown";

/// Edge-injected client address, trusted when a CDN fronts the service.
pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";
/// Proxy chain; only the first (client-facing) entry is used.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Derives the caller identity a request is counted under.
///
/// Values are extracted verbatim and never validated as IP addresses; trusting
/// these headers is a deployment concern (the proxy in front must overwrite them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierResolver {
    fallback: String,
}

impl IdentifierResolver {
    pub fn new() -> Self {
        Self::with_fallback(FALLBACK_IDENTIFIER)
    }

    /// Use `fallback` as the shared identity for requests without identity headers.
    pub fn with_fallback(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
        }
    }

    /// Resolve the identity for a request.
    ///
    /// A non-empty `explicit` identifier (for example an authenticated user id)
    /// is returned as is. Otherwise the first non-empty of `CF-Connecting-IP`,
    /// the first entry of `X-Forwarded-For`, and `X-Real-IP` wins, falling back
    /// to a fixed identity so resolution never fails.
    pub fn resolve(&self, headers: &HeaderMap, explicit: Option<&str>) -> String {
        if let Some(id) = explicit.filter(|id| !id.is_empty()) {
            return id.to_string();
        }

        header_value(headers, CF_CONNECTING_IP)
            .or_else(|| {
                header_value(headers, X_FORWARDED_FOR)
                    .and_then(|chain| chain.split(',').next())
                    .map(str::trim)
                    .filter(|first| !first.is_empty())
            })
            .or_else(|| header_value(headers, X_REAL_IP))
            .unwrap_or(self.fallback.as_str())
            .to_string()
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

impl Default for IdentifierResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// First value of `name` as trimmed, non-empty text.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let value = headers.get(name)?;
    match value.to_str() {
        Ok(s) => Some(s.trim()).filter(|s| !s.is_empty()),
        Err(_) => {
            warn!(header = name, "Ignoring identity header with non-visible characters");
            None
        }
    }
}
