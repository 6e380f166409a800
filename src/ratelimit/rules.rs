//! Route policy configuration and matching.
//!
//! This module handles loading route rules from configuration and resolving an
//! inbound request path to exactly one [`RoutePolicy`]. Resolution order is an
//! exact pattern match, then the longest matching prefix rule, then the default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{Result, TollgateError};

/// Default limit for routes without a configured rule.
pub const DEFAULT_LIMIT: u64 = 1000;
/// Default window for routes without a configured rule.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Limit and window applied to one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    /// Maximum requests admitted per window. Zero denies every request.
    pub limit: u64,
    /// Window length in milliseconds
    #[serde(alias = "windowMs")]
    pub window_ms: u64,
}

impl RoutePolicy {
    pub const fn new(limit: u64, window_ms: u64) -> Self {
        Self { limit, window_ms }
    }

    fn validate(&self, pattern: &str) -> Result<()> {
        if self.window_ms == 0 {
            return Err(TollgateError::InvalidPolicy {
                pattern: pattern.to_string(),
                reason: "window_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW_MS)
    }
}

/// How a rule's pattern is compared against the request path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// The path must equal the pattern
    #[default]
    Exact,
    /// The path must start with the pattern
    Prefix,
}

/// A single configured route rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Route path or path prefix, e.g. `/api/auth/login`
    pub pattern: String,
    /// Matching mode for `pattern`
    #[serde(default, rename = "match")]
    pub match_kind: MatchKind,
    /// The policy applied on match
    #[serde(flatten)]
    pub policy: RoutePolicy,
}

impl RouteRule {
    /// Create an exact-match rule.
    pub fn exact(pattern: impl Into<String>, limit: u64, window_ms: u64) -> Self {
        Self {
            pattern: pattern.into(),
            match_kind: MatchKind::Exact,
            policy: RoutePolicy::new(limit, window_ms),
        }
    }

    /// Create a prefix-match rule.
    pub fn prefix(pattern: impl Into<String>, limit: u64, window_ms: u64) -> Self {
        Self {
            pattern: pattern.into(),
            match_kind: MatchKind::Prefix,
            policy: RoutePolicy::new(limit, window_ms),
        }
    }
}

/// On-disk shape of a rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteRulesFile {
    /// Policy for unmatched routes
    #[serde(default)]
    pub default: RoutePolicy,
    /// Route specific rules
    #[serde(default)]
    pub routes: Vec<RouteRule>,
}

/// The result of resolving a path against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// The route name used in the counter key.
    ///
    /// For a prefix rule this is the rule's pattern, so every path under the
    /// prefix shares one bucket per caller.
    pub route: &'a str,
    pub policy: RoutePolicy,
}

/// Immutable, validated route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    exact: HashMap<String, RoutePolicy>,
    /// Sorted longest pattern first
    prefixes: Vec<(String, RoutePolicy)>,
    default: RoutePolicy,
}

impl RouteTable {
    /// Build a table, validating every policy.
    pub fn new(default: RoutePolicy, rules: Vec<RouteRule>) -> Result<Self> {
        default.validate("<default>")?;

        let mut exact = HashMap::new();
        let mut prefixes: Vec<(String, RoutePolicy)> = Vec::new();

        for rule in rules {
            if rule.pattern.is_empty() {
                return Err(TollgateError::InvalidPolicy {
                    pattern: rule.pattern,
                    reason: "pattern must not be empty".to_string(),
                });
            }
            if !rule.pattern.starts_with('/') {
                return Err(TollgateError::InvalidPolicy {
                    pattern: rule.pattern,
                    reason: "pattern must start with '/'".to_string(),
                });
            }
            rule.policy.validate(&rule.pattern)?;

            let duplicate = match rule.match_kind {
                MatchKind::Exact => exact.insert(rule.pattern.clone(), rule.policy).is_some(),
                MatchKind::Prefix => {
                    let seen = prefixes.iter().any(|(p, _)| *p == rule.pattern);
                    prefixes.push((rule.pattern.clone(), rule.policy));
                    seen
                }
            };
            if duplicate {
                return Err(TollgateError::InvalidPolicy {
                    pattern: rule.pattern,
                    reason: "pattern is configured more than once".to_string(),
                });
            }
        }

        prefixes.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

        Ok(Self {
            exact,
            prefixes,
            default,
        })
    }

    /// The routes the application ships with when no rules file is configured.
    pub fn builtin() -> Self {
        let mut exact = HashMap::new();
        exact.insert("/api/auth/login".to_string(), RoutePolicy::new(5, 900_000));
        exact.insert("/api/clients".to_string(), RoutePolicy::new(100, 60_000));

        Self {
            exact,
            prefixes: Vec::new(),
            default: RoutePolicy::default(),
        }
    }

    /// Load a table from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading route rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a table from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: RouteRulesFile = serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(format!("Failed to parse route rules: {}", e)))?;
        Self::new(file.default, file.routes)
    }

    /// Resolve `path` to exactly one policy.
    pub fn resolve<'a>(&'a self, path: &'a str) -> RouteMatch<'a> {
        if let Some(policy) = self.exact.get(path) {
            return RouteMatch {
                route: path,
                policy: *policy,
            };
        }

        if let Some((pattern, policy)) = self
            .prefixes
            .iter()
            .find(|(p, _)| path.starts_with(p.as_str()))
        {
            return RouteMatch {
                route: pattern,
                policy: *policy,
            };
        }

        RouteMatch {
            route: path,
            policy: self.default,
        }
    }

    /// The policy for unmatched routes.
    pub fn default_policy(&self) -> RoutePolicy {
        self.default
    }

    /// Number of configured (non-default) rules.
    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::builtin()
    }
}
