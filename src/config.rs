//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::ratelimit::{
    IdentifierResolver, RateLimiter, RouteTable, DEFAULT_IDLE_WINDOWS, FALLBACK_IDENTIFIER,
};

/// Prefix for environment overrides, e.g. `TOLLGATE__SERVER__ADDR`.
pub const ENV_PREFIX: &str = "TOLLGATE";

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_addr() }
    }
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Path to the route rules file; the built-in table is used when unset
    #[serde(default)]
    pub rules_path: Option<String>,

    /// How often idle counters are swept, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Full windows a counter may stay idle before it is evicted
    #[serde(default = "default_idle_windows")]
    pub idle_windows: u64,

    /// Identity shared by requests carrying no identity headers
    #[serde(default = "default_fallback_identifier")]
    pub fallback_identifier: String,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            sweep_interval_secs: default_sweep_interval(),
            idle_windows: default_idle_windows(),
            fallback_identifier: default_fallback_identifier(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_idle_windows() -> u64 {
    DEFAULT_IDLE_WINDOWS
}

fn default_fallback_identifier() -> String {
    FALLBACK_IDENTIFIER.to_string()
}

/// The `TOLLGATE__SECTION__KEY` environment source.
pub fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).separator("__")
}

impl TollgateConfig {
    /// Load configuration from an optional file, overridden by `TOLLGATE__*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, environment())
    }

    /// Load configuration from an optional file layered under `env`.
    pub fn load_from(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading service configuration");
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder.add_source(env).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Apply command line overrides on top of file and environment values.
    pub fn with_overrides(mut self, rules: Option<&Path>, addr: Option<SocketAddr>) -> Self {
        if let Some(rules) = rules {
            self.rate_limiting.rules_path = Some(rules.to_string_lossy().into_owned());
        }
        if let Some(addr) = addr {
            self.server.addr = addr;
        }
        self
    }

    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    /// Load the route table this configuration points at.
    pub fn route_table(&self) -> Result<RouteTable> {
        match &self.rate_limiting.rules_path {
            Some(path) => RouteTable::from_file(path),
            None => Ok(RouteTable::builtin()),
        }
    }

    /// Build a rate limiter from this configuration.
    ///
    /// Fails if the rules file is missing or contains an invalid policy; the
    /// service must not start without working limits.
    pub fn build_rate_limiter(&self) -> Result<RateLimiter> {
        let routes = self.route_table()?;
        info!(rules = routes.len(), default = ?routes.default_policy(), "Route rules loaded");

        Ok(RateLimiter::new(routes)
            .with_identity(IdentifierResolver::with_fallback(
                self.rate_limiting.fallback_identifier.clone(),
            ))
            .with_idle_windows(self.rate_limiting.idle_windows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TollgateError;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("tollgate-{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = TollgateConfig::default();
        assert_eq!(config.server.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.rate_limiting.rules_path, None);
        assert_eq!(config.rate_limiting.sweep_interval_secs, 60);
        assert_eq!(config.rate_limiting.idle_windows, 2);
        assert_eq!(config.rate_limiting.fallback_identifier, "unknown");
    }

    #[test]
    fn test_from_yaml_file() {
        let path = temp_file(
            "service.yaml",
            r#"
server:
  addr: 0.0.0.0:9000
rate_limiting:
  sweep_interval_secs: 5
  fallback_identifier: 127.0.0.1
"#,
        );

        let config = TollgateConfig::from_file(&path).unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.rate_limiting.sweep_interval_secs, 5);
        assert_eq!(config.rate_limiting.idle_windows, 2);
        assert_eq!(config.rate_limiting.fallback_identifier, "127.0.0.1");

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = temp_file(
            "env-override.yaml",
            r#"
server:
  addr: 0.0.0.0:9000
rate_limiting:
  idle_windows: 4
  sweep_interval_secs: 5
"#,
        );

        let vars: config::Map<String, String> = [
            ("TOLLGATE__SERVER__ADDR", "10.1.2.3:7070"),
            ("TOLLGATE__RATE_LIMITING__IDLE_WINDOWS", "9"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let env = environment().source(Some(vars));

        let config = TollgateConfig::load_from(Some(path.as_path()), env).unwrap();
        assert_eq!(config.server.addr, "10.1.2.3:7070".parse().unwrap());
        assert_eq!(config.rate_limiting.idle_windows, 9);
        assert_eq!(config.rate_limiting.sweep_interval_secs, 5);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_environment_without_file() {
        let vars: config::Map<String, String> =
            [("TOLLGATE__RATE_LIMITING__FALLBACK_IDENTIFIER".to_string(), "edge".to_string())]
                .into_iter()
                .collect();

        let config = TollgateConfig::load_from(None, environment().source(Some(vars))).unwrap();
        assert_eq!(config.rate_limiting.fallback_identifier, "edge");
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_cli_overrides() {
        let base = TollgateConfig::default();
        assert_eq!(base.clone().with_overrides(None, None), base);

        let addr: SocketAddr = "0.0.0.0:8181".parse().unwrap();
        let config = base.with_overrides(Some(Path::new("/etc/tollgate/rules.yaml")), Some(addr));
        assert_eq!(config.server.addr, addr);
        assert_eq!(
            config.rate_limiting.rules_path.as_deref(),
            Some("/etc/tollgate/rules.yaml")
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = TollgateConfig::from_file("/nonexistent/tollgate.yaml").unwrap_err();
        assert!(matches!(err, TollgateError::Settings(_)));
    }

    #[test]
    fn test_build_rate_limiter_with_rules_file() {
        let rules = temp_file(
            "rules.yaml",
            r#"
default:
  limit: 10
  window_ms: 1000
routes:
  - pattern: /api/auth/login
    limit: 3
    window_ms: 60000
"#,
        );

        let mut config = TollgateConfig::default();
        config.rate_limiting.rules_path = Some(rules.to_string_lossy().into_owned());

        let limiter = config.build_rate_limiter().unwrap();
        let routes = limiter.routes();
        assert_eq!(routes.default_policy().limit, 10);
        assert_eq!(routes.resolve("/api/auth/login").policy.limit, 3);

        std::fs::remove_file(rules).unwrap();
    }

    #[test]
    fn test_invalid_rules_refuse_to_build() {
        let rules = temp_file(
            "bad-rules.yaml",
            r#"
routes:
  - pattern: /api/clients
    limit: 100
    window_ms: 0
"#,
        );

        let mut config = TollgateConfig::default();
        config.rate_limiting.rules_path = Some(rules.to_string_lossy().into_owned());

        assert!(matches!(config.build_rate_limiter(), Err(TollgateError::InvalidPolicy { .. })));

        std::fs::remove_file(rules).unwrap();
    }

    #[test]
    fn test_missing_rules_file_refuses_to_build() {
        let mut config = TollgateConfig::default();
        config.rate_limiting.rules_path = Some("/nonexistent/rules.yaml".to_string());

        assert!(matches!(config.build_rate_limiter(), Err(TollgateError::Io(_))));
    }
}
