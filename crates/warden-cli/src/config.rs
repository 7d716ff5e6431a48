//! Gateway configuration file.
//!
//! ```yaml
//! serve:
//!   host: 0.0.0.0
//!   port: 4456
//! log:
//!   level: info
//!   format: json
//! mechanisms:
//!   authenticators:
//!     - id: anon
//!       type: anonymous
//! default_rule:
//!   execute:
//!     - authenticator: anon
//! providers:
//!   file_system:
//!     src: /etc/warden/rules
//!     watch_interval: 10s
//! ```
//!
//! `WARDEN_HOST`, `WARDEN_PORT` and `WARDEN_LOG_LEVEL` override the
//! corresponding file values.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use warden_core::config::duration;
use warden_core::{Error, Result};
use warden_mechanisms::CatalogConfig;
use warden_provider::ProvidersConfig;
use warden_rules::DefaultRuleConfig;

const ENV_HOST: &str = "WARDEN_HOST";
const ENV_PORT: &str = "WARDEN_PORT";
const ENV_LOG_LEVEL: &str = "WARDEN_LOG_LEVEL";

/// The whole configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Decision API listener
    #[serde(default)]
    pub serve: ServeConfig,
    /// Logging
    #[serde(default)]
    pub log: LogConfig,
    /// Mechanism result cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Mechanism prototypes
    #[serde(default)]
    pub mechanisms: CatalogConfig,
    /// Rule applied when nothing else matches
    #[serde(default)]
    pub default_rule: Option<DefaultRuleConfig>,
    /// Rule set providers
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Decision API listener.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServeConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Include the error in denied responses
    pub verbose_errors: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4456,
            verbose_errors: false,
        }
    }
}

impl ServeConfig {
    /// `host:port` to bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `warn,warden_provider=debug`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Mechanism result cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheConfig {
    /// Disabled means every mechanism result is fetched again
    pub enabled: bool,
    /// How often expired entries are dropped
    #[serde(deserialize_with = "duration::deserialize")]
    pub purge_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            purge_interval: Duration::from_secs(60),
        }
    }
}

impl WardenConfig {
    /// Read `path` and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_yaml(&raw)
            .map_err(|e| e.with_context(path.display()))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Decode a configuration document.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty file is a valid, empty configuration.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        yaml_serde::from_str(raw).map_err(|e| Error::configuration(e.to_string()))
    }

    /// Apply `WARDEN_*` overrides looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.serve.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.serve.port = port.trim().parse().map_err(|_| {
                Error::configuration(format!("{ENV_PORT} must be a port number, got '{port}'"))
            })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log.level = level;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    const CONFIG: &str = r#"
serve:
  port: 8080
  verbose_errors: true
log:
  format: json
cache:
  purge_interval: 30s
mechanisms:
  authenticators:
    - id: anon
      type: anonymous
default_rule:
  execute:
    - authenticator: anon
providers:
  file_system:
    src: /tmp
    watch_interval: 5s
"#;

    #[test]
    fn test_defaults() {
        let config = WardenConfig::from_yaml("").unwrap();
        assert_eq!(config.serve.address(), "0.0.0.0:4456");
        assert!(!config.serve.verbose_errors);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, LogFormat::Text);
        assert!(config.cache.enabled);
        assert!(config.default_rule.is_none());
        assert!(config.providers.file_system.is_none());
    }

    #[test]
    fn test_full_document() {
        let config = WardenConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(config.serve.address(), "0.0.0.0:8080");
        assert!(config.serve.verbose_errors);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.cache.purge_interval, Duration::from_secs(30));
        assert_eq!(config.mechanisms.authenticators.len(), 1);
        assert!(config.default_rule.is_some());
        let fs = config.providers.file_system.unwrap();
        assert_eq!(fs.watch_interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(WardenConfig::from_yaml("servers: {}").is_err());
        assert!(WardenConfig::from_yaml("serve:\n  address: x").is_err());
        assert!(WardenConfig::from_yaml("log:\n  format: xml").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WARDEN_HOST", "127.0.0.1"),
            ("WARDEN_PORT", "9000"),
            ("WARDEN_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = WardenConfig::from_yaml(CONFIG).unwrap();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.serve.address(), "127.0.0.1:9000");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = WardenConfig::default();
        let err = config
            .apply_env(|key| (key == "WARDEN_PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("WARDEN_PORT must be a port number"));
    }

    #[test]
    fn test_load_names_file_on_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"serve:\n  port: not-a-port\n").unwrap();

        let err = WardenConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));

        let err = WardenConfig::load(Path::new("/nonexistent/warden.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
