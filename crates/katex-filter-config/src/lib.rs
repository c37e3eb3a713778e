#![deny(unsafe_code)]

//! Configuration loading and validation for katex-filter.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure: where the render server lives, what to
//! do when it cannot be reached, and how chatty the logs are.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "katex-filter.toml";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Render server endpoint.
    #[serde(default)]
    pub server: ServerConfig,

    /// Rendering behavior.
    #[serde(default)]
    pub render: RenderConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the render server listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host name or address of the render server.
    #[serde(default = "default_server_host")]
    pub host: String,

    /// TCP port of the render server.
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Deadline in seconds applied to the connect and to the exchange each
    /// (0 = wait forever).
    #[serde(default)]
    pub timeout_secs: u64,
}

impl ServerConfig {
    /// The per-phase deadline, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            timeout_secs: 0,
        }
    }
}

fn default_server_host() -> String {
    "localhost".to_string()
}

fn default_server_port() -> u16 {
    7000
}

/// What a failed connection to the render server means for the run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectFailurePolicy {
    /// Log the failure and leave the expression unrendered.
    #[default]
    Skip,
    /// Log the failure and stop the whole run.
    Abort,
}

/// Rendering behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Policy applied when the render server cannot be reached.
    #[serde(default)]
    pub on_connect_failure: ConnectFailurePolicy,

    /// Maximum number of exchanges in flight at once (1 = sequential).
    #[serde(default = "default_render_concurrency")]
    pub concurrency: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            on_connect_failure: ConnectFailurePolicy::default(),
            concurrency: default_render_concurrency(),
        }
    }
}

fn default_render_concurrency() -> usize {
    1
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if tokio::fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::Validation(
                "server.host must not be empty".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be non-zero".to_string(),
            ));
        }
        if self.render.concurrency == 0 {
            return Err(ConfigError::Validation(
                "render.concurrency must be at least 1".to_string(),
            ));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.timeout(), None);
        assert_eq!(config.render.on_connect_failure, ConnectFailurePolicy::Skip);
        assert_eq!(config.render.concurrency, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 7100
            timeout_secs = 5

            [render]
            on_connect_failure = "abort"
            concurrency = 8

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7100);
        assert_eq!(config.server.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.render.on_connect_failure, ConnectFailurePolicy::Abort);
        assert_eq!(config.render.concurrency, 8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let toml = r#"
            [server]
            port = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_host() {
        let toml = r#"
            [server]
            host = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let toml = r#"
            [render]
            concurrency = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_rejects_unknown_connect_policy() {
        let toml = r#"
            [render]
            on_connect_failure = "retry"
        "#;
        let result = AppConfig::parse(toml);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let toml = r#"
            [logging]
            level = "loud"
        "#;
        let result = AppConfig::parse(toml);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut config = AppConfig::default();
        config.render.on_connect_failure = ConnectFailurePolicy::Abort;
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("on_connect_failure = \"abort\""));

        let parsed = AppConfig::parse(&text).unwrap();
        assert_eq!(parsed.render.on_connect_failure, ConnectFailurePolicy::Abort);
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[test_log::test(tokio::test)]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        tokio::fs::write(&path, b"[server]\nport = 4242\nhost = \"render.local\"\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.server.port, 4242);
        assert_eq!(config.server.host, "render.local");
    }

    #[test_log::test(tokio::test)]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_load_or_default_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let config = AppConfig::load_or_default(&path).await.unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[test_log::test(tokio::test)]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
