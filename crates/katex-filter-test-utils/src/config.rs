//! Configuration builders for tests.

use std::path::PathBuf;

use katex_filter_config::{AppConfig, ConnectFailurePolicy, DEFAULT_CONFIG_FILE};
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .server("127.0.0.1", server.port())
///     .on_connect_failure(ConnectFailurePolicy::Abort)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn server(mut self, host: &str, port: u16) -> Self {
        self.config.server.host = host.to_string();
        self.config.server.port = port;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.server.timeout_secs = secs;
        self
    }

    pub fn on_connect_failure(mut self, policy: ConnectFailurePolicy) -> Self {
        self.config.render.on_connect_failure = policy;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.render.concurrency = n;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A config file in a temporary directory, deleted on drop.
pub struct TempConfigFile {
    pub path: PathBuf,
    _temp_dir: TempDir,
}

impl TempConfigFile {
    /// Write `toml_content` to a fresh `katex-filter.toml`.
    pub async fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }
}
