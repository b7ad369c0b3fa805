//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `RAWREAD_*` environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::storage::MemoryStoreConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins, empty means any
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Upper bound on a buffered read; the read is cancelled past it
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Series buffered between the stream drain and the socket
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8086
}

fn default_request_timeout() -> u64 {
    30
}

fn default_stream_buffer() -> usize {
    1
}

impl ApiConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

/// Reference store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_retention_policy")]
    pub default_retention_policy: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// JSON file loaded into the store at startup
    #[serde(default)]
    pub seed_file: Option<String>,
}

fn default_retention_policy() -> String {
    "autogen".to_string()
}

fn default_batch_size() -> usize {
    1000
}

impl StorageConfig {
    pub fn store_config(&self) -> MemoryStoreConfig {
        MemoryStoreConfig {
            default_retention_policy: self.default_retention_policy.clone(),
            batch_size: self.batch_size.max(1),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_retention_policy: default_retention_policy(),
            batch_size: default_batch_size(),
            seed_file: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Defaults with environment variable overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    /// Unparseable numbers are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // API overrides
        if let Some(host) = lookup("RAWREAD_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("RAWREAD_API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }
        if let Some(secs) = lookup("RAWREAD_REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.api.request_timeout_secs = secs;
        }
        if let Some(buffer) = lookup("RAWREAD_STREAM_BUFFER").and_then(|s| s.parse().ok()) {
            self.api.stream_buffer = buffer;
        }

        // Storage overrides
        if let Some(seed) = lookup("RAWREAD_SEED_FILE") {
            self.storage.seed_file = Some(seed);
        }
        if let Some(rp) = lookup("RAWREAD_DEFAULT_RP") {
            self.storage.default_retention_policy = rp;
        }

        // Logging overrides
        if let Some(level) = lookup("RAWREAD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("RAWREAD_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Config file locations, searched in order
pub fn default_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|p| p.join("rawread").join("config.toml")),
        Some(PathBuf::from("/etc/rawread/config.toml")),
        Some(PathBuf::from("./config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# rawread configuration
#
# Environment variables override these settings:
# - RAWREAD_API_HOST
# - RAWREAD_API_PORT
# - RAWREAD_REQUEST_TIMEOUT_SECS
# - RAWREAD_STREAM_BUFFER
# - RAWREAD_SEED_FILE
# - RAWREAD_DEFAULT_RP
# - RAWREAD_LOG_LEVEL
# - RAWREAD_LOG_FORMAT

[api]
host = "0.0.0.0"
port = 8086

# Allowed CORS origins (empty allows any)
cors_origins = []

# Buffered reads running longer than this are cancelled (seconds)
request_timeout_secs = 30

# Series queued between the stream drain and the WebSocket
stream_buffer = 1

[storage]
# Retention policy used when a request names none
default_retention_policy = "autogen"

# Maximum points per cursor batch
batch_size = 1000

# JSON file loaded into the store at startup
# seed_file = "/var/lib/rawread/seed.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.addr(), "0.0.0.0:8086");
        assert_eq!(config.api.stream_buffer, 1);
        assert_eq!(config.storage.default_retention_policy, "autogen");
        assert_eq!(config.storage.batch_size, 1000);
        assert!(config.storage.seed_file.is_none());
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.api.port, 8086);
        assert_eq!(config.api.request_timeout_secs, 30);
        assert!(config.api.cors_origins.is_empty());
        assert_eq!(config.storage.batch_size, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nport = 9000\n\n[storage]\nbatch_size = 0").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.storage.store_config().batch_size, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_errors() {
        let err = Config::load(Path::new("/nonexistent/rawread.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api\nport = ").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("RAWREAD_API_PORT", "9999"),
            ("RAWREAD_REQUEST_TIMEOUT_SECS", "soon"),
            ("RAWREAD_SEED_FILE", "/tmp/seed.json"),
            ("RAWREAD_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.port, 9999);
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.storage.seed_file.as_deref(), Some("/tmp/seed.json"));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.api.host, "0.0.0.0");
    }
}
