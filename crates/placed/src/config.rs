//! Server configuration.
//!
//! Values come from three layers, lowest precedence first: built-in
//! defaults, an optional TOML file, and command-line overrides applied by
//! the binary. [`ServerConfig::validate`] runs after all layers are merged.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use place_core::MAX_DIM;

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "PLACE_CONFIG";

/// Smallest accepted outbound queue: room for the login replies plus traffic.
pub const MIN_OUTBOUND_BUFFER: usize = 8;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Board side length.
    pub dim: u32,
    /// Minimum interval between accepted tile changes per session.
    pub cooldown_ms: u64,
    /// Messages queued per session before it is evicted as a slow consumer.
    pub outbound_buffer: usize,
    /// Time a connection may stay unauthenticated.
    pub login_timeout_secs: u64,
    /// Time a single socket write may take.
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5555,
            dim: 100,
            cooldown_ms: 1000,
            outbound_buffer: 1024,
            login_timeout_secs: 60,
            write_timeout_secs: 10,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ServerConfig {
    /// Parses configuration from TOML text; absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&text)
    }

    /// Loads `path`, else the file named by `PLACE_CONFIG`, else defaults.
    ///
    /// The result is not validated; call [`ServerConfig::validate`] after
    /// applying any overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim == 0 || self.dim > MAX_DIM {
            return Err(ConfigError::Invalid {
                field: "dim",
                reason: format!("must be in 1..={MAX_DIM}, got {}", self.dim),
            });
        }
        if self.cooldown_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "cooldown_ms",
                reason: "must be positive".into(),
            });
        }
        if self.outbound_buffer < MIN_OUTBOUND_BUFFER {
            return Err(ConfigError::Invalid {
                field: "outbound_buffer",
                reason: format!(
                    "must be at least {MIN_OUTBOUND_BUFFER}, got {}",
                    self.outbound_buffer
                ),
            });
        }
        if self.login_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "login_timeout_secs",
                reason: "must be positive".into(),
            });
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "write_timeout_secs",
                reason: "must be positive".into(),
            });
        }
        self.socket_addr().map(|_| ())
    }

    /// Returns the address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                field: "host",
                reason: format!("{}: {e}", self.host),
            })
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}
