//! Session configuration.
//!
//! Built in code via `Default` plus struct update syntax, or loaded from a
//! TOML file:
//!
//! ```toml
//! host = "kb.example.org"
//! port = 3600
//! encoding = "binary"
//! persistent = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AccessResult, ConfigError};
use crate::transport::Encoding;

/// Capacity of each result cache unless configured otherwise.
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Configuration for a [`Session`](crate::session::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server host name.
    pub host: String,
    /// Server base port.
    pub port: u16,
    /// Wire encoding.
    pub encoding: Encoding,
    /// Keep one connection for the session's lifetime instead of one per call.
    pub persistent: bool,
    /// Entries per result cache.
    pub cache_capacity: usize,
    /// Resolve the well-known constants when the session opens.
    pub bootstrap: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3600,
            encoding: Encoding::Textual,
            persistent: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            bootstrap: true,
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> AccessResult<Self> {
        let config: SessionConfig = toml::from_str(text).map_err(|e| ConfigError::Toml {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> AccessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> AccessResult<()> {
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                message: "port must be > 0".into(),
            }
            .into());
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "cache_capacity must be > 0".into(),
            }
            .into());
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "host must not be empty".into(),
            }
            .into());
        }
        Ok(())
    }
}
