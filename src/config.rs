//! Configuration for stowage

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default store root
pub fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stowage")
}

/// Configuration
///
/// Loaded from a TOML file when `--config` is given; every field has a
/// default so a partial file works. CLI flags override whatever loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory blobs are stored under
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,

    /// Host the HTTP server binds
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// HTTP port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            bind_host: default_bind_host(),
            http_port: default_http_port(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
