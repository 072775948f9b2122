//! `AppConfig` struct and TOML read/write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Default proxy host.
const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default proxy port.
const DEFAULT_PORT: u16 = 8081;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 2;

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Proxy connection settings.
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Local recordings settings.
    #[serde(default)]
    pub records: RecordsConfig,
}

/// Proxy connection configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host name or IP address.
    #[serde(default = "default_address")]
    pub address: String,
    /// Proxy HTTP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Recordings configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RecordsConfig {
    /// Directory holding `<id>.ts` capture files, cleaned up on delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_address() -> String {
    String::from(DEFAULT_ADDRESS)
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProxyConfig {
    /// Request timeout as a `Duration`.
    ///
    /// # Errors
    ///
    /// Returns an error if `timeout_secs` is zero.
    pub fn timeout(&self) -> Result<Duration> {
        if self.timeout_secs == 0 {
            bail!("proxy.timeout_secs must be at least 1");
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }
}
