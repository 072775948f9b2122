//! Application configuration module.
//!
//! Manages the TOML config file holding the proxy address, the request
//! timeout and the optional recordings directory.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, ProxyConfig, RecordsConfig};
pub use paths::resolve_config_path;
