//! Typed proxy endpoints and URL construction.

use std::fmt;

use anyhow::{Context, Result, bail};
use url::Url;

/// Targets exposed by the P2P proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Session setup (`login`).
    Login,
    /// Channel list with categories (`channels/`).
    Channels,
    /// All recordings (`records/all`).
    Records,
    /// Schedule a recording (`records/add`).
    RecordAdd,
    /// Stop or delete a recording (`records/del`).
    RecordDelete,
    /// Per-channel program guide (`epg/`).
    Epg,
    /// Liveness probe (`stat`).
    Stat,
}

impl Endpoint {
    /// Path suffix relative to the proxy root.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Channels => "channels/",
            Self::Records => "records/all",
            Self::RecordAdd => "records/add",
            Self::RecordDelete => "records/del",
            Self::Epg => "epg/",
            Self::Stat => "stat",
        }
    }

    /// Whether the proxy expects a `login` call before this endpoint.
    #[must_use]
    pub const fn requires_login(self) -> bool {
        matches!(
            self,
            Self::Channels | Self::Records | Self::RecordAdd | Self::RecordDelete
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Root address of a proxy (`http://host:port/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddress {
    base: Url,
}

impl ProxyAddress {
    /// Validates `host` and `port` and builds the root URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is empty or does not form a valid URL.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            bail!("proxy host must not be empty");
        }
        let base = Url::parse(&format!("http://{host}:{port}/"))
            .with_context(|| format!("invalid proxy address {host}:{port}"))?;
        Ok(Self { base })
    }

    /// Uses an existing URL as the proxy root (for wiremock in tests).
    ///
    /// A missing trailing slash is added so endpoint paths are appended
    /// rather than replacing the last segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot carry a path (e.g. `data:`).
    pub fn from_url(mut base: Url) -> Result<Self> {
        if base.cannot_be_a_base() {
            bail!("proxy URL cannot be a base: {base}");
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        Ok(Self { base })
    }

    /// Root URL of the proxy.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Full URL for `endpoint`.
    #[must_use]
    pub fn url(&self, endpoint: Endpoint) -> Url {
        let mut url = self.base.clone();
        let path = format!("{}{}", self.base.path(), endpoint.path());
        url.set_path(&path);
        url
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.base.fmt(f)
    }
}
