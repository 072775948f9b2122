//! `RecordManager` - owns the proxy client and the channel cache and turns
//! proxy outcomes into user-facing results.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use recmgr_api::proxy::{
    Channel, ChannelListing, LocalProxyApi, Recording, ScheduleRequest, Telecast,
};
use recmgr_cache::ChannelCache;
use tracing::instrument;

/// Extension of capture files in the recordings directory.
const CAPTURE_EXTENSION: &str = "ts";

/// Actions that need a reachable proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Channel listing.
    Channels,
    /// Recording listing and deletion.
    Records,
    /// Scheduling new recordings.
    Schedule,
    /// Program guide.
    Epg,
}

impl Feature {
    /// Every feature, in display order.
    pub const ALL: [Self; 4] = [Self::Channels, Self::Records, Self::Schedule, Self::Epg];
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Channels => "channels",
            Self::Records => "records",
            Self::Schedule => "schedule",
            Self::Epg => "epg",
        })
    }
}

/// Result of the liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyStatus {
    /// Whether `stat` answered with HTTP 200.
    pub reachable: bool,
    /// Features to disable while the proxy is unreachable.
    pub disabled: Vec<Feature>,
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    /// The action succeeded.
    Success,
    /// The action failed.
    Error,
}

/// One-line outcome of a mutation, shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    /// Severity.
    pub level: FlashLevel,
    /// Message text.
    pub message: String,
}

impl Flash {
    /// Creates a success flash.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    /// Creates an error flash.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    /// Whether the flash reports success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.level == FlashLevel::Success
    }
}

/// Serving component: one proxy API handle plus the channel cache.
#[derive(Debug)]
pub struct RecordManager<A> {
    api: A,
    channels: ChannelCache,
    records_dir: Option<PathBuf>,
}

impl<A: LocalProxyApi + Sync> RecordManager<A> {
    /// Creates a manager with an empty channel cache.
    pub fn new(api: A, records_dir: Option<PathBuf>) -> Self {
        Self {
            api,
            channels: ChannelCache::new(),
            records_dir,
        }
    }

    /// Probes the proxy. Never fails.
    #[instrument(skip_all)]
    pub async fn status(&self) -> ProxyStatus {
        let reachable = self.api.is_alive().await;
        ProxyStatus {
            reachable,
            disabled: if reachable {
                Vec::new()
            } else {
                Feature::ALL.to_vec()
            },
        }
    }

    /// Returns the channel listing, fetched once and then served from cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing has to be fetched and the fetch fails.
    pub async fn channels(&self) -> Result<Arc<ChannelListing>> {
        self.channels
            .get_or_fetch(&self.api)
            .await
            .context("failed to fetch channels")
    }

    /// Returns the live recording list.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch or the parse fails.
    pub async fn records(&self) -> Result<Vec<Recording>> {
        self.api
            .records()
            .await
            .context("failed to fetch recordings")
    }

    /// Returns the channel and its program guide.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown or a fetch fails.
    #[instrument(skip(self))]
    pub async fn epg(&self, channel_id: &str) -> Result<(Channel, Vec<Telecast>)> {
        let listing = self.channels().await?;
        let Some(channel) = listing.find(channel_id).cloned() else {
            bail!("unknown channel id {channel_id}");
        };
        let telecasts = self
            .api
            .epg(&channel.epg_id)
            .await
            .with_context(|| format!("failed to fetch EPG for {}", channel.name))?;
        Ok((channel, telecasts))
    }

    /// Schedules a recording and reports the outcome as a flash.
    ///
    /// # Errors
    ///
    /// Returns an error only if the channel listing cannot be loaded;
    /// proxy failures while scheduling become an error flash.
    #[instrument(skip_all, fields(channel_id = %request.channel_id))]
    pub async fn schedule(&self, request: &ScheduleRequest) -> Result<Flash> {
        let listing = self.channels().await?;
        if listing.find(&request.channel_id).is_none() {
            return Ok(Flash::error(format!(
                "Record schedule failed: unknown channel id {}",
                request.channel_id
            )));
        }

        Ok(match self.api.add_record(request).await {
            Ok(()) => Flash::success("Record scheduled"),
            Err(e) => Flash::error(format!("Record schedule failed: {e}")),
        })
    }

    /// Stops and deletes a recording, then removes its capture file.
    ///
    /// The file is only touched when both proxy calls succeeded.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Flash {
        if let Err(e) = self.api.delete_record(id).await {
            return Flash::error(format!("Record deletion failed: {e}"));
        }

        if let Some(dir) = self.records_dir.as_deref() {
            remove_capture_file(dir, id);
        }
        Flash::success("Record deleted")
    }
}

/// Removes `<dir>/<id>.ts`, ignoring a missing file.
fn remove_capture_file(dir: &Path, id: &str) {
    if Path::new(id).file_name().and_then(|n| n.to_str()) != Some(id) {
        tracing::warn!(%id, "Recording id is not a plain file name, skipping file removal");
        return;
    }

    let path = dir.join(format!("{id}.{CAPTURE_EXTENSION}"));
    match std::fs::remove_file(&path) {
        Ok(()) => tracing::info!(path = %path.display(), "Removed capture file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No capture file to remove");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove capture file");
        }
    }
}
