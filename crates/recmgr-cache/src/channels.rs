//! Lazily populated channel listing cache.

use std::sync::Arc;

use recmgr_api::proxy::{ChannelListing, LocalProxyApi, ProxyError};
use tokio::sync::Mutex;
use tracing::instrument;

/// Holds the last fetched channel listing.
///
/// The first [`get_or_fetch`](Self::get_or_fetch) fetches and stores the
/// listing; later calls return it without touching the network until
/// [`refresh`](Self::refresh) or [`invalidate`](Self::invalidate) is called.
/// The lock is held across the fetch, so concurrent first callers share a
/// single request.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct ChannelCache {
    entry: Mutex<Option<Arc<ChannelListing>>>,
}

impl ChannelCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached listing, fetching it on first access.
    ///
    /// A failed fetch leaves the cache empty.
    ///
    /// # Errors
    ///
    /// Returns the proxy error when the listing has to be fetched and the
    /// fetch fails.
    #[instrument(skip_all)]
    pub async fn get_or_fetch(
        &self,
        api: &(impl LocalProxyApi + Sync),
    ) -> Result<Arc<ChannelListing>, ProxyError> {
        let mut entry = self.entry.lock().await;
        if let Some(listing) = entry.as_ref() {
            tracing::trace!(channels = listing.len(), "Channel cache hit");
            return Ok(Arc::clone(listing));
        }

        tracing::debug!("Channel cache empty, fetching from proxy");
        let listing = Arc::new(api.channels().await?);
        tracing::info!(channels = listing.len(), "Channel cache populated");
        *entry = Some(Arc::clone(&listing));
        Ok(listing)
    }

    /// Fetches the listing unconditionally and replaces the cached one.
    ///
    /// On failure the previous listing is kept.
    ///
    /// # Errors
    ///
    /// Returns the proxy error when the fetch fails.
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        api: &(impl LocalProxyApi + Sync),
    ) -> Result<Arc<ChannelListing>, ProxyError> {
        let mut entry = self.entry.lock().await;
        let listing = Arc::new(api.channels().await?);
        tracing::info!(channels = listing.len(), "Channel cache refreshed");
        *entry = Some(Arc::clone(&listing));
        Ok(listing)
    }

    /// Drops the cached listing; the next access fetches again.
    pub async fn invalidate(&self) {
        if self.entry.lock().await.take().is_some() {
            tracing::debug!("Channel cache invalidated");
        }
    }

    /// Returns the cached listing without fetching.
    pub async fn cached(&self) -> Option<Arc<ChannelListing>> {
        self.entry.lock().await.clone()
    }
}
