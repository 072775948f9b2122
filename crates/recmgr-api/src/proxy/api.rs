//! `ProxyApi` trait definition.
#![allow(clippy::future_not_send)]

use super::error::ProxyError;
use super::types::{ChannelListing, Recording, ScheduleRequest, Telecast};

/// P2P proxy API trait.
///
/// Abstracts proxy operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(ProxyApi: Send)]
pub trait LocalProxyApi {
    /// Fetches the channel listing with resolved group labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the proxy answers with a
    /// non-200 status, or the markup cannot be parsed.
    async fn channels(&self) -> Result<ChannelListing, ProxyError>;

    /// Fetches all recordings, sorted by channel name.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the proxy answers with a
    /// non-200 status, or any record cannot be parsed.
    async fn records(&self) -> Result<Vec<Recording>, ProxyError>;

    /// Fetches the program guide for one EPG identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the proxy answers with a
    /// non-200 status, or the markup cannot be parsed.
    async fn epg(&self, epg_id: &str) -> Result<Vec<Telecast>, ProxyError>;

    /// Schedules a recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the proxy does not
    /// answer with HTTP 200.
    async fn add_record(&self, request: &ScheduleRequest) -> Result<(), ProxyError>;

    /// Stops and deletes a recording.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP request fails or either call does not
    /// answer with HTTP 200.
    async fn delete_record(&self, id: &str) -> Result<(), ProxyError>;

    /// Probes the proxy. Never fails: any error means unreachable.
    async fn is_alive(&self) -> bool;
}
