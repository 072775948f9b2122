//! P2P proxy client module.
//!
//! Builds endpoint URLs, issues HTTP GET requests against the proxy
//! and parses the returned markup into channels, recordings and
//! EPG entries.

mod api;
mod client;
mod endpoint;
mod error;
pub(crate) mod markup;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalProxyApi, ProxyApi};
#[allow(clippy::module_name_repetitions)]
pub use client::{DEFAULT_TIMEOUT, ProxyClient, ProxyClientBuilder};
pub use endpoint::{Endpoint, ProxyAddress};
#[allow(clippy::module_name_repetitions)]
pub use error::{DeleteStep, MarkupError, ProxyError};
pub use types::{
    Channel, ChannelListing, RECORD_TIME_FORMAT, Recording, ScheduleRequest, Telecast,
};
