//! In-memory cache layer for recmgr.
//!
//! Keeps the proxy's channel listing for the lifetime of the owning
//! component so repeated lookups avoid a network round-trip. Recordings
//! and EPG data are not cached.

/// Channel listing cache.
pub mod channels;

#[allow(clippy::module_name_repetitions)]
pub use channels::ChannelCache;
