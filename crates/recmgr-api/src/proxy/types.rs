//! Proxy data types.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp format used by `records/all` and `records/add`
/// (e.g. `01012024_100000`).
pub const RECORD_TIME_FORMAT: &str = "%d%m%Y_%H%M%S";

/// A single channel from the `channels/` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Channel ID (unique within a listing).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Group label resolved from the `category` elements.
    /// Falls back to `group_id` when no category matches.
    pub group: String,
    /// Raw group ID as sent by the proxy.
    pub group_id: String,
    /// Adult content flag.
    pub adult: bool,
    /// Identifier to pass to the `epg/` endpoint.
    pub epg_id: String,
}

/// Parsed `channels/` response: channels sorted by name plus the
/// group mapping they were resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelListing {
    /// Channels, ascending by name.
    pub channels: Vec<Channel>,
    /// Group ID to display name.
    pub groups: BTreeMap<String, String>,
}

impl ChannelListing {
    /// Looks up a channel by ID.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|ch| ch.id == id)
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the listing holds no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// A scheduled, running or finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// Channel name with the `[prefix] ` stripped.
    pub channel_name: String,
    /// Start time (proxy local time).
    pub start: NaiveDateTime,
    /// End time (proxy local time).
    pub end: NaiveDateTime,
    /// Status string, verbatim.
    pub status: String,
    /// Proxy-side recording ID, verbatim.
    pub id: String,
}

/// A single EPG entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Telecast {
    /// Broadcast start.
    pub start: DateTime<Utc>,
    /// Broadcast end.
    pub end: DateTime<Utc>,
    /// Program name.
    pub name: String,
}

/// Parameters for `records/add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    /// Channel to record.
    pub channel_id: String,
    /// Capture start (proxy local time).
    pub start: NaiveDateTime,
    /// Capture end (proxy local time).
    pub end: NaiveDateTime,
}

impl ScheduleRequest {
    /// Query parameters in the proxy's wire format.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("channel_id", self.channel_id.clone()),
            ("start", self.start.format(RECORD_TIME_FORMAT).to_string()),
            ("end", self.end.format(RECORD_TIME_FORMAT).to_string()),
        ]
    }
}
