//! Error types for proxy calls and markup parsing.

use std::fmt;

use super::endpoint::Endpoint;

/// Failure of a proxy call.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ProxyError {
    /// The request did not complete within the client timeout.
    #[error("{endpoint} request timed out")]
    Timeout {
        /// Target of the request.
        endpoint: Endpoint,
    },

    /// The proxy could not be reached.
    #[error("{endpoint} connection failed: {source}")]
    Connect {
        /// Target of the request.
        endpoint: Endpoint,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Any other transport failure (body read, redirect, ...).
    #[error("{endpoint} request failed: {source}")]
    Transport {
        /// Target of the request.
        endpoint: Endpoint,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The proxy answered with a non-200 status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Target of the request.
        endpoint: Endpoint,
        /// HTTP status code.
        status: u16,
    },

    /// One of the two `records/del` calls returned a non-200 status.
    #[error("{step} failed (HTTP {status})")]
    Deletion {
        /// Which of the two calls failed.
        step: DeleteStep,
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be parsed.
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

impl ProxyError {
    /// Classifies a `reqwest` error raised while calling `endpoint`.
    pub(crate) fn from_transport(endpoint: Endpoint, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { endpoint }
        } else if source.is_connect() {
            Self::Connect { endpoint, source }
        } else {
            Self::Transport { endpoint, source }
        }
    }

    /// Whether the error comes from the network rather than the payload.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connect { .. } | Self::Transport { .. }
        )
    }
}

/// The two sub-calls of a recording deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    /// First `records/del` call, stops an active capture.
    Stop,
    /// Second `records/del` call, removes the entry.
    Delete,
}

impl fmt::Display for DeleteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Failure while turning proxy markup into typed records.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum MarkupError {
    /// The markup is not readable at all.
    #[error("malformed markup: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute list could not be read.
    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// A required attribute is absent.
    #[error("<{element}> is missing the `{attribute}` attribute")]
    MissingAttribute {
        /// Element name.
        element: &'static str,
        /// Attribute name.
        attribute: &'static str,
    },

    /// An attribute holds a value outside its domain.
    #[error("<{element}> has an invalid `{attribute}` value: {value:?}")]
    InvalidValue {
        /// Element name.
        element: &'static str,
        /// Attribute name.
        attribute: &'static str,
        /// Offending raw value.
        value: String,
    },

    /// A recording name lacks the `[prefix] name` shape.
    #[error("record name does not match `[prefix] name`: {0:?}")]
    RecordName(String),

    /// A timestamp could not be parsed.
    #[error("invalid timestamp {value:?}: {reason}")]
    Timestamp {
        /// Offending raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
}
