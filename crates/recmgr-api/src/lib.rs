//! Proxy client library for recmgr.
//!
//! Talks to a P2P TV proxy over plain HTTP and turns its channel,
//! recording and EPG markup into typed records.

/// P2P proxy client.
pub mod proxy;
