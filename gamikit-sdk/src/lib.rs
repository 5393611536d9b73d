//! Shared wire types for gamikit.
//!
//! The server, the core engine and external consumers (dashboards,
//! analytics sinks) all speak the JSON shapes defined in [`objects`].
//! Enable the `client` feature for a typed HTTP client and a WebSocket
//! event stream.

#![forbid(unsafe_code)]

pub mod objects;

#[cfg(feature = "client")]
pub mod client;
