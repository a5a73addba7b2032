//! WebSocket transport.
//!
//! This module provides the WebSocket client used to reach live chat services.

#[cfg(feature = "ws-client")]
mod client;
#[cfg(feature = "ws-client")]
pub use client::WsTransport;
