//! # Dotbot
//!
//! A chat-bot framework for hack.chat-style WebSocket chat services.
//!
//! ## Overview
//!
//! Dotbot turns each service's wire format into one canonical message model
//! and routes every message to registered handlers, which may be synchronous
//! callbacks or async tasks. Handlers can also await the next message
//! directly through the receive bridge.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌─────────────┐     ┌────────────┐     ┌──────────────────┐
//! │ Transport │────▶│  Connector  │────▶│ Dispatcher │────▶│ sync handlers    │
//! │ (ws/mem)  │     │ (HC / IDNS) │     │ (Chatter)  │────▶│ async handlers   │
//! └───────────┘     └─────────────┘     └────────────┘────▶│ Receiver waiters │
//!                                                          └──────────────────┘
//! ```
//!
//! - **Transport**: raw text frames over a socket ([`transport`])
//! - **Connector**: handshake, sends and message normalization per service
//! - **Chatter**: a connector plus its handler registries ([`Chatter`](crate::core::Chatter))
//! - **Runtime**: configuration, logging and Ctrl+C handling ([`runtime`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dotbot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = DotbotRuntime::builder().build()?;
//!     runtime.chatter().on("chat", |ctx| {
//!         if ctx.message().text() == Some("!ping") {
//!             let _ = ctx.reply("pong");
//!         }
//!     });
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `hackchat`: hack.chat adapter (default)
//! - `idns`: IDNS adapter (default)
//! - `runtime`: configuration loading, logging and runtime (default)
//! - `ws-client`: WebSocket client transport (default)
//! - `toml-config`: TOML configuration files (default)
//! - `json-log`: JSON log lines

pub use dotbot_core as core;
pub use dotbot_transport as transport;

#[cfg(feature = "hackchat")]
pub use dotbot_adapter_hackchat as hackchat;
#[cfg(feature = "idns")]
pub use dotbot_adapter_idns as idns;
#[cfg(feature = "runtime")]
pub use dotbot_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use dotbot::prelude::*;
/// ```
pub mod prelude {
    // Core model and dispatch
    pub use dotbot_core::prelude::*;

    // Transports
    pub use dotbot_transport::MemoryTransport;
    #[cfg(feature = "ws-client")]
    pub use dotbot_transport::WsTransport;

    // Service adapters
    #[cfg(feature = "hackchat")]
    pub use dotbot_adapter_hackchat::{HcConfig, HcConnector, HcMessage};
    #[cfg(feature = "idns")]
    pub use dotbot_adapter_idns::{IdnsConfig, IdnsConnector, IdnsMessage};

    // Runtime - main entry point
    #[cfg(feature = "runtime")]
    pub use dotbot_runtime::{DotbotRuntime, TrafficLog, apply_logging};
}
