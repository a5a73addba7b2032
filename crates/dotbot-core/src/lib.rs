//! # Dotbot Core
//!
//! The core engine of the dotbot chat-bot framework.
//!
//! This crate turns heterogeneous chat-service wire payloads into one
//! canonical message model and routes every message to registered handlers.
//!
//! ## Architecture Layers
//!
//! Dotbot Core is organized into three architectural layers:
//!
//! ### Foundation Layer
//!
//! Core abstractions and type system:
//! - **Error Taxonomy**: protocol, state, missing-data and transport errors ([`CoreError`])
//! - **Canonical Model**: [`Message`] and [`UserInfo`] with last-write-wins [`UserFields`]
//! - **Context**: one message plus the connector it arrived on ([`Context`])
//!
//! ### Framework Layer
//!
//! Message processing and routing:
//! - **Handlers**: tagged sync/async callbacks ([`Handler`])
//! - **Dispatcher**: ordered untyped and typed registries plus the event loop ([`Dispatcher`])
//! - **Modules**: reusable registration bundles ([`Module`])
//! - **Await Bridge**: pull-style consumption ([`Receiver`])
//!
//! ### Integration Layer
//!
//! External system interfaces:
//! - **Transport Contract**: what a socket implementation must provide ([`Transport`])
//! - **Connector Contract**: lifecycle and sends for one service ([`Connector`])
//! - **Session Engine**: shared state machine connectors embed ([`Link`])
//! - **Chatter**: a connector bound to a dispatcher ([`Chatter`])
//!
//! ## Data Flow
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌────────────┐     ┌───────────┐
//! │ Transport │────▶│ Connector  │────▶│ Dispatcher │────▶│  Handler  │
//! │ (ws/mem)  │     │ (parse_*)  │     │  (Chatter) │────▶│  Handler  │
//! └───────────┘     └────────────┘     └────────────┘────▶│ Receiver  │
//!                                                         └───────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dotbot_core::{Chatter, SessionParams, apply_recv};
//!
//! let chatter = Chatter::new(connector, SessionParams::new("lounge", "dotbot"));
//! chatter.on("chat", |ctx| {
//!     if ctx.message().text() == Some("!hello") {
//!         let _ = ctx.reply("hello!");
//!     }
//! });
//!
//! let recv = apply_recv(&chatter);
//! chatter.start()?;
//! let first = recv.recv_message().await?;
//! println!("first message: {:?}", first.text());
//! chatter.wait().await?;
//! ```

// Architectural layers
pub mod foundation;
pub mod framework;
pub mod integration;

// Re-export foundation types
pub use foundation::{
    BoxedMessage, BoxedUserInfo, Context, CoreError, CoreResult, Message, TransportError,
    TransportResult, UserFields, UserInfo,
};

// Re-export framework types
pub use framework::{
    ApplyHook, AsyncHandler, BoxFuture, Dispatcher, Handler, Module, Receiver, SyncHandler,
    apply_recv, guarded,
};

// Re-export integration types
pub use integration::{
    BoxedConnector, BoxedTransport, Chatter, Connector, Delivery, Link, LinkState, MessageSink,
    SendHook, SessionHandler, SessionParams, Transport, TransportEvent, TransportHandle,
    TransportSession, downcast_connector,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::framework::{Handler, Module, Receiver, apply_recv, guarded};
    pub use super::integration::{Chatter, Connector, Delivery, SessionParams};
}
