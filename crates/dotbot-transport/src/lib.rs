//! # Dotbot Transport
//!
//! Socket transport implementations for the dotbot chat-bot framework.
//!
//! This crate provides concrete implementations of the [`Transport`] contract
//! defined in `dotbot-core`. Connectors only see that contract, so any
//! implementation here can back any service adapter.
//!
//! ## Features
//!
//! - `ws-client`: WebSocket client transport ([`WsTransport`])
//! - `full`: All transports
//!
//! The in-memory loopback transport is always available.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Adapter Layer      │  (hack.chat, IDNS)
//! │  (uses Transport)   │
//! ├─────────────────────┤
//! │  dotbot-core        │  (Transport contract)
//! ├─────────────────────┤
//! │  dotbot-transport   │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network / memory   │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dotbot_transport::WsTransport;
//! use dotbot_core::Transport;
//!
//! let transport = WsTransport::new();
//! let session = transport.open("wss://hack.chat/chat-ws", &[]).await?;
//! session.handle.send(r#"{"cmd":"join","channel":"lounge","nick":"dotbot"}"#.into())?;
//! ```
//!
//! [`Transport`]: dotbot_core::Transport

pub mod memory;

#[cfg(feature = "ws-client")]
pub mod websocket;

pub use memory::{MemoryPeer, MemoryTransport};

#[cfg(feature = "ws-client")]
pub use websocket::WsTransport;
