//! # Dotbot Adapter for IDNS
//!
//! This crate connects the dotbot framework to the IDNS portal chat.
//!
//! ## Overview
//!
//! - [`IdnsMessage`]: normalizes raw frames and carries the history flag
//! - [`IdnsUserInfo`]: message authors (name and avatar)
//! - [`IdnsConnector`]: resumable `init` handshake, keep-alive pings, and
//!   whisper/emote emulated through public chat
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dotbot_adapter_idns::{IdnsConfig, IdnsConnector};
//! use dotbot_core::{Chatter, SessionParams};
//! use dotbot_transport::WsTransport;
//!
//! let connector = IdnsConnector::new(IdnsConfig::new("CN", "Mozilla/5.0"), WsTransport::new());
//! let chatter = Chatter::new(connector, SessionParams::new("public", "dotbot"));
//! chatter.on("message", |ctx| {
//!     if ctx.message().text() == Some("!ping") && !ctx.message().is_feedback() {
//!         let _ = ctx.reply("pong");
//!     }
//! });
//! chatter.run().await?;
//! ```
//!
//! ## Message Types
//!
//! ```text
//! message, pong, online, initFinished, <command name>, unknown
//! ```

pub mod config;
mod connector;
pub mod model;

pub use config::IdnsConfig;
pub use connector::IdnsConnector;
pub use model::{IdnsMessage, IdnsMessageType, IdnsUserInfo};
