//! # Dotbot Adapter for hack.chat
//!
//! This crate connects the dotbot framework to [hack.chat](https://hack.chat)
//! and servers speaking the same protocol.
//!
//! ## Overview
//!
//! - [`HcMessage`]: normalizes raw frames (type classification, feedback
//!   detection, whisper/emote text stripping, nick-change detection)
//! - [`HcUserInfo`]: user records merged from partial payloads
//! - [`HcConnector`]: join handshake and outbound commands
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dotbot_adapter_hackchat::HcConnector;
//! use dotbot_core::{Chatter, SessionParams};
//! use dotbot_transport::WsTransport;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let chatter = Chatter::new(
//!         HcConnector::new(WsTransport::new()),
//!         SessionParams::new("lounge", "dotbot"),
//!     );
//!     chatter.on("chat", |ctx| {
//!         if ctx.message().text() == Some("!ping") {
//!             let _ = ctx.reply("pong");
//!         }
//!     });
//!     chatter.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Message Types
//!
//! ```text
//! chat, emote, warn, onlineSet, onlineAdd, onlineRemove, captcha,
//! updateUser, whisper, invite, info, changeNick, unknown
//! ```

pub mod config;
mod connector;
pub mod model;

pub use config::HcConfig;
pub use connector::HcConnector;
pub use model::{HcMessage, HcMessageType, HcUserInfo, parse_hc_message};
