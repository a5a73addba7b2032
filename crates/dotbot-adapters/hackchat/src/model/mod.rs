//! Data models for the hack.chat protocol.
//!
//! This module contains the normalized message and user types the hack.chat
//! connector produces from raw frames.

pub mod message;
pub mod user;

pub use message::{HcMessage, HcMessageType, parse_hc_message};
pub use user::HcUserInfo;
