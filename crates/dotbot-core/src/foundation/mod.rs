//! Foundation layer - Core abstractions and type system.
//!
//! This module contains the fundamental building blocks of dotbot:
//! - Error taxonomy shared by every crate
//! - Canonical message and user model
//! - The per-message [`Context`]

pub mod context;
pub mod error;
pub mod message;

pub use context::Context;
pub use error::{CoreError, CoreResult, TransportError, TransportResult};
pub use message::{BoxedMessage, BoxedUserInfo, Message, UserFields, UserInfo};
