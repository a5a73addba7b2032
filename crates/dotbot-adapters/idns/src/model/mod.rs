//! Data models for the IDNS portal protocol.

pub mod message;
pub mod user;

pub use message::{IdnsMessage, IdnsMessageType};
pub use user::IdnsUserInfo;
