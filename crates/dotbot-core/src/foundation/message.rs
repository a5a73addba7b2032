//! Canonical message and user model.
//!
//! Every service adapter normalizes its wire frames into types implementing
//! [`Message`] and [`UserInfo`]. Downstream code (dispatch, contexts, user
//! handlers) only talks to these traits and never to a concrete adapter type,
//! unless it explicitly downcasts through [`Message::as_any`].
//!
//! # Architecture
//!
//! ```text
//! raw frame ──parse──▶ HcMessage / IdnsMessage ──(dyn Message)──▶ Context
//!                          │
//!                          └── user_info() ──▶ HcUserInfo / IdnsUserInfo (dyn UserInfo)
//! ```

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::foundation::error::CoreResult;

/// A boxed, shareable message.
pub type BoxedMessage = Arc<dyn Message>;

/// A boxed, shareable user record.
pub type BoxedUserInfo = Arc<dyn UserInfo>;

// ============================================================================
// UserInfo Trait
// ============================================================================

/// Attributes of a chat participant.
///
/// Services populate different subsets of these fields; anything a service
/// never sends reads as `None`.
pub trait UserInfo: Debug + Send + Sync + 'static {
    /// Display nickname.
    fn nick(&self) -> Option<&str>;

    /// Tripcode (identity hash derived from a password).
    fn trip(&self) -> Option<&str> {
        None
    }

    /// Name color.
    fn color(&self) -> Option<&str> {
        None
    }

    /// Permission level.
    fn level(&self) -> Option<i64> {
        None
    }

    /// User type ("user", "mod", "admin", ...).
    fn utype(&self) -> Option<&str> {
        None
    }

    /// Connection hash.
    fn hash(&self) -> Option<&str> {
        None
    }

    /// Raw access to any field, including protocol-specific extensions.
    fn get(&self, key: &str) -> Option<&Value>;
}

// ============================================================================
// Message Trait
// ============================================================================

/// A normalized inbound message.
///
/// All derived accessors are computed from the immutable raw payload; a
/// message never changes after it has been parsed.
pub trait Message: Debug + Send + Sync + 'static {
    /// The raw wire payload.
    fn raw_data(&self) -> &str;

    /// The parsed payload tree. Unknown fields are preserved here.
    fn data(&self) -> &Value;

    /// The type tag, drawn from the adapter's closed enumeration or `"unknown"`.
    fn kind(&self) -> &str;

    /// Protocol-specific facts derived at parse time.
    fn extras(&self) -> &Map<String, Value>;

    /// True when this message echoes the bot's own outbound action.
    fn is_feedback(&self) -> bool;

    /// The message text as sent over the wire, decorations included.
    fn raw_text(&self) -> Option<&str>;

    /// The message text with protocol decorations removed.
    fn text(&self) -> Option<&str>;

    /// Service timestamp, if the service provides one.
    fn time(&self) -> Option<i64>;

    /// The principal subject of this message.
    fn user_info(&self) -> Option<BoxedUserInfo>;

    /// The roster carried by snapshot messages.
    ///
    /// Fails with [`CoreError::MissingData`](crate::CoreError::MissingData)
    /// for every message that does not carry a roster.
    fn users(&self) -> CoreResult<Vec<BoxedUserInfo>>;

    /// The sender, for message types that have a distinct sender.
    fn sender(&self) -> Option<BoxedUserInfo>;

    /// Returns self as `Any` for downcasting to the concrete adapter type.
    fn as_any(&self) -> &dyn Any;
}

impl dyn Message {
    /// Attempts to downcast to a concrete message type.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns a string field from the parsed payload.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data().get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// UserFields
// ============================================================================

/// Overlay of partial attribute sources.
///
/// Later sources overwrite earlier ones key by key. A key present in a later
/// source always wins, even when its value is `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFields {
    fields: Map<String, Value>,
}

impl UserFields {
    /// Merges the given sources in order.
    pub fn merge<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        let mut fields = Map::new();
        for source in sources {
            for (key, value) in source {
                fields.insert(key.clone(), value.clone());
            }
        }
        Self { fields }
    }

    /// Returns a raw field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a field if it is a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns a field if it is an integer.
    pub fn int_field(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    /// Returns the merged map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_merge_is_last_write_wins() {
        let first = object(json!({"nick": "a", "color": "red"}));
        let second = object(json!({"nick": "b"}));
        let user = UserFields::merge([&first, &second]);

        assert_eq!(user.str_field("nick"), Some("b"));
        assert_eq!(user.str_field("color"), Some("red"));
    }

    #[test]
    fn test_merge_null_overwrites() {
        let first = object(json!({"nick": "a"}));
        let second = object(json!({"nick": null}));
        let user = UserFields::merge([&first, &second]);

        assert_eq!(user.str_field("nick"), None);
        assert_eq!(user.get("nick"), Some(&Value::Null));
    }

    #[test]
    fn test_merge_empty() {
        let user = UserFields::merge(std::iter::empty());
        assert!(user.as_map().is_empty());
        assert_eq!(user.int_field("level"), None);
    }
}
