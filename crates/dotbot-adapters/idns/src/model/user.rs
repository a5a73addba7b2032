//! IDNS user records.
//!
//! IDNS only identifies a sender by display name and avatar. Tripcodes,
//! colors, levels, user types and hashes are never sent, so those accessors
//! keep their `None` defaults.

use serde_json::{Map, Value};

use dotbot_core::{UserFields, UserInfo};

/// The author of an IDNS message record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdnsUserInfo {
    fields: UserFields,
}

impl IdnsUserInfo {
    /// Merges `sources` in order, later keys overwriting earlier ones.
    pub fn merge<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        Self {
            fields: UserFields::merge(sources),
        }
    }

    /// Avatar URL or identifier.
    pub fn avatar(&self) -> Option<&str> {
        self.fields.str_field("avatar")
    }
}

impl UserInfo for IdnsUserInfo {
    fn nick(&self) -> Option<&str> {
        self.fields.str_field("name")
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
