//! hack.chat user records.

use serde_json::{Map, Value};

use dotbot_core::{UserFields, UserInfo};

/// A hack.chat participant, merged from one or more partial payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HcUserInfo {
    fields: UserFields,
}

impl HcUserInfo {
    /// Merges `sources` in order, later keys overwriting earlier ones.
    pub fn merge<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        Self {
            fields: UserFields::merge(sources),
        }
    }

    /// Returns the merged fields.
    pub fn fields(&self) -> &UserFields {
        &self.fields
    }

    /// Returns the user id, if the service sent one.
    pub fn user_id(&self) -> Option<i64> {
        self.fields.int_field("userid")
    }

    /// Returns true if this record describes the receiving client.
    pub fn is_me(&self) -> bool {
        self.fields
            .get("isme")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl UserInfo for HcUserInfo {
    fn nick(&self) -> Option<&str> {
        self.fields.str_field("nick")
    }

    fn trip(&self) -> Option<&str> {
        self.fields.str_field("trip")
    }

    fn color(&self) -> Option<&str> {
        self.fields.str_field("color")
    }

    fn level(&self) -> Option<i64> {
        self.fields.int_field("level")
    }

    fn utype(&self) -> Option<&str> {
        self.fields.str_field("utype")
    }

    fn hash(&self) -> Option<&str> {
        self.fields.str_field("hash")
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
