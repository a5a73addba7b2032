//! IDNS message normalization.
//!
//! IDNS frames carry a `type` field and, for chat traffic, a nested `message`
//! record holding the author, text and sequence id. Whether a frame belongs to
//! the history replayed after `init` is not part of the payload: the connector
//! supplies it at parse time.

use std::any::Any;
use std::sync::Arc;

use serde_json::{Map, Value};

use dotbot_core::{BoxedUserInfo, CoreError, CoreResult, Message};

use crate::model::user::IdnsUserInfo;

/// Type tags of IDNS messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdnsMessageType {
    Message,
    Pong,
    Online,
    InitFinished,
    /// A `command` frame, tagged with its `name` (or `"command"` if absent).
    Command(String),
    Unknown,
}

impl IdnsMessageType {
    fn classify(data: &Value) -> Self {
        match data.get("type").and_then(Value::as_str) {
            Some("message") => Self::Message,
            Some("pong") => Self::Pong,
            Some("online") => Self::Online,
            Some("initFinished") => Self::InitFinished,
            Some("command") => Self::Command(
                data.get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("command")
                    .to_owned(),
            ),
            _ => Self::Unknown,
        }
    }

    /// Returns the tag as exposed through [`Message::kind`].
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::Pong => "pong",
            Self::Online => "online",
            Self::InitFinished => "initFinished",
            Self::Command(name) => name,
            Self::Unknown => "unknown",
        }
    }
}

/// A normalized IDNS frame.
#[derive(Debug, Clone)]
pub struct IdnsMessage {
    raw: String,
    data: Value,
    kind: IdnsMessageType,
    extras: Map<String, Value>,
    is_history: bool,
}

impl IdnsMessage {
    /// Parses one raw frame. `is_history` marks frames replayed before the
    /// service reported `initFinished`.
    pub fn parse(raw: &str, is_history: bool) -> CoreResult<Self> {
        let data: Value = serde_json::from_str(raw)?;
        if !data.is_object() {
            return Err(CoreError::parse("IDNS frame is not a JSON object"));
        }

        Ok(Self {
            raw: raw.to_owned(),
            kind: IdnsMessageType::classify(&data),
            data,
            extras: Map::new(),
            is_history,
        })
    }

    /// Returns the typed tag.
    pub fn message_type(&self) -> &IdnsMessageType {
        &self.kind
    }

    /// True for frames replayed from history.
    pub fn is_history(&self) -> bool {
        self.is_history
    }

    /// Returns the nested message record.
    pub fn message_record(&self) -> Option<&Map<String, Value>> {
        self.data.get("message").and_then(Value::as_object)
    }

    /// Returns the sequence id of the message record.
    pub fn message_id(&self) -> Option<i64> {
        self.message_record()?.get("messageId")?.as_i64()
    }

    /// Marks whether this frame arrived during the history replay.
    pub(crate) fn set_history(&mut self, is_history: bool) {
        self.is_history = is_history;
    }

    /// True for the frame that ends the history replay.
    pub fn ends_history(&self) -> bool {
        self.kind == IdnsMessageType::InitFinished && self.data.get("data") == Some(&Value::Bool(true))
    }

    /// Builds the typed author record.
    pub fn idns_user_info(&self) -> Option<IdnsUserInfo> {
        self.message_record()
            .map(|record| IdnsUserInfo::merge([record]))
    }
}

impl Message for IdnsMessage {
    fn raw_data(&self) -> &str {
        &self.raw
    }

    fn data(&self) -> &Value {
        &self.data
    }

    fn kind(&self) -> &str {
        self.kind.as_str()
    }

    fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    fn is_feedback(&self) -> bool {
        self.message_record()
            .and_then(|record| record.get("type"))
            .and_then(Value::as_str)
            == Some("sent")
    }

    fn raw_text(&self) -> Option<&str> {
        self.message_record()?.get("text")?.as_str()
    }

    fn text(&self) -> Option<&str> {
        self.raw_text()
    }

    /// IDNS frames carry no usable timestamp.
    fn time(&self) -> Option<i64> {
        None
    }

    fn user_info(&self) -> Option<BoxedUserInfo> {
        self.idns_user_info()
            .map(|user| Arc::new(user) as BoxedUserInfo)
    }

    fn users(&self) -> CoreResult<Vec<BoxedUserInfo>> {
        Err(CoreError::missing("\"users\" is not available for IDNS messages"))
    }

    fn sender(&self) -> Option<BoxedUserInfo> {
        self.user_info()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotbot_core::UserInfo;
    use serde_json::json;

    fn parse(value: Value, is_history: bool) -> IdnsMessage {
        IdnsMessage::parse(&value.to_string(), is_history).unwrap()
    }

    #[test]
    fn test_chat_record() {
        let msg = parse(
            json!({
                "type": "message",
                "message": {
                    "messageId": 17, "name": "alice", "avatar": "a.png",
                    "text": "hi all", "type": "received", "date": 1700000000000i64
                }
            }),
            false,
        );

        assert_eq!(msg.kind(), "message");
        assert_eq!(msg.text(), Some("hi all"));
        assert_eq!(msg.raw_text(), Some("hi all"));
        assert!(!msg.is_feedback());
        assert!(!msg.is_history());
        assert_eq!(msg.message_id(), Some(17));
        assert_eq!(msg.time(), None);
        assert_eq!(msg.sender().unwrap().nick(), Some("alice"));
        assert_eq!(msg.idns_user_info().unwrap().avatar(), Some("a.png"));
    }

    #[test]
    fn test_sent_record_is_feedback() {
        let msg = parse(
            json!({"type": "message", "message": {"name": "bot", "text": "x", "type": "sent"}}),
            true,
        );
        assert!(msg.is_feedback());
        assert!(msg.is_history());
    }

    #[test]
    fn test_classification() {
        assert_eq!(parse(json!({"type": "pong"}), false).kind(), "pong");
        assert_eq!(parse(json!({"type": "online", "count": 3}), false).kind(), "online");
        assert_eq!(
            parse(json!({"type": "command", "name": "clear"}), false).kind(),
            "clear"
        );
        assert_eq!(parse(json!({"type": "command"}), false).kind(), "command");
        assert_eq!(parse(json!({"type": "banner"}), false).kind(), "unknown");
        assert_eq!(parse(json!({}), false).kind(), "unknown");
    }

    #[test]
    fn test_init_finished() {
        let done = parse(json!({"type": "initFinished", "data": true}), true);
        assert_eq!(done.message_type(), &IdnsMessageType::InitFinished);
        assert!(done.ends_history());

        let not_done = parse(json!({"type": "initFinished", "data": false}), true);
        assert!(!not_done.ends_history());
    }

    #[test]
    fn test_users_always_missing() {
        let msg = parse(json!({"type": "online", "users": [{"name": "a"}]}), false);
        assert!(matches!(msg.users(), Err(CoreError::MissingData(_))));
    }

    #[test]
    fn test_frames_without_record() {
        let msg = parse(json!({"type": "pong"}), false);
        assert!(msg.user_info().is_none());
        assert!(msg.text().is_none());
        assert!(!msg.is_feedback());
        assert_eq!(msg.message_id(), None);
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            IdnsMessage::parse("nope", false),
            Err(CoreError::Parse { .. })
        ));
        assert!(matches!(
            IdnsMessage::parse("\"text\"", false),
            Err(CoreError::Parse { .. })
        ));
    }
}
