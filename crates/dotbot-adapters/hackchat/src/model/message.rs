//! hack.chat message normalization.
//!
//! # Classification
//!
//! ```text
//! cmd ∈ {chat, emote, warn, onlineSet, onlineAdd, onlineRemove,
//!        captcha, updateUser, whisper, invite}          ──▶ cmd
//! cmd = "info", type ∈ {whisper, invite, emote}         ──▶ type (legacy form)
//! cmd = "info", text = "<old> is now <new>"             ──▶ changeNick
//! cmd = "info"                                          ──▶ info
//! anything else                                         ──▶ unknown
//! ```
//!
//! Everything derived from the frame (type, feedback flag, stripped text) is
//! computed once in [`HcMessage::parse`]. A whisper or emote whose text lacks
//! the expected decoration is rejected there as a parse error.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Map, Value, json};

use dotbot_core::{BoxedUserInfo, CoreError, CoreResult, Message};

use crate::model::user::HcUserInfo;

/// Matches on the first line only; the new nick is the rest of that line.
static NICK_CHANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?) is now (.+)").expect("invalid nick change regex"));

static WHISPER_SENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^You whispered to @.+?: ").expect("invalid whisper regex"));

static INVITE_SENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^You invited .+? to \?").expect("invalid invite regex"));

static WHISPER_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:You whispered to @.+?: |.+? whispered: )(.+)")
        .expect("invalid whisper text regex")
});

static EMOTE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^@.+? (.+)").expect("invalid emote text regex"));

/// Type tags of hack.chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HcMessageType {
    Chat,
    Emote,
    Warn,
    OnlineSet,
    OnlineAdd,
    OnlineRemove,
    Captcha,
    UpdateUser,
    Whisper,
    Invite,
    Info,
    ChangeNick,
    Unknown,
}

impl HcMessageType {
    /// Maps a `cmd` value from the allow-list.
    fn from_cmd(cmd: &str) -> Option<Self> {
        Some(match cmd {
            "chat" => Self::Chat,
            "emote" => Self::Emote,
            "warn" => Self::Warn,
            "onlineSet" => Self::OnlineSet,
            "onlineAdd" => Self::OnlineAdd,
            "onlineRemove" => Self::OnlineRemove,
            "captcha" => Self::Captcha,
            "updateUser" => Self::UpdateUser,
            "whisper" => Self::Whisper,
            "invite" => Self::Invite,
            _ => return None,
        })
    }

    /// Returns the wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Emote => "emote",
            Self::Warn => "warn",
            Self::OnlineSet => "onlineSet",
            Self::OnlineAdd => "onlineAdd",
            Self::OnlineRemove => "onlineRemove",
            Self::Captcha => "captcha",
            Self::UpdateUser => "updateUser",
            Self::Whisper => "whisper",
            Self::Invite => "invite",
            Self::Info => "info",
            Self::ChangeNick => "changeNick",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HcMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized hack.chat frame.
#[derive(Debug, Clone)]
pub struct HcMessage {
    raw: String,
    data: Value,
    kind: HcMessageType,
    extras: Map<String, Value>,
    feedback: bool,
    text: Option<String>,
}

impl HcMessage {
    /// Parses and classifies one raw frame.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let data: Value = serde_json::from_str(raw)?;
        if !data.is_object() {
            return Err(CoreError::parse("hack.chat frame is not a JSON object"));
        }

        let raw_text = data.get("text").and_then(Value::as_str);
        let mut extras = Map::new();
        let kind = classify(&data, raw_text, &mut extras);
        let feedback = is_feedback(kind, raw_text);
        let text = strip_decoration(kind, raw_text)?;

        Ok(Self {
            raw: raw.to_owned(),
            data,
            kind,
            extras,
            feedback,
            text,
        })
    }

    /// Returns the typed tag.
    pub fn message_type(&self) -> HcMessageType {
        self.kind
    }

    /// Returns the text of a chat message.
    ///
    /// Fails for every other type, and for chat frames without text.
    pub fn chat_text(&self) -> CoreResult<&str> {
        if self.kind != HcMessageType::Chat {
            return Err(CoreError::missing(format!(
                "chat text requested on a {} message",
                self.kind
            )));
        }
        self.raw_text()
            .ok_or_else(|| CoreError::missing("chat message has no text"))
    }

    /// Nick before a rename, for `changeNick` messages.
    pub fn old_nick(&self) -> Option<&str> {
        self.extras.get("oldNick").and_then(Value::as_str)
    }

    /// Nick after a rename, for `changeNick` messages.
    pub fn new_nick(&self) -> Option<&str> {
        self.extras.get("newNick").and_then(Value::as_str)
    }

    /// Builds the typed user record for this message.
    pub fn hc_user_info(&self) -> Option<HcUserInfo> {
        let payload = self.data.as_object()?;
        match self.kind {
            HcMessageType::Chat
            | HcMessageType::Emote
            | HcMessageType::OnlineAdd
            | HcMessageType::OnlineRemove
            | HcMessageType::UpdateUser => Some(HcUserInfo::merge([payload])),
            HcMessageType::Whisper | HcMessageType::Invite => {
                if self.feedback {
                    return None;
                }
                let from = json!({ "nick": payload.get("from").cloned().unwrap_or(Value::Null) });
                Some(HcUserInfo::merge([payload, from.as_object()?]))
            }
            _ => None,
        }
    }

    /// Returns the typed roster of an `onlineSet` snapshot.
    pub fn hc_users(&self) -> CoreResult<Vec<HcUserInfo>> {
        let roster = match (self.kind, self.data.get("users")) {
            (HcMessageType::OnlineSet, Some(Value::Array(users))) => users,
            _ => {
                return Err(CoreError::missing(format!(
                    "\"users\" not available on a {} message",
                    self.kind
                )));
            }
        };

        roster
            .iter()
            .map(|entry| {
                entry
                    .as_object()
                    .map(|user| HcUserInfo::merge([user]))
                    .ok_or_else(|| CoreError::parse("roster entry is not an object"))
            })
            .collect()
    }
}

/// Parses one raw hack.chat frame.
pub fn parse_hc_message(raw: &str) -> CoreResult<HcMessage> {
    HcMessage::parse(raw)
}

fn classify(data: &Value, raw_text: Option<&str>, extras: &mut Map<String, Value>) -> HcMessageType {
    let cmd = data.get("cmd").and_then(Value::as_str);
    if let Some(kind) = cmd.and_then(HcMessageType::from_cmd) {
        return kind;
    }
    if cmd != Some("info") {
        return HcMessageType::Unknown;
    }

    match data.get("type").and_then(Value::as_str) {
        Some("whisper") => return HcMessageType::Whisper,
        Some("invite") => return HcMessageType::Invite,
        Some("emote") => return HcMessageType::Emote,
        _ => {}
    }

    // Heuristic: a nick containing " is now " splits at its first occurrence.
    if let Some(caps) = raw_text
        .filter(|text| !text.is_empty())
        .and_then(|text| NICK_CHANGE.captures(text))
    {
        extras.insert("oldNick".into(), Value::String(caps[1].to_owned()));
        extras.insert("newNick".into(), Value::String(caps[2].to_owned()));
        return HcMessageType::ChangeNick;
    }
    HcMessageType::Info
}

fn is_feedback(kind: HcMessageType, raw_text: Option<&str>) -> bool {
    let Some(text) = raw_text.filter(|text| !text.is_empty()) else {
        return false;
    };
    match kind {
        HcMessageType::Whisper => WHISPER_SENT.is_match(text),
        HcMessageType::Invite => INVITE_SENT.is_match(text),
        _ => false,
    }
}

fn strip_decoration(kind: HcMessageType, raw_text: Option<&str>) -> CoreResult<Option<String>> {
    let Some(text) = raw_text.filter(|text| !text.is_empty()) else {
        return Ok(None);
    };
    let pattern = match kind {
        HcMessageType::Whisper => &*WHISPER_TEXT,
        HcMessageType::Emote => &*EMOTE_TEXT,
        _ => return Ok(Some(text.to_owned())),
    };
    pattern
        .captures(text)
        .map(|caps| Some(caps[1].to_owned()))
        .ok_or_else(|| CoreError::parse(format!("{kind} text lacks its decoration: {text:?}")))
}

impl Message for HcMessage {
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
        self.feedback
    }

    fn raw_text(&self) -> Option<&str> {
        self.data.get("text").and_then(Value::as_str)
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn time(&self) -> Option<i64> {
        self.data.get("time").and_then(Value::as_i64)
    }

    fn user_info(&self) -> Option<BoxedUserInfo> {
        self.hc_user_info()
            .map(|user| Arc::new(user) as BoxedUserInfo)
    }

    fn users(&self) -> CoreResult<Vec<BoxedUserInfo>> {
        Ok(self
            .hc_users()?
            .into_iter()
            .map(|user| Arc::new(user) as BoxedUserInfo)
            .collect())
    }

    fn sender(&self) -> Option<BoxedUserInfo> {
        match self.kind {
            HcMessageType::Chat
            | HcMessageType::Emote
            | HcMessageType::Whisper
            | HcMessageType::Invite => self.user_info(),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
