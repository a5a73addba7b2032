//! The per-message context handed to handlers.

use std::sync::Arc;

use crate::foundation::error::{CoreError, CoreResult};
use crate::foundation::message::BoxedMessage;
use crate::integration::connector::Connector;

/// Pairs a live connector with one dispatched message.
///
/// A context is created fresh for every inbound message. Cloning is cheap and
/// every clone refers to the same connector and the same message.
#[derive(Clone)]
pub struct Context {
    connector: Arc<dyn Connector>,
    message: BoxedMessage,
}

impl Context {
    /// Creates a new context.
    pub fn new(connector: Arc<dyn Connector>, message: BoxedMessage) -> Self {
        Self { connector, message }
    }

    /// Returns the connector the message arrived on.
    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Returns the dispatched message.
    pub fn message(&self) -> &BoxedMessage {
        &self.message
    }

    /// Splits the context into its connector and message.
    pub fn into_parts(self) -> (Arc<dyn Connector>, BoxedMessage) {
        (self.connector, self.message)
    }

    /// Replies to the message.
    ///
    /// Whispers go back to the sender as a whisper; everything else is
    /// answered with a public chat line.
    pub fn reply(&self, text: &str) -> CoreResult<()> {
        if self.message.kind() != "whisper" {
            return self.connector.send_chat(text);
        }

        let nick = self
            .message
            .user_info()
            .and_then(|user| user.nick().map(str::to_owned))
            .ok_or_else(|| CoreError::missing("whisper has no sender nick to reply to"))?;
        self.connector.send_whisper(text, &nick).map(|_| ())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("site", &self.connector.site())
            .field("kind", &self.message.kind())
            .finish()
    }
}
