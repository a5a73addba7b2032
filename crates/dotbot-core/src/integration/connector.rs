//! Connector trait and related types.
//!
//! A connector owns one transport session to one chat service. It exposes the
//! session lifecycle (`start`/`wait`/`run_forever`/`quit`), outbound send
//! operations, and the service's normalizer through `parse_message`.
//!
//! Concrete connectors (`HcConnector`, `IdnsConnector`) share their session
//! plumbing through [`Link`](crate::integration::session::Link).

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::context::Context;
use crate::foundation::error::CoreResult;
use crate::foundation::message::BoxedMessage;
use crate::framework::handler::BoxFuture;

/// Observer invoked with every serialized outbound frame before it is sent.
pub type SendHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Receiver of normalized inbound messages.
///
/// The connector hands every parsed frame, wrapped in a [`Context`], to its
/// sink. A chatter installs its dispatcher here.
pub trait MessageSink: Send + Sync {
    /// Delivers one context. Called on the network task, in arrival order.
    fn deliver(&self, ctx: Context);
}

/// How an outbound whisper or emote was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The service supports the operation natively.
    Native,
    /// The service lacks the operation; a decorated chat line was sent instead.
    Emulated,
}

/// Session parameters supplied at start time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Channel (room, group) to join.
    pub channel: String,
    /// Nickname to join as.
    pub nick: String,
    /// Optional password. Empty strings are treated as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl SessionParams {
    /// Creates session parameters without a password.
    pub fn new(channel: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            nick: nick.into(),
            password: None,
        }
    }

    /// Sets the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Returns the password if one was given and is non-empty.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

/// The core Connector trait.
///
/// Dispatch and context code depend only on this trait, never on a concrete
/// service variant.
pub trait Connector: Send + Sync + 'static {
    /// Short service identifier ("HC", "IDNS").
    fn site(&self) -> &str;

    /// Service endpoint URL.
    fn url(&self) -> &str;

    /// Returns true while the transport session is open.
    fn is_running(&self) -> bool;

    /// Appends an outbound observer. Hooks run in registration order.
    fn add_send_hook(&self, hook: SendHook);

    /// Installs the receiver of normalized inbound messages.
    fn set_sink(&self, sink: Arc<dyn MessageSink>);

    /// Starts the session on a background task and returns immediately.
    ///
    /// The handshake is sent once the transport reports it is open. Fails with
    /// [`CoreError::AlreadyRunning`](crate::CoreError::AlreadyRunning) if a
    /// session is active.
    fn start(self: Arc<Self>, params: SessionParams) -> CoreResult<()>;

    /// Resolves when the background session started by `start` ends.
    fn wait(&self) -> BoxFuture<'_, CoreResult<()>>;

    /// Runs the whole session on the calling task.
    fn run_forever(self: Arc<Self>, params: SessionParams) -> BoxFuture<'static, CoreResult<()>>;

    /// Closes the transport. Tolerates an already-closed session.
    fn quit(&self);

    /// Sends a public chat line.
    fn send_chat(&self, text: &str) -> CoreResult<()>;

    /// Sends a private whisper to `nick`.
    fn send_whisper(&self, text: &str, nick: &str) -> CoreResult<Delivery>;

    /// Sends an emote ("/me") line.
    fn send_emote(&self, text: &str) -> CoreResult<Delivery>;

    /// Serializes and sends a structured payload.
    fn send_dict(&self, payload: &Value) -> CoreResult<()>;

    /// Sends a pre-serialized payload.
    fn send_string(&self, payload: &str) -> CoreResult<()>;

    /// Normalizes one raw inbound frame.
    fn parse_message(&self, raw: &str) -> CoreResult<BoxedMessage>;

    /// Returns self as an `Arc<dyn Any>` for safe downcasting.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A boxed connector.
pub type BoxedConnector = Arc<dyn Connector>;

/// Attempts to downcast a boxed connector to a concrete type.
pub fn downcast_connector<T: Connector>(connector: BoxedConnector) -> Option<Arc<T>> {
    Arc::downcast::<T>(connector.as_any()).ok()
}
