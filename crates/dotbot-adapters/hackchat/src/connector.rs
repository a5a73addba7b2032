//! hack.chat connector.

use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use dotbot_core::{
    BoxFuture, BoxedMessage, BoxedTransport, Connector, CoreResult, Delivery, Link, MessageSink,
    SendHook, SessionHandler, SessionParams,
};

use crate::config::HcConfig;
use crate::model::HcMessage;

/// Connector for hack.chat and compatible servers.
///
/// ```rust,ignore
/// let connector = HcConnector::new(WsTransport::new());
/// let chatter = Chatter::new(connector, SessionParams::new("lounge", "dotbot"));
/// chatter.run().await?;
/// ```
pub struct HcConnector {
    config: HcConfig,
    link: Arc<Link>,
}

impl HcConnector {
    /// Creates a connector for the public hack.chat endpoint.
    pub fn new(transport: BoxedTransport) -> Arc<Self> {
        Self::from_config(HcConfig::default(), transport)
    }

    /// Creates a connector from explicit configuration.
    pub fn from_config(config: HcConfig, transport: BoxedTransport) -> Arc<Self> {
        let link = Arc::new(Link::new(config.url.clone(), transport));
        Arc::new(Self { config, link })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HcConfig {
        &self.config
    }

    /// Sends the join handshake.
    pub fn join(&self, params: &SessionParams) -> CoreResult<()> {
        self.link.send_value(&join_payload(params))
    }
}

/// Builds the `join` command for `params`.
fn join_payload(params: &SessionParams) -> Value {
    let mut payload = json!({
        "cmd": "join",
        "channel": params.channel,
        "nick": params.nick,
    });
    if let (Some(password), Some(map)) = (params.password(), payload.as_object_mut()) {
        map.insert("pass".into(), Value::String(password.to_owned()));
    }
    payload
}

/// Escapes `\rule` in messages that also contain `$`, since hack.chat would
/// render it as a LaTeX rule.
fn escape_chat(text: &str) -> Cow<'_, str> {
    if text.contains('$') && text.contains("\\rule") {
        Cow::Owned(text.replace("\\rule", "&#92;rule"))
    } else {
        Cow::Borrowed(text)
    }
}

impl SessionHandler for HcConnector {
    fn link(&self) -> &Arc<Link> {
        &self.link
    }

    fn on_open(connector: &Arc<Self>, params: &SessionParams) -> CoreResult<()> {
        debug!(channel = %params.channel, nick = %params.nick, "Joining hack.chat channel");
        connector.join(params)
    }
}

impl Connector for HcConnector {
    fn site(&self) -> &str {
        &self.config.site
    }

    fn url(&self) -> &str {
        self.link.url()
    }

    fn is_running(&self) -> bool {
        self.link.is_running()
    }

    fn add_send_hook(&self, hook: SendHook) {
        self.link.add_send_hook(hook);
    }

    fn set_sink(&self, sink: Arc<dyn MessageSink>) {
        self.link.set_sink(sink);
    }

    fn start(self: Arc<Self>, params: SessionParams) -> CoreResult<()> {
        Link::start(self, params)
    }

    fn wait(&self) -> BoxFuture<'_, CoreResult<()>> {
        Box::pin(self.link.wait())
    }

    fn run_forever(self: Arc<Self>, params: SessionParams) -> BoxFuture<'static, CoreResult<()>> {
        Box::pin(Link::run(self, params))
    }

    fn quit(&self) {
        self.link.close();
    }

    fn send_chat(&self, text: &str) -> CoreResult<()> {
        self.send_dict(&json!({"cmd": "chat", "text": escape_chat(text)}))
    }

    fn send_whisper(&self, text: &str, nick: &str) -> CoreResult<Delivery> {
        self.send_dict(&json!({"cmd": "whisper", "nick": nick, "text": text}))?;
        Ok(Delivery::Native)
    }

    fn send_emote(&self, text: &str) -> CoreResult<Delivery> {
        self.send_dict(&json!({"cmd": "emote", "text": text}))?;
        Ok(Delivery::Native)
    }

    fn send_dict(&self, payload: &Value) -> CoreResult<()> {
        self.link.send_value(payload)
    }

    fn send_string(&self, payload: &str) -> CoreResult<()> {
        self.link.send_string(payload)
    }

    fn parse_message(&self, raw: &str) -> CoreResult<BoxedMessage> {
        Ok(Arc::new(HcMessage::parse(raw)?))
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl std::fmt::Debug for HcConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HcConnector")
            .field("site", &self.config.site)
            .field("link", &self.link)
            .finish()
    }
}
