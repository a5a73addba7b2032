//! IDNS portal connector.
//!
//! IDNS sessions are resumable: the `init` handshake carries the id of the
//! last message seen, and the service replays history after it before sending
//! `initFinished`. The connector tracks both facts while parsing, so handlers
//! always observe session state that already accounts for the current frame.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use dotbot_core::{
    BoxFuture, BoxedMessage, BoxedTransport, Connector, CoreResult, Delivery, Link,
    MessageSink, SendHook, SessionHandler, SessionParams,
};

use crate::config::IdnsConfig;
use crate::model::IdnsMessage;

/// Sentinel sent before any message id has been seen.
const NO_MESSAGE_ID: i64 = -1;

/// Connector for the IDNS portal.
///
/// ```rust,ignore
/// let connector = IdnsConnector::new(IdnsConfig::new("CN", "Mozilla/5.0"), WsTransport::new());
/// let chatter = Chatter::new(connector, SessionParams::new("public", "dotbot"));
/// chatter.run().await?;
/// ```
pub struct IdnsConnector {
    config: IdnsConfig,
    link: Arc<Link>,
    /// Parameters of the current (or last) session.
    params: RwLock<Option<SessionParams>>,
    /// Set once the service has finished replaying history.
    init_finished: AtomicBool,
    /// Last message id seen, kept across sessions for resumption.
    last_message_id: AtomicI64,
}

impl IdnsConnector {
    /// Creates a connector from configuration.
    pub fn new(config: IdnsConfig, transport: BoxedTransport) -> Arc<Self> {
        let link = Link::new(config.url.clone(), transport)
            .with_header("User-Agent", config.user_agent.clone());
        Arc::new(Self {
            config,
            link: Arc::new(link),
            params: RwLock::new(None),
            init_finished: AtomicBool::new(false),
            last_message_id: AtomicI64::new(NO_MESSAGE_ID),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &IdnsConfig {
        &self.config
    }

    /// True once the history replay of the current session has finished.
    pub fn init_finished(&self) -> bool {
        self.init_finished.load(Ordering::SeqCst)
    }

    /// Id of the last message seen, or `-1`.
    pub fn last_message_id(&self) -> i64 {
        self.last_message_id.load(Ordering::SeqCst)
    }

    /// Sends the `init` handshake.
    pub fn join(&self, params: &SessionParams) -> CoreResult<()> {
        self.link.send_value(&json!({
            "type": "init",
            "group": params.channel,
            "name": params.nick,
            "country": self.config.country,
            "userAgent": self.config.user_agent,
            "lastMessageId": self.last_message_id(),
        }))
    }

    /// Sends one keep-alive ping for `channel`.
    pub fn ping(&self, channel: &str) -> CoreResult<()> {
        self.link
            .send_value(&json!({"type": "ping", "group": channel}))
    }

    /// Parameters of the current session, empty before the first one.
    fn session_params(&self) -> SessionParams {
        self.params.read().clone().unwrap_or_default()
    }

    /// Folds one parsed frame into the session state.
    fn observe(&self, message: &IdnsMessage) {
        if message.ends_history() && !self.init_finished.swap(true, Ordering::SeqCst) {
            debug!(url = %self.link.url(), "History replay finished");
        }
        if let Some(id) = message.message_id() {
            self.last_message_id.store(id, Ordering::SeqCst);
        }
    }
}

/// Sends a ping every `period` until `token` (the session that spawned it)
/// is cancelled or the connector is dropped. The first ping goes out
/// immediately.
async fn keep_alive(
    connector: Weak<IdnsConnector>,
    token: CancellationToken,
    channel: String,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(connector) = connector.upgrade() else {
                    break;
                };
                if let Err(e) = connector.ping(&channel) {
                    debug!(error = %e, "Keep-alive stopped");
                    break;
                }
                trace!(channel = %channel, "Keep-alive ping sent");
            }
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

impl SessionHandler for IdnsConnector {
    fn link(&self) -> &Arc<Link> {
        &self.link
    }

    fn on_open(connector: &Arc<Self>, params: &SessionParams) -> CoreResult<()> {
        if params.password().is_some() {
            warn!(site = %connector.config.site, "IDNS does not support passwords, ignoring it");
        }

        *connector.params.write() = Some(params.clone());
        connector.init_finished.store(false, Ordering::SeqCst);

        debug!(
            channel = %params.channel,
            nick = %params.nick,
            last_message_id = connector.last_message_id(),
            "Sending IDNS init"
        );
        connector.join(params)?;

        tokio::spawn(keep_alive(
            Arc::downgrade(connector),
            connector.link.session_token(),
            params.channel.clone(),
            connector.config.ping_interval(),
        ));
        Ok(())
    }
}

impl Connector for IdnsConnector {
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
        let params = self.session_params();
        self.send_dict(&json!({
            "type": "message",
            "group": params.channel,
            "name": params.nick,
            "text": text,
            "date": now_millis(),
            "lastMessageId": self.last_message_id(),
        }))
    }

    fn send_whisper(&self, text: &str, nick: &str) -> CoreResult<Delivery> {
        warn!(site = %self.config.site, nick = %nick, "IDNS has no whispers, sending a public mention instead");
        self.send_chat(&format!("@{nick} {text}"))?;
        Ok(Delivery::Emulated)
    }

    fn send_emote(&self, text: &str) -> CoreResult<Delivery> {
        warn!(site = %self.config.site, "IDNS has no emotes, sending a chat line instead");
        let params = self.session_params();
        self.send_chat(&format!("*{} {text}", params.nick))?;
        Ok(Delivery::Emulated)
    }

    fn send_dict(&self, payload: &Value) -> CoreResult<()> {
        self.link.send_value(payload)
    }

    fn send_string(&self, payload: &str) -> CoreResult<()> {
        self.link.send_string(payload)
    }

    fn parse_message(&self, raw: &str) -> CoreResult<BoxedMessage> {
        let mut message = IdnsMessage::parse(raw, false)?;
        self.observe(&message);
        message.set_history(!self.init_finished());
        Ok(Arc::new(message))
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl std::fmt::Debug for IdnsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdnsConnector")
            .field("site", &self.config.site)
            .field("link", &self.link)
            .field("init_finished", &self.init_finished())
            .field("last_message_id", &self.last_message_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use dotbot_core::{Chatter, CoreError, LinkState, Message};
    use dotbot_transport::{MemoryPeer, MemoryTransport};
    use parking_lot::Mutex;

    fn config() -> IdnsConfig {
        IdnsConfig::new("CN", "agent/1.0").with_url("mem://idns")
    }

    fn frame(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    async fn started(params: SessionParams) -> (Arc<IdnsConnector>, MemoryPeer) {
        let transport = MemoryTransport::new();
        let connector = IdnsConnector::new(config(), transport.clone());
        Arc::clone(&connector).start(params).unwrap();
        let peer = transport.accept().await.unwrap();
        (connector, peer)
    }

    #[tokio::test]
    async fn test_init_handshake_and_first_ping() {
        let (_connector, mut peer) = started(SessionParams::new("public", "bot")).await;

        assert_eq!(peer.header("user-agent"), Some("agent/1.0"));
        assert_eq!(
            frame(&peer.recv().await.unwrap()),
            json!({
                "type": "init", "group": "public", "name": "bot",
                "country": "CN", "userAgent": "agent/1.0", "lastMessageId": -1
            })
        );
        assert_eq!(
            frame(&peer.recv().await.unwrap()),
            json!({"type": "ping", "group": "public"})
        );
    }

    #[tokio::test]
    async fn test_chat_payload() {
        let (connector, mut peer) = started(SessionParams::new("public", "bot")).await;
        let _init = peer.recv().await.unwrap();
        let _ping = peer.recv().await.unwrap();

        connector.send_chat("hi").unwrap();
        let sent = frame(&peer.recv().await.unwrap());

        assert_eq!(sent["type"], json!("message"));
        assert_eq!(sent["group"], json!("public"));
        assert_eq!(sent["name"], json!("bot"));
        assert_eq!(sent["text"], json!("hi"));
        assert_eq!(sent["lastMessageId"], json!(-1));
        assert!(sent["date"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_whisper_and_emote_are_emulated() {
        let (connector, mut peer) = started(SessionParams::new("public", "bot")).await;
        let _init = peer.recv().await.unwrap();
        let _ping = peer.recv().await.unwrap();

        assert_eq!(connector.send_whisper("psst", "alice").unwrap(), Delivery::Emulated);
        assert_eq!(frame(&peer.recv().await.unwrap())["text"], json!("@alice psst"));

        assert_eq!(connector.send_emote("waves").unwrap(), Delivery::Emulated);
        assert_eq!(frame(&peer.recv().await.unwrap())["text"], json!("*bot waves"));
    }

    #[tokio::test]
    async fn test_sends_fail_before_start() {
        let connector = IdnsConnector::new(config(), MemoryTransport::new());

        assert!(matches!(connector.send_chat("hi"), Err(CoreError::NotConnected)));
        assert!(matches!(
            connector.send_whisper("hi", "alice"),
            Err(CoreError::NotConnected)
        ));
        assert!(matches!(connector.send_emote("hi"), Err(CoreError::NotConnected)));
        assert!(matches!(connector.ping("public"), Err(CoreError::NotConnected)));
    }

    #[tokio::test]
    async fn test_hooks_see_sends_before_start() {
        let connector = IdnsConnector::new(config(), MemoryTransport::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        connector.add_send_hook(Arc::new(move |payload: &str| {
            seen_clone.lock().push(frame(payload));
        }));

        assert!(matches!(connector.send_chat("hi"), Err(CoreError::NotConnected)));
        assert!(matches!(connector.send_emote("waves"), Err(CoreError::NotConnected)));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0]["text"], json!("hi"));
        assert_eq!(seen[1]["text"], json!("* waves"));
    }

    #[tokio::test]
    async fn test_password_is_ignored() {
        let (_connector, mut peer) =
            started(SessionParams::new("public", "bot").with_password("secret")).await;

        let init = peer.recv().await.unwrap();
        assert!(!init.contains("secret"));
    }

    #[test]
    fn test_parse_updates_session_state() {
        let connector = IdnsConnector::new(config(), MemoryTransport::new());

        let replayed = connector
            .parse_message(r#"{"type":"message","message":{"messageId":7,"name":"a","text":"old"}}"#)
            .unwrap();
        assert!(
            replayed
                .downcast_ref::<IdnsMessage>()
                .unwrap()
                .is_history()
        );
        assert_eq!(connector.last_message_id(), 7);
        assert!(!connector.init_finished());

        let finished = connector
            .parse_message(r#"{"type":"initFinished","data":true}"#)
            .unwrap();
        assert!(connector.init_finished());
        assert!(
            !finished
                .downcast_ref::<IdnsMessage>()
                .unwrap()
                .is_history()
        );

        let live = connector
            .parse_message(r#"{"type":"message","message":{"messageId":8,"name":"a","text":"new"}}"#)
            .unwrap();
        assert!(!live.downcast_ref::<IdnsMessage>().unwrap().is_history());
        assert_eq!(connector.last_message_id(), 8);

        connector.parse_message(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(connector.last_message_id(), 8);
    }

    #[tokio::test]
    async fn test_handlers_see_updated_state() {
        let transport = MemoryTransport::new();
        let connector = IdnsConnector::new(config(), transport.clone());
        let chatter = Chatter::new(connector.clone(), SessionParams::new("public", "bot"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let observer = Arc::clone(&connector);
        chatter.on("message", move |ctx| {
            let history = ctx
                .message()
                .downcast_ref::<IdnsMessage>()
                .is_some_and(IdnsMessage::is_history);
            seen_clone.lock().push((
                ctx.message().text().unwrap_or_default().to_owned(),
                history,
                observer.last_message_id(),
            ));
        });

        chatter.start().unwrap();
        let mut peer = transport.accept().await.unwrap();
        let _init = peer.recv().await.unwrap();
        peer.send(r#"{"type":"message","message":{"messageId":1,"name":"a","text":"old"}}"#);
        peer.send(r#"{"type":"initFinished","data":true}"#);
        peer.send(r#"{"type":"message","message":{"messageId":2,"name":"a","text":"new"}}"#);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(
            *seen.lock(),
            vec![("old".to_string(), true, 1), ("new".to_string(), false, 2)]
        );
    }

    #[tokio::test]
    async fn test_restart_resumes_from_last_id() {
        let transport = MemoryTransport::new();
        let connector = IdnsConnector::new(config(), transport.clone());
        let params = SessionParams::new("public", "bot");

        Arc::clone(&connector).start(params.clone()).unwrap();
        let mut peer = transport.accept().await.unwrap();
        let _init = peer.recv().await.unwrap();
        peer.send(r#"{"type":"initFinished","data":true}"#);
        peer.send(r#"{"type":"message","message":{"messageId":42,"name":"a","text":"x"}}"#);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(connector.init_finished());

        peer.close(None);
        connector.wait().await.unwrap();
        assert_eq!(connector.link().state(), LinkState::Stopped);

        Arc::clone(&connector).start(params).unwrap();
        let mut peer = transport.accept().await.unwrap();
        let init = frame(&peer.recv().await.unwrap());

        assert_eq!(init["lastMessageId"], json!(42));
        assert!(!connector.init_finished());
    }

    #[tokio::test]
    async fn test_keep_alive_stops_with_session() {
        let (connector, mut peer) = started(SessionParams::new("public", "bot")).await;
        let _init = peer.recv().await.unwrap();
        let _ping = peer.recv().await.unwrap();
        let token = connector.link().session_token();

        connector.quit();
        connector.wait().await.unwrap();

        assert!(token.is_cancelled());
        assert!(!connector.is_running());
    }

    #[tokio::test]
    async fn test_keep_alive_follows_its_own_session() {
        let (connector, mut peer) = started(SessionParams::new("public", "bot")).await;
        let _init = peer.recv().await.unwrap();
        let _ping = peer.recv().await.unwrap();

        let previous = CancellationToken::new();
        previous.cancel();
        keep_alive(
            Arc::downgrade(&connector),
            previous,
            "public".to_owned(),
            Duration::from_millis(5),
        )
        .await;

        assert!(!connector.link().session_token().is_cancelled());
        assert_eq!(peer.try_recv(), None);
    }
}
