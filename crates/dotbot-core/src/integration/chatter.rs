//! The chatter: one connector, its session parameters and its dispatcher.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::foundation::context::Context;
use crate::foundation::error::{CoreError, CoreResult};
use crate::framework::dispatcher::Dispatcher;
use crate::framework::handler::Handler;
use crate::framework::module::Module;
use crate::integration::connector::{BoxedConnector, Delivery, MessageSink, SessionParams};

/// A bot session bound to one connector.
///
/// The chatter installs its [`Dispatcher`] as the connector's message sink on
/// construction, so every normalized inbound message reaches the handlers
/// registered here.
///
/// ```rust,ignore
/// let chatter = Chatter::new(connector, SessionParams::new("lounge", "dotbot"));
/// chatter.on("chat", |ctx| {
///     if ctx.message().text() == Some("!ping") {
///         let _ = ctx.reply("pong");
///     }
/// });
/// chatter.run().await?;
/// ```
pub struct Chatter {
    connector: BoxedConnector,
    params: RwLock<SessionParams>,
    dispatcher: Arc<Dispatcher>,
}

impl Chatter {
    /// Creates a chatter and wires its dispatcher into `connector`.
    pub fn new(connector: BoxedConnector, params: SessionParams) -> Self {
        let dispatcher = Arc::new(Dispatcher::new());
        let sink: Arc<dyn MessageSink> = dispatcher.clone();
        connector.set_sink(sink);
        Self {
            connector,
            params: RwLock::new(params),
            dispatcher,
        }
    }

    /// Returns the connector.
    pub fn connector(&self) -> &BoxedConnector {
        &self.connector
    }

    /// Returns the dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Returns a copy of the session parameters.
    pub fn params(&self) -> SessionParams {
        self.params.read().clone()
    }

    /// Returns the channel.
    pub fn channel(&self) -> String {
        self.params.read().channel.clone()
    }

    /// Returns the nickname.
    pub fn nick(&self) -> String {
        self.params.read().nick.clone()
    }

    /// Returns the password, if any.
    pub fn password(&self) -> Option<String> {
        self.params.read().password().map(str::to_owned)
    }

    /// Updates the session parameters used by the next `start` or `run`.
    ///
    /// `None` leaves a field untouched; an empty password clears it.
    pub fn set_parameters(&self, channel: Option<&str>, nick: Option<&str>, password: Option<&str>) {
        let mut params = self.params.write();
        if let Some(channel) = channel {
            params.channel = channel.to_owned();
        }
        if let Some(nick) = nick {
            params.nick = nick.to_owned();
        }
        if let Some(password) = password {
            params.password = Some(password.to_owned()).filter(|p| !p.is_empty());
        }
    }

    /// Returns true while the connector's transport is open.
    pub fn is_running(&self) -> bool {
        self.connector.is_running()
    }

    /// Starts the event loop and the connector session in the background.
    pub fn start(&self) -> CoreResult<()> {
        Handle::try_current().map_err(|e| CoreError::NoRuntime(e.to_string()))?;
        let params = self.params();
        info!(site = %self.connector.site(), channel = %params.channel, nick = %params.nick, "Starting chatter");

        Arc::clone(&self.connector).start(params)?;
        self.dispatcher.spawn_event_loop();
        Ok(())
    }

    /// Waits for the background session started by [`Chatter::start`].
    pub async fn wait(&self) -> CoreResult<()> {
        self.connector.wait().await
    }

    /// Runs the session on the calling task until it ends.
    pub async fn run(&self) -> CoreResult<()> {
        let params = self.params();
        info!(site = %self.connector.site(), channel = %params.channel, nick = %params.nick, "Running chatter");

        self.dispatcher.spawn_event_loop();
        Arc::clone(&self.connector).run_forever(params).await
    }

    /// Closes the session. Async handlers already scheduled keep running.
    pub fn quit(&self) {
        debug!(site = %self.connector.site(), "Quitting chatter");
        self.connector.quit();
    }

    /// Sends a public chat line.
    pub fn chat(&self, text: &str) -> CoreResult<()> {
        self.connector.send_chat(text)
    }

    /// Whispers `text` to `nick`.
    pub fn whisper(&self, text: &str, nick: &str) -> CoreResult<Delivery> {
        self.connector.send_whisper(text, nick)
    }

    /// Sends an emote line.
    pub fn me(&self, text: &str) -> CoreResult<Delivery> {
        self.connector.send_emote(text)
    }

    /// Registers `handler` for each of `kinds`, or for every message when
    /// `kinds` is empty.
    pub fn register_callback(&self, handler: Handler, kinds: &[&str]) {
        if kinds.is_empty() {
            self.dispatcher.add_untyped(handler);
            return;
        }
        for kind in kinds {
            self.dispatcher.add_typed(*kind, handler.clone());
        }
    }

    /// Registers a synchronous handler for `kind`.
    pub fn on<F>(&self, kind: &str, f: F)
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        self.register_callback(Handler::sync(f), &[kind]);
    }

    /// Registers an asynchronous handler for `kind`.
    pub fn on_async<F, Fut>(&self, kind: &str, f: F)
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register_callback(Handler::future(f), &[kind]);
    }

    /// Merges `module` into this chatter's registries.
    pub fn apply(&self, module: &Module) {
        module.run_before(self);
        module.merge_into(&self.dispatcher);
        module.run_after(self);
    }
}

impl std::fmt::Debug for Chatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chatter")
            .field("site", &self.connector.site())
            .field("params", &*self.params.read())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::recv::apply_recv;
    use crate::integration::transport::TransportEvent;
    use crate::testing::{LinkConnector, ScriptedTransport};
    use parking_lot::Mutex;
    use std::time::Duration;

    fn chatter(transport: &Arc<ScriptedTransport>) -> Chatter {
        Chatter::new(
            LinkConnector::new(transport.clone()),
            SessionParams::new("lounge", "bot"),
        )
    }

    #[test]
    fn test_set_parameters() {
        let chatter = chatter(&ScriptedTransport::new());
        chatter.set_parameters(None, Some("other"), Some("secret"));
        assert_eq!(chatter.channel(), "lounge");
        assert_eq!(chatter.nick(), "other");
        assert_eq!(chatter.password().as_deref(), Some("secret"));

        chatter.set_parameters(Some("den"), None, Some(""));
        assert_eq!(chatter.channel(), "den");
        assert_eq!(chatter.password(), None);
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let chatter = chatter(&ScriptedTransport::new());
        let err = chatter.start().unwrap_err();
        assert!(matches!(err, CoreError::NoRuntime(_)));
    }

    #[test]
    fn test_sends_fail_when_not_running() {
        let chatter = chatter(&ScriptedTransport::new());
        assert!(matches!(chatter.chat("hi"), Err(CoreError::NotConnected)));
        assert!(matches!(chatter.whisper("hi", "alice"), Err(CoreError::NotConnected)));
        assert!(matches!(chatter.me("waves"), Err(CoreError::NotConnected)));
    }

    #[tokio::test]
    async fn test_inbound_frames_reach_handlers_in_order() {
        let transport = ScriptedTransport::new();
        let chatter = chatter(&transport);
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = Arc::clone(&log);
        chatter.register_callback(
            Handler::sync(move |ctx| log_clone.lock().push(format!("any:{}", ctx.message().kind()))),
            &[],
        );
        let log_clone = Arc::clone(&log);
        chatter.on("chat", move |_| log_clone.lock().push("chat".to_string()));

        chatter.start().unwrap();
        transport.emit(TransportEvent::Opened);
        transport.emit(TransportEvent::Text("chat".into()));
        transport.emit(TransportEvent::Text("emote".into()));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*log.lock(), vec!["any:chat", "chat", "any:emote"]);
    }

    #[tokio::test]
    async fn test_recv_context_through_chatter() {
        let transport = ScriptedTransport::new();
        let chatter = chatter(&transport);
        let recv = apply_recv(&chatter);

        chatter.start().unwrap();
        transport.emit(TransportEvent::Opened);
        let waiter = tokio::spawn({
            let recv = Arc::clone(&recv);
            async move { recv.recv_message().await }
        });
        while recv.pending() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        transport.emit(TransportEvent::Text("chat".into()));

        let message = waiter.await.unwrap().unwrap();
        assert_eq!(message.kind(), "chat");
    }

    #[tokio::test]
    async fn test_apply_runs_hooks_around_merge() {
        let chatter = chatter(&ScriptedTransport::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut module = Module::new("hooks");
        module.on("chat", |_| {});
        let seen_before = Arc::clone(&seen);
        module.before_apply(move |c: &Chatter| {
            seen_before
                .lock()
                .push(format!("before:{}", c.dispatcher().typed_count("chat")));
        });
        let seen_after = Arc::clone(&seen);
        module.after_apply(move |c: &Chatter| {
            seen_after
                .lock()
                .push(format!("after:{}", c.dispatcher().typed_count("chat")));
        });

        chatter.apply(&module);
        assert_eq!(*seen.lock(), vec!["before:0", "after:1"]);
    }
}
