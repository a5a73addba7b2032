//! Shared session engine for connectors.
//!
//! [`Link`] owns everything a connector needs to drive one transport session:
//! the lifecycle state machine, the transport handle, the outbound send hooks
//! and the inbound message sink. Service connectors embed a `Link` and
//! implement [`SessionHandler`] to supply their handshake.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start/run──▶ Starting ──Opened + handshake──▶ Running ──close/quit──▶ Stopped
//!                        │                                                      │
//!                        └──────────────── open failed ─────────────────────────┘
//! ```
//!
//! Starting while `Starting` or `Running` fails with
//! [`CoreError::AlreadyRunning`]. A `Stopped` link may be started again.
//! [`Link::close`] cancels the session token, so it also aborts a session
//! whose transport is still connecting. Dropping a `run` future stops the
//! link the same way.
//!
//! # Inbound path
//!
//! Every text frame is parsed through [`Connector::parse_message`] (which
//! also updates any service session state), wrapped in a [`Context`] and
//! delivered to the sink, synchronously and in arrival order.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::foundation::context::Context;
use crate::foundation::error::{CoreError, CoreResult};
use crate::integration::connector::{
    BoxedConnector, Connector, MessageSink, SendHook, SessionParams,
};
use crate::integration::transport::{
    BoxedTransport, TransportEvent, TransportHandle, TransportSession,
};

/// Lifecycle state of a [`Link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Never started.
    Idle,
    /// Session requested, handshake not yet sent.
    Starting,
    /// Handshake sent on an open transport.
    Running,
    /// Session ended.
    Stopped,
}

/// Implemented by service connectors that drive a [`Link`].
pub trait SessionHandler: Connector + Sized {
    /// Returns the connector's link.
    fn link(&self) -> &Arc<Link>;

    /// Sends the join handshake. Called once the transport is open.
    fn on_open(connector: &Arc<Self>, params: &SessionParams) -> CoreResult<()>;
}

/// Session plumbing shared by all connectors.
pub struct Link {
    /// Endpoint URL.
    url: String,
    /// Extra headers sent when opening the transport.
    headers: Vec<(String, String)>,
    /// Transport used to open sessions.
    transport: BoxedTransport,
    /// Lifecycle state.
    state: Mutex<LinkState>,
    /// Handle of the open session, if any.
    handle: RwLock<Option<TransportHandle>>,
    /// Outbound observers, append-only.
    send_hooks: RwLock<Vec<SendHook>>,
    /// Receiver of normalized inbound messages.
    sink: RwLock<Option<Arc<dyn MessageSink>>>,
    /// Background task spawned by `start`.
    worker: Mutex<Option<JoinHandle<CoreResult<()>>>>,
    /// Cancelled when the current session ends.
    session: Mutex<CancellationToken>,
}

impl Link {
    /// Creates a link for `url` over `transport`.
    pub fn new(url: impl Into<String>, transport: BoxedTransport) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            transport,
            state: Mutex::new(LinkState::Idle),
            handle: RwLock::new(None),
            send_hooks: RwLock::new(Vec::new()),
            sink: RwLock::new(None),
            worker: Mutex::new(None),
            session: Mutex::new(CancellationToken::new()),
        }
    }

    /// Adds a header sent when opening the transport.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    /// Returns true while the transport session is open.
    pub fn is_running(&self) -> bool {
        self.handle
            .read()
            .as_ref()
            .is_some_and(TransportHandle::is_running)
    }

    /// Returns a token cancelled when the current session ends.
    ///
    /// Session-scoped background work (keep-alive timers) should stop on it.
    pub fn session_token(&self) -> CancellationToken {
        self.session.lock().clone()
    }

    /// Appends an outbound observer.
    pub fn add_send_hook(&self, hook: SendHook) {
        self.send_hooks.write().push(hook);
    }

    /// Installs the inbound message sink.
    pub fn set_sink(&self, sink: Arc<dyn MessageSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Starts a session for `connector` on a background task.
    pub fn start<C: SessionHandler>(connector: Arc<C>, params: SessionParams) -> CoreResult<()> {
        let runtime = Handle::try_current().map_err(|e| CoreError::NoRuntime(e.to_string()))?;
        let link = Arc::clone(connector.link());
        link.claim()?;

        let worker = runtime.spawn(Self::drive(connector, params));
        *link.worker.lock() = Some(worker);
        Ok(())
    }

    /// Runs a session for `connector` on the calling task until it ends.
    pub async fn run<C: SessionHandler>(connector: Arc<C>, params: SessionParams) -> CoreResult<()> {
        connector.link().claim()?;
        Self::drive(connector, params).await
    }

    /// Waits for the background session started by [`Link::start`].
    pub async fn wait(&self) -> CoreResult<()> {
        let worker = self.worker.lock().take().ok_or(CoreError::NotStarted)?;
        match worker.await {
            Ok(result) => result,
            Err(e) => Err(CoreError::internal(format!("session task failed: {e}"))),
        }
    }

    /// Ends the current session, including one still connecting.
    pub fn close(&self) {
        self.session.lock().cancel();
        if let Some(handle) = self.handle.read().as_ref() {
            debug!(url = %self.url, "Closing transport");
            handle.close();
        }
    }

    /// Pipes `payload` through the send hooks, then writes it.
    ///
    /// Hooks see the payload even when the write itself fails.
    pub fn send_string(&self, payload: &str) -> CoreResult<()> {
        let hooks = self.send_hooks.read().clone();
        for hook in &hooks {
            hook(payload);
        }

        let handle = self.handle.read().clone();
        match handle {
            Some(handle) if handle.is_running() => {
                trace!(url = %self.url, len = payload.len(), "Outbound frame");
                handle.send(payload.to_owned()).map_err(CoreError::from)
            }
            _ => Err(CoreError::NotConnected),
        }
    }

    /// Serializes `payload` and sends it.
    pub fn send_value(&self, payload: &Value) -> CoreResult<()> {
        let text = serde_json::to_string(payload)
            .map_err(|e| CoreError::internal(format!("failed to serialize payload: {e}")))?;
        self.send_string(&text)
    }

    /// Moves to `Starting`, rejecting an active session.
    fn claim(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if matches!(*state, LinkState::Starting | LinkState::Running) {
            return Err(CoreError::AlreadyRunning);
        }
        *state = LinkState::Starting;
        *self.session.lock() = CancellationToken::new();
        Ok(())
    }

    /// Takes the one-shot `Starting -> Running` transition.
    fn mark_running(&self) {
        let mut state = self.state.lock();
        if *state == LinkState::Starting {
            *state = LinkState::Running;
        }
    }

    /// Resets the link once a session is over.
    fn finish(&self) {
        self.session.lock().cancel();
        if let Some(handle) = self.handle.write().take() {
            handle.close();
        }
        *self.state.lock() = LinkState::Stopped;
    }

    /// Drives one session and resets the link afterwards, even when the
    /// driving future is dropped early.
    async fn drive<C: SessionHandler>(connector: Arc<C>, params: SessionParams) -> CoreResult<()> {
        let link = Arc::clone(connector.link());
        let guard = SessionGuard(Arc::clone(&link));
        let result = link.pump(&connector, &params).await;
        drop(guard);

        match &result {
            Ok(()) => info!(url = %link.url, "Session ended"),
            Err(e) => warn!(url = %link.url, error = %e, "Session ended with error"),
        }
        result
    }

    /// Opens the transport and processes its events until it closes.
    async fn pump<C: SessionHandler>(
        &self,
        connector: &Arc<C>,
        params: &SessionParams,
    ) -> CoreResult<()> {
        info!(url = %self.url, channel = %params.channel, nick = %params.nick, "Connecting");

        let token = self.session_token();
        let opened = tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(url = %self.url, "Session closed while connecting");
                return Ok(());
            }
            opened = self.transport.open(&self.url, &self.headers) => opened?,
        };
        let TransportSession { handle, mut events } = opened;
        *self.handle.write() = Some(handle);

        let mut failure = None;
        loop {
            let event = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(url = %self.url, "Session closed");
                    break;
                }
                event = events.recv() => event,
            };
            let Some(event) = event else {
                break;
            };
            match event {
                TransportEvent::Opened => {
                    if let Err(e) = C::on_open(connector, params) {
                        self.close();
                        return Err(e);
                    }
                    self.mark_running();
                    info!(url = %self.url, channel = %params.channel, "Joined");
                }
                TransportEvent::Text(raw) => self.forward(connector, &raw),
                TransportEvent::Error(e) => {
                    warn!(url = %self.url, error = %e, "Transport error");
                    failure = Some(e);
                }
                TransportEvent::Closed(reason) => {
                    debug!(url = %self.url, reason = ?reason, "Transport closed");
                    break;
                }
            }
        }

        failure.map_or(Ok(()), |e| Err(e.into()))
    }

    /// Parses one inbound frame and hands it to the sink.
    fn forward<C: SessionHandler>(&self, connector: &Arc<C>, raw: &str) {
        trace!(url = %self.url, len = raw.len(), "Inbound frame");

        let message = match connector.parse_message(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(url = %self.url, error = %e, raw = %raw, "Failed to parse inbound frame");
                return;
            }
        };

        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            let connector: BoxedConnector = connector.clone();
            sink.deliver(Context::new(connector, message));
        } else {
            trace!(kind = %message.kind(), "No sink installed, dropping message");
        }
    }
}

/// Runs [`Link::finish`] when a session's driving future completes or is
/// dropped.
struct SessionGuard(Arc<Link>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("url", &self.url)
            .field("state", &self.state())
            .field("send_hooks", &self.send_hooks.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LinkConnector, ScriptedTransport};
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_handshake_sent_on_open() {
        let transport = ScriptedTransport::new();
        let connector = LinkConnector::new(transport.clone());

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        transport.emit(TransportEvent::Opened);
        settle().await;

        assert_eq!(connector.link().state(), LinkState::Running);
        assert_eq!(transport.written(), vec!["join:lounge:bot".to_string()]);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let transport = ScriptedTransport::new();
        let connector = LinkConnector::new(transport.clone());

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        let err = Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap_err();

        assert!(matches!(err, CoreError::AlreadyRunning));
        settle().await;
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_wait_before_start_fails() {
        let connector = LinkConnector::new(ScriptedTransport::new());
        let err = connector.wait().await.unwrap_err();
        assert!(matches!(err, CoreError::NotStarted));
    }

    #[tokio::test]
    async fn test_wait_returns_after_close() {
        let transport = ScriptedTransport::new();
        let connector = LinkConnector::new(transport.clone());

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        transport.emit(TransportEvent::Opened);
        settle().await;
        connector.quit();

        connector.wait().await.unwrap();
        assert_eq!(connector.link().state(), LinkState::Stopped);
        assert!(!connector.is_running());
    }

    #[tokio::test]
    async fn test_transport_error_reaches_wait() {
        let transport = ScriptedTransport::new();
        let connector = LinkConnector::new(transport.clone());

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        transport.emit(TransportEvent::Opened);
        transport.emit(TransportEvent::Error(
            crate::TransportError::ConnectionClosed {
                reason: "reset".into(),
            },
        ));
        transport.emit(TransportEvent::Closed(None));

        let err = connector.wait().await.unwrap_err();
        assert!(matches!(err, CoreError::Transport(_)));
    }

    #[tokio::test]
    async fn test_send_runs_hooks_then_fails_when_closed() {
        let connector = LinkConnector::new(ScriptedTransport::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        connector.add_send_hook(Arc::new(move |payload: &str| {
            seen_clone.lock().push(payload.to_string());
        }));

        let err = connector.send_string("hello").unwrap_err();

        assert!(matches!(err, CoreError::NotConnected));
        assert_eq!(*seen.lock(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_hooks_run_in_registration_order() {
        let transport = ScriptedTransport::new();
        let connector = LinkConnector::new(transport.clone());
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            connector.add_send_hook(Arc::new(move |_: &str| order.lock().push(tag)));
        }

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        transport.emit(TransportEvent::Opened);
        settle().await;

        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_session_token_cancelled_on_end() {
        let transport = ScriptedTransport::new();
        let connector = LinkConnector::new(transport.clone());

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        let token = connector.link().session_token();
        transport.emit(TransportEvent::Closed(None));
        connector.wait().await.unwrap();

        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let transport = ScriptedTransport::new();
        let connector = LinkConnector::new(transport.clone());

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        transport.emit(TransportEvent::Closed(None));
        connector.wait().await.unwrap();

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        settle().await;
        assert_eq!(transport.open_count(), 2);
    }

    #[tokio::test]
    async fn test_quit_while_connecting_ends_session() {
        let transport = ScriptedTransport::slow(Duration::from_millis(100));
        let connector = LinkConnector::new(transport.clone());

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        transport.emit(TransportEvent::Opened);
        connector.quit();

        tokio::time::timeout(Duration::from_millis(500), connector.wait())
            .await
            .expect("session should end after quit")
            .unwrap();
        assert_eq!(connector.link().state(), LinkState::Stopped);
        assert!(!connector.is_running());
        assert!(transport.written().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_run_resets_link() {
        let transport = ScriptedTransport::new();
        let connector = LinkConnector::new(transport.clone());
        transport.emit(TransportEvent::Opened);

        let run = Arc::clone(&connector).run_forever(SessionParams::new("lounge", "bot"));
        assert!(
            tokio::time::timeout(Duration::from_millis(50), run)
                .await
                .is_err()
        );
        assert_eq!(connector.link().state(), LinkState::Stopped);
        assert!(!connector.is_running());

        Arc::clone(&connector)
            .start(SessionParams::new("lounge", "bot"))
            .unwrap();
        settle().await;
        assert_eq!(transport.open_count(), 2);
    }
}
