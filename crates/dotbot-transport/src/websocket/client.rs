//! WebSocket client transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{Error, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use dotbot_core::{
    Transport, TransportError, TransportEvent, TransportHandle, TransportResult, TransportSession,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// WebSocket client transport.
///
/// Each `open` performs one connection. There is no automatic reconnect: a
/// dropped socket ends the session and surfaces to whoever waits on it.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

impl WsTransport {
    /// Creates a new WebSocket transport.
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

/// Builds the upgrade request with the extra headers.
fn build_request(url: &str, headers: &[(String, String)]) -> TransportResult<Request> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::InvalidConfig(format!("bad url {url}: {e}")))?;

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidConfig(format!("bad header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidConfig(format!("bad header value: {e}")))?;
        request.headers_mut().insert(name, value);
    }
    Ok(request)
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> TransportResult<TransportSession> {
        let request = build_request(url, headers)?;

        info!(url = %url, "Connecting to WebSocket server");

        let (ws_stream, _response) =
            connect_async(request)
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    url: url.to_owned(),
                    reason: format!("WebSocket connection failed: {e}"),
                })?;

        info!(url = %url, "WebSocket client connected");

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));

        let _ = events_tx.send(TransportEvent::Opened);
        let mut state = ClientLoopState::new(url.to_owned(), ws_stream, events_tx, Arc::clone(&running));

        // Spawn connection manager task
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Sender dropped counts as shutdown
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!(url = %state.url, "WebSocket client shutting down");
                            let _ = state.ws_tx.close().await;
                            state.finish(None);
                            break;
                        }
                    }

                    // Outbound frames
                    Some(text) = outbound_rx.recv() => {
                        if let Err(e) = state.ws_tx.send(Message::Text(text.into())).await {
                            warn!(url = %state.url, error = %e, "Failed to send message");
                            state.fail(e);
                            break;
                        }
                    }

                    // Inbound frames
                    msg = state.ws_rx.next() => {
                        if !state.handle_message(msg).await {
                            break;
                        }
                    }
                }
            }
            debug!(url = %state.url, "WebSocket client loop ended");
        });

        Ok(TransportSession {
            handle: TransportHandle::new(outbound_tx, shutdown_tx, running),
            events,
        })
    }
}

/// State owned by one client loop.
struct ClientLoopState {
    url: String,
    ws_tx: WsSink,
    ws_rx: WsSource,
    events: mpsc::UnboundedSender<TransportEvent>,
    running: Arc<AtomicBool>,
}

impl ClientLoopState {
    fn new(
        url: String,
        ws_stream: WsStream,
        events: mpsc::UnboundedSender<TransportEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let (ws_tx, ws_rx) = ws_stream.split();
        Self {
            url,
            ws_tx,
            ws_rx,
            events,
            running,
        }
    }

    /// Marks the session closed and emits the final event.
    fn finish(&self, reason: Option<String>) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Closed(reason));
    }

    /// Reports `error`, then closes.
    fn fail(&self, error: Error) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self
            .events
            .send(TransportEvent::Error(TransportError::ConnectionClosed {
                reason: error.to_string(),
            }));
        self.finish(None);
    }

    fn emit_text(&self, text: String) {
        trace!(url = %self.url, len = text.len(), "Received");
        let _ = self.events.send(TransportEvent::Text(text));
    }

    /// Handles one inbound websocket item.
    /// Returns true if the loop should continue.
    async fn handle_message(&mut self, msg: Option<Result<Message, Error>>) -> bool {
        match msg {
            Some(Ok(Message::Text(text))) => {
                self.emit_text(text.as_str().to_owned());
                true
            }
            Some(Ok(Message::Binary(data))) => {
                self.emit_text(String::from_utf8_lossy(&data).into_owned());
                true
            }
            Some(Ok(Message::Ping(data))) => {
                trace!(url = %self.url, "Received ping, sending pong");
                let _ = self.ws_tx.send(Message::Pong(data)).await;
                true
            }
            Some(Ok(Message::Pong(_))) => {
                trace!(url = %self.url, "Received pong");
                true
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.as_str().to_owned())
                    .filter(|r| !r.is_empty());
                info!(url = %self.url, reason = ?reason, "Server closed connection");
                self.finish(reason);
                false
            }
            Some(Ok(Message::Frame(_))) => true,
            Some(Err(e)) => {
                warn!(url = %self.url, error = %e, "WebSocket error");
                self.fail(e);
                false
            }
            None => {
                info!(url = %self.url, "WebSocket stream ended");
                self.finish(None);
                false
            }
        }
    }
}
