//! In-memory loopback transport.
//!
//! [`MemoryTransport`] opens sessions without touching the network. Every
//! `open` yields a [`MemoryPeer`] that plays the server side: it sees the
//! frames the client sends and can push frames, errors and closure back.
//!
//! ```rust,ignore
//! let transport = MemoryTransport::new();
//! let connector = HcConnector::with_transport(transport.clone());
//! Arc::clone(&connector).start(params)?;
//!
//! let mut peer = transport.accept().await.unwrap();
//! let join = peer.recv().await.unwrap();
//! peer.send(r#"{"cmd":"chat","nick":"alice","text":"hi"}"#);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, trace};

use dotbot_core::{
    Transport, TransportError, TransportEvent, TransportHandle, TransportResult, TransportSession,
};

/// A transport whose sessions are served in-process.
pub struct MemoryTransport {
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
    peers_rx: Mutex<mpsc::UnboundedReceiver<MemoryPeer>>,
}

impl MemoryTransport {
    /// Creates a transport with no open sessions.
    pub fn new() -> Arc<Self> {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            peers_tx,
            peers_rx: Mutex::new(peers_rx),
        })
    }

    /// Waits for the next session a client opens.
    pub async fn accept(&self) -> Option<MemoryPeer> {
        self.peers_rx.lock().await.recv().await
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> TransportResult<TransportSession> {
        debug!(url = %url, "Opening in-memory session");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));

        let peer = MemoryPeer {
            url: url.to_owned(),
            headers: headers.to_vec(),
            frames: outbound_rx,
            events: events_tx.clone(),
            running: Arc::clone(&running),
        };
        self.peers_tx
            .send(peer)
            .map_err(|_| TransportError::ConnectionFailed {
                url: url.to_owned(),
                reason: "memory transport was dropped".into(),
            })?;

        let _ = events_tx.send(TransportEvent::Opened);

        let watcher_running = Arc::clone(&running);
        tokio::spawn(async move {
            let _ = shutdown_rx.changed().await;
            if watcher_running.swap(false, Ordering::SeqCst) {
                trace!("Client closed in-memory session");
                let _ = events_tx.send(TransportEvent::Closed(None));
            }
        });

        Ok(TransportSession {
            handle: TransportHandle::new(outbound_tx, shutdown_tx, running),
            events,
        })
    }
}

/// The server side of one in-memory session.
pub struct MemoryPeer {
    url: String,
    headers: Vec<(String, String)>,
    frames: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
    running: Arc<AtomicBool>,
}

impl MemoryPeer {
    /// URL the client opened.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the value of a header the client sent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Waits for the next frame the client sent.
    ///
    /// Returns `None` once the client's writer is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    /// Returns a frame the client already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.frames.try_recv().ok()
    }

    /// Pushes a text frame to the client.
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Text(text.into()));
    }

    /// Reports a transport error to the client and closes the session.
    pub fn fail(&self, error: TransportError) {
        if self.running.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(TransportEvent::Error(error));
            let _ = self.events.send(TransportEvent::Closed(None));
        }
    }

    /// Closes the session from the server side.
    pub fn close(&self, reason: Option<&str>) {
        if self.running.swap(false, Ordering::SeqCst) {
            let _ = self
                .events
                .send(TransportEvent::Closed(reason.map(str::to_owned)));
        }
    }

    /// Returns true until either side closes the session.
    pub fn is_open(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MemoryPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPeer")
            .field("url", &self.url)
            .field("open", &self.is_open())
            .finish()
    }
}
