//! Transport contract.
//!
//! The core never talks to a socket library directly. A [`Transport`] opens a
//! session and hands back a [`TransportSession`]: a [`TransportHandle`] for
//! outbound text and shutdown, plus a stream of [`TransportEvent`]s describing
//! the session lifecycle. Concrete implementations live in `dotbot-transport`.
//!
//! ```text
//! Transport::open ──▶ TransportSession
//!                       ├── handle: send(text) / close() / is_running()
//!                       └── events: Opened → Text* → (Error)? → Closed
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::foundation::error::{TransportError, TransportResult};

/// Lifecycle and data events emitted by an open transport session.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The session is open and ready for the handshake.
    Opened,
    /// A text frame arrived.
    Text(String),
    /// The transport hit an error. A `Closed` event always follows.
    Error(TransportError),
    /// The session ended. No further events are emitted.
    Closed(Option<String>),
}

/// An open transport session.
#[derive(Debug)]
pub struct TransportSession {
    /// Handle for outbound traffic and shutdown.
    pub handle: TransportHandle,
    /// Inbound event stream, in arrival order.
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// The minimal transport contract the connectors depend on.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a session to `url`, sending the given extra headers.
    async fn open(&self, url: &str, headers: &[(String, String)])
    -> TransportResult<TransportSession>;
}

/// A boxed transport.
pub type BoxedTransport = Arc<dyn Transport>;

/// Handle to an open transport session.
///
/// Writes never block: frames are queued to the session's writer task.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    /// Sender for outgoing frames.
    outbound: mpsc::UnboundedSender<String>,
    /// Shutdown signal sender.
    shutdown_tx: Arc<watch::Sender<bool>>,
    /// Cleared by the transport once the session is gone.
    running: Arc<AtomicBool>,
}

impl TransportHandle {
    /// Creates a new transport handle.
    ///
    /// The transport implementation keeps a clone of `running` and clears it
    /// when the session ends.
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        shutdown_tx: watch::Sender<bool>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            outbound,
            shutdown_tx: Arc::new(shutdown_tx),
            running,
        }
    }

    /// Queues a text frame for transmission.
    pub fn send(&self, text: String) -> TransportResult<()> {
        if !self.is_running() {
            return Err(TransportError::SendFailed("session is closed".into()));
        }
        self.outbound
            .send(text)
            .map_err(|e| TransportError::SendFailed(format!("writer is gone: {e}")))
    }

    /// Requests the session to close. Closing twice is harmless.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Returns true while the session is open.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }
}
