//! Await-queue bridge.
//!
//! A [`Receiver`] lets a task suspend until the next message arrives instead
//! of registering a standing callback. Each call to [`Receiver::recv_context`]
//! parks a single-use slot; the fan-out handler fills every parked slot with
//! the same [`Context`] and retires it.
//!
//! The receiver is owned, not global: wire it into a chatter once with
//! [`apply_recv`] and share the returned `Arc`.
//!
//! ```rust,ignore
//! let recv = apply_recv(&chatter);
//! chatter.start()?;
//! let msg = recv.recv_message().await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::foundation::context::Context;
use crate::foundation::error::{CoreError, CoreResult};
use crate::foundation::message::BoxedMessage;
use crate::framework::handler::Handler;
use crate::integration::chatter::Chatter;
use crate::integration::connector::Connector;

/// Registry of pending single-use waiters.
#[derive(Default)]
pub struct Receiver {
    next_id: AtomicU64,
    waiters: Mutex<BTreeMap<u64, oneshot::Sender<Context>>>,
}

/// Retires a waiter's slot when its future is dropped.
struct SlotGuard<'a> {
    receiver: &'a Receiver,
    id: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.receiver.waiters.lock().remove(&self.id);
    }
}

impl Receiver {
    /// Creates a receiver with no pending waiters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of parked waiters.
    pub fn pending(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Hands `ctx` to every parked waiter and retires them all.
    pub fn deliver(&self, ctx: &Context) {
        let waiters = std::mem::take(&mut *self.waiters.lock());
        if waiters.is_empty() {
            return;
        }
        trace!(waiters = waiters.len(), "Waking receivers");
        for (_, tx) in waiters {
            let _ = tx.send(ctx.clone());
        }
    }

    /// Returns the fan-out handler to register as an untyped callback.
    pub fn handler(self: &Arc<Self>) -> Handler {
        let receiver = Arc::clone(self);
        Handler::sync(move |ctx| receiver.deliver(ctx))
    }

    /// Waits for the next dispatched context.
    pub async fn recv_context(&self) -> CoreResult<Context> {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.waiters.lock().insert(id, tx);
        let _guard = SlotGuard { receiver: self, id };

        rx.await
            .map_err(|_| CoreError::internal("receiver slot dropped before delivery"))
    }

    /// Waits for the next dispatched message.
    pub async fn recv_message(&self) -> CoreResult<BoxedMessage> {
        Ok(self.recv_context().await?.message().clone())
    }

    /// Waits for the next dispatched message together with its connector.
    pub async fn recv_unwrap(&self) -> CoreResult<(Arc<dyn Connector>, BoxedMessage)> {
        Ok(self.recv_context().await?.into_parts())
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Wires a new [`Receiver`] into `chatter` and returns it.
///
/// Call this once per chatter; every call adds another fan-out handler.
pub fn apply_recv(chatter: &Chatter) -> Arc<Receiver> {
    let receiver = Arc::new(Receiver::new());
    chatter.register_callback(receiver.handler(), &[]);
    receiver
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubConnector, StubMessage};
    use std::time::Duration;

    fn ctx(kind: &str) -> Context {
        Context::new(StubConnector::new(), StubMessage::boxed(kind, Some("alice")))
    }

    async fn until_pending(receiver: &Receiver, n: usize) {
        while receiver.pending() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_one_message() {
        let receiver = Arc::new(Receiver::new());
        let first = tokio::spawn({
            let receiver = Arc::clone(&receiver);
            async move { receiver.recv_context().await }
        });
        let second = tokio::spawn({
            let receiver = Arc::clone(&receiver);
            async move { receiver.recv_context().await }
        });
        until_pending(&receiver, 2).await;

        let sent = ctx("chat");
        receiver.deliver(&sent);
        receiver.deliver(&ctx("emote"));

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(a.message(), sent.message()));
        assert!(Arc::ptr_eq(b.message(), sent.message()));
        assert_eq!(receiver.pending(), 0);
    }

    #[tokio::test]
    async fn test_waiter_needs_to_wait_again() {
        let receiver = Arc::new(Receiver::new());
        let handler = receiver.handler();
        let Handler::Sync(fan_out) = handler else {
            panic!("fan-out handler must be synchronous");
        };

        let waiter = tokio::spawn({
            let receiver = Arc::clone(&receiver);
            async move {
                let first = receiver.recv_message().await.unwrap();
                let second = receiver.recv_message().await.unwrap();
                (first.kind().to_string(), second.kind().to_string())
            }
        });

        until_pending(&receiver, 1).await;
        fan_out(&ctx("chat"));
        until_pending(&receiver, 1).await;
        fan_out(&ctx("emote"));

        let (first, second) = waiter.await.unwrap();
        assert_eq!(first, "chat");
        assert_eq!(second, "emote");
    }

    #[tokio::test]
    async fn test_dropped_waiter_is_retired() {
        let receiver = Arc::new(Receiver::new());
        let waiter = tokio::spawn({
            let receiver = Arc::clone(&receiver);
            async move { receiver.recv_context().await }
        });
        until_pending(&receiver, 1).await;

        waiter.abort();
        let _ = waiter.await;

        assert_eq!(receiver.pending(), 0);
    }
}
