//! Dispatch core.
//!
//! The [`Dispatcher`] owns two handler registries and an event-loop channel:
//!
//! 1. Untyped handlers fire for every message, in registration order
//! 2. Typed handlers fire afterwards for messages of their type, in
//!    registration order
//! 3. Sync handlers run inline; async handlers are submitted to the event
//!    loop and never awaited
//!
//! ```text
//! network task ──deliver──▶ Dispatcher ──Sync──▶ runs inline
//!                                 │
//!                                 └──Async──▶ task channel ──▶ event loop ──▶ tokio::spawn
//! ```
//!
//! Registration is append-only and may race with dispatch: each dispatch
//! works on a snapshot of the registries taken when the message arrives.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Level, debug, span, trace, warn};

use crate::foundation::context::Context;
use crate::framework::handler::{BoxFuture, Handler};
use crate::integration::connector::MessageSink;

/// Untyped and per-type handler lists.
#[derive(Default, Clone)]
struct Registry {
    untyped: Vec<Handler>,
    typed: HashMap<String, Vec<Handler>>,
}

/// The central message dispatcher of a chatter.
pub struct Dispatcher {
    registry: RwLock<Registry>,
    /// Submission side of the event-loop channel.
    tasks: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
    /// Receiving side, taken once the event loop starts.
    pending: Mutex<Option<mpsc::UnboundedReceiver<BoxFuture<'static, ()>>>>,
}

impl Dispatcher {
    /// Creates a dispatcher with empty registries.
    ///
    /// Async handlers submitted before [`Dispatcher::spawn_event_loop`] is
    /// called are queued and run once the loop starts.
    pub fn new() -> Self {
        let (tasks, pending) = mpsc::unbounded_channel();
        Self {
            registry: RwLock::new(Registry::default()),
            tasks,
            pending: Mutex::new(Some(pending)),
        }
    }

    /// Registers `handler` for every message.
    pub fn add_untyped(&self, handler: Handler) {
        self.registry.write().untyped.push(handler);
    }

    /// Registers `handler` for messages whose type tag is `kind`.
    pub fn add_typed(&self, kind: impl Into<String>, handler: Handler) {
        self.registry
            .write()
            .typed
            .entry(kind.into())
            .or_default()
            .push(handler);
    }

    /// Returns the number of untyped handlers.
    pub fn untyped_count(&self) -> usize {
        self.registry.read().untyped.len()
    }

    /// Returns the number of handlers registered for `kind`.
    pub fn typed_count(&self, kind: &str) -> usize {
        self.registry.read().typed.get(kind).map_or(0, Vec::len)
    }

    /// Starts the event loop on the current tokio runtime.
    ///
    /// Returns `None` if the loop was already started.
    pub fn spawn_event_loop(&self) -> Option<JoinHandle<()>> {
        let mut rx = self.pending.lock().take()?;
        debug!("Starting event loop");
        Some(tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                tokio::spawn(task);
            }
            trace!("Event loop drained");
        }))
    }

    /// Returns true once the event loop has been started.
    pub fn is_looping(&self) -> bool {
        self.pending.lock().is_none()
    }

    /// Invokes every matching handler for `ctx`.
    pub fn dispatch(&self, ctx: &Context) {
        let kind = ctx.message().kind().to_owned();
        let span = span!(Level::TRACE, "dispatch", kind = %kind);
        let _enter = span.enter();

        let (untyped, typed) = {
            let registry = self.registry.read();
            (
                registry.untyped.clone(),
                registry.typed.get(&kind).cloned().unwrap_or_default(),
            )
        };

        for handler in untyped.iter().chain(typed.iter()) {
            self.invoke(handler, ctx);
        }
    }

    fn invoke(&self, handler: &Handler, ctx: &Context) {
        match handler {
            Handler::Sync(f) => f(ctx),
            Handler::Async(f) => {
                if self.tasks.send(f(ctx.clone())).is_err() {
                    warn!("Event loop is gone, dropping async handler");
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSink for Dispatcher {
    fn deliver(&self, ctx: Context) {
        self.dispatch(&ctx);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Dispatcher")
            .field("untyped", &registry.untyped.len())
            .field("typed_kinds", &registry.typed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubConnector, StubMessage};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn ctx(kind: &str) -> Context {
        Context::new(StubConnector::new(), StubMessage::boxed(kind, Some("alice")))
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Handler {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Handler::sync(move |ctx| log.lock().push(format!("{tag}:{}", ctx.message().kind())))
    }

    #[test]
    fn test_registration_order_untyped_before_typed() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        dispatcher.add_typed("chat", recorder(&log, "t1"));
        dispatcher.add_untyped(recorder(&log, "u1"));
        dispatcher.add_typed("chat", recorder(&log, "t2"));
        dispatcher.add_untyped(recorder(&log, "u2"));
        dispatcher.add_typed("emote", recorder(&log, "e1"));
        dispatcher.add_untyped(recorder(&log, "u3"));

        dispatcher.dispatch(&ctx("chat"));
        dispatcher.dispatch(&ctx("emote"));
        dispatcher.dispatch(&ctx("info"));

        assert_eq!(
            *log.lock(),
            vec![
                "u1:chat", "u2:chat", "u3:chat", "t1:chat", "t2:chat", "u1:emote", "u2:emote",
                "u3:emote", "e1:emote", "u1:info", "u2:info", "u3:info",
            ]
        );
    }

    #[test]
    fn test_duplicate_registrations_are_kept() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = recorder(&log, "h");

        dispatcher.add_untyped(handler.clone());
        dispatcher.add_untyped(handler);
        dispatcher.dispatch(&ctx("chat"));

        assert_eq!(log.lock().len(), 2);
        assert_eq!(dispatcher.untyped_count(), 2);
    }

    #[tokio::test]
    async fn test_async_handler_is_not_awaited() {
        let dispatcher = Dispatcher::new();
        let release = Arc::new(Notify::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let release_clone = Arc::clone(&release);
        let log_clone = Arc::clone(&log);
        dispatcher.add_untyped(Handler::future(move |_ctx| {
            let release = Arc::clone(&release_clone);
            let log = Arc::clone(&log_clone);
            async move {
                release.notified().await;
                log.lock().push("async".to_string());
            }
        }));
        dispatcher.add_untyped(recorder(&log, "sync"));
        dispatcher.spawn_event_loop().unwrap();

        dispatcher.dispatch(&ctx("chat"));
        assert_eq!(*log.lock(), vec!["sync:chat"]);

        release.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*log.lock(), vec!["sync:chat", "async"]);
    }

    #[tokio::test]
    async fn test_async_handlers_queue_until_loop_starts() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        dispatcher.add_typed(
            "chat",
            Handler::future(move |ctx: Context| {
                let log = Arc::clone(&log_clone);
                async move { log.lock().push(ctx.message().kind().to_string()) }
            }),
        );

        dispatcher.dispatch(&ctx("chat"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(log.lock().is_empty());

        assert!(dispatcher.spawn_event_loop().is_some());
        assert!(dispatcher.spawn_event_loop().is_none());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*log.lock(), vec!["chat"]);
    }
}
