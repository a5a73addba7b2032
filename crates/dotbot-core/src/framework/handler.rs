//! Handler types.
//!
//! A handler is either synchronous or asynchronous, and the tag is fixed at
//! registration time:
//!
//! - [`Handler::Sync`] runs to completion inline on the dispatching task.
//! - [`Handler::Async`] produces a future that the dispatcher submits to the
//!   chatter's event loop without awaiting it.
//!
//! # Example
//!
//! ```rust,ignore
//! use dotbot_core::{Context, Handler};
//!
//! let greet = Handler::sync(|ctx: &Context| {
//!     let _ = ctx.reply("hi");
//! });
//!
//! let slow = Handler::future(|ctx: Context| async move {
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     let _ = ctx.reply("done");
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

pub use futures::future::BoxFuture;

use crate::foundation::context::Context;

/// A synchronous handler.
pub type SyncHandler = Arc<dyn Fn(&Context) + Send + Sync>;

/// An asynchronous handler.
pub type AsyncHandler = Arc<dyn Fn(Context) -> BoxFuture<'static, ()> + Send + Sync>;

/// A registered callback.
#[derive(Clone)]
pub enum Handler {
    /// Runs inline during dispatch.
    Sync(SyncHandler),
    /// Scheduled on the event loop, never awaited by the dispatcher.
    Async(AsyncHandler),
}

impl Handler {
    /// Wraps a synchronous closure.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wraps an async closure.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Async(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    /// Returns true for asynchronous handlers.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Handler::Sync"),
            Self::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

/// Wraps a fallible synchronous handler.
///
/// Errors returned by `handler` are passed to `on_error` together with the
/// context instead of being dropped.
pub fn guarded<F, E, G>(handler: F, on_error: G) -> Handler
where
    F: Fn(&Context) -> Result<(), E> + Send + Sync + 'static,
    G: Fn(E, &Context) + Send + Sync + 'static,
{
    Handler::sync(move |ctx| {
        if let Err(e) = handler(ctx) {
            on_error(e, ctx);
        }
    })
}
