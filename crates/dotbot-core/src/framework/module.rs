//! Reusable handler bundles.
//!
//! A [`Module`] collects handler registrations independently of any live
//! chatter. Applying it to a [`Chatter`] merges its registries in bulk:
//!
//! ```text
//! before hook ──▶ untyped handlers appended ──▶ typed handlers appended ──▶ after hook
//! ```
//!
//! Relative order within each group is preserved, and a module may be
//! applied to several chatters.
//!
//! ```rust,ignore
//! let mut greeter = Module::new("greeter");
//! greeter.on("onlineAdd", |ctx| {
//!     let _ = ctx.reply("welcome");
//! });
//! chatter.apply(&greeter);
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::foundation::context::Context;
use crate::framework::dispatcher::Dispatcher;
use crate::framework::handler::Handler;
use crate::integration::chatter::Chatter;

/// Hook run around a module's merge.
pub type ApplyHook = Arc<dyn Fn(&Chatter) + Send + Sync>;

/// A named bundle of handler registrations.
#[derive(Clone)]
pub struct Module {
    name: String,
    untyped: Vec<Handler>,
    typed: Vec<(String, Vec<Handler>)>,
    before_apply: Option<ApplyHook>,
    after_apply: Option<ApplyHook>,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            untyped: Vec::new(),
            typed: Vec::new(),
            before_apply: None,
            after_apply: None,
        }
    }

    /// Returns the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `handler` for each of `kinds`, or for every message when
    /// `kinds` is empty.
    pub fn register_callback(&mut self, handler: Handler, kinds: &[&str]) -> &mut Self {
        if kinds.is_empty() {
            self.untyped.push(handler);
            return self;
        }
        for kind in kinds {
            self.typed_slot(kind).push(handler.clone());
        }
        self
    }

    /// Registers a synchronous handler for `kind`.
    pub fn on<F>(&mut self, kind: &str, f: F) -> &mut Self
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        self.register_callback(Handler::sync(f), &[kind])
    }

    /// Registers an asynchronous handler for `kind`.
    pub fn on_async<F, Fut>(&mut self, kind: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.register_callback(Handler::future(f), &[kind])
    }

    /// Sets the hook run immediately before the module is merged.
    pub fn before_apply<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Chatter) + Send + Sync + 'static,
    {
        self.before_apply = Some(Arc::new(hook));
        self
    }

    /// Sets the hook run immediately after the module is merged.
    pub fn after_apply<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Chatter) + Send + Sync + 'static,
    {
        self.after_apply = Some(Arc::new(hook));
        self
    }

    /// Returns the total number of registrations.
    pub fn handler_count(&self) -> usize {
        self.untyped.len() + self.typed.iter().map(|(_, h)| h.len()).sum::<usize>()
    }

    pub(crate) fn run_before(&self, chatter: &Chatter) {
        if let Some(hook) = &self.before_apply {
            hook(chatter);
        }
    }

    pub(crate) fn run_after(&self, chatter: &Chatter) {
        if let Some(hook) = &self.after_apply {
            hook(chatter);
        }
    }

    /// Appends this module's registrations to `dispatcher`.
    pub(crate) fn merge_into(&self, dispatcher: &Dispatcher) {
        debug!(module = %self.name, handlers = self.handler_count(), "Merging module");
        for handler in &self.untyped {
            dispatcher.add_untyped(handler.clone());
        }
        for (kind, handlers) in &self.typed {
            for handler in handlers {
                dispatcher.add_typed(kind.clone(), handler.clone());
            }
        }
    }

    fn typed_slot(&mut self, kind: &str) -> &mut Vec<Handler> {
        let index = match self.typed.iter().position(|(k, _)| k == kind) {
            Some(index) => index,
            None => {
                self.typed.push((kind.to_owned(), Vec::new()));
                self.typed.len() - 1
            }
        };
        &mut self.typed[index].1
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("handlers", &self.handler_count())
            .finish()
    }
}
