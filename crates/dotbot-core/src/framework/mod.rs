//! Framework layer - Message processing and routing.
//!
//! This module contains the dispatch pipeline:
//! - Tagged sync/async handlers
//! - The dispatch core with its event loop
//! - Reusable handler modules
//! - The await-queue bridge for pull-style consumption

pub mod dispatcher;
pub mod handler;
pub mod module;
pub mod recv;

pub use dispatcher::Dispatcher;
pub use handler::{AsyncHandler, BoxFuture, Handler, SyncHandler, guarded};
pub use module::{ApplyHook, Module};
pub use recv::{Receiver, apply_recv};
