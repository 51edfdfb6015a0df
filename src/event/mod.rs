// src/event/mod.rs
//! Event publish/subscribe
//!
//! Handlers subscribe to integer event ids. Events are fired either deferred
//! (queued from any thread, dispatched on the next [`EventPool::update`]) or
//! immediately on the update thread with [`EventPool::fire_now`]. Payloads are
//! pooled through the shared [`ReferencePool`](crate::reference::ReferencePool)
//! and released exactly once after dispatch.

pub mod args;
pub mod dispatch;
pub mod handler;
pub mod pool;

pub use args::{EventArgs, Sender};
pub use dispatch::EventContext;
pub use handler::{EventHandler, EventPoolMode};
pub use pool::{EventEmitter, EventPool};
