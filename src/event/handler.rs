// src/event/handler.rs
//! Event handlers and subscription policy

use crate::event::args::EventArgs;
use crate::event::dispatch::EventContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

type HandlerFn<E> = dyn Fn(&mut EventContext<'_, E>, &E) + Send + Sync;

/// Subscribed callback
///
/// Handlers compare by identity: clones of one handler are equal, two
/// handlers built from identical closures are not.
pub struct EventHandler<E: EventArgs>(Arc<HandlerFn<E>>);

impl<E: EventArgs> EventHandler<E> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut EventContext<'_, E>, &E) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub(crate) fn call(&self, ctx: &mut EventContext<'_, E>, args: &E) {
        (self.0)(ctx, args)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl<E: EventArgs> Clone for EventHandler<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E: EventArgs> PartialEq for EventHandler<E> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<E: EventArgs> Eq for EventHandler<E> {}

impl<E: EventArgs> fmt::Debug for EventHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", self.addr())
    }
}

/// Subscription policy, fixed when the pool is built
///
/// The default is the strictest policy: one handler per id, no duplicates,
/// firing an id nobody handles is an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventPoolMode {
    /// Tolerate firing an event with no subscriber and no default handler
    pub allow_no_handler: bool,

    /// More than one handler per event id
    pub allow_multi_handler: bool,

    /// The same handler more than once for one event id
    pub allow_duplicate_handler: bool,
}

impl EventPoolMode {
    /// Everything allowed
    pub fn permissive() -> Self {
        Self {
            allow_no_handler: true,
            allow_multi_handler: true,
            allow_duplicate_handler: true,
        }
    }

    pub fn with_no_handler(mut self) -> Self {
        self.allow_no_handler = true;
        self
    }

    pub fn with_multi_handler(mut self) -> Self {
        self.allow_multi_handler = true;
        self
    }

    pub fn with_duplicate_handler(mut self) -> Self {
        self.allow_duplicate_handler = true;
        self
    }
}
