// src/event/pool.rs
//! Publish/subscribe event pool
//!
//! # Architecture
//!
//! ```text
//!  any thread                         update thread
//!  ──────────                         ─────────────
//!  EventEmitter::fire ──▶ [ locked FIFO ] ──▶ EventPool::update ──▶ handlers
//!                                                    │
//!  EventPool::fire_now ──────────────────────────────┘ (same thread, immediate)
//! ```
//!
//! Only the FIFO is shared between threads; its lock is held around each
//! enqueue/dequeue and never while a handler runs. The handler registry is
//! owned by the pool and only reachable through `&mut self`, so it needs no
//! lock at all.

use crate::event::args::{EventArgs, Sender};
use crate::event::dispatch::Registry;
use crate::event::handler::{EventHandler, EventPoolMode};
use crate::reference::{ReferenceHandle, ReferencePool};
use crate::utils::errors::Result;
use metrics::counter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// A fired event waiting for dispatch
struct EventNode<E> {
    sender: Option<Sender>,
    handle: ReferenceHandle<E>,
    args: E,
}

/// Cloneable, thread-safe handle for deferred firing
pub struct EventEmitter<E: EventArgs> {
    queue: Arc<Mutex<VecDeque<EventNode<E>>>>,
    references: Arc<ReferencePool>,
}

impl<E: EventArgs> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            references: Arc::clone(&self.references),
        }
    }
}

impl<E: EventArgs> EventEmitter<E> {
    /// Queue an acquired event for the next [`EventPool::update`]
    ///
    /// The args are checked out of the reference pool until dispatched.
    pub fn fire(&self, sender: Option<Sender>, handle: ReferenceHandle<E>) -> Result<()> {
        let args = self.references.take(handle)?;
        let id = args.id();
        self.queue.lock().push_back(EventNode {
            sender,
            handle,
            args,
        });
        trace!("Event {} queued", id);
        counter!("zero_kernel_events_fired_total").increment(1);
        Ok(())
    }

    pub fn references(&self) -> &ReferencePool {
        &self.references
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn pop(&self) -> Option<EventNode<E>> {
        self.queue.lock().pop_front()
    }
}

/// Event pool for payloads of type `E`
pub struct EventPool<E: EventArgs> {
    registry: Registry<E>,
    emitter: EventEmitter<E>,
}

impl<E: EventArgs> EventPool<E> {
    /// Create a pool recycling its args through `references`
    pub fn new(references: Arc<ReferencePool>, mode: EventPoolMode) -> Self {
        debug!(
            "Creating event pool for {} with {:?}",
            std::any::type_name::<E>(),
            mode
        );
        Self {
            registry: Registry::new(mode),
            emitter: EventEmitter {
                queue: Arc::new(Mutex::new(VecDeque::new())),
                references,
            },
        }
    }

    pub fn mode(&self) -> EventPoolMode {
        self.registry.mode()
    }

    /// Number of event ids with at least one handler
    pub fn subscribed_event_count(&self) -> usize {
        self.registry.subscribed_event_count()
    }

    pub fn handler_count(&self, id: i32) -> usize {
        self.registry.handler_count(id)
    }

    /// Number of events waiting for the next update
    pub fn event_count(&self) -> usize {
        self.emitter.len()
    }

    /// Whether `handler` is subscribed to `id`
    pub fn check(&self, id: i32, handler: &EventHandler<E>) -> bool {
        self.registry.check(id, handler)
    }

    pub fn subscribe(&mut self, id: i32, handler: EventHandler<E>) -> Result<()> {
        self.registry.subscribe(id, handler)
    }

    pub fn unsubscribe(&mut self, id: i32, handler: &EventHandler<E>) -> Result<()> {
        self.registry.unsubscribe(id, handler)
    }

    /// Handler used for ids nobody subscribed to
    pub fn set_default_handler(&mut self, handler: Option<EventHandler<E>>) {
        self.registry.set_default_handler(handler);
    }

    /// Handle for firing from other threads
    pub fn emitter(&self) -> EventEmitter<E> {
        self.emitter.clone()
    }

    /// Queue an event for the next update (thread-safe)
    pub fn fire(&self, sender: Option<Sender>, handle: ReferenceHandle<E>) -> Result<()> {
        self.emitter.fire(sender, handle)
    }

    /// Dispatch an event on the calling thread before returning
    pub fn fire_now(&mut self, sender: Option<Sender>, handle: ReferenceHandle<E>) -> Result<()> {
        let args = self.emitter.references.take(handle)?;
        self.registry.dispatch(&self.emitter, sender, handle, args)
    }

    /// Dispatch every queued event, including ones fired by handlers meanwhile
    ///
    /// Stops at the first dispatch error; later events stay queued.
    pub fn update(&mut self, _elapsed: Duration, _real_elapsed: Duration) -> Result<()> {
        while let Some(node) = self.emitter.pop() {
            self.registry
                .dispatch(&self.emitter, node.sender, node.handle, node.args)?;
        }
        Ok(())
    }

    /// Drop queued events, releasing their args
    pub fn clear(&self) -> Result<()> {
        let mut dropped = 0;
        while let Some(node) = self.emitter.pop() {
            self.emitter
                .references
                .release_value(node.handle, node.args)?;
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} queued events", dropped);
        }
        Ok(())
    }

    /// Drop queued events and every subscription
    pub fn shutdown(&mut self) -> Result<()> {
        self.clear()?;
        self.registry.clear();
        info!("Event pool for {} shut down", std::any::type_name::<E>());
        Ok(())
    }
}
