// src/event/dispatch.rs
//! Handler registry and dispatch
//!
//! Every dispatch registers a cursor under a fresh dispatch id. The cursor
//! holds the index of the next handler to run and the end of the handler
//! range captured when the dispatch began. Unsubscribing shifts every live
//! cursor for that event id, so a handler can remove itself or any other
//! handler mid-dispatch without skipping or repeating anyone. Handlers added
//! mid-dispatch land past `end` and first see the next event.

use crate::event::args::{EventArgs, Sender};
use crate::event::handler::{EventHandler, EventPoolMode};
use crate::event::pool::EventEmitter;
use crate::reference::{ReferenceHandle, ReferencePool};
use crate::utils::errors::{KernelError, Result};
use metrics::counter;
use std::collections::HashMap;
use tracing::{trace, warn};

struct DispatchCursor {
    dispatch_id: u64,
    event_id: i32,
    next: usize,
    end: usize,
}

pub(crate) struct Registry<E: EventArgs> {
    mode: EventPoolMode,
    handlers: HashMap<i32, Vec<EventHandler<E>>>,
    default_handler: Option<EventHandler<E>>,
    cursors: Vec<DispatchCursor>,
    last_dispatch_id: u64,
}

impl<E: EventArgs> Registry<E> {
    pub(crate) fn new(mode: EventPoolMode) -> Self {
        Self {
            mode,
            handlers: HashMap::new(),
            default_handler: None,
            cursors: Vec::new(),
            last_dispatch_id: 0,
        }
    }

    pub(crate) fn mode(&self) -> EventPoolMode {
        self.mode
    }

    pub(crate) fn subscribed_event_count(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn handler_count(&self, id: i32) -> usize {
        self.handlers.get(&id).map_or(0, Vec::len)
    }

    pub(crate) fn check(&self, id: i32, handler: &EventHandler<E>) -> bool {
        self.handlers
            .get(&id)
            .is_some_and(|handlers| handlers.contains(handler))
    }

    pub(crate) fn subscribe(&mut self, id: i32, handler: EventHandler<E>) -> Result<()> {
        match self.handlers.get_mut(&id) {
            None => {
                self.handlers.insert(id, vec![handler]);
            }
            Some(_) if !self.mode.allow_multi_handler => {
                return Err(KernelError::MultiHandlerNotAllowed { id });
            }
            Some(handlers) => {
                if !self.mode.allow_duplicate_handler && handlers.contains(&handler) {
                    return Err(KernelError::DuplicateHandlerNotAllowed { id });
                }
                handlers.push(handler);
            }
        }
        Ok(())
    }

    pub(crate) fn unsubscribe(&mut self, id: i32, handler: &EventHandler<E>) -> Result<()> {
        let handlers = self
            .handlers
            .get_mut(&id)
            .ok_or(KernelError::HandlerNotFound { id })?;
        let index = handlers
            .iter()
            .position(|candidate| candidate == handler)
            .ok_or(KernelError::HandlerNotFound { id })?;

        handlers.remove(index);
        if handlers.is_empty() {
            self.handlers.remove(&id);
        }

        for cursor in self.cursors.iter_mut().filter(|c| c.event_id == id) {
            if index < cursor.end {
                cursor.end -= 1;
            }
            if index < cursor.next {
                cursor.next -= 1;
            }
        }
        Ok(())
    }

    pub(crate) fn set_default_handler(&mut self, handler: Option<EventHandler<E>>) {
        self.default_handler = handler;
    }

    pub(crate) fn clear(&mut self) {
        self.handlers.clear();
        self.default_handler = None;
        self.cursors.clear();
    }

    /// Run every handler for `args`, then release `args` exactly once
    pub(crate) fn dispatch(
        &mut self,
        emitter: &EventEmitter<E>,
        sender: Option<Sender>,
        handle: ReferenceHandle<E>,
        args: E,
    ) -> Result<()> {
        let id = args.id();
        let mut in_flight = InFlight {
            references: emitter.references(),
            handle,
            args: Some(args),
        };
        let result = self.run_handlers(emitter, sender.as_ref(), id, in_flight.args());
        counter!("zero_kernel_events_dispatched_total").increment(1);

        result.and(in_flight.release())
    }

    fn run_handlers(
        &mut self,
        emitter: &EventEmitter<E>,
        sender: Option<&Sender>,
        id: i32,
        args: &E,
    ) -> Result<()> {
        let count = self.handler_count(id);
        if count == 0 {
            return match self.default_handler.clone() {
                Some(handler) => {
                    trace!("Event {} routed to default handler", id);
                    let mut ctx = EventContext::new(self, emitter, sender, id, &handler);
                    handler.call(&mut ctx, args);
                    Ok(())
                }
                None if self.mode.allow_no_handler => Ok(()),
                None => Err(KernelError::NoHandler { id }),
            };
        }

        self.last_dispatch_id += 1;
        let dispatch_id = self.last_dispatch_id;
        self.cursors.push(DispatchCursor {
            dispatch_id,
            event_id: id,
            next: 0,
            end: count,
        });
        trace!("Dispatch {} of event {} to {} handlers", dispatch_id, id, count);

        while let Some(handler) = self.advance(dispatch_id, id) {
            let mut ctx = EventContext::new(self, emitter, sender, id, &handler);
            handler.call(&mut ctx, args);
        }

        self.cursors.retain(|cursor| cursor.dispatch_id != dispatch_id);
        Ok(())
    }

    fn advance(&mut self, dispatch_id: u64, id: i32) -> Option<EventHandler<E>> {
        let cursor = self
            .cursors
            .iter_mut()
            .find(|cursor| cursor.dispatch_id == dispatch_id)?;
        if cursor.next >= cursor.end {
            return None;
        }
        let index = cursor.next;
        cursor.next += 1;
        self.handlers.get(&id)?.get(index).cloned()
    }
}

/// Args of the event being dispatched, released on drop if a handler panics
struct InFlight<'a, E: EventArgs> {
    references: &'a ReferencePool,
    handle: ReferenceHandle<E>,
    args: Option<E>,
}

impl<E: EventArgs> InFlight<'_, E> {
    fn args(&mut self) -> &E {
        // Always `Some` until released
        self.args.get_or_insert_with(E::default)
    }

    fn release(mut self) -> Result<()> {
        match self.args.take() {
            Some(args) => self.references.release_value(self.handle, args),
            None => Ok(()),
        }
    }
}

impl<E: EventArgs> Drop for InFlight<'_, E> {
    fn drop(&mut self) {
        if let Some(args) = self.args.take() {
            if let Err(e) = self.references.release_value(self.handle, args) {
                warn!("Failed to release {} after a panic: {}", std::any::type_name::<E>(), e);
            }
        }
    }
}

/// Handle given to a running event handler
///
/// Gives access to the sender and lets the handler change subscriptions or
/// fire further events while the dispatch is in flight.
pub struct EventContext<'a, E: EventArgs> {
    registry: &'a mut Registry<E>,
    emitter: &'a EventEmitter<E>,
    sender: Option<&'a Sender>,
    event_id: i32,
    current: &'a EventHandler<E>,
}

impl<'a, E: EventArgs> EventContext<'a, E> {
    fn new(
        registry: &'a mut Registry<E>,
        emitter: &'a EventEmitter<E>,
        sender: Option<&'a Sender>,
        event_id: i32,
        current: &'a EventHandler<E>,
    ) -> Self {
        Self {
            registry,
            emitter,
            sender,
            event_id,
            current,
        }
    }

    pub fn sender(&self) -> Option<&Sender> {
        self.sender
    }

    /// Id of the event being dispatched
    pub fn event_id(&self) -> i32 {
        self.event_id
    }

    /// Reference pool the event args come from
    pub fn references(&self) -> &ReferencePool {
        self.emitter.references()
    }

    /// Subscribe a handler; it first runs for the next event with `id`
    pub fn subscribe(&mut self, id: i32, handler: EventHandler<E>) -> Result<()> {
        self.registry.subscribe(id, handler)
    }

    pub fn unsubscribe(&mut self, id: i32, handler: &EventHandler<E>) -> Result<()> {
        self.registry.unsubscribe(id, handler)
    }

    /// Remove the running handler from the current event id
    pub fn unsubscribe_current(&mut self) -> Result<()> {
        let current = self.current.clone();
        self.registry.unsubscribe(self.event_id, &current)
    }

    /// Queue an event for the next update
    pub fn fire(&self, sender: Option<Sender>, handle: ReferenceHandle<E>) -> Result<()> {
        self.emitter.fire(sender, handle)
    }

    /// Dispatch an event before this call returns
    pub fn fire_now(&mut self, sender: Option<Sender>, handle: ReferenceHandle<E>) -> Result<()> {
        let args = self.emitter.references().take(handle)?;
        self.registry.dispatch(self.emitter, sender, handle, args)
    }
}
