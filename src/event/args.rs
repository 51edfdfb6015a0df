// src/event/args.rs
//! Event payload contract

use crate::reference::Reference;
use std::any::Any;
use std::sync::Arc;

/// Non-owning view of whoever fired an event
pub type Sender = Arc<dyn Any + Send + Sync>;

/// Poolable event payload identified by an integer event type id
pub trait EventArgs: Reference {
    fn id(&self) -> i32;
}
