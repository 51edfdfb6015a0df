// src/reference/mod.rs
//! Object recycling
//!
//! Short-lived objects (tasks, event args, scratch buffers) are acquired from a
//! [`ReferencePool`] instead of being allocated per use. Each concrete type has
//! its own [`ReferenceCollection`]: an arena of instances plus a FIFO of unused
//! ones. Callers hold [`ReferenceHandle`]s; releasing a handle clears the
//! instance and queues it for reuse.
//!
//! # Thread safety
//!
//! Collections lock their state around every operation, so acquire/release
//! may be called from any thread. The lock is never held while user code
//! (`Default::default`, [`Reference::clear`], `Drop`) runs.

pub mod collection;
pub mod pool;
pub mod strict_check;

pub use collection::{ReferenceCollection, ReferenceHandle, ReferencePoolInfo};
pub use pool::ReferencePool;
pub use strict_check::ReferenceStrictCheckType;

/// A poolable object
///
/// `Default` builds a fresh instance; [`Reference::clear`] must return a used
/// instance to the same neutral state so nothing leaks to the next acquirer.
pub trait Reference: Default + Send + 'static {
    fn clear(&mut self);
}
