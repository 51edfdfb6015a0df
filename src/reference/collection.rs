// src/reference/collection.rs
//! Per-type reference collection
//!
//! Owns every instance of one reference type in a generational arena and
//! hands out [`ReferenceHandle`]s. Unused instances wait in a FIFO so the
//! oldest released instance is reused first.
//!
//! # Slot lifecycle
//!
//! ```text
//!   acquire            take             release_value
//! Unused ──────▶ InUse ──────▶ CheckedOut ──────────▶ Unused
//!                  │  ◀──────      │
//!                  │   restore     │
//!                  └───────────────┴── release ──────▶ Unused
//! ```
//!
//! A checked-out instance is owned by a pool (task waiting list, event queue)
//! and cannot be reached through its handle until it is restored.
//!
//! User code (`Default`, `clear`, `Drop`) never runs while the collection
//! lock is held.
//!
//! Every collection draws a process-unique id and stamps it into the handles it
//! issues. Slot keys restart when a collection is rebuilt (after
//! [`ReferencePool::clear_all`](crate::reference::ReferencePool::clear_all)) or
//! come from another pool entirely; the id makes such handles invalid instead
//! of aliasing a live slot.

use crate::reference::Reference;
use crate::utils::errors::{KernelError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use slotmap::{new_key_type, SlotMap};
use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

new_key_type! {
    struct ReferenceKey;
}

static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lightweight, copyable handle to one pooled instance of `T`
pub struct ReferenceHandle<T> {
    collection: u64,
    key: ReferenceKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ReferenceHandle<T> {
    fn new(collection: u64, key: ReferenceKey) -> Self {
        Self {
            collection,
            key,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for ReferenceHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReferenceHandle<T> {}

impl<T> PartialEq for ReferenceHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection && self.key == other.key
    }
}

impl<T> Eq for ReferenceHandle<T> {}

impl<T> Hash for ReferenceHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.collection.hash(state);
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for ReferenceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReferenceHandle<{}>({}:{:?})",
            std::any::type_name::<T>(),
            self.collection,
            self.key
        )
    }
}

/// Snapshot of a collection's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferencePoolInfo {
    pub type_name: &'static str,
    pub unused_count: usize,
    pub using_count: usize,
    pub acquire_count: u64,
    pub release_count: u64,
    pub add_count: u64,
    pub remove_count: u64,
}

enum Slot<T> {
    Unused(T),
    InUse(T),
    CheckedOut,
}

struct CollectionState<T> {
    slots: SlotMap<ReferenceKey, Slot<T>>,
    unused: VecDeque<ReferenceKey>,
    using_count: usize,
    acquire_count: u64,
    release_count: u64,
    add_count: u64,
    remove_count: u64,
}

/// Arena of `T` instances plus the FIFO of unused slots
pub struct ReferenceCollection<T: Reference> {
    id: u64,
    state: Mutex<CollectionState<T>>,
    strict_check: bool,
}

impl<T: Reference> ReferenceCollection<T> {
    /// Create an empty collection
    pub fn new(strict_check: bool) -> Self {
        Self {
            id: NEXT_COLLECTION_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(CollectionState {
                slots: SlotMap::with_key(),
                unused: VecDeque::new(),
                using_count: 0,
                acquire_count: 0,
                release_count: 0,
                add_count: 0,
                remove_count: 0,
            }),
            strict_check,
        }
    }

    pub fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    pub fn strict_check(&self) -> bool {
        self.strict_check
    }

    /// Hand out the oldest unused instance, constructing one if none is left
    pub fn acquire(&self) -> ReferenceHandle<T> {
        {
            let mut state = self.state.lock();
            state.acquire_count += 1;
            state.using_count += 1;

            if let Some(key) = state.unused.pop_front() {
                let slot = &mut state.slots[key];
                if let Slot::Unused(value) = std::mem::replace(slot, Slot::CheckedOut) {
                    *slot = Slot::InUse(value);
                }
                return ReferenceHandle::new(self.id, key);
            }
        }

        let value = T::default();
        let mut state = self.state.lock();
        state.add_count += 1;
        let key = state.slots.insert(Slot::InUse(value));
        debug!(
            "Reference collection {} grew to {} instances",
            self.type_name(),
            state.slots.len()
        );
        ReferenceHandle::new(self.id, key)
    }

    /// Clear an acquired instance and return it to the unused queue
    ///
    /// Releasing an instance that is already unused is a double release:
    /// with strict checking it fails with [`KernelError::DoubleRelease`],
    /// otherwise it is ignored with a warning.
    pub fn release(&self, handle: ReferenceHandle<T>) -> Result<()> {
        let mut value = {
            let mut state = self.state.lock();
            let slot = state
                .slots
                .get_mut(self.key(handle)?)
                .ok_or_else(|| self.invalid())?;

            match std::mem::replace(slot, Slot::CheckedOut) {
                Slot::InUse(value) => value,
                Slot::CheckedOut => {
                    return Err(KernelError::ReferenceCheckedOut {
                        type_name: self.type_name(),
                    })
                }
                unused @ Slot::Unused(_) => {
                    *slot = unused;
                    if self.strict_check {
                        return Err(KernelError::DoubleRelease {
                            type_name: self.type_name(),
                        });
                    }
                    warn!("Ignoring double release of {}", self.type_name());
                    return Ok(());
                }
            }
        };

        value.clear();
        self.reclaim(handle, value)
    }

    /// Move an acquired instance out of the arena
    pub fn take(&self, handle: ReferenceHandle<T>) -> Result<T> {
        let mut state = self.state.lock();
        let slot = state
            .slots
            .get_mut(self.key(handle)?)
            .ok_or_else(|| self.invalid())?;

        match std::mem::replace(slot, Slot::CheckedOut) {
            Slot::InUse(value) => Ok(value),
            other => {
                let err = self.state_error(&other);
                *slot = other;
                Err(err)
            }
        }
    }

    /// Put a checked-out instance back under its handle
    pub fn restore(&self, handle: ReferenceHandle<T>, value: T) -> Result<()> {
        let mut state = self.state.lock();
        let slot = state
            .slots
            .get_mut(self.key(handle)?)
            .ok_or_else(|| self.invalid())?;

        if matches!(slot, Slot::CheckedOut) {
            *slot = Slot::InUse(value);
            return Ok(());
        }

        if matches!(slot, Slot::Unused(_)) {
            return Err(KernelError::ReferenceNotInUse {
                type_name: self.type_name(),
            });
        }

        // Restoring over a resident instance means the handle was mixed up
        Err(self.invalid())
    }

    /// Clear a checked-out instance and return it to the unused queue
    pub fn release_value(&self, handle: ReferenceHandle<T>, mut value: T) -> Result<()> {
        {
            let state = self.state.lock();
            match state.slots.get(self.key(handle)?) {
                Some(Slot::CheckedOut) => {}
                Some(Slot::Unused(_)) if self.strict_check => {
                    return Err(KernelError::DoubleRelease {
                        type_name: self.type_name(),
                    })
                }
                Some(_) => {
                    return Err(KernelError::ReferenceNotInUse {
                        type_name: self.type_name(),
                    })
                }
                None => return Err(self.invalid()),
            }
        }

        value.clear();
        self.reclaim(handle, value)
    }

    /// Run `f` against an acquired instance
    ///
    /// The instance is checked out for the duration of `f`, so `f` may use
    /// the collection freely but cannot reach the same handle. If `f` panics
    /// the instance is still put back.
    pub fn with<R>(&self, handle: ReferenceHandle<T>, f: impl FnOnce(&T) -> R) -> Result<R> {
        let mut checkout = Checkout::new(self, handle)?;
        let result = f(checkout.value());
        checkout.restore()?;
        Ok(result)
    }

    /// Mutable variant of [`ReferenceCollection::with`]
    pub fn with_mut<R>(
        &self,
        handle: ReferenceHandle<T>,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R> {
        let mut checkout = Checkout::new(self, handle)?;
        let result = f(checkout.value());
        checkout.restore()?;
        Ok(result)
    }

    /// Pre-warm the unused queue with `count` fresh instances
    pub fn add(&self, count: usize) {
        let fresh: Vec<T> = (0..count).map(|_| T::default()).collect();

        let mut state = self.state.lock();
        state.add_count += count as u64;
        for value in fresh {
            let key = state.slots.insert(Slot::Unused(value));
            state.unused.push_back(key);
        }
    }

    /// Drop up to `count` unused instances, oldest first
    pub fn remove(&self, count: usize) -> usize {
        let dropped = {
            let mut state = self.state.lock();
            let count = count.min(state.unused.len());
            state.remove_count += count as u64;

            let mut dropped = Vec::with_capacity(count);
            for _ in 0..count {
                if let Some(key) = state.unused.pop_front() {
                    if let Some(slot) = state.slots.remove(key) {
                        dropped.push(slot);
                    }
                }
            }
            dropped
        };
        dropped.len()
    }

    /// Drop every unused instance
    pub fn remove_all(&self) -> usize {
        self.remove(usize::MAX)
    }

    pub fn unused_count(&self) -> usize {
        self.state.lock().unused.len()
    }

    pub fn using_count(&self) -> usize {
        self.state.lock().using_count
    }

    pub fn info(&self) -> ReferencePoolInfo {
        let state = self.state.lock();
        ReferencePoolInfo {
            type_name: self.type_name(),
            unused_count: state.unused.len(),
            using_count: state.using_count,
            acquire_count: state.acquire_count,
            release_count: state.release_count,
            add_count: state.add_count,
            remove_count: state.remove_count,
        }
    }

    fn reclaim(&self, handle: ReferenceHandle<T>, value: T) -> Result<()> {
        let mut state = self.state.lock();
        let slot = state
            .slots
            .get_mut(self.key(handle)?)
            .ok_or_else(|| self.invalid())?;
        *slot = Slot::Unused(value);
        state.unused.push_back(handle.key);
        state.release_count += 1;
        state.using_count -= 1;
        Ok(())
    }

    /// Slot key of a handle issued by this collection
    fn key(&self, handle: ReferenceHandle<T>) -> Result<ReferenceKey> {
        if handle.collection == self.id {
            Ok(handle.key)
        } else {
            Err(self.invalid())
        }
    }

    fn invalid(&self) -> KernelError {
        KernelError::InvalidReference {
            type_name: self.type_name(),
        }
    }

    fn state_error(&self, slot: &Slot<T>) -> KernelError {
        match slot {
            Slot::CheckedOut => KernelError::ReferenceCheckedOut {
                type_name: self.type_name(),
            },
            _ => KernelError::ReferenceNotInUse {
                type_name: self.type_name(),
            },
        }
    }
}

/// Instance taken out for a scoped borrow, put back on drop
struct Checkout<'a, T: Reference> {
    collection: &'a ReferenceCollection<T>,
    handle: ReferenceHandle<T>,
    value: Option<T>,
}

impl<'a, T: Reference> Checkout<'a, T> {
    fn new(collection: &'a ReferenceCollection<T>, handle: ReferenceHandle<T>) -> Result<Self> {
        let value = collection.take(handle)?;
        Ok(Self {
            collection,
            handle,
            value: Some(value),
        })
    }

    fn value(&mut self) -> &mut T {
        // Always `Some` until restored
        self.value.get_or_insert_with(T::default)
    }

    fn restore(mut self) -> Result<()> {
        match self.value.take() {
            Some(value) => self.collection.restore(self.handle, value),
            None => Ok(()),
        }
    }
}

impl<T: Reference> Drop for Checkout<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            if let Err(e) = self.collection.restore(self.handle, value) {
                warn!("Failed to restore {} after a panic: {}", self.collection.type_name(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Packet {
        payload: Vec<u8>,
        sequence: u32,
    }

    impl Reference for Packet {
        fn clear(&mut self) {
            self.payload.clear();
            self.sequence = 0;
        }
    }

    fn conserved(info: &ReferencePoolInfo) -> bool {
        info.acquire_count - info.release_count == info.using_count as u64
            && (info.unused_count + info.using_count) as u64 == info.add_count - info.remove_count
    }

    #[test]
    fn test_acquire_constructs_then_reuses() {
        let collection = ReferenceCollection::<Packet>::new(true);

        let first = collection.acquire();
        collection.release(first).unwrap();
        let second = collection.acquire();

        assert_eq!(first, second);
        let info = collection.info();
        assert_eq!(info.add_count, 1);
        assert_eq!(info.acquire_count, 2);
        assert_eq!(info.using_count, 1);
        assert!(conserved(&info));
    }

    #[test]
    fn test_release_clears_fields() {
        let collection = ReferenceCollection::<Packet>::new(true);
        let handle = collection.acquire();
        collection
            .with_mut(handle, |packet| {
                packet.payload.extend_from_slice(b"hello");
                packet.sequence = 7;
            })
            .unwrap();

        collection.release(handle).unwrap();

        let reused = collection.acquire();
        assert_eq!(reused, handle);
        let (len, sequence) = collection
            .with(reused, |packet| (packet.payload.len(), packet.sequence))
            .unwrap();
        assert_eq!(len, 0);
        assert_eq!(sequence, 0);
    }

    #[test]
    fn test_double_release_strict() {
        let collection = ReferenceCollection::<Packet>::new(true);
        let handle = collection.acquire();
        collection.release(handle).unwrap();

        let err = collection.release(handle).unwrap_err();
        assert!(matches!(err, KernelError::DoubleRelease { .. }));
        assert!(conserved(&collection.info()));
    }

    #[test]
    fn test_double_release_lenient_is_ignored() {
        let collection = ReferenceCollection::<Packet>::new(false);
        let handle = collection.acquire();
        collection.release(handle).unwrap();
        collection.release(handle).unwrap();

        let info = collection.info();
        assert_eq!(info.release_count, 1);
        assert_eq!(info.unused_count, 1);
        assert!(conserved(&info));
    }

    #[test]
    fn test_take_restore_and_release_value() {
        let collection = ReferenceCollection::<Packet>::new(true);
        let handle = collection.acquire();

        let mut packet = collection.take(handle).unwrap();
        assert!(matches!(
            collection.with(handle, |_| ()),
            Err(KernelError::ReferenceCheckedOut { .. })
        ));
        assert!(matches!(
            collection.release(handle),
            Err(KernelError::ReferenceCheckedOut { .. })
        ));

        packet.sequence = 9;
        collection.restore(handle, packet).unwrap();
        assert_eq!(collection.with(handle, |p| p.sequence).unwrap(), 9);

        let packet = collection.take(handle).unwrap();
        collection.release_value(handle, packet).unwrap();
        assert_eq!(collection.unused_count(), 1);
        assert_eq!(collection.using_count(), 0);
    }

    #[test]
    fn test_panic_inside_with_mut_restores_instance() {
        let collection = ReferenceCollection::<Packet>::new(true);
        let handle = collection.acquire();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            collection
                .with_mut(handle, |packet| {
                    packet.sequence = 3;
                    panic!("callback failed");
                })
                .ok();
        }));
        assert!(outcome.is_err());

        assert_eq!(collection.with(handle, |p| p.sequence).unwrap(), 3);
        collection.release(handle).unwrap();
        let info = collection.info();
        assert_eq!(info.using_count, 0);
        assert!(conserved(&info));
    }

    #[test]
    fn test_add_remove_conservation() {
        let collection = ReferenceCollection::<Packet>::new(true);
        collection.add(5);
        let held = collection.acquire();
        assert_eq!(collection.unused_count(), 4);

        assert_eq!(collection.remove(2), 2);
        assert_eq!(collection.remove(10), 2);
        assert_eq!(collection.unused_count(), 0);
        assert!(conserved(&collection.info()));

        collection.release(held).unwrap();
        assert_eq!(collection.remove_all(), 1);
        let info = collection.info();
        assert_eq!(info.remove_count, 5);
        assert!(conserved(&info));
    }

    #[test]
    fn test_removed_handle_is_stale() {
        let collection = ReferenceCollection::<Packet>::new(true);
        let handle = collection.acquire();
        collection.release(handle).unwrap();
        collection.remove_all();

        assert!(matches!(
            collection.release(handle),
            Err(KernelError::InvalidReference { .. })
        ));
        assert!(matches!(
            collection.take(handle),
            Err(KernelError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_concurrent_acquire_release() {
        use std::sync::Arc;
        use std::thread;

        let collection = Arc::new(ReferenceCollection::<Packet>::new(true));
        let mut handles = vec![];

        for _ in 0..8 {
            let collection = Arc::clone(&collection);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let handle = collection.acquire();
                    collection.release(handle).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let info = collection.info();
        assert_eq!(info.acquire_count, 1600);
        assert_eq!(info.release_count, 1600);
        assert_eq!(info.using_count, 0);
        assert!(info.add_count <= 8);
        assert!(conserved(&info));
    }
}
