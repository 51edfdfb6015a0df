// src/reference/pool.rs
//! Type-keyed registry of reference collections
//!
//! The pool is an explicit object shared by injection (usually behind an
//! `Arc`) rather than process-global state, so independent hosts and tests
//! never observe each other's instances. Collections are created lazily on
//! first use and live until [`ReferencePool::clear_all`] or
//! [`ReferencePool::shutdown`].

use crate::reference::collection::{ReferenceCollection, ReferenceHandle, ReferencePoolInfo};
use crate::reference::Reference;
use crate::utils::config::KernelConfig;
use crate::utils::errors::{KernelError, Result};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::{debug, info};

/// Type-erased view of a collection for registry-wide operations
trait ErasedCollection: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn info(&self) -> ReferencePoolInfo;
    fn remove_all(&self) -> usize;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Reference> ErasedCollection for ReferenceCollection<T> {
    fn type_name(&self) -> &'static str {
        ReferenceCollection::type_name(self)
    }

    fn info(&self) -> ReferencePoolInfo {
        ReferenceCollection::info(self)
    }

    fn remove_all(&self) -> usize {
        ReferenceCollection::remove_all(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Registry mapping reference types to their collections
pub struct ReferencePool {
    collections: DashMap<TypeId, Arc<dyn ErasedCollection>>,
    strict_check: bool,
}

impl ReferencePool {
    /// Create an empty registry
    pub fn new(strict_check: bool) -> Self {
        Self {
            collections: DashMap::new(),
            strict_check,
        }
    }

    /// Create a registry with the strict-check policy resolved from `config`
    pub fn from_config(config: &KernelConfig) -> Self {
        let strict_check = config.strict_check_enabled();
        info!(
            "Reference pool created (strict check {:?} -> {})",
            config.reference.strict_check, strict_check
        );
        Self::new(strict_check)
    }

    pub fn strict_check(&self) -> bool {
        self.strict_check
    }

    /// Number of registered collections
    pub fn count(&self) -> usize {
        self.collections.len()
    }

    /// Collection for `T`, created on first use
    pub fn collection<T: Reference>(&self) -> Result<Arc<ReferenceCollection<T>>> {
        let erased = self
            .collections
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                debug!("Registering reference collection {}", std::any::type_name::<T>());
                Arc::new(ReferenceCollection::<T>::new(self.strict_check))
                    as Arc<dyn ErasedCollection>
            })
            .value()
            .clone();

        let registered = erased.type_name();
        erased
            .into_any()
            .downcast::<ReferenceCollection<T>>()
            .map_err(|_| KernelError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                registered,
            })
    }

    pub fn acquire<T: Reference>(&self) -> Result<ReferenceHandle<T>> {
        Ok(self.collection::<T>()?.acquire())
    }

    pub fn release<T: Reference>(&self, handle: ReferenceHandle<T>) -> Result<()> {
        self.collection::<T>()?.release(handle)
    }

    pub fn take<T: Reference>(&self, handle: ReferenceHandle<T>) -> Result<T> {
        self.collection::<T>()?.take(handle)
    }

    pub fn restore<T: Reference>(&self, handle: ReferenceHandle<T>, value: T) -> Result<()> {
        self.collection::<T>()?.restore(handle, value)
    }

    pub fn release_value<T: Reference>(&self, handle: ReferenceHandle<T>, value: T) -> Result<()> {
        self.collection::<T>()?.release_value(handle, value)
    }

    pub fn with<T: Reference, R>(
        &self,
        handle: ReferenceHandle<T>,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R> {
        self.collection::<T>()?.with(handle, f)
    }

    pub fn with_mut<T: Reference, R>(
        &self,
        handle: ReferenceHandle<T>,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R> {
        self.collection::<T>()?.with_mut(handle, f)
    }

    /// Pre-warm `T`'s collection with `count` unused instances
    pub fn add<T: Reference>(&self, count: usize) -> Result<()> {
        self.collection::<T>()?.add(count);
        Ok(())
    }

    /// Shrink `T`'s unused set by up to `count` instances
    pub fn remove<T: Reference>(&self, count: usize) -> Result<usize> {
        Ok(self.collection::<T>()?.remove(count))
    }

    pub fn remove_all<T: Reference>(&self) -> Result<usize> {
        Ok(self.collection::<T>()?.remove_all())
    }

    /// Counter snapshots for every registered collection, sorted by type name
    pub fn infos(&self) -> Vec<ReferencePoolInfo> {
        let mut infos: Vec<ReferencePoolInfo> = self
            .collections
            .iter()
            .map(|entry| entry.value().info())
            .collect();
        infos.sort_by(|a, b| a.type_name.cmp(b.type_name));
        infos
    }

    /// Drop every unused instance and forget all collections
    ///
    /// Handles still held by callers become stale.
    pub fn clear_all(&self) {
        let collections: Vec<Arc<dyn ErasedCollection>> = self
            .collections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.collections.clear();

        let removed: usize = collections.iter().map(|c| c.remove_all()).sum();
        debug!(
            "Cleared {} reference collections ({} unused instances)",
            collections.len(),
            removed
        );
    }

    pub fn shutdown(&self) {
        info!("Shutting down reference pool");
        self.clear_all();
    }
}

impl Default for ReferencePool {
    fn default() -> Self {
        Self::new(cfg!(debug_assertions))
    }
}
