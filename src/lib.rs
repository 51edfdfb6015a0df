// src/lib.rs
//! Zero Kernel
//!
//! Engine-agnostic runtime primitives for frame-driven hosts such as game
//! loops and simulations.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────────────────────┐
//!              │         ReferencePool        │  one per host, Arc-shared
//!              │  TypeId ─▶ ReferenceCollection<T>
//!              └──────┬────────────────┬──────┘
//!                     │ take/release   │ take/release
//!              ┌──────▼──────┐  ┌──────▼──────┐
//!              │ TaskPool<T> │  │ EventPool<E>│  driven by update(elapsed)
//!              └─────────────┘  └─────────────┘
//! ```
//!
//! - **collections**: array-backed binary min-heap
//! - **reference**: typed object recycling with double-release detection
//! - **task**: priority task queue scheduled onto agents every tick
//! - **event**: publish/subscribe with deferred and immediate firing
//! - **observability**: tracing subscriber and Prometheus recorder setup
//! - **utils**: configuration and errors

pub mod collections;
pub mod event;
pub mod observability;
pub mod reference;
pub mod task;
pub mod utils;

// Re-export commonly used types
pub use collections::MinHeap;
pub use event::{EventArgs, EventContext, EventEmitter, EventHandler, EventPool, EventPoolMode};
pub use reference::{Reference, ReferenceHandle, ReferencePool, ReferenceStrictCheckType};
pub use task::{StartTaskStatus, Task, TaskAgent, TaskBase, TaskPool};
pub use utils::config::KernelConfig;
pub use utils::errors::{KernelError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Kernel build information
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = BuildInfo::current();
        assert_eq!(info.version, VERSION);
        assert!(!info.git_hash.is_empty());
        assert!(!info.rustc_version.is_empty());
    }
}
