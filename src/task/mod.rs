// src/task/mod.rs
//! Task scheduling
//!
//! - **Task**: poolable unit of work carrying a [`TaskBase`]
//! - **Agent**: long-lived worker running one task at a time
//! - **Task Pool**: priority queue of tasks matched to free agents every tick

pub mod agent;
pub mod base;
pub mod pool;

pub use agent::{StartTaskStatus, TaskAgent};
pub use base::{Task, TaskBase, TaskInfo, TaskStatus, UserData};
pub use pool::{TaskPool, TaskPoolStats};
