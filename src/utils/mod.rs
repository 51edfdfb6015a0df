// src/utils/mod.rs
//! Shared utilities: error types and configuration

pub mod config;
pub mod errors;

pub use config::KernelConfig;
pub use errors::{KernelError, Result};
