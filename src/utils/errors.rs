// src/utils/errors.rs
//! Kernel error types
//!
//! Every variant is a usage or contract violation: the caller did something
//! the kernel cannot recover from on its behalf. Scheduling outcomes reported
//! by task agents are not errors and never surface here.

use thiserror::Error;

/// Result alias used across the kernel
pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors raised by the reference, task and event pools
#[derive(Debug, Error)]
pub enum KernelError {
    /// Reference released while already sitting in the unused queue
    #[error("reference of type '{type_name}' has already been released")]
    DoubleRelease { type_name: &'static str },

    /// Handle points to a slot that was removed from its collection
    #[error("invalid or stale reference handle for type '{type_name}'")]
    InvalidReference { type_name: &'static str },

    /// Handle points to an instance that is not currently acquired
    #[error("reference of type '{type_name}' is not in use")]
    ReferenceNotInUse { type_name: &'static str },

    /// Instance is checked out by a pool and cannot be accessed through its handle
    #[error("reference of type '{type_name}' is checked out by a pool")]
    ReferenceCheckedOut { type_name: &'static str },

    /// Registered collection does not hold the requested type
    #[error("reference collection type mismatch: expected '{expected}', registered '{registered}'")]
    TypeMismatch {
        expected: &'static str,
        registered: &'static str,
    },

    /// Second handler subscribed to an id on a single-handler pool
    #[error("event '{id}' does not allow multiple handlers")]
    MultiHandlerNotAllowed { id: i32 },

    /// Same handler subscribed twice while duplicates are disallowed
    #[error("event '{id}' does not allow duplicate handlers")]
    DuplicateHandlerNotAllowed { id: i32 },

    /// Unsubscribe of a handler that was never subscribed
    #[error("event '{id}' has no such handler subscribed")]
    HandlerNotFound { id: i32 },

    /// Event fired with no subscriber and no default handler
    #[error("event '{id}' has no handler")]
    NoHandler { id: i32 },

    /// Configuration loading failure
    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// Logging or metrics setup failure
    #[error("observability error: {0}")]
    Observability(String),
}

impl KernelError {
    /// True for errors caused by a stale or misused reference handle
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            KernelError::DoubleRelease { .. }
                | KernelError::InvalidReference { .. }
                | KernelError::ReferenceNotInUse { .. }
                | KernelError::ReferenceCheckedOut { .. }
                | KernelError::TypeMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_event() {
        let err = KernelError::NoHandler { id: 42 };
        assert_eq!(err.to_string(), "event '42' has no handler");

        let err = KernelError::MultiHandlerNotAllowed { id: 7 };
        assert!(err.to_string().contains("'7'"));
    }

    #[test]
    fn test_reference_error_classification() {
        assert!(KernelError::DoubleRelease { type_name: "T" }.is_reference_error());
        assert!(!KernelError::HandlerNotFound { id: 1 }.is_reference_error());
    }
}
