//! Error types for the Spotter environment abstraction.

use thiserror::Error;

/// Errors reported by a `ReportStore` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store refused the operation (constraint, policy, bad payload)
    #[error("Store rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    /// The store could not be reached or timed out
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store session has no signed-in identity to attribute a write to
    #[error("No authenticated session for {0}")]
    Unauthenticated(&'static str),
}

impl StoreError {
    /// Creates a rejection error for the named operation.
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            reason: reason.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
