//! Errors surfaced by the reporting engine.

use spotter_env::StoreError;
use thiserror::Error;

/// Failure of a submission or a feed query.
///
/// A missing caller identity is deliberately absent: it is treated as
/// "not the author" and never escalated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    /// Insert or update rejected by the store
    #[error("Failed to save report: {0}")]
    StoreWrite(#[source] StoreError),

    /// Range query rejected by the store
    #[error("Failed to fetch reports: {0}")]
    StoreRead(#[source] StoreError),

    /// Sighting position is not a usable map coordinate
    #[error("Invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

/// Coarse classification handed to callers alongside the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    StoreWriteFailure,
    StoreReadFailure,
    InvalidCoordinate,
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::StoreWrite(_) => ErrorKind::StoreWriteFailure,
            ReportError::StoreRead(_) => ErrorKind::StoreReadFailure,
            ReportError::InvalidCoordinate { .. } => ErrorKind::InvalidCoordinate,
        }
    }

    /// Returns the underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ReportError::StoreWrite(e) | ReportError::StoreRead(e) => Some(e),
            ReportError::InvalidCoordinate { .. } => None,
        }
    }
}
