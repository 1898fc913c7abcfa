//! Report store abstraction.

use async_trait::async_trait;
use crate::error::StoreError;
use crate::types::{InspectorReport, NewReport, ReportId, ReportPatch, ReportQuery};

/// Name of the backing table/collection.
pub const REPORTS_TABLE: &str = "inspector_reports";

/// Persistence surface required by the reporting engine.
///
/// # Implementations
///
/// - **Production**: a thin client over the hosted database
/// - **Simulation**: `MemoryStore` sessions with fault injection
///
/// # Consistency
///
/// No operation here is conditional. Matching a sighting against a snapshot
/// and then writing is not atomic, so two concurrent first sightings of the
/// same spot may both insert. Callers that need stronger guarantees must use
/// a store that offers a version-checked update.
#[async_trait]
pub trait ReportStore: Send + Sync + 'static {
    /// Inserts a new report row.
    ///
    /// The store assigns `id`, stamps `user_id` from the bound session,
    /// defaults `votes = 1` and sets `created_at = now`.
    ///
    /// # Returns
    /// * `Ok(report)` - The row as stored
    /// * `Err(StoreError::Unauthenticated)` - No identity to attribute it to
    async fn insert(&self, report: NewReport) -> Result<InspectorReport, StoreError>;

    /// Applies a partial patch to the row with the given id.
    ///
    /// Patching an id that does not exist affects no rows and is not an error.
    async fn update(&self, id: ReportId, patch: ReportPatch) -> Result<(), StoreError>;

    /// Returns all rows with `created_at >= query.since`, ordered by
    /// `created_at` in `query.order`.
    async fn query(&self, query: ReportQuery) -> Result<Vec<InspectorReport>, StoreError>;
}
