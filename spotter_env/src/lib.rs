//! Spotter Environment Abstraction Layer
//!
//! This crate provides the seams that let the Spotter reporting engine run
//! against a real backend in production and against in-memory doubles in
//! simulation:
//! - Time (`now()`, `elapsed()`)
//! - Persistence (`insert()`, `update()`, `query()` on the report table)
//! - Identity (`current_identity()` of the signed-in caller)
//!
//! Every collaborator is passed to the engine explicitly at construction;
//! nothing here is a process-wide singleton.
//!
//! # Example
//!
//! ```ignore
//! use spotter_env::{SpotterContext, ReportStore, ReportQuery, SortOrder};
//!
//! async fn recent<Ctx: SpotterContext, S: ReportStore>(ctx: &Ctx, store: &S) {
//!     let since = ctx.now() - chrono::Duration::hours(8);
//!     let rows = store.query(ReportQuery::since(since, SortOrder::Descending)).await;
//! }
//! ```

mod context;
mod error;
mod identity;
mod store;
mod system_clock;
mod types;

pub use context::SpotterContext;
pub use error::StoreError;
pub use identity::{AnonymousIdentity, IdentityProvider};
pub use store::{ReportStore, REPORTS_TABLE};
pub use system_clock::SystemContext;
pub use types::{
    Coordinate, Identity, InspectorReport, NewReport, ReportId, ReportPatch, ReportQuery,
    SortOrder, UserId,
};
