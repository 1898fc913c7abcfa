//! Spotter Core - Crowd-sourced sighting reports
//!
//! Clients submit a geolocated sighting. Sightings that land close to an
//! already-active report are folded into it as a vote; everything else
//! becomes a new report. A trailing time window decides which reports are
//! still active:
//! 1. **Proximity**: fixed axis-aligned coordinate tolerance, first match wins
//! 2. **Votes**: only the original author can bump a report's count
//! 3. **Feed**: newest-first list of reports inside the window, fail-open
//!
//! The store, identity and clock are injected; see `spotter_env`.

pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod proximity;
pub mod service;
pub mod submitter;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use config::{ReportConfig, DEFAULT_WINDOW_HOURS};
pub use error::{ErrorKind, ReportError};
pub use feed::ActiveReportFeed;
pub use metrics::{MetricsSnapshot, SubmissionMetrics};
pub use proximity::{ProximityMatcher, COORDINATE_TOLERANCE};
pub use service::{ErrorHandler, ReportService};
pub use submitter::{ReportSubmitter, SubmitOutcome};
