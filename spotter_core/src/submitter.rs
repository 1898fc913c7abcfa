//! Sighting submission: dedup against the active snapshot, then vote or insert.
//!
//! ```text
//!  location ──► ProximityMatcher(snapshot)
//!                   │
//!        ┌──── Some(report) ────┐          None
//!        ▼                      ▼            ▼
//!  caller == author?      otherwise     insert {lat, lng}
//!   update votes+1,       no write
//!   created_at = now
//! ```
//!
//! The snapshot is taken as given and never re-fetched mid-call. Matching and
//! writing are not atomic across calls: two first sightings of the same spot
//! racing each other both insert. That duplicate is accepted.

use crate::error::ReportError;
use crate::metrics::SubmissionMetrics;
use crate::proximity::ProximityMatcher;

use chrono::{DateTime, Utc};
use spotter_env::{
    Coordinate, IdentityProvider, InspectorReport, NewReport, ReportId, ReportPatch, ReportStore,
    SpotterContext,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a successful submission did.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// No active report nearby; a new row was created
    Inserted(InspectorReport),

    /// The author re-reported their own sighting; votes bumped
    Corroborated {
        id: ReportId,
        votes: u32,
        at: DateTime<Utc>,
    },

    /// A nearby report exists but the caller is not its author (or is
    /// signed out); nothing was written
    ForeignMatch { id: ReportId },
}

impl SubmitOutcome {
    /// Returns true if the submission wrote to the store.
    pub fn wrote(&self) -> bool {
        !matches!(self, SubmitOutcome::ForeignMatch { .. })
    }
}

/// Orchestrates one sighting submission.
///
/// Generic over the clock, the store and the identity source so the same
/// code runs against production collaborators and simulation doubles.
pub struct ReportSubmitter<Ctx, S, I>
where
    Ctx: SpotterContext,
    S: ReportStore,
    I: IdentityProvider,
{
    /// Environment clock
    context: Arc<Ctx>,

    /// Backing report store
    store: Arc<S>,

    /// Caller identity source
    identity: Arc<I>,

    matcher: ProximityMatcher,

    metrics: Arc<SubmissionMetrics>,
}

impl<Ctx, S, I> ReportSubmitter<Ctx, S, I>
where
    Ctx: SpotterContext,
    S: ReportStore,
    I: IdentityProvider,
{
    pub fn new(context: Arc<Ctx>, store: Arc<S>, identity: Arc<I>) -> Self {
        Self {
            context,
            store,
            identity,
            matcher: ProximityMatcher,
            metrics: Arc::new(SubmissionMetrics::new()),
        }
    }

    /// Shares a metrics sink with other components.
    pub fn with_metrics(mut self, metrics: Arc<SubmissionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<SubmissionMetrics> {
        &self.metrics
    }

    /// Submits a sighting and reports store failures through `on_error`.
    ///
    /// Returns `true` on success, including a foreign match that wrote
    /// nothing. On failure `on_error` is called exactly once and `false`
    /// is returned.
    pub async fn submit<F>(
        &self,
        location: Coordinate,
        active_reports: &[InspectorReport],
        on_error: F,
    ) -> bool
    where
        F: FnOnce(&ReportError) + Send,
    {
        match self.try_submit(location, active_reports).await {
            Ok(_) => true,
            Err(e) => {
                on_error(&e);
                false
            }
        }
    }

    /// Submits a sighting and returns what happened.
    ///
    /// Performs at most one store write. With no match in `active_reports`
    /// exactly one insert is attempted, for any finite coordinate pair
    /// (ranges are not checked). NaN or infinite axes are rejected with
    /// [`ReportError::InvalidCoordinate`] before matching.
    pub async fn try_submit(
        &self,
        location: Coordinate,
        active_reports: &[InspectorReport],
    ) -> Result<SubmitOutcome, ReportError> {
        self.metrics.record_submission();

        if !location.is_finite() {
            self.metrics.record_rejected_coordinate();
            warn!(
                lat = location.lat,
                lng = location.lng,
                "Rejecting sighting with non-finite coordinate"
            );
            return Err(ReportError::InvalidCoordinate {
                lat: location.lat,
                lng: location.lng,
            });
        }

        match self.matcher.find_match(location, active_reports) {
            Some(existing) => self.corroborate(existing).await,
            None => self.insert(location).await,
        }
    }

    async fn corroborate(&self, existing: &InspectorReport) -> Result<SubmitOutcome, ReportError> {
        let caller = self.identity.current_identity().await;

        let is_author = caller
            .as_ref()
            .is_some_and(|identity| existing.is_authored_by(&identity.id));

        if !is_author {
            self.metrics.record_foreign_match();
            debug!(
                report = %existing.id,
                author = %existing.user_id,
                signed_in = caller.is_some(),
                "Sighting matches another user's report, leaving it unchanged"
            );
            return Ok(SubmitOutcome::ForeignMatch { id: existing.id });
        }

        let now = self.context.now();
        let patch = ReportPatch::corroborate(existing.votes, now);
        let votes = patch.votes.unwrap_or(existing.votes);

        if let Err(e) = self.store.update(existing.id, patch).await {
            self.metrics.record_write_failure();
            warn!(report = %existing.id, error = %e, "Failed to record corroboration");
            return Err(ReportError::StoreWrite(e));
        }

        self.metrics.record_corroboration();
        info!(report = %existing.id, votes, "Corroborated report");

        Ok(SubmitOutcome::Corroborated {
            id: existing.id,
            votes,
            at: now,
        })
    }

    async fn insert(&self, location: Coordinate) -> Result<SubmitOutcome, ReportError> {
        let started = self.context.elapsed();

        match self.store.insert(NewReport::at(location)).await {
            Ok(report) => {
                self.metrics.record_insert();
                info!(
                    report = %report.id,
                    lat = report.latitude,
                    lng = report.longitude,
                    latency_ms = self.context.elapsed().saturating_sub(started).as_millis() as u64,
                    "Created report"
                );
                Ok(SubmitOutcome::Inserted(report))
            }
            Err(e) => {
                self.metrics.record_write_failure();
                warn!(
                    lat = location.lat,
                    lng = location.lng,
                    error = %e,
                    "Failed to create report"
                );
                Err(ReportError::StoreWrite(e))
            }
        }
    }
}
