//! Report Service - the caller-facing surface of the engine.
//!
//! Wires a `ReportSubmitter` and an `ActiveReportFeed` to the same clock,
//! store and identity, and keeps the last fetched feed as the snapshot new
//! sightings are matched against.
//!
//! ```text
//!  get_active_reports(window) ──► feed ──► store.query ──► snapshot
//!                                                             │
//!  report_sighting(coordinate) ──► submitter(snapshot) ──► store.insert / update
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use spotter_core::{ReportConfig, ReportService};
//! use spotter_env::SystemContext;
//!
//! let clock = SystemContext::shared();
//! let service = ReportService::new(clock, store, session, ReportConfig::default());
//! service.get_active_reports(None).await;
//! if !service.report_sighting(Coordinate::new(52.52, 13.405)).await {
//!     // the error handler already saw the failure
//! }
//! ```

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::feed::ActiveReportFeed;
use crate::metrics::{MetricsSnapshot, SubmissionMetrics};
use crate::submitter::{ReportSubmitter, SubmitOutcome};

use spotter_env::{Coordinate, IdentityProvider, InspectorReport, ReportStore, SpotterContext};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;

/// Callback receiving write-path failures of `report_sighting`.
pub type ErrorHandler = Arc<dyn Fn(&ReportError) + Send + Sync>;

/// Caller-facing report operations.
pub struct ReportService<Ctx, S, I>
where
    Ctx: SpotterContext,
    S: ReportStore,
    I: IdentityProvider,
{
    /// Configuration
    pub config: ReportConfig,

    submitter: ReportSubmitter<Ctx, S, I>,

    feed: ActiveReportFeed<Ctx, S>,

    on_error: ErrorHandler,

    /// Last fetched active reports
    snapshot: RwLock<Vec<InspectorReport>>,

    metrics: Arc<SubmissionMetrics>,
}

impl<Ctx, S, I> ReportService<Ctx, S, I>
where
    Ctx: SpotterContext,
    S: ReportStore,
    I: IdentityProvider,
{
    /// Creates a service; failures are logged until a handler is set.
    pub fn new(context: Arc<Ctx>, store: Arc<S>, identity: Arc<I>, config: ReportConfig) -> Self {
        let metrics = Arc::new(SubmissionMetrics::new());

        let submitter = ReportSubmitter::new(context.clone(), store.clone(), identity)
            .with_metrics(metrics.clone());
        let feed = ActiveReportFeed::new(context, store, &config).with_metrics(metrics.clone());

        let name = config.name.clone();
        let on_error: ErrorHandler = Arc::new(move |e: &ReportError| {
            error!(service = %name, kind = ?e.kind(), error = %e, "Report submission failed");
        });

        Self {
            config,
            submitter,
            feed,
            on_error,
            snapshot: RwLock::new(Vec::new()),
            metrics,
        }
    }

    /// Replaces the error handler used by `report_sighting`.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ReportError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(handler);
        self
    }

    /// Fetches the active reports and makes them the matching snapshot.
    ///
    /// Uses the configured window when `window_hours` is `None`.
    pub async fn get_active_reports(&self, window_hours: Option<f64>) -> Vec<InspectorReport> {
        let reports = self.feed.list(window_hours).await;
        *self.snapshot.write().await = reports.clone();
        reports
    }

    /// Reports a sighting at `coordinate` against the current snapshot.
    ///
    /// Returns `false` after passing the failure to the error handler.
    pub async fn report_sighting(&self, coordinate: Coordinate) -> bool {
        let active = self.active_snapshot().await;
        let on_error = self.on_error.clone();

        self.submitter
            .submit(coordinate, &active, move |e| on_error(e))
            .await
    }

    /// Reports a sighting and returns the outcome instead of calling the
    /// error handler.
    pub async fn try_report_sighting(
        &self,
        coordinate: Coordinate,
    ) -> Result<SubmitOutcome, ReportError> {
        let active = self.active_snapshot().await;
        self.submitter.try_submit(coordinate, &active).await
    }

    /// Returns a copy of the current snapshot.
    pub async fn active_snapshot(&self) -> Vec<InspectorReport> {
        self.snapshot.read().await.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn submitter(&self) -> &ReportSubmitter<Ctx, S, I> {
        &self.submitter
    }

    pub fn feed(&self) -> &ActiveReportFeed<Ctx, S> {
        &self.feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{report, t0, FixedClock, RecordingStore};
    use chrono::Duration as ChronoDuration;
    use spotter_env::Identity;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    fn service_for(
        user: &str,
        store: &Arc<RecordingStore>,
        clock: &Arc<FixedClock>,
    ) -> ReportService<FixedClock, RecordingStore, Identity> {
        ReportService::new(
            clock.clone(),
            store.clone(),
            Arc::new(Identity::new(user)),
            ReportConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_example_corroboration_and_foreign_match() {
        let clock = FixedClock::at(t0());
        let store = RecordingStore::new(clock.clone(), Some("U"));
        store.seed(vec![report(1, "U", 37.7749, -122.4194, 3, 2.0)]);

        let author = service_for("U", &store, &clock);
        let other = service_for("V", &store, &clock);
        author.get_active_reports(None).await;
        other.get_active_reports(None).await;

        assert!(author.report_sighting(Coordinate::new(37.77495, -122.41942)).await);
        let after_author = store.row(1).unwrap();
        assert_eq!(after_author.votes, 4);
        assert_eq!(after_author.created_at, t0());

        clock.advance(ChronoDuration::minutes(5));
        assert!(other.report_sighting(Coordinate::new(37.7749, -122.4194)).await);
        assert_eq!(store.row(1).unwrap(), after_author);
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_error_handler_sees_write_failure() {
        let clock = FixedClock::at(t0());
        let store = RecordingStore::new(clock.clone(), Some("U"));
        store.fail_writes.store(true, Ordering::SeqCst);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let service = service_for("U", &store, &clock)
            .with_error_handler(move |e| sink.lock().unwrap().push(e.kind()));

        assert!(!service.report_sighting(Coordinate::new(1.0, 1.0)).await);
        assert_eq!(*seen.lock().unwrap(), vec![ErrorKind::StoreWriteFailure]);
        assert_eq!(service.metrics().write_failures, 1);
    }

    #[tokio::test]
    async fn test_submission_does_not_refresh_snapshot() {
        let clock = FixedClock::at(t0());
        let store = RecordingStore::new(clock.clone(), Some("U"));
        let service = service_for("U", &store, &clock);

        service.get_active_reports(None).await;
        assert!(service.report_sighting(Coordinate::new(3.0, 3.0)).await);
        assert!(service.active_snapshot().await.is_empty());

        // Same spot against the stale snapshot inserts again.
        assert!(service.report_sighting(Coordinate::new(3.0, 3.0)).await);
        assert_eq!(store.rows().len(), 2);

        let refreshed = service.get_active_reports(None).await;
        assert_eq!(refreshed.len(), 2);
        assert_eq!(service.active_snapshot().await, refreshed);
    }

    #[tokio::test]
    async fn test_read_failure_clears_snapshot() {
        let clock = FixedClock::at(t0());
        let store = RecordingStore::new(clock.clone(), Some("U"));
        store.seed(vec![report(1, "U", 1.0, 1.0, 1, 1.0)]);
        let service = service_for("U", &store, &clock);

        assert_eq!(service.get_active_reports(None).await.len(), 1);
        store.fail_reads.store(true, Ordering::SeqCst);
        assert!(service.get_active_reports(None).await.is_empty());
        assert!(service.active_snapshot().await.is_empty());
        assert_eq!(service.metrics().read_failures, 1);
    }

    #[tokio::test]
    async fn test_try_report_sighting_returns_outcome() {
        let clock = FixedClock::at(t0());
        let store = RecordingStore::new(clock.clone(), Some("U"));
        store.seed(vec![report(1, "U", 9.0, 9.0, 1, 0.1)]);
        let service = service_for("U", &store, &clock);
        service.get_active_reports(Some(1.0)).await;

        let outcome = service
            .try_report_sighting(Coordinate::new(9.0002, 8.9998))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Corroborated {
                id: spotter_env::ReportId(1),
                votes: 2,
                at: t0(),
            }
        );
    }
}
