//! Time-windowed feed of active reports.
//!
//! A report is active while its `created_at` lies inside the trailing window.
//! Expiry is purely a read-time filter; rows are never deleted.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::metrics::SubmissionMetrics;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use spotter_env::{InspectorReport, ReportQuery, ReportStore, SortOrder, SpotterContext};
use std::sync::Arc;
use tracing::{debug, error, warn};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Lists reports inside a trailing window, newest first.
pub struct ActiveReportFeed<Ctx, S>
where
    Ctx: SpotterContext,
    S: ReportStore,
{
    context: Arc<Ctx>,
    store: Arc<S>,

    /// Window used when the caller passes none
    default_window_hours: f64,

    metrics: Arc<SubmissionMetrics>,
}

impl<Ctx, S> ActiveReportFeed<Ctx, S>
where
    Ctx: SpotterContext,
    S: ReportStore,
{
    pub fn new(context: Arc<Ctx>, store: Arc<S>, config: &ReportConfig) -> Self {
        Self {
            context,
            store,
            default_window_hours: config.window_hours,
            metrics: Arc::new(SubmissionMetrics::new()),
        }
    }

    /// Shares a metrics sink with other components.
    pub fn with_metrics(mut self, metrics: Arc<SubmissionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the oldest `created_at` still inside a window of `window_hours`.
    ///
    /// Returns `None` for a negative or non-finite window.
    pub fn cutoff(&self, window_hours: f64) -> Option<DateTime<Utc>> {
        window_cutoff(self.context.now(), window_hours)
    }

    /// Lists active reports; never fails.
    ///
    /// Store failures are logged and yield an empty list.
    pub async fn list(&self, window_hours: Option<f64>) -> Vec<InspectorReport> {
        let hours = window_hours.unwrap_or(self.default_window_hours);

        match self.try_list(hours).await {
            Ok(reports) => reports,
            Err(e) => {
                error!(window_hours = hours, error = %e, "Error fetching recent reports");
                Vec::new()
            }
        }
    }

    /// Lists active reports, surfacing store failures.
    pub async fn try_list(&self, window_hours: f64) -> Result<Vec<InspectorReport>, ReportError> {
        let Some(since) = self.cutoff(window_hours) else {
            warn!(window_hours, "Ignoring feed request with invalid window");
            return Ok(Vec::new());
        };

        self.metrics.record_feed_query();

        let reports = self
            .store
            .query(ReportQuery::since(since, SortOrder::Descending))
            .await
            .map_err(|e| {
                self.metrics.record_read_failure();
                ReportError::StoreRead(e)
            })?;

        debug!(window_hours, %since, count = reports.len(), "Fetched active reports");
        Ok(reports)
    }
}

/// Computes `now - window_hours`, at millisecond precision.
pub fn window_cutoff(now: DateTime<Utc>, window_hours: f64) -> Option<DateTime<Utc>> {
    if !window_hours.is_finite() || window_hours < 0.0 {
        return None;
    }

    // `as` saturates, so absurdly long windows clamp instead of wrapping.
    let millis = (window_hours * MILLIS_PER_HOUR) as i64;
    let window = ChronoDuration::milliseconds(millis);

    Some(now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC))
}
