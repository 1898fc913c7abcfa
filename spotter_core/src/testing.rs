//! Test doubles for the engine's collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use spotter_env::{
    InspectorReport, NewReport, ReportId, ReportPatch, ReportQuery, ReportStore, SortOrder,
    SpotterContext, StoreError, UserId,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fixed "now" for all engine tests: 2024-01-01T12:00:00Z.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// Returns `t0()` minus the given number of hours.
pub fn hours_ago(hours: f64) -> DateTime<Utc> {
    t0() - ChronoDuration::milliseconds((hours * 3_600_000.0) as i64)
}

/// Builds a report row aged `age_hours` relative to `t0()`.
pub fn report(
    id: i64,
    user: &str,
    lat: f64,
    lng: f64,
    votes: u32,
    age_hours: f64,
) -> InspectorReport {
    InspectorReport {
        id: ReportId(id),
        user_id: UserId::from(user),
        latitude: lat,
        longitude: lng,
        votes,
        created_at: hours_ago(age_hours),
    }
}

/// Manually advanced wall clock.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl SpotterContext for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn elapsed(&self) -> Duration {
        Duration::ZERO
    }
}

/// Vec-backed store that counts writes and can be told to fail.
pub struct RecordingStore {
    clock: Arc<FixedClock>,
    author: Option<UserId>,
    rows: Mutex<Vec<InspectorReport>>,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub queries: AtomicUsize,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl RecordingStore {
    pub fn new(clock: Arc<FixedClock>, author: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            author: author.map(UserId::from),
            rows: Mutex::new(Vec::new()),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        })
    }

    pub fn seed(&self, rows: Vec<InspectorReport>) {
        self.rows.lock().unwrap().extend(rows);
    }

    pub fn rows(&self) -> Vec<InspectorReport> {
        self.rows.lock().unwrap().clone()
    }

    pub fn row(&self, id: i64) -> Option<InspectorReport> {
        self.rows().into_iter().find(|r| r.id.0 == id)
    }

    pub fn writes(&self) -> usize {
        self.inserts.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportStore for RecordingStore {
    async fn insert(&self, report: NewReport) -> Result<InspectorReport, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("insert refused by test"));
        }
        let user_id = self
            .author
            .clone()
            .ok_or(StoreError::Unauthenticated("insert"))?;

        let mut rows = self.rows.lock().unwrap();
        let next_id = rows.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
        let row = InspectorReport {
            id: ReportId(next_id),
            user_id,
            latitude: report.latitude,
            longitude: report.longitude,
            votes: 1,
            created_at: self.clock.now(),
        };
        rows.push(row.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn update(&self, id: ReportId, patch: ReportPatch) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("update refused by test"));
        }
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.apply(&patch);
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, query: ReportQuery) -> Result<Vec<InspectorReport>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("query refused by test"));
        }
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        if query.order == SortOrder::Descending {
            rows.reverse();
        }
        Ok(rows)
    }
}
