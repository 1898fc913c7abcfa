//! In-memory report store with fault injection.

use crate::context::SimContext;

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spotter_env::{
    IdentityProvider, InspectorReport, NewReport, ReportId, ReportPatch, ReportQuery, ReportStore,
    SortOrder, SpotterContext, StoreError, REPORTS_TABLE,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Store operations that faults can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Insert,
    Update,
    Query,
}

impl StoreOp {
    pub fn name(&self) -> &'static str {
        match self {
            StoreOp::Insert => "insert",
            StoreOp::Update => "update",
            StoreOp::Query => "query",
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<InspectorReport>,
    last_id: i64,
}

/// The shared `inspector_reports` table.
///
/// Cheap to clone; clones share rows and faults. Clients talk to it through
/// a `SessionStore` bound to their identity, which stamps `user_id` on insert.
#[derive(Clone)]
pub struct MemoryStore {
    context: Arc<SimContext>,
    table: Arc<Mutex<Table>>,
    faults: Arc<StoreFaultController>,
}

impl MemoryStore {
    /// Creates an empty table on the given clock.
    pub fn new(context: Arc<SimContext>) -> Self {
        let fault_seed = context.seed().wrapping_mul(0x9e3779b97f4a7c15);
        Self {
            context,
            table: Arc::new(Mutex::new(Table::default())),
            faults: Arc::new(StoreFaultController::new(fault_seed)),
        }
    }

    /// Returns a store handle acting on behalf of `identity`.
    pub fn session<I: IdentityProvider>(&self, identity: Arc<I>) -> SessionStore<I> {
        SessionStore {
            backend: self.clone(),
            identity,
        }
    }

    /// Fault injection for this table.
    pub fn faults(&self) -> &StoreFaultController {
        &self.faults
    }

    /// Inserts fully-formed rows, bypassing defaults and faults.
    pub fn seed(&self, rows: impl IntoIterator<Item = InspectorReport>) {
        let mut table = self.table.lock().unwrap();
        for row in rows {
            table.last_id = table.last_id.max(row.id.0);
            table.rows.push(row);
        }
    }

    /// Returns every row, expired or not, in insertion order.
    pub fn rows(&self) -> Vec<InspectorReport> {
        self.table.lock().unwrap().rows.clone()
    }

    pub fn row(&self, id: ReportId) -> Option<InspectorReport> {
        self.table
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_as(&self, author: spotter_env::UserId, report: NewReport) -> InspectorReport {
        let mut table = self.table.lock().unwrap();
        table.last_id += 1;

        let row = InspectorReport {
            id: ReportId(table.last_id),
            user_id: author,
            latitude: report.latitude,
            longitude: report.longitude,
            votes: 1,
            created_at: self.context.now(),
        };
        table.rows.push(row.clone());
        row
    }

    fn patch(&self, id: ReportId, patch: &ReportPatch) -> bool {
        let mut table = self.table.lock().unwrap();
        match table.rows.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.apply(patch);
                true
            }
            None => false,
        }
    }

    fn select(&self, query: &ReportQuery) -> Vec<InspectorReport> {
        let mut rows: Vec<InspectorReport> = self
            .table
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        match query.order {
            SortOrder::Ascending => rows.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::Descending => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        rows
    }
}

/// A `MemoryStore` handle bound to one client's session.
pub struct SessionStore<I: IdentityProvider> {
    backend: MemoryStore,
    identity: Arc<I>,
}

#[async_trait]
impl<I: IdentityProvider> ReportStore for SessionStore<I> {
    async fn insert(&self, report: NewReport) -> Result<InspectorReport, StoreError> {
        self.backend.faults.check(StoreOp::Insert)?;

        let author = self
            .identity
            .current_identity()
            .await
            .ok_or(StoreError::Unauthenticated("insert"))?;

        let row = self.backend.insert_as(author.id, report);
        debug!(table = REPORTS_TABLE, id = %row.id, "insert");
        Ok(row)
    }

    async fn update(&self, id: ReportId, patch: ReportPatch) -> Result<(), StoreError> {
        self.backend.faults.check(StoreOp::Update)?;

        let touched = self.backend.patch(id, &patch);
        debug!(table = REPORTS_TABLE, %id, touched, "update");
        Ok(())
    }

    async fn query(&self, query: ReportQuery) -> Result<Vec<InspectorReport>, StoreError> {
        self.backend.faults.check(StoreOp::Query)?;
        Ok(self.backend.select(&query))
    }
}

/// Fault controller for the simulated store.
pub struct StoreFaultController {
    /// Operations that fail until recovered
    outages: Mutex<HashMap<StoreOp, bool>>,

    /// Remaining forced failures per operation
    fail_next: Mutex<HashMap<StoreOp, u32>>,

    /// Random failure probability per operation (0.0 - 1.0)
    failure_rate: Mutex<HashMap<StoreOp, f64>>,

    rng: Mutex<ChaCha8Rng>,

    injected: AtomicU64,
}

impl StoreFaultController {
    /// Creates a controller with no faults configured.
    pub fn new(seed: u64) -> Self {
        Self {
            outages: Mutex::new(HashMap::new()),
            fail_next: Mutex::new(HashMap::new()),
            failure_rate: Mutex::new(HashMap::new()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            injected: AtomicU64::new(0),
        }
    }

    /// Fails every `op` until `recover` or `heal_all`.
    pub fn fail_always(&self, op: StoreOp) {
        self.outages.lock().unwrap().insert(op, true);
    }

    /// Ends an outage of `op`.
    pub fn recover(&self, op: StoreOp) {
        self.outages.lock().unwrap().remove(&op);
    }

    /// Fails the next `count` calls of `op`.
    pub fn fail_next(&self, op: StoreOp, count: u32) {
        *self.fail_next.lock().unwrap().entry(op).or_insert(0) += count;
    }

    /// Sets a random failure rate for `op`.
    pub fn set_failure_rate(&self, op: StoreOp, rate: f64) {
        self.failure_rate
            .lock()
            .unwrap()
            .insert(op, rate.clamp(0.0, 1.0));
    }

    /// Clears every configured fault.
    pub fn heal_all(&self) {
        self.outages.lock().unwrap().clear();
        self.fail_next.lock().unwrap().clear();
        self.failure_rate.lock().unwrap().clear();
    }

    /// Number of failures injected so far.
    pub fn injected_failures(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    /// Decides whether this call of `op` fails.
    pub fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        if self.should_fail(op) {
            self.injected.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::unavailable(format!(
                "injected {} failure on {}",
                op.name(),
                REPORTS_TABLE
            )));
        }
        Ok(())
    }

    fn should_fail(&self, op: StoreOp) -> bool {
        if self.outages.lock().unwrap().get(&op).copied().unwrap_or(false) {
            return true;
        }

        {
            let mut pending = self.fail_next.lock().unwrap();
            if let Some(remaining) = pending.get_mut(&op) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return true;
                }
            }
        }

        let rate = self.failure_rate.lock().unwrap().get(&op).copied().unwrap_or(0.0);
        rate > 0.0 && self.rng.lock().unwrap().gen_bool(rate)
    }
}

impl Default for StoreFaultController {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SimIdentity;
    use chrono::Duration as ChronoDuration;
    use spotter_env::{AnonymousIdentity, UserId};

    fn store() -> (Arc<SimContext>, MemoryStore) {
        let ctx = SimContext::shared(7);
        let store = MemoryStore::new(ctx.clone());
        (ctx, store)
    }

    #[tokio::test]
    async fn test_insert_applies_defaults_and_stamps_author() {
        let (ctx, store) = store();
        let session = store.session(Arc::new(SimIdentity::signed_in(UserId::from("U"))));

        let first = session
            .insert(NewReport { latitude: 1.0, longitude: 2.0 })
            .await
            .unwrap();
        ctx.advance_hours(1.0);
        let second = session
            .insert(NewReport { latitude: 3.0, longitude: 4.0 })
            .await
            .unwrap();

        assert_eq!(first.id, ReportId(1));
        assert_eq!(second.id, ReportId(2));
        assert_eq!(first.votes, 1);
        assert_eq!(first.user_id, UserId::from("U"));
        assert_eq!(second.created_at - first.created_at, ChronoDuration::hours(1));
    }

    #[tokio::test]
    async fn test_signed_out_insert_is_rejected() {
        let (_, store) = store();
        let session = store.session(Arc::new(AnonymousIdentity));

        let err = session
            .insert(NewReport { latitude: 1.0, longitude: 2.0 })
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::Unauthenticated("insert"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_a_no_op() {
        let (_, store) = store();
        let session = store.session(Arc::new(AnonymousIdentity));

        let result = session
            .update(ReportId(99), ReportPatch { votes: Some(5), created_at: None })
            .await;

        assert!(result.is_ok());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let (ctx, store) = store();
        let session = store.session(Arc::new(SimIdentity::signed_in(UserId::from("U"))));

        for lat in [1.0, 2.0, 3.0] {
            session
                .insert(NewReport { latitude: lat, longitude: 0.0 })
                .await
                .unwrap();
            ctx.advance_hours(1.0);
        }

        let since = ctx.now() - ChronoDuration::minutes(150);
        let desc = session
            .query(ReportQuery::since(since, SortOrder::Descending))
            .await
            .unwrap();
        let asc = session
            .query(ReportQuery::since(since, SortOrder::Ascending))
            .await
            .unwrap();

        let desc_ids: Vec<i64> = desc.iter().map(|r| r.id.0).collect();
        let asc_ids: Vec<i64> = asc.iter().map(|r| r.id.0).collect();
        assert_eq!(desc_ids, vec![3, 2]);
        assert_eq!(asc_ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_fail_next_then_recover() {
        let (_, store) = store();
        let session = store.session(Arc::new(SimIdentity::signed_in(UserId::from("U"))));
        store.faults().fail_next(StoreOp::Insert, 2);

        let payload = NewReport { latitude: 0.0, longitude: 0.0 };
        assert!(session.insert(payload).await.is_err());
        assert!(session.insert(payload).await.is_err());
        assert!(session.insert(payload).await.is_ok());
        assert_eq!(store.faults().injected_failures(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_outage_and_heal() {
        let faults = StoreFaultController::new(1);

        assert!(faults.check(StoreOp::Query).is_ok());
        faults.fail_always(StoreOp::Query);
        assert!(faults.check(StoreOp::Query).is_err());
        assert!(faults.check(StoreOp::Insert).is_ok());

        faults.heal_all();
        assert!(faults.check(StoreOp::Query).is_ok());
    }

    #[test]
    fn test_full_failure_rate_always_fails() {
        let faults = StoreFaultController::new(1);
        faults.set_failure_rate(StoreOp::Update, 1.0);

        for _ in 0..10 {
            assert!(faults.check(StoreOp::Update).is_err());
        }
        assert_eq!(faults.injected_failures(), 10);
    }
}
