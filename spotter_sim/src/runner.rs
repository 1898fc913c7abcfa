//! Scenario runner - executes simulation scenarios against a fresh SimWorld.

use crate::scenarios::ScenarioId;
use crate::store::StoreOp;
use crate::world::{SimClient, SimConfig, SimWorld};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::Serialize;
use spotter_core::feed::window_cutoff;
use spotter_core::proximity::within_tolerance;
use spotter_core::{ErrorKind, ReportConfig, COORDINATE_TOLERANCE};
use spotter_env::{Coordinate, InspectorReport, ReportId, SpotterContext, UserId};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

type Check = Result<(), String>;

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Check {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total sightings submitted by all clients
    pub sightings: u64,

    /// Final simulation time in hours
    pub final_time_hours: f64,

    /// Rows in the store at the end, expired or not
    pub final_report_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    pub inserts: u64,
    pub corroborations: u64,
    pub foreign_matches: u64,
    pub write_failures: u64,
    pub read_failures: u64,

    /// Faults the store controller injected
    pub injected_failures: u64,

    /// Pairs of stored reports that sit within tolerance of each other
    pub duplicate_pairs: u64,
}

impl ScenarioMetrics {
    fn collect(world: &SimWorld) -> (Self, u64) {
        let mut metrics = Self {
            injected_failures: world.store.faults().injected_failures(),
            duplicate_pairs: count_duplicate_pairs(&world.store.rows()),
            ..Self::default()
        };
        let mut sightings = 0;

        for client in &world.clients {
            let snap = client.service.metrics();
            sightings += snap.submissions;
            metrics.inserts += snap.inserts;
            metrics.corroborations += snap.corroborations;
            metrics.foreign_matches += snap.foreign_matches;
            metrics.write_failures += snap.write_failures;
            metrics.read_failures += snap.read_failures;
        }

        (metrics, sightings)
    }
}

fn count_duplicate_pairs(rows: &[InspectorReport]) -> u64 {
    let mut pairs = 0;
    for (i, a) in rows.iter().enumerate() {
        for b in &rows[i + 1..] {
            if within_tolerance(a.coordinate(), b.coordinate(), COORDINATE_TOLERANCE) {
                pairs += 1;
            }
        }
    }
    pairs
}

/// Runs simulation scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Number of clients
    num_clients: usize,

    /// Sightings submitted by the crowd scenario
    num_sightings: usize,

    /// Feed window in hours
    window_hours: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_clients: usize) -> Self {
        Self {
            seed,
            num_clients,
            num_sightings: 200,
            window_hours: spotter_core::DEFAULT_WINDOW_HOURS,
        }
    }

    /// Sets the number of crowd sightings.
    pub fn with_sightings(mut self, sightings: usize) -> Self {
        self.num_sightings = sightings;
        self
    }

    /// Sets the feed window.
    pub fn with_window_hours(mut self, hours: f64) -> Self {
        self.window_hours = hours;
        self
    }

    fn world(&self) -> SimWorld {
        let mut world = SimWorld::new(SimConfig {
            seed: self.seed,
            // Every scenario needs an author, a bystander and a spare.
            num_clients: self.num_clients.max(3),
            report: ReportConfig::default().with_window_hours(self.window_hours),
        });
        world.spawn_clients();
        world
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let world = self.world();

        let outcome = match scenario {
            ScenarioId::FirstSighting => self.run_first_sighting(&world).await,
            ScenarioId::Corroboration => self.run_corroboration(&world).await,
            ScenarioId::ForeignMatch => self.run_foreign_match(&world).await,
            ScenarioId::WindowExpiry => self.run_window_expiry(&world).await,
            ScenarioId::DuplicateRace => self.run_duplicate_race(&world).await,
            ScenarioId::WriteOutage => self.run_write_outage(&world).await,
            ScenarioId::ReadOutage => self.run_read_outage(&world).await,
            ScenarioId::Crowd => self.run_crowd(&world).await,
        };

        let (metrics, sightings) = ScenarioMetrics::collect(&world);

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: outcome.is_ok(),
            sightings,
            final_time_hours: world.hours(),
            final_report_count: world.store.len(),
            failure_reason: outcome.err(),
            metrics,
        }
    }

    /// SIM-001: FirstSighting - an unmatched sighting creates one report.
    async fn run_first_sighting(&self, world: &SimWorld) -> Check {
        let reporter = world.client(0);
        let spot = random_spot(world);

        reporter.service.get_active_reports(None).await;
        ensure(reporter.service.report_sighting(spot).await, || {
            "first sighting was rejected".to_string()
        })?;

        let rows = world.store.rows();
        ensure(rows.len() == 1, || format!("expected 1 report, found {}", rows.len()))?;

        let row = &rows[0];
        ensure(row.votes == 1, || format!("new report has {} votes", row.votes))?;
        ensure(row.user_id == reporter.user, || "new report has the wrong author".to_string())?;
        ensure(row.created_at == world.context.now(), || {
            "new report is not stamped with the current time".to_string()
        })?;

        let feed = world.client(1).service.get_active_reports(None).await;
        ensure(feed == rows, || "other clients do not see the new report".to_string())
    }

    /// SIM-002: Corroboration - the author bumps their own report.
    async fn run_corroboration(&self, world: &SimWorld) -> Check {
        let author = world.client(0);
        let spot = random_spot(world);

        author.service.get_active_reports(None).await;
        ensure(author.service.report_sighting(spot).await, || {
            "initial sighting was rejected".to_string()
        })?;

        let nudged = Coordinate::new(spot.lat + 0.00005, spot.lng - 0.00002);

        for round in 1..=3 {
            world.context.advance_hours(2.0);
            author.service.get_active_reports(None).await;

            let before = world.store.rows()[0].clone();
            ensure(author.service.report_sighting(nudged).await, || {
                format!("corroboration {round} was rejected")
            })?;

            let after = world
                .store
                .row(before.id)
                .ok_or_else(|| format!("report {} disappeared", before.id))?;
            ensure(after.votes == before.votes + 1, || {
                format!("round {round}: votes {} -> {}", before.votes, after.votes)
            })?;
            ensure(
                after.created_at == world.context.now() && after.created_at > before.created_at,
                || format!("round {round}: created_at was not refreshed"),
            )?;
        }

        ensure(world.store.len() == 1, || {
            format!("corroboration created {} rows", world.store.len())
        })
    }

    /// SIM-003: ForeignMatch - non-authors never change a report.
    async fn run_foreign_match(&self, world: &SimWorld) -> Check {
        let author = world.client(0);
        let bystander = world.client(1);
        let signed_out = world.client(2);
        let spot = random_spot(world);

        author.service.get_active_reports(None).await;
        author.service.report_sighting(spot).await;
        let original = world.store.rows();
        ensure(original.len() == 1, || "author's report was not created".to_string())?;

        world.context.advance_hours(1.0);
        bystander.service.get_active_reports(None).await;
        ensure(bystander.service.report_sighting(spot).await, || {
            "foreign match was reported as a failure".to_string()
        })?;
        ensure(world.store.rows() == original, || {
            "another user's sighting changed the report".to_string()
        })?;

        signed_out.identity.sign_out();
        signed_out.service.get_active_reports(None).await;
        let accepted = signed_out.service.report_sighting(spot).await;
        signed_out.identity.sign_in(signed_out.user.clone());

        ensure(accepted, || "signed-out match was reported as a failure".to_string())?;
        ensure(world.store.rows() == original, || {
            "a signed-out sighting changed the report".to_string()
        })?;
        ensure(
            bystander.error_count() == 0 && signed_out.error_count() == 0,
            || "foreign matches reached the error handler".to_string(),
        )
    }

    /// SIM-004: WindowExpiry - the feed forgets old reports, the table does not.
    async fn run_window_expiry(&self, world: &SimWorld) -> Check {
        let author = world.client(0);
        let reader = world.client(1);
        let spot = random_spot(world);
        let window = self.window_hours;

        // A heavily voted report that is already outside the window.
        world.store.seed([InspectorReport {
            id: ReportId(1000),
            user_id: reader.user.clone(),
            latitude: -spot.lat,
            longitude: -spot.lng,
            votes: 50,
            created_at: world.context.now() - hours(window + 1.0),
        }]);

        author.service.get_active_reports(None).await;
        author.service.report_sighting(spot).await;

        // Step to just inside the window, then just past it.
        let margin = (window * 0.5).min(0.1);
        world.context.advance_hours(window - margin);
        let feed = reader.service.get_active_reports(None).await;
        ensure(feed.len() == 1 && feed[0].votes == 1, || {
            format!(
                "expected only the fresh report just inside the window, got {}",
                feed.len()
            )
        })?;

        world.context.advance_hours(2.0 * margin);
        let feed = reader.service.get_active_reports(None).await;
        ensure(feed.is_empty(), || format!("{} expired reports still listed", feed.len()))?;
        ensure(world.store.len() == 2, || "expired reports were deleted".to_string())?;

        // With nothing active, the same spot starts a new report.
        author.service.get_active_reports(None).await;
        ensure(author.service.report_sighting(spot).await, || {
            "sighting after expiry was rejected".to_string()
        })?;
        ensure(world.store.len() == 3, || "expired report was reused".to_string())
    }

    /// SIM-005: DuplicateRace - two first sightings on one snapshot.
    async fn run_duplicate_race(&self, world: &SimWorld) -> Check {
        let a = world.client(0);
        let b = world.client(1);
        let spot = random_spot(world);
        let nearby = Coordinate::new(spot.lat + 0.0001, spot.lng);

        a.service.get_active_reports(None).await;
        b.service.get_active_reports(None).await;

        let (a_ok, b_ok) = tokio::join!(
            a.service.report_sighting(spot),
            b.service.report_sighting(nearby),
        );
        ensure(a_ok && b_ok, || "racing sightings were rejected".to_string())?;

        // The race is accepted: both inserts land.
        let rows = world.store.rows();
        ensure(rows.len() == 2, || format!("expected 2 racing inserts, found {}", rows.len()))?;
        ensure(count_duplicate_pairs(&rows) == 1, || {
            "racing inserts are not duplicates".to_string()
        })?;

        // A later sighting only ever touches the first match in feed order.
        world.context.advance_time(Duration::from_secs(60));
        let feed = a.service.get_active_reports(None).await;
        a.service.report_sighting(spot).await;

        let changed = world
            .store
            .rows()
            .iter()
            .zip(rows.iter())
            .filter(|(now, then)| now != then)
            .count();
        ensure(changed <= 1, || format!("{changed} reports changed by one sighting"))?;
        ensure(feed.len() == 2, || "feed does not show both duplicates".to_string())
    }

    /// SIM-006: WriteOutage - write failures reach the caller.
    async fn run_write_outage(&self, world: &SimWorld) -> Check {
        let client = world.client(0);
        let faults = world.store.faults();
        let spot = random_spot(world);

        client.service.get_active_reports(None).await;
        faults.fail_always(StoreOp::Insert);
        ensure(!client.service.report_sighting(spot).await, || {
            "insert outage was reported as success".to_string()
        })?;
        ensure(last_error_is(client, 1, ErrorKind::StoreWriteFailure), || {
            "insert failure did not reach the error handler exactly once".to_string()
        })?;
        ensure(world.store.is_empty(), || "failed insert left a row".to_string())?;

        faults.recover(StoreOp::Insert);
        ensure(client.service.report_sighting(spot).await, || {
            "insert after recovery failed".to_string()
        })?;

        world.context.advance_hours(0.5);
        client.service.get_active_reports(None).await;
        let before = world.store.rows()[0].clone();

        faults.fail_next(StoreOp::Update, 1);
        ensure(!client.service.report_sighting(spot).await, || {
            "update failure was reported as success".to_string()
        })?;
        ensure(last_error_is(client, 2, ErrorKind::StoreWriteFailure), || {
            "update failure did not reach the error handler".to_string()
        })?;
        ensure(world.store.row(before.id).as_ref() == Some(&before), || {
            "failed update changed the report".to_string()
        })?;

        ensure(client.service.report_sighting(spot).await, || {
            "update after recovery failed".to_string()
        })?;
        let after = world.store.row(before.id).ok_or("report disappeared")?;
        ensure(after.votes == before.votes + 1, || {
            format!("votes {} -> {} after recovery", before.votes, after.votes)
        })
    }

    /// SIM-007: ReadOutage - the feed fails open.
    async fn run_read_outage(&self, world: &SimWorld) -> Check {
        let author = world.client(0);
        let reader = world.client(1);
        let spot = random_spot(world);

        author.service.get_active_reports(None).await;
        for i in 0..3 {
            let offset = 0.01 * i as f64;
            author
                .service
                .report_sighting(Coordinate::new(spot.lat + offset, spot.lng))
                .await;
            world.context.advance_time(Duration::from_secs(600));
        }

        world.store.faults().fail_always(StoreOp::Query);
        let feed = reader.service.get_active_reports(None).await;
        ensure(feed.is_empty(), || "feed returned rows during an outage".to_string())?;
        ensure(reader.error_count() == 0, || {
            "read failure reached the write error handler".to_string()
        })?;

        world.store.faults().recover(StoreOp::Query);
        let feed = reader.service.get_active_reports(None).await;
        ensure(feed.len() == 3, || format!("expected 3 reports, got {}", feed.len()))?;
        check_feed(world, &feed)
    }

    /// SIM-008: Crowd - random clients, hotspots and faults.
    ///
    /// After every sighting: votes >= 1, created_at never moves backwards,
    /// at most one row written, only authors bump votes. After every feed
    /// refresh: window respected, newest first, nothing active missing.
    /// Clients refresh their snapshot only some of the time, so stale
    /// snapshots and duplicate clusters are expected.
    async fn run_crowd(&self, world: &SimWorld) -> Check {
        let hotspots: Vec<Coordinate> = (0..5).map(|_| random_spot(world)).collect();
        let faults = world.store.faults();
        faults.set_failure_rate(StoreOp::Insert, 0.05);
        faults.set_failure_rate(StoreOp::Update, 0.05);
        faults.set_failure_rate(StoreOp::Query, 0.05);

        for step in 0..self.num_sightings {
            let plan = world.context.with_rng(|rng| SightingPlan {
                client: rng.gen_range(0..world.client_count()),
                refresh: rng.gen_bool(0.6),
                toggle_session: rng.gen_bool(0.03),
                wait_minutes: rng.gen_range(0..45),
                spot: if rng.gen_bool(0.8) {
                    let hotspot = hotspots[rng.gen_range(0..hotspots.len())];
                    Coordinate::new(
                        hotspot.lat + rng.gen_range(-0.0003..0.0003),
                        hotspot.lng + rng.gen_range(-0.0003..0.0003),
                    )
                } else {
                    Coordinate::new(rng.gen_range(-60.0..60.0), rng.gen_range(-170.0..170.0))
                },
            });

            world.context.advance_time(Duration::from_secs(plan.wait_minutes * 60));
            let client = world.client(plan.client);

            if plan.toggle_session {
                match client.identity.user() {
                    Some(_) => client.identity.sign_out(),
                    None => client.identity.sign_in(client.user.clone()),
                }
            }

            if plan.refresh {
                let feed = client.service.get_active_reports(None).await;
                if !feed.is_empty() {
                    check_feed(world, &feed).map_err(|e| format!("step {step}: {e}"))?;
                }
            }

            let before = world.store.rows();
            let signed_in_as = client.identity.user();
            let accepted = client.service.report_sighting(plan.spot).await;
            let after = world.store.rows();

            check_sighting(&before, &after, signed_in_as.as_ref(), accepted)
                .map_err(|e| format!("step {step}: {e}"))?;

            debug!(step, client = plan.client, accepted, rows = after.len(), "crowd sighting");
        }

        faults.heal_all();
        let feed = world.client(0).service.get_active_reports(None).await;
        check_feed(world, &feed)?;

        let (metrics, _) = ScenarioMetrics::collect(world);
        let extra_votes: u64 = world
            .store
            .rows()
            .iter()
            .map(|r| u64::from(r.votes - 1))
            .sum();
        ensure(extra_votes <= metrics.corroborations, || {
            format!(
                "{} extra votes stored but {} corroborations recorded",
                extra_votes, metrics.corroborations
            )
        })
    }
}

struct SightingPlan {
    client: usize,
    refresh: bool,
    toggle_session: bool,
    wait_minutes: u64,
    spot: Coordinate,
}

fn hours(h: f64) -> ChronoDuration {
    ChronoDuration::milliseconds((h * 3_600_000.0) as i64)
}

fn random_spot(world: &SimWorld) -> Coordinate {
    world.context.with_rng(|rng| {
        Coordinate::new(rng.gen_range(-60.0..60.0), rng.gen_range(-170.0..170.0))
    })
}

fn last_error_is(client: &SimClient, count: usize, kind: ErrorKind) -> bool {
    let errors = client.errors.lock().unwrap();
    errors.len() == count && errors.last().map(|e| e.kind()) == Some(kind)
}

/// Checks a non-empty feed against the table: window, order, completeness.
fn check_feed(world: &SimWorld, feed: &[InspectorReport]) -> Check {
    let now = world.context.now();
    let cutoff: DateTime<Utc> = window_cutoff(now, world.config.report.window_hours)
        .ok_or_else(|| "invalid window".to_string())?;

    ensure(feed.iter().all(|r| r.created_at >= cutoff), || {
        "feed lists a report outside the window".to_string()
    })?;
    ensure(
        feed.windows(2).all(|w| w[0].created_at >= w[1].created_at),
        || "feed is not ordered newest first".to_string(),
    )?;

    let listed: HashSet<ReportId> = feed.iter().map(|r| r.id).collect();
    let active: HashSet<ReportId> = world
        .store
        .rows()
        .iter()
        .filter(|r| r.created_at >= cutoff)
        .map(|r| r.id)
        .collect();
    ensure(listed == active, || {
        format!("feed lists {} reports, {} are active", listed.len(), active.len())
    })
}

/// Checks the table before and after one sighting.
fn check_sighting(
    before: &[InspectorReport],
    after: &[InspectorReport],
    caller: Option<&UserId>,
    accepted: bool,
) -> Check {
    let previous: HashMap<ReportId, &InspectorReport> = before.iter().map(|r| (r.id, r)).collect();
    let mut writes = 0;

    for row in after {
        ensure(row.votes >= 1, || format!("report {} has {} votes", row.id, row.votes))?;

        match previous.get(&row.id) {
            Some(old) if *old == row => {}
            Some(old) => {
                writes += 1;
                ensure(row.created_at >= old.created_at, || {
                    format!("report {} created_at moved backwards", row.id)
                })?;
                // Votes are written as snapshot + 1, so a stale snapshot can
                // under-count but never over-count.
                ensure(row.votes >= 2 && row.votes <= old.votes + 1, || {
                    format!("report {} votes {} -> {}", row.id, old.votes, row.votes)
                })?;
                ensure(Some(&row.user_id) == caller, || {
                    format!("report {} was voted by a non-author", row.id)
                })?;
            }
            None => {
                writes += 1;
                ensure(row.votes == 1, || {
                    format!("new report {} has {} votes", row.id, row.votes)
                })?;
                ensure(Some(&row.user_id) == caller, || {
                    format!("new report {} has the wrong author", row.id)
                })?;
            }
        }
    }

    ensure(after.len() >= before.len(), || "a report was deleted".to_string())?;
    ensure(writes <= 1, || format!("one sighting wrote {writes} rows"))?;
    ensure(accepted || writes == 0, || "a rejected sighting changed the table".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[tokio::test]
    async fn test_all_scenarios_pass_with_default_seed() {
        let runner = ScenarioRunner::new(42, 4).with_sightings(120);

        for scenario in ScenarioId::all() {
            let result = runner.run(scenario).await;
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
        }
    }

    #[tokio::test]
    async fn test_duplicate_race_records_duplicate() {
        let result = ScenarioRunner::new(7, 2).run(ScenarioId::DuplicateRace).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.inserts, 2);
        assert_eq!(result.metrics.duplicate_pairs, 1);
    }

    #[tokio::test]
    async fn test_write_outage_counts_failures() {
        let result = ScenarioRunner::new(3, 3).run(ScenarioId::WriteOutage).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.write_failures, 2);
        assert_eq!(result.metrics.injected_failures, 2);
        assert_eq!(result.metrics.corroborations, 1);
    }

    #[tokio::test]
    async fn test_shorter_window() {
        let result = ScenarioRunner::new(11, 3)
            .with_window_hours(2.0)
            .run(ScenarioId::WindowExpiry)
            .await;

        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[tokio::test]
    async fn test_window_below_six_minutes() {
        let result = ScenarioRunner::new(11, 3)
            .with_window_hours(0.05)
            .run(ScenarioId::WindowExpiry)
            .await;

        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_check_sighting_flags_foreign_vote() {
        let at = Utc::now();
        let row = InspectorReport {
            id: ReportId(1),
            user_id: UserId::from("U"),
            latitude: 0.0,
            longitude: 0.0,
            votes: 1,
            created_at: at,
        };
        let mut voted = row.clone();
        voted.votes = 2;

        let other = UserId::from("V");
        assert!(check_sighting(&[row.clone()], &[voted.clone()], Some(&other), true).is_err());
        assert!(check_sighting(&[row.clone()], &[voted], Some(&row.user_id), true).is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_crowd_invariants_hold_for_any_seed(seed in any::<u64>(), clients in 2usize..6) {
            let result = block_on(
                ScenarioRunner::new(seed, clients)
                    .with_sightings(80)
                    .run(ScenarioId::Crowd),
            );
            prop_assert!(result.passed, "seed {}: {:?}", seed, result.failure_reason);
        }
    }
}
