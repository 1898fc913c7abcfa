//! Spotter Metrics Module
//!
//! Lock-free counters shared by the submitter and the feed. They are cheap
//! to bump from any task and can be snapshotted for logs or the simulator's
//! JSON output.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one report service.
#[derive(Debug, Default)]
pub struct SubmissionMetrics {
    submissions: AtomicU64,
    inserts: AtomicU64,
    corroborations: AtomicU64,
    foreign_matches: AtomicU64,
    rejected_coordinates: AtomicU64,
    write_failures: AtomicU64,
    feed_queries: AtomicU64,
    read_failures: AtomicU64,
}

/// Point-in-time copy of `SubmissionMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub submissions: u64,
    pub inserts: u64,
    pub corroborations: u64,
    pub foreign_matches: u64,
    pub rejected_coordinates: u64,
    pub write_failures: u64,
    pub feed_queries: u64,
    pub read_failures: u64,
}

impl SubmissionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submission(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_corroboration(&self) {
        self.corroborations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_foreign_match(&self) {
        self.foreign_matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_coordinate(&self) {
        self.rejected_coordinates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_feed_query(&self) {
        self.feed_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submissions: self.submissions.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            corroborations: self.corroborations.load(Ordering::Relaxed),
            foreign_matches: self.foreign_matches.load(Ordering::Relaxed),
            rejected_coordinates: self.rejected_coordinates.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            feed_queries: self.feed_queries.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Number of store writes that went through.
    pub fn writes(&self) -> u64 {
        self.inserts + self.corroborations
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = SubmissionMetrics::new();
        metrics.record_submission();
        metrics.record_submission();
        metrics.record_insert();
        metrics.record_corroboration();
        metrics.record_read_failure();

        let snap = metrics.snapshot();
        assert_eq!(snap.submissions, 2);
        assert_eq!(snap.writes(), 2);
        assert_eq!(snap.read_failures, 1);
        assert_eq!(snap.foreign_matches, 0);
    }

    #[test]
    fn test_snapshot_json_keys() {
        let metrics = SubmissionMetrics::new();
        metrics.record_write_failure();

        let json = metrics.snapshot().to_json();
        assert_eq!(json["write_failures"], 1);
        assert_eq!(json["inserts"], 0);
    }
}
