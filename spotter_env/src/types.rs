//! Record and wire types shared by the store, the engine and the simulator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned identifier of a report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub i64);

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a signed-in user, as stored in `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a deterministic UserId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        let short = self.0.get(..8).unwrap_or(self.0.as_str());
        write!(f, "{}", short)
    }
}

/// The caller's resolved session identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
}

impl Identity {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self { id: id.into() }
    }
}

/// A point on the map in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns true if both axes are finite numbers.
    ///
    /// Range is not checked; the store accepts any finite pair.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// One row of the `inspector_reports` table.
///
/// Wire shape: `{id, user_id, latitude, longitude, votes, created_at}` with
/// `created_at` as an ISO-8601 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectorReport {
    /// Store-assigned row id
    pub id: ReportId,

    /// Original submitter
    pub user_id: UserId,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Corroboration count, always >= 1
    pub votes: u32,

    /// Last sighting time; refreshed on every corroboration
    pub created_at: DateTime<Utc>,
}

impl InspectorReport {
    /// Returns the report's position.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Returns true if the report was authored by `user`.
    pub fn is_authored_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }

    /// Applies a partial patch in place.
    pub fn apply(&mut self, patch: &ReportPatch) {
        if let Some(votes) = patch.votes {
            self.votes = votes;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
    }
}

/// Insert payload: only the coordinates.
///
/// The store fills in `id`, `user_id`, `votes = 1` and `created_at = now`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub latitude: f64,
    pub longitude: f64,
}

impl NewReport {
    pub fn at(location: Coordinate) -> Self {
        Self {
            latitude: location.lat,
            longitude: location.lng,
        }
    }
}

/// Partial update payload. Absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ReportPatch {
    /// Patch recording one more corroborating sighting at `at`.
    pub fn corroborate(current_votes: u32, at: DateTime<Utc>) -> Self {
        Self {
            votes: Some(current_votes.saturating_add(1)),
            created_at: Some(at),
        }
    }
}

/// Ordering on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Range query over `created_at`: rows with `created_at >= since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportQuery {
    pub since: DateTime<Utc>,
    pub order: SortOrder,
}

impl ReportQuery {
    pub fn since(since: DateTime<Utc>, order: SortOrder) -> Self {
        Self { since, order }
    }

    /// Returns true if `report` falls inside the query range.
    pub fn matches(&self, report: &InspectorReport) -> bool {
        report.created_at >= self.since
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> InspectorReport {
        InspectorReport {
            id: ReportId(7),
            user_id: UserId::from("U"),
            latitude: 37.7749,
            longitude: -122.4194,
            votes: 3,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_report_wire_shape() {
        let json = serde_json::to_value(sample()).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["user_id"], "U");
        assert_eq!(json["votes"], 3);
        assert_eq!(json["created_at"], "2024-01-01T10:00:00Z");
    }

    #[test]
    fn test_report_parses_offset_timestamp() {
        let raw = r#"{
            "id": 12,
            "user_id": "2b1c7c1e-0000-4000-8000-000000000000",
            "latitude": 52.52,
            "longitude": 13.405,
            "votes": 1,
            "created_at": "2024-03-05T08:15:30.123456+00:00"
        }"#;

        let report: InspectorReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.id, ReportId(12));
        assert_eq!(report.votes, 1);
        assert_eq!(report.created_at.timestamp(), 1709626530);
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut report = sample();
        let before = report.created_at;

        report.apply(&ReportPatch {
            votes: Some(9),
            created_at: None,
        });

        assert_eq!(report.votes, 9);
        assert_eq!(report.created_at, before);
    }

    #[test]
    fn test_patch_serializes_without_absent_fields() {
        let patch = ReportPatch {
            votes: Some(4),
            created_at: None,
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"votes":4}"#);
    }

    #[test]
    fn test_coordinate_finiteness() {
        assert!(Coordinate::new(37.7749, -122.4194).is_finite());
        assert!(Coordinate::new(90.5, -180.1).is_finite());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_finite());
        assert!(!Coordinate::new(0.0, f64::NEG_INFINITY).is_finite());
    }

    #[test]
    fn test_user_id_from_seed_is_deterministic() {
        assert_eq!(UserId::from_seed(3), UserId::from_seed(3));
        assert_ne!(UserId::from_seed(3), UserId::from_seed(4));
    }
}
