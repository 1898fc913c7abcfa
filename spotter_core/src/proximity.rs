//! Proximity matching of a sighting against the active reports.
//!
//! "Same spot" is an axis-aligned box: both the latitude and the longitude
//! delta must be strictly below the tolerance. This is not a geodesic
//! distance; at 0.0005 degrees the box is roughly 50m tall and narrower
//! toward the poles.

use spotter_env::{Coordinate, InspectorReport};

/// Per-axis tolerance in degrees. A delta of exactly this value does not match.
pub const COORDINATE_TOLERANCE: f64 = 0.0005;

/// Returns true if `a` and `b` are within `tolerance` on both axes (strict).
#[inline]
pub fn within_tolerance(a: Coordinate, b: Coordinate, tolerance: f64) -> bool {
    (a.lat - b.lat).abs() < tolerance && (a.lng - b.lng).abs() < tolerance
}

/// Finds the report a new sighting should be folded into.
///
/// Always matches at [`COORDINATE_TOLERANCE`]; the box size is part of the
/// stored data's contract and is not tunable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProximityMatcher;

impl ProximityMatcher {
    /// Returns true if `report` sits on the same spot as `candidate`.
    pub fn matches(&self, candidate: Coordinate, report: &InspectorReport) -> bool {
        within_tolerance(candidate, report.coordinate(), COORDINATE_TOLERANCE)
    }

    /// Returns the first report in `reports` that matches `candidate`.
    ///
    /// Input order decides ties; there is no nearest-match ranking.
    pub fn find_match<'a>(
        &self,
        candidate: Coordinate,
        reports: &'a [InspectorReport],
    ) -> Option<&'a InspectorReport> {
        reports.iter().find(|report| self.matches(candidate, report))
    }
}
