//! Core environment context trait for Spotter services.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// The clock the reporting engine reads "now" from.
///
/// This trait abstracts the real world so the submitter and the feed can run
/// in production (system clock) and in simulation (virtual clock) alike.
///
/// # Implementations
///
/// - **Production**: `SystemContext` - wraps `Utc::now()` and `Instant`
/// - **Simulation**: `SimContext` - a manually advanced virtual clock
pub trait SpotterContext: Send + Sync + 'static {
    /// Returns the current wall-clock time.
    ///
    /// Used for `created_at` refreshes and for the feed's window cutoff.
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the monotonic time elapsed since context creation.
    ///
    /// Only used for latency measurements in logs.
    fn elapsed(&self) -> Duration;
}
