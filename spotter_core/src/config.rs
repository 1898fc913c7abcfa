//! Engine configuration.
//!
//! The matching tolerance is not configurable; it is fixed at
//! [`COORDINATE_TOLERANCE`](crate::proximity::COORDINATE_TOLERANCE).

use std::env;
use std::str::FromStr;
use tracing::{info, warn};

/// Default trailing window of the active-report feed, in hours.
pub const DEFAULT_WINDOW_HOURS: f64 = 8.0;

/// Environment variable overriding [`ReportConfig::window_hours`].
pub const WINDOW_HOURS_VAR: &str = "SPOTTER_WINDOW_HOURS";

/// Configuration for a Spotter report service.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Service's logical name (for logging)
    pub name: String,

    /// Trailing window used when the caller does not pass one (default: 8)
    pub window_hours: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            name: "spotter".to_string(),
            window_hours: DEFAULT_WINDOW_HOURS,
        }
    }
}

impl ReportConfig {
    /// Loads overrides from `SPOTTER_WINDOW_HOURS`.
    ///
    /// Missing or malformed values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let window_hours = match lookup(WINDOW_HOURS_VAR) {
            Some(raw) => parse_positive(WINDOW_HOURS_VAR, &raw).unwrap_or(defaults.window_hours),
            None => {
                info!("{WINDOW_HOURS_VAR} not set, using default: {}", defaults.window_hours);
                defaults.window_hours
            }
        };
        Self {
            window_hours,
            ..defaults
        }
    }

    pub fn with_window_hours(mut self, hours: f64) -> Self {
        self.window_hours = hours;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Parses a finite, strictly positive number.
fn parse_positive(key: &str, raw: &str) -> Option<f64> {
    match f64::from_str(raw.trim()) {
        Ok(value) if value.is_finite() && value > 0.0 => Some(value),
        Ok(_) => {
            warn!("Invalid {key} value {raw:?}: must be a finite positive number");
            None
        }
        Err(e) => {
            warn!("Invalid {key} value {raw:?}: {e}");
            None
        }
    }
}
