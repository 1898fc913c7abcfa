//! Simulation scenarios for the reporting engine.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: A sighting with nothing nearby creates a one-vote report
    FirstSighting,

    /// SIM-002: The author re-reports; votes climb and the timestamp refreshes
    Corroboration,

    /// SIM-003: Other users and signed-out clients leave the report untouched
    ForeignMatch,

    /// SIM-004: Reports drop out of the feed after the window, rows stay
    WindowExpiry,

    /// SIM-005: Two first sightings race on a stale snapshot
    DuplicateRace,

    /// SIM-006: Insert and update outages surface through the error handler
    WriteOutage,

    /// SIM-007: Query outage yields an empty feed
    ReadOutage,

    /// SIM-008: Seeded multi-client run with random faults, invariant checks
    Crowd,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::FirstSighting,
            ScenarioId::Corroboration,
            ScenarioId::ForeignMatch,
            ScenarioId::WindowExpiry,
            ScenarioId::DuplicateRace,
            ScenarioId::WriteOutage,
            ScenarioId::ReadOutage,
            ScenarioId::Crowd,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::FirstSighting => "first_sighting",
            ScenarioId::Corroboration => "corroboration",
            ScenarioId::ForeignMatch => "foreign_match",
            ScenarioId::WindowExpiry => "window_expiry",
            ScenarioId::DuplicateRace => "duplicate_race",
            ScenarioId::WriteOutage => "write_outage",
            ScenarioId::ReadOutage => "read_outage",
            ScenarioId::Crowd => "crowd",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::FirstSighting => "Unmatched sighting inserts one report with votes = 1",
            ScenarioId::Corroboration => "Author re-reports; votes +1 and created_at refreshed",
            ScenarioId::ForeignMatch => "Sightings from other or no identity write nothing",
            ScenarioId::WindowExpiry => "Feed drops expired reports without deleting them",
            ScenarioId::DuplicateRace => "Concurrent first sightings on one snapshot both insert",
            ScenarioId::WriteOutage => "Rejected writes return false and reach the handler",
            ScenarioId::ReadOutage => "Rejected feed queries return an empty list",
            ScenarioId::Crowd => "Many clients and random faults; invariants hold",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first_sighting" | "firstsighting" | "sim-001" => Ok(ScenarioId::FirstSighting),
            "corroboration" | "sim-002" => Ok(ScenarioId::Corroboration),
            "foreign_match" | "foreignmatch" | "sim-003" => Ok(ScenarioId::ForeignMatch),
            "window_expiry" | "windowexpiry" | "sim-004" => Ok(ScenarioId::WindowExpiry),
            "duplicate_race" | "duplicaterace" | "sim-005" => Ok(ScenarioId::DuplicateRace),
            "write_outage" | "writeoutage" | "sim-006" => Ok(ScenarioId::WriteOutage),
            "read_outage" | "readoutage" | "sim-007" => Ok(ScenarioId::ReadOutage),
            "crowd" | "sim-008" => Ok(ScenarioId::Crowd),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("SIM-005".parse::<ScenarioId>(), Ok(ScenarioId::DuplicateRace));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
