//! Simulation context implementing SpotterContext for deterministic testing.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use spotter_env::SpotterContext;
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

/// Simulation context backed by deterministic time and RNG.
///
/// This implements `SpotterContext` using:
/// - A virtual clock that can be advanced manually
/// - A seeded ChaCha8 RNG for sighting positions and client choices
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Deterministic RNG for scenario decisions
    rng: Arc<Mutex<ChaCha8Rng>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: DateTime<Utc>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            // 2024-01-01 00:00:00 UTC
            epoch: DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_secs(1_704_067_200)),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap();
        *time += duration.as_nanos() as u64;
    }

    /// Advances virtual time by a number of (possibly fractional) hours.
    ///
    /// Virtual time never runs backwards: negative or NaN hours are a no-op,
    /// and a span too large to represent leaves the clock where it is.
    pub fn advance_hours(&self, hours: f64) {
        match Duration::try_from_secs_f64(hours.max(0.0) * 3600.0) {
            Ok(span) => self.advance_time(span),
            Err(e) => tracing::warn!(hours, error = %e, "Ignoring unrepresentable time advance"),
        }
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap()
    }

    /// Returns the master seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the wall-clock time virtual time 0 maps to.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Runs `f` with exclusive access to the seeded RNG.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap();
        f(&mut *rng)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            rng: Arc::clone(&self.rng),
            epoch: self.epoch,
        }
    }
}

impl SpotterContext for SimContext {
    fn now(&self) -> DateTime<Utc> {
        self.epoch + ChronoDuration::nanoseconds(self.time_ns() as i64)
    }

    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }
}
