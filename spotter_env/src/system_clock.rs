//! Production implementation of SpotterContext backed by the system clock.

use crate::SpotterContext;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production context reading the host's wall clock.
pub struct SystemContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl SystemContext {
    /// Creates a new SystemContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for SystemContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SpotterContext for SystemContext {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_context_elapsed_is_monotonic() {
        let ctx = SystemContext::new();
        let t1 = ctx.elapsed();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = ctx.elapsed();

        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[test]
    fn test_system_context_wall_clock_moves_forward() {
        let ctx = SystemContext::new();
        let a = ctx.now();
        let b = ctx.now();
        assert!(b >= a);
    }
}
