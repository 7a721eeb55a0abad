//! Simulated clock.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use braid_core::Environment;

/// Manually advanced clock for deterministic tests.
///
/// All clones share the same underlying instant, so a clone held by the
/// client under test observes every [`SimEnv::advance`] made by the test.
#[derive(Clone)]
pub struct SimEnv {
    now: Arc<Mutex<Instant>>,
}

impl SimEnv {
    /// Creates a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self { now: Arc::new(Mutex::new(Instant::now())) }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
