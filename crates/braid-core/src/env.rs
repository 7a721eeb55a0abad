//! Time abstraction.
//!
//! The engine never calls `Instant::now()` directly. Production uses
//! [`SystemEnv`]; the test harness substitutes a manually advanced clock so
//! every timeout and backoff is exercised deterministically.

use std::time::Instant;

/// Source of the current time for an engine instance.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Production environment backed by the system monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
