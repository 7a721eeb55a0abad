//! Keyed deadline registry.
//!
//! The engine's timers are plain deadlines in a map; nothing here sleeps or
//! spawns. Scheduling a key replaces any pending deadline for that key, so
//! at most one timer per key is ever pending. The driver asks for
//! [`TimerRegistry::next_deadline`] and pops due keys when the clock passes.

use std::collections::HashMap;
use std::time::Instant;

/// The engine's timer keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    /// Budget for the server's `SETUP` response.
    Setup,
    /// Budget for the server's first `AUTH_STATE`.
    AuthState,
    /// Next outbound `KEEPALIVE`.
    Keepalive,
    /// Peer-liveness check against the server keepalive budget.
    Liveness,
    /// Pending transport restart after a reconnect.
    Reconnect,
}

/// Deadline map with replace-on-schedule semantics.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    deadlines: HashMap<TimerKey, Instant>,
}

impl TimerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `key` to fire at `deadline`, cancelling any pending
    /// deadline for the same key.
    pub fn schedule(&mut self, key: TimerKey, deadline: Instant) {
        self.deadlines.insert(key, deadline);
    }

    /// Cancels the pending deadline for `key`, if any. Idempotent.
    pub fn cancel(&mut self, key: TimerKey) {
        self.deadlines.remove(&key);
    }

    /// Cancels every pending deadline.
    pub fn cancel_all(&mut self) {
        self.deadlines.clear();
    }

    /// True when a deadline is pending for `key`.
    #[must_use]
    pub fn is_scheduled(&self, key: TimerKey) -> bool {
        self.deadlines.contains_key(&key)
    }

    /// The pending deadline for `key`, if any.
    #[must_use]
    pub fn deadline(&self, key: TimerKey) -> Option<Instant> {
        self.deadlines.get(&key).copied()
    }

    /// Earliest pending deadline across all keys.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Removes and returns the earliest key whose deadline has passed.
    ///
    /// Equal deadlines fire in key declaration order so firing is
    /// deterministic under a simulated clock.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKey> {
        let key = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .min_by_key(|(key, deadline)| (**deadline, **key))
            .map(|(key, _)| *key)?;
        self.deadlines.remove(&key);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn schedule_replaces_pending_deadline() {
        let t0 = Instant::now();
        let mut timers = TimerRegistry::new();

        timers.schedule(TimerKey::Keepalive, t0 + Duration::from_secs(30));
        timers.schedule(TimerKey::Keepalive, t0 + Duration::from_secs(60));

        assert_eq!(timers.deadline(TimerKey::Keepalive), Some(t0 + Duration::from_secs(60)));
        assert_eq!(timers.pop_due(t0 + Duration::from_secs(30)), None);
        assert_eq!(timers.pop_due(t0 + Duration::from_secs(60)), Some(TimerKey::Keepalive));
        assert_eq!(timers.pop_due(t0 + Duration::from_secs(60)), None);
    }

    #[test]
    fn pop_due_fires_in_deadline_order() {
        let t0 = Instant::now();
        let mut timers = TimerRegistry::new();

        timers.schedule(TimerKey::Liveness, t0 + Duration::from_secs(2));
        timers.schedule(TimerKey::Setup, t0 + Duration::from_secs(1));

        let late = t0 + Duration::from_secs(5);
        assert_eq!(timers.pop_due(late), Some(TimerKey::Setup));
        assert_eq!(timers.pop_due(late), Some(TimerKey::Liveness));
        assert_eq!(timers.pop_due(late), None);
    }

    #[test]
    fn cancel_is_idempotent() {
        let t0 = Instant::now();
        let mut timers = TimerRegistry::new();

        timers.schedule(TimerKey::Setup, t0);
        timers.cancel(TimerKey::Setup);
        timers.cancel(TimerKey::Setup);
        assert!(!timers.is_scheduled(TimerKey::Setup));
    }

    #[test]
    fn next_deadline_is_the_minimum() {
        let t0 = Instant::now();
        let mut timers = TimerRegistry::new();
        assert_eq!(timers.next_deadline(), None);

        timers.schedule(TimerKey::Keepalive, t0 + Duration::from_secs(30));
        timers.schedule(TimerKey::Liveness, t0 + Duration::from_secs(10));
        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_secs(10)));
    }
}
