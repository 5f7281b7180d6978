//! Per-workload cooldown windows.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use latscale_core::WorkloadRef;

/// Remembers when each workload was last scaled.
///
/// Checking and committing are separate: `eligible` never mutates, and
/// `commit` is called only after an action was actually applied.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_actions: HashMap<String, Instant>,
}

impl CooldownTracker {
    /// Empty tracker: every workload starts eligible.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `workload` may act at `now`: never acted, or at least
    /// `cooldown` has elapsed since the last committed action.
    pub fn eligible(&self, workload: &WorkloadRef, now: Instant, cooldown: Duration) -> bool {
        self.remaining(workload, now, cooldown).is_none()
    }

    /// Time left in the window, or `None` if the workload may act.
    pub fn remaining(
        &self,
        workload: &WorkloadRef,
        now: Instant,
        cooldown: Duration,
    ) -> Option<Duration> {
        let last = self.last_actions.get(&workload.key())?;
        let elapsed = now.saturating_duration_since(*last);
        if elapsed >= cooldown {
            None
        } else {
            Some(cooldown - elapsed)
        }
    }

    /// Record that an action on `workload` was applied at `now`.
    pub fn commit(&mut self, workload: &WorkloadRef, now: Instant) {
        self.last_actions.insert(workload.key(), now);
    }

    /// Instant of the last committed action on `workload`, if any.
    pub fn last_action(&self, workload: &WorkloadRef) -> Option<Instant> {
        self.last_actions.get(&workload.key()).copied()
    }

    /// Number of workloads with a committed action.
    pub fn len(&self) -> usize {
        self.last_actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_actions.is_empty()
    }
}
