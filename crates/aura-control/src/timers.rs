// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-instance settle timers.
//!
//! Each instance owns at most one pending timer. Timers carry a generation
//! number; the owner remembers the generation it is waiting for, so a timer
//! that outlived a cancel or a reschedule is recognised as stale and dropped.

use aura_core::InstanceId;
use std::time::Instant;

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Run the capability probe for a freshly mounted instance.
    /// `fresh` bypasses the probe cache.
    Probe {
        /// Ignore any cached probe result.
        fresh: bool,
    },
    /// Run a recovery attempt for an instance that lost its context.
    Restore,
}

/// A timer that reached its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer {
    /// Owning instance.
    pub id: InstanceId,
    /// Action to run.
    pub kind: TimerKind,
    /// Generation the timer was scheduled with.
    pub generation: u64,
}

#[derive(Debug)]
struct PendingTimer {
    id: InstanceId,
    kind: TimerKind,
    deadline: Instant,
    generation: u64,
}

/// Deadline-ordered set of pending timers.
#[derive(Debug, Default)]
pub struct TimerQueue {
    pending: Vec<PendingTimer>,
    next_generation: u64,
}

impl TimerQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a timer for `id`, replacing any timer it already had.
    /// Returns the generation to wait for.
    pub fn schedule(&mut self, id: &InstanceId, kind: TimerKind, deadline: Instant) -> u64 {
        self.cancel(id);
        let generation = self.next_generation;
        self.next_generation += 1;
        self.pending.push(PendingTimer {
            id: id.clone(),
            kind,
            deadline,
            generation,
        });
        log::trace!("Timers: Scheduled {:?} for {} (gen={})", kind, id, generation);
        generation
    }

    /// Removes the pending timer of `id`. Returns `false` if it had none.
    pub fn cancel(&mut self, id: &InstanceId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| &t.id != id);
        self.pending.len() < before
    }

    /// Removes and returns every timer due at `now`, earliest first.
    pub fn drain_due(&mut self, now: Instant) -> Vec<FiredTimer> {
        let mut due: Vec<PendingTimer> = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].deadline <= now {
                due.push(self.pending.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| {
            a.deadline
                .cmp(&b.deadline)
                .then(a.generation.cmp(&b.generation))
        });
        due.into_iter()
            .map(|t| FiredTimer {
                id: t.id,
                kind: t.kind,
                generation: t.generation,
            })
            .collect()
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|t| t.deadline).min()
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every pending timer.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const PROBE: TimerKind = TimerKind::Probe { fresh: false };

    #[test]
    fn test_fires_in_deadline_order() {
        let mut timers = TimerQueue::new();
        let t0 = Instant::now();
        timers.schedule(&"late".into(), PROBE, t0 + Duration::from_millis(20));
        timers.schedule(&"early".into(), TimerKind::Restore, t0 + Duration::from_millis(10));

        assert!(timers.drain_due(t0).is_empty());
        let fired = timers.drain_due(t0 + Duration::from_millis(30));
        let ids: Vec<&str> = fired.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_reschedule_replaces_previous_timer() {
        let mut timers = TimerQueue::new();
        let t0 = Instant::now();
        let first = timers.schedule(&"a".into(), PROBE, t0);
        let second = timers.schedule(&"a".into(), TimerKind::Restore, t0);
        assert_ne!(first, second);
        assert_eq!(timers.len(), 1);

        let fired = timers.drain_due(t0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].generation, second);
        assert_eq!(fired[0].kind, TimerKind::Restore);
    }

    #[test]
    fn test_cancel_removes_timer() {
        let mut timers = TimerQueue::new();
        let t0 = Instant::now();
        timers.schedule(&"a".into(), PROBE, t0);
        assert!(timers.cancel(&"a".into()));
        assert!(!timers.cancel(&"a".into()));
        assert!(timers.drain_due(t0 + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_next_deadline() {
        let mut timers = TimerQueue::new();
        let t0 = Instant::now();
        assert_eq!(timers.next_deadline(), None);
        timers.schedule(&"a".into(), PROBE, t0 + Duration::from_secs(2));
        timers.schedule(&"b".into(), PROBE, t0 + Duration::from_secs(1));
        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_secs(1)));
    }
}
