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

//! The bounded pool of concurrently active 3D render slots.
//!
//! `acquire` and `release` are idempotent and tolerate any call order: a view
//! may unmount before its admission resolved, or release twice.

use crate::scheduler::{PriorityScheduler, SlotHolder, Verdict};
use aura_core::{InstanceId, PoolStatus, Priority};

/// Outcome of [`RenderSlotPool::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The id already held a slot. Nothing changed.
    AlreadyHeld,
    /// A free slot was assigned.
    Granted,
    /// The pool was full; `evicted` lost its slot to the requester.
    Preempted {
        /// The holder that was evicted.
        evicted: InstanceId,
    },
    /// The pool was full and the requester did not outrank anyone.
    Refused,
}

impl Admission {
    /// Returns `true` if the requester holds a slot after the call.
    pub fn is_granted(&self) -> bool {
        !matches!(self, Admission::Refused)
    }
}

/// Admission control over a fixed number of render slots.
#[derive(Debug)]
pub struct RenderSlotPool {
    max_slots: usize,
    holders: Vec<SlotHolder>,
    next_seq: u64,
}

impl RenderSlotPool {
    /// Creates an empty pool with a fixed capacity.
    pub fn new(max_slots: usize) -> Self {
        Self {
            max_slots,
            holders: Vec::with_capacity(max_slots),
            next_seq: 0,
        }
    }

    /// Requests a slot for `id`.
    ///
    /// Admits unconditionally while below capacity. When saturated, the
    /// [`PriorityScheduler`] decides whether a lower-priority holder is
    /// evicted to make room.
    pub fn acquire(&mut self, id: &InstanceId, priority: Priority) -> Admission {
        if self.contains(id) {
            return Admission::AlreadyHeld;
        }

        if self.holders.len() < self.max_slots {
            self.admit(id, priority);
            log::debug!(
                "SlotPool: Granted {} (priority={}, {}/{})",
                id,
                priority,
                self.holders.len(),
                self.max_slots
            );
            return Admission::Granted;
        }

        match PriorityScheduler.evaluate(&self.holders, priority) {
            Verdict::Preempt(evicted) => {
                self.holders.retain(|h| h.id != evicted);
                self.admit(id, priority);
                log::info!(
                    "SlotPool: {} (priority={}) preempted {}",
                    id,
                    priority,
                    evicted
                );
                Admission::Preempted { evicted }
            }
            Verdict::Refuse => {
                log::debug!(
                    "SlotPool: Refused {} (priority={}), pool full at {}",
                    id,
                    priority,
                    self.max_slots
                );
                Admission::Refused
            }
        }
    }

    /// Frees the slot held by `id`. Returns `false` if it held none.
    pub fn release(&mut self, id: &InstanceId) -> bool {
        let before = self.holders.len();
        self.holders.retain(|h| &h.id != id);
        let released = self.holders.len() < before;
        if released {
            log::debug!(
                "SlotPool: Released {} ({}/{})",
                id,
                self.holders.len(),
                self.max_slots
            );
        }
        released
    }

    /// Updates the priority a holder competes with. Returns `false` if `id`
    /// holds no slot.
    pub fn reprioritize(&mut self, id: &InstanceId, priority: Priority) -> bool {
        match self.holders.iter_mut().find(|h| &h.id == id) {
            Some(holder) => {
                holder.priority = priority;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `id` holds a slot.
    pub fn contains(&self, id: &InstanceId) -> bool {
        self.holders.iter().any(|h| &h.id == id)
    }

    /// Current occupancy.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            active: self.holders.len(),
            max: self.max_slots,
        }
    }

    /// Number of free slots.
    pub fn available(&self) -> usize {
        self.max_slots.saturating_sub(self.holders.len())
    }

    /// Returns `true` when every slot is held.
    pub fn is_full(&self) -> bool {
        self.available() == 0
    }

    /// Pool capacity.
    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Current holders in admission order.
    pub fn holders(&self) -> &[SlotHolder] {
        &self.holders
    }

    fn admit(&mut self, id: &InstanceId, priority: Priority) {
        self.holders.push(SlotHolder {
            id: id.clone(),
            priority,
            granted_seq: self.next_seq,
        });
        self.next_seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> InstanceId {
        InstanceId::from(name)
    }

    // ── Admission ────────────────────────────────────────────────────

    #[test]
    fn test_admits_below_capacity() {
        let mut pool = RenderSlotPool::new(2);
        assert_eq!(pool.acquire(&id("a"), Priority(0)), Admission::Granted);
        assert_eq!(pool.acquire(&id("b"), Priority(0)), Admission::Granted);
        assert_eq!(pool.status(), PoolStatus { active: 2, max: 2 });
        assert!(pool.is_full());
    }

    #[test]
    fn test_reacquire_is_idempotent() {
        let mut pool = RenderSlotPool::new(3);
        pool.acquire(&id("a"), Priority(1));
        let holders_before = pool.holders().to_vec();

        assert_eq!(pool.acquire(&id("a"), Priority(9)), Admission::AlreadyHeld);
        assert!(pool.acquire(&id("a"), Priority(9)).is_granted());
        assert_eq!(pool.holders(), holders_before.as_slice());
    }

    #[test]
    fn test_preemption_matches_priority_policy() {
        let mut pool = RenderSlotPool::new(3);
        pool.acquire(&id("p1"), Priority(1));
        pool.acquire(&id("p2"), Priority(2));
        pool.acquire(&id("p3"), Priority(3));

        assert_eq!(pool.acquire(&id("low"), Priority(1)), Admission::Refused);
        assert_eq!(
            pool.acquire(&id("p4"), Priority(4)),
            Admission::Preempted { evicted: id("p1") }
        );
        assert!(!pool.contains(&id("p1")));
        assert!(pool.contains(&id("p4")));
        assert_eq!(pool.status().active, 3);
    }

    #[test]
    fn test_zero_capacity_refuses_everything() {
        let mut pool = RenderSlotPool::new(0);
        assert_eq!(pool.acquire(&id("a"), Priority(i32::MAX)), Admission::Refused);
        assert_eq!(pool.status(), PoolStatus { active: 0, max: 0 });
    }

    #[test]
    fn test_reprioritize_changes_eviction_target() {
        let mut pool = RenderSlotPool::new(2);
        pool.acquire(&id("a"), Priority(1));
        pool.acquire(&id("b"), Priority(1));
        assert!(pool.reprioritize(&id("a"), Priority(10)));
        assert!(!pool.reprioritize(&id("ghost"), Priority(10)));
        assert_eq!(
            pool.acquire(&id("c"), Priority(5)),
            Admission::Preempted { evicted: id("b") }
        );
    }

    // ── Release ──────────────────────────────────────────────────────

    #[test]
    fn test_release_is_idempotent() {
        let mut pool = RenderSlotPool::new(3);
        pool.acquire(&id("a"), Priority(0));
        assert!(pool.release(&id("a")));
        assert!(!pool.release(&id("a")));
        assert_eq!(pool.status().active, 0);
    }

    #[test]
    fn test_release_before_acquire_is_noop() {
        let mut pool = RenderSlotPool::new(1);
        assert!(!pool.release(&id("ghost")));
        assert_eq!(pool.acquire(&id("ghost"), Priority(0)), Admission::Granted);
    }

    #[test]
    fn test_release_frees_exactly_one_slot() {
        let mut pool = RenderSlotPool::new(3);
        pool.acquire(&id("a"), Priority(0));
        pool.acquire(&id("b"), Priority(0));
        pool.release(&id("a"));
        assert_eq!(pool.available(), 2);
        assert!(pool.contains(&id("b")));
    }

    // ── Invariants ───────────────────────────────────────────────────

    #[test]
    fn test_capacity_invariant_under_random_sequences() {
        // Deterministic pseudo-random sequence of acquire/release calls.
        let mut pool = RenderSlotPool::new(3);
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..5_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let who = id(&format!("i{}", state % 8));
            if state % 3 == 0 {
                pool.release(&who);
            } else {
                pool.acquire(&who, Priority((state % 5) as i32));
            }
            assert!(pool.status().active <= 3);
            let mut ids: Vec<_> = pool.holders().iter().map(|h| h.id.clone()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), pool.status().active, "a holder appears twice");
        }
    }

    #[test]
    fn test_preemption_tie_break_is_oldest_holder() {
        let mut pool = RenderSlotPool::new(2);
        pool.acquire(&id("first"), Priority(1));
        pool.acquire(&id("second"), Priority(1));
        assert_eq!(
            pool.acquire(&id("vip"), Priority(5)),
            Admission::Preempted {
                evicted: id("first")
            }
        );
        // The next eviction targets the remaining priority-1 holder.
        assert_eq!(
            pool.acquire(&id("vip2"), Priority(5)),
            Admission::Preempted {
                evicted: id("second")
            }
        );
    }
}
