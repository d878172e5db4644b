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

//! Priority preemption policy for a saturated slot pool.
//!
//! The policy accepts starvation: a low-priority instance may wait forever
//! while higher-priority holders persist. Its fallback is a fully working 2D
//! avatar, not a failure.

use aura_core::{InstanceId, Priority};

/// One occupant of the pool, as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotHolder {
    /// The occupying instance.
    pub id: InstanceId,
    /// Priority it was admitted with.
    pub priority: Priority,
    /// Admission sequence number. Lower means admitted earlier.
    pub granted_seq: u64,
}

/// The scheduler's verdict on a request against a full pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Evict this holder and admit the requester.
    Preempt(InstanceId),
    /// Keep every holder; refuse the requester.
    Refuse,
}

/// Decides which holder loses its slot when the pool is saturated.
pub struct PriorityScheduler;

impl PriorityScheduler {
    /// Evaluates a request with `priority` against the current `holders`.
    ///
    /// 1. Find the minimum priority among the holders.
    /// 2. If the request is strictly greater, evict one minimum-priority
    ///    holder: the one admitted earliest.
    /// 3. Otherwise refuse. Equal priorities never preempt each other.
    pub fn evaluate(&self, holders: &[SlotHolder], priority: Priority) -> Verdict {
        let victim = holders
            .iter()
            .min_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.granted_seq.cmp(&b.granted_seq))
            });

        match victim {
            Some(victim) if priority > victim.priority => {
                log::trace!(
                    "Scheduler: priority {} outranks minimum {} held by {}",
                    priority,
                    victim.priority,
                    victim.id
                );
                Verdict::Preempt(victim.id.clone())
            }
            _ => Verdict::Refuse,
        }
    }
}
