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

//! The render coordinator: one slot pool, one probe cache and the
//! degradation state machine of every mounted avatar.
//!
//! The coordinator is single-owner (`&mut self`). Settle delays are timers
//! fired by [`RenderCoordinator::advance`]; nothing happens behind the
//! caller's back. [`AvatarService`](crate::service::AvatarService) wraps it
//! for multi-threaded hosts.

use crate::capability::{CapabilityProbe, ProbeCache};
use crate::config::AuraConfig;
use crate::instance::{AvatarInstance, InstanceSnapshot};
use crate::pool::{Admission, RenderSlotPool};
use crate::quality::TierChange;
use crate::timers::{TimerKind, TimerQueue};
use aura_core::{
    Clock, ContextHealth, ContextTrial, DegradationState, HardwareInfo, InstanceId, PoolStatus,
    Priority, ProbeReport, QualitySettings, RenderError, RenderState, SystemClock, VisualOutput,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Owns every piece of render-resource state.
pub struct RenderCoordinator {
    config: AuraConfig,
    pool: RenderSlotPool,
    probes: ProbeCache,
    instances: HashMap<InstanceId, AvatarInstance>,
    timers: TimerQueue,
    clock: Box<dyn Clock>,
    next_request_seq: u64,
    /// Set by a context loss, cleared once a probe passes again.
    capability_suspect: bool,
    /// When a suspect capability blocks waiting instances from free slots.
    recheck_at: Option<Instant>,
}

impl RenderCoordinator {
    /// Creates a coordinator driven by the system clock.
    pub fn new(
        config: AuraConfig,
        hardware: Box<dyn HardwareInfo>,
        trial: Box<dyn ContextTrial>,
    ) -> Self {
        Self::with_clock(config, hardware, trial, Box::new(SystemClock))
    }

    /// Creates a coordinator driven by `clock`.
    pub fn with_clock(
        config: AuraConfig,
        hardware: Box<dyn HardwareInfo>,
        trial: Box<dyn ContextTrial>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let probe = CapabilityProbe::new(hardware, trial, config.probe.clone());
        let probes = ProbeCache::new(probe, config.probe.cache_ttl());
        log::info!(
            "Coordinator: Created with {} render slots, {} restore attempts",
            config.pool.max_slots,
            config.recovery.max_retries
        );
        Self {
            pool: RenderSlotPool::new(config.pool.max_slots),
            probes,
            instances: HashMap::new(),
            timers: TimerQueue::new(),
            clock,
            next_request_seq: 0,
            capability_suspect: false,
            recheck_at: None,
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &AuraConfig {
        &self.config
    }

    // ── UI-facing API ────────────────────────────────────────────────

    /// Mounts `id` and asks for 3D rendering.
    ///
    /// Resolves synchronously when a fresh capability result is cached;
    /// otherwise the instance shows a placeholder until the probe timer fires.
    /// Returns whether the instance may render 3D right now. Requesting an
    /// already mounted id changes nothing.
    pub fn request_render(&mut self, id: &InstanceId, priority: Priority) -> bool {
        if self.instances.contains_key(id) {
            log::debug!("Coordinator: {} already mounted", id);
            return self.is_allowed_to_render(id);
        }

        let seq = self.next_request_seq;
        self.next_request_seq += 1;
        self.instances.insert(
            id.clone(),
            AvatarInstance::new(id.clone(), priority, self.config.quality.initial_tier, seq),
        );
        log::debug!("Coordinator: Mounted {} (priority={})", id, priority);

        let now = self.clock.now();
        match self.probes.peek(now).cloned() {
            Some(report) => self.resolve_probe(id, report),
            None => {
                let deadline = now + self.config.probe.probe_settle();
                self.schedule(id, TimerKind::Probe { fresh: false }, deadline);
            }
        }
        self.is_allowed_to_render(id)
    }

    /// Unmounts `id`: destroys its state, frees its slot and cancels its
    /// timers. Unknown ids are ignored.
    pub fn release_render(&mut self, id: &InstanceId) {
        let removed = self.instances.remove(id).is_some();
        self.timers.cancel(id);
        let freed = self.pool.release(id);
        if removed {
            log::debug!("Coordinator: Unmounted {}", id);
        }
        if freed {
            self.readmit();
        }
    }

    /// Returns `true` only while `id` renders 3D and holds a slot.
    pub fn is_allowed_to_render(&self, id: &InstanceId) -> bool {
        self.instances
            .get(id)
            .is_some_and(AvatarInstance::is_rendering_3d)
            && self.pool.contains(id)
    }

    /// Degradation state of `id`, or `None` if it is not mounted.
    pub fn current_degradation_state(&self, id: &InstanceId) -> Option<DegradationState> {
        self.instances.get(id).map(|i| i.degradation)
    }

    /// Pool occupancy.
    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// What the view of `id` must show.
    pub fn visual_output(&self, id: &InstanceId) -> Option<VisualOutput> {
        self.instances.get(id).map(AvatarInstance::visual_output)
    }

    /// Quality settings of `id` while it renders 3D.
    pub fn quality_settings(&self, id: &InstanceId) -> Option<QualitySettings> {
        self.instances.get(id)?.quality_settings()
    }

    /// Serializable view of `id`.
    pub fn snapshot(&self, id: &InstanceId) -> Option<InstanceSnapshot> {
        self.instances.get(id).map(AvatarInstance::snapshot)
    }

    /// Views of every mounted instance, ordered by id.
    pub fn snapshots(&self) -> Vec<InstanceSnapshot> {
        let mut all: Vec<_> = self.instances.values().map(AvatarInstance::snapshot).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Number of mounted instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of pending settle timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// The earliest pending timer deadline, capability rechecks included.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.timers.next_deadline(), self.recheck_at) {
            (Some(timer), Some(recheck)) => Some(timer.min(recheck)),
            (timer, recheck) => timer.or(recheck),
        }
    }

    /// Changes the priority of `id`.
    ///
    /// A holder keeps its slot and competes with the new priority from now
    /// on. A waiting instance is resubmitted and may preempt.
    pub fn update_priority(&mut self, id: &InstanceId, priority: Priority) -> bool {
        let Some(inst) = self.instances.get_mut(id) else {
            return false;
        };
        if inst.priority != priority {
            log::debug!(
                "Coordinator: {} priority {} -> {}",
                id,
                inst.priority,
                priority
            );
            inst.priority = priority;
            let waiting = inst.is_waiting_for_slot();
            if !self.pool.reprioritize(id, priority) && waiting && !self.capability_suspect {
                self.admit(id);
            }
        }
        self.is_allowed_to_render(id)
    }

    /// Runs the capability probe now so later mounts resolve synchronously.
    pub fn prime_capability(&mut self) -> ProbeReport {
        let report = self.probes.get(self.clock.now());
        if report.supported {
            self.capability_confirmed();
        }
        report
    }

    // ── Platform signals ─────────────────────────────────────────────

    /// Records one rendered frame of `id`. Returns the tier change it
    /// triggered, if any.
    pub fn on_frame(&mut self, id: &InstanceId, frame_time: Duration) -> Option<TierChange> {
        let inst = self.instances.get_mut(id)?;
        if !inst.is_rendering_3d() {
            return None;
        }
        let change = inst
            .quality
            .as_mut()?
            .record_frame(frame_time.as_secs_f32() * 1000.0)?;
        let direction = if change.is_downgrade() {
            "downgraded"
        } else {
            "upgraded"
        };
        log::info!(
            "Quality: {} {} {:?} -> {:?}",
            id,
            direction,
            change.from,
            change.to
        );
        Some(change)
    }

    /// The GPU context of `id` was lost.
    ///
    /// Falls back to 2D before returning and frees the slot. The instance
    /// then waits for [`on_context_restored`](Self::on_context_restored).
    pub fn on_context_lost(&mut self, id: &InstanceId) {
        let max_retries = self.config.recovery.max_retries;
        let Some(inst) = self.instances.get_mut(id) else {
            return;
        };
        if !inst.is_rendering_3d() {
            log::debug!("Coordinator: Context loss for {} ignored, not rendering 3D", id);
            return;
        }
        inst.mark_lost(RenderError::ContextLost.to_string(), max_retries);
        log::warn!("Coordinator: {} lost its GPU context, now {}", id, inst.degradation);

        self.pool.release(id);
        self.probes.invalidate();
        self.capability_suspect = true;
        self.readmit();
    }

    /// The platform restored the GPU context of `id`.
    ///
    /// Starts a recovery attempt after the restore settle delay if the
    /// instance is waiting for one and has budget left.
    pub fn on_context_restored(&mut self, id: &InstanceId) {
        let Some(inst) = self.instances.get(id) else {
            return;
        };
        if inst.health != ContextHealth::Lost {
            log::debug!(
                "Coordinator: Restore signal for {} ignored (health={:?})",
                id,
                inst.health
            );
            return;
        }
        if inst.sticky {
            log::info!("Coordinator: {} needs an explicit retry", id);
            return;
        }
        self.begin_recovery(id, self.config.recovery.restore_settle());
    }

    /// The 3D path of `id` failed while drawing.
    ///
    /// Handled like a context loss, except that no platform signal will
    /// announce a restore, so a recovery attempt is scheduled here.
    pub fn on_render_fault(&mut self, id: &InstanceId, error: &RenderError) {
        if matches!(error, RenderError::ContextLost) {
            self.on_context_lost(id);
            return;
        }
        let max_retries = self.config.recovery.max_retries;
        let Some(inst) = self.instances.get_mut(id) else {
            return;
        };
        if !inst.is_rendering_3d() {
            return;
        }
        inst.mark_lost(error.to_string(), max_retries);
        let sticky = inst.sticky;
        log::warn!(
            "Coordinator: {} render fault ({}), now {}",
            id,
            error,
            inst.degradation
        );

        self.pool.release(id);
        if !sticky {
            self.begin_recovery(id, self.config.recovery.fault_restore_delay());
        }
        self.readmit();
    }

    /// Explicit user retry: resets the retry budget and probes again.
    ///
    /// Only instances showing the 2D fallback can be retried.
    pub fn retry(&mut self, id: &InstanceId) -> bool {
        let now = self.clock.now();
        let Some(inst) = self.instances.get_mut(id) else {
            return false;
        };
        if !inst.degradation.is_fallback() {
            return false;
        }
        inst.retries_used = 0;
        inst.sticky = false;
        inst.health = ContextHealth::Healthy;
        inst.degradation = DegradationState::Probing;
        inst.render_state = RenderState::Requested;
        inst.capable = None;
        inst.capability_reason = None;
        inst.last_error = None;
        log::info!("Coordinator: Manual retry for {}", id);

        self.pool.release(id);
        let deadline = now + self.config.probe.probe_settle();
        self.schedule(id, TimerKind::Probe { fresh: true }, deadline);
        true
    }

    /// Fires every due timer. Returns how many were applied.
    pub fn advance(&mut self) -> usize {
        let now = self.clock.now();
        let mut applied = 0;
        for timer in self.timers.drain_due(now) {
            let Some(inst) = self
                .instances
                .get_mut(&timer.id)
                .filter(|i| i.pending_timer == Some(timer.generation))
            else {
                log::trace!("Timers: Dropped stale timer for {}", timer.id);
                continue;
            };
            inst.pending_timer = None;
            applied += 1;

            match timer.kind {
                TimerKind::Probe { fresh } => {
                    let report = if fresh {
                        self.probes.refresh(now)
                    } else {
                        self.probes.get(now)
                    };
                    self.resolve_probe(&timer.id, report);
                }
                TimerKind::Restore => self.attempt_restore(&timer.id, now),
            }
        }
        let recheck_due = self.recheck_at.is_some_and(|at| at <= now);
        if recheck_due {
            self.recheck_capability(now);
        }
        if applied > 0 || recheck_due || self.capability_suspect {
            self.readmit();
        }
        applied
    }

    /// Frees every slot and cancels every timer.
    pub fn shutdown(&mut self) {
        let holders: Vec<InstanceId> = self.pool.holders().iter().map(|h| h.id.clone()).collect();
        for id in &holders {
            self.pool.release(id);
        }
        self.timers.clear();
        self.recheck_at = None;
        self.instances.clear();
        log::info!("Coordinator: Shut down, released {} slots", holders.len());
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn schedule(&mut self, id: &InstanceId, kind: TimerKind, deadline: Instant) {
        let generation = self.timers.schedule(id, kind, deadline);
        if let Some(inst) = self.instances.get_mut(id) {
            inst.pending_timer = Some(generation);
        }
    }

    fn resolve_probe(&mut self, id: &InstanceId, report: ProbeReport) {
        let Some(inst) = self.instances.get_mut(id) else {
            return;
        };
        inst.capable = Some(report.supported);
        inst.capability_reason = report.reason;
        if !report.supported {
            inst.enter_2d();
            log::info!(
                "Coordinator: {} falls back to 2D ({})",
                id,
                inst.capability_reason.as_deref().unwrap_or("unsupported")
            );
            return;
        }
        self.capability_confirmed();
        self.admit(id);
    }

    /// Asks the pool for a slot and moves `id` to 3D or 2D accordingly.
    fn admit(&mut self, id: &InstanceId) -> bool {
        let Some(priority) = self.instances.get(id).map(|i| i.priority) else {
            return false;
        };
        let admission = self.pool.acquire(id, priority);
        let granted = admission.is_granted();
        if let Some(inst) = self.instances.get_mut(id) {
            if granted {
                inst.enter_3d(&self.config.quality);
            } else {
                inst.enter_2d();
                inst.health = ContextHealth::Healthy;
                log::info!("Coordinator: {} waits in 2D, pool full", id);
            }
        }
        if let Admission::Preempted { evicted } = admission {
            if let Some(victim) = self.instances.get_mut(&evicted) {
                victim.enter_2d();
                log::info!("Coordinator: {} suspended to 2D by {}", evicted, id);
            }
        }
        granted
    }

    /// Offers free slots to waiting instances, highest priority first and
    /// earliest request on ties.
    fn readmit(&mut self) {
        if !self.config.pool.readmit_on_release {
            return;
        }
        if self.capability_suspect {
            self.arm_recheck();
            return;
        }
        while !self.pool.is_full() {
            let next = self
                .instances
                .values()
                .filter(|i| i.is_waiting_for_slot())
                .max_by(|a, b| {
                    a.priority
                        .cmp(&b.priority)
                        .then(b.requested_seq.cmp(&a.requested_seq))
                })
                .map(|i| i.id.clone());
            let Some(id) = next else {
                break;
            };
            log::debug!("Coordinator: Re-admitting {}", id);
            if !self.admit(&id) {
                break;
            }
        }
    }

    /// Consumes one restore attempt and schedules it after `delay`, or
    /// marks the instance sticky when the budget is spent.
    fn begin_recovery(&mut self, id: &InstanceId, delay: Duration) {
        let max_retries = self.config.recovery.max_retries;
        let now = self.clock.now();
        let Some(inst) = self.instances.get_mut(id) else {
            return;
        };
        if !inst.retries_remaining(max_retries) {
            inst.health = ContextHealth::Lost;
            inst.sticky = true;
            log::warn!(
                "Coordinator: {} exhausted {} restore attempts, retry required",
                id,
                max_retries
            );
            return;
        }
        inst.retries_used += 1;
        inst.health = ContextHealth::Restoring;
        log::info!(
            "Coordinator: {} restore attempt {}/{} in {:?}",
            id,
            inst.retries_used,
            max_retries,
            delay
        );
        self.schedule(id, TimerKind::Restore, now + delay);
    }

    fn attempt_restore(&mut self, id: &InstanceId, now: Instant) {
        let report = self.probes.refresh(now);
        let Some(inst) = self.instances.get_mut(id) else {
            return;
        };
        inst.capable = Some(report.supported);
        inst.capability_reason = report.reason;

        if report.supported {
            // The budget counts consecutive failures. A refused slot is not a
            // failure either: the instance waits for re-admission.
            inst.retries_used = 0;
            self.capability_confirmed();
            self.admit(id);
            return;
        }

        log::warn!(
            "Coordinator: Restore attempt for {} failed ({})",
            id,
            inst.capability_reason.as_deref().unwrap_or("unsupported")
        );
        inst.health = ContextHealth::Lost;
        self.begin_recovery(id, self.config.recovery.restore_settle());
    }

    fn capability_confirmed(&mut self) {
        self.capability_suspect = false;
        self.recheck_at = None;
    }

    /// Schedules a capability recheck once a free slot and a waiting
    /// instance exist while the capability is suspect. The lost instance
    /// may never be restored, so waiters cannot rely on its recovery probe.
    fn arm_recheck(&mut self) {
        if self.recheck_at.is_some()
            || self.pool.is_full()
            || !self
                .instances
                .values()
                .any(AvatarInstance::is_waiting_for_slot)
        {
            return;
        }
        let delay = self.config.recovery.restore_settle();
        log::debug!("Coordinator: Capability recheck in {:?}", delay);
        self.recheck_at = Some(self.clock.now() + delay);
    }

    fn recheck_capability(&mut self, now: Instant) {
        self.recheck_at = None;
        let report = self.probes.refresh(now);
        if report.supported {
            log::info!("Coordinator: Capability confirmed, re-admitting waiters");
            self.capability_confirmed();
        } else {
            // Still broken: back off to the probe cache lifetime.
            log::warn!(
                "Coordinator: Capability recheck failed ({})",
                report.reason.as_deref().unwrap_or("unsupported")
            );
            self.recheck_at = Some(now + self.config.probe.cache_ttl());
        }
    }
}
