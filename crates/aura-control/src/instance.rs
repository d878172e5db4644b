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

//! The per-instance degradation state machine.
//!
//! An [`AvatarInstance`] owns the state of one mounted avatar: its render
//! state, degradation state, context health, quality controller and retry
//! budget. Transitions that only touch the instance live here; transitions
//! that also touch the pool, the probe cache or the timers are driven by the
//! coordinator.

use crate::config::QualityConfig;
use crate::quality::QualityController;
use aura_core::{
    ContextHealth, DegradationState, InstanceId, Priority, QualitySettings, QualityTier,
    RenderState, VisualOutput,
};
use serde::Serialize;

/// Serializable read-only view of one instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    /// Instance identity.
    pub id: InstanceId,
    /// Scheduling priority.
    pub priority: Priority,
    /// Slot lifecycle state.
    pub render_state: RenderState,
    /// Degradation state.
    pub degradation: DegradationState,
    /// GPU context health.
    pub health: ContextHealth,
    /// Active quality tier, if rendering in 3D.
    pub tier: Option<QualityTier>,
    /// Restore attempts consumed since the last explicit retry.
    pub retries_used: u32,
    /// Automatic recovery has stopped; only an explicit retry resumes it.
    pub retry_required: bool,
    /// The most recent loss or fault.
    pub last_error: Option<String>,
    /// Why the capability probe rejected 3D, if it did.
    pub capability_reason: Option<String>,
}

/// One mounted avatar.
#[derive(Debug)]
pub struct AvatarInstance {
    pub(crate) id: InstanceId,
    pub(crate) priority: Priority,
    pub(crate) render_state: RenderState,
    pub(crate) degradation: DegradationState,
    pub(crate) health: ContextHealth,
    pub(crate) quality: Option<QualityController>,
    /// Tier to resume at after a suspension or a recovery.
    pub(crate) resume_tier: QualityTier,
    pub(crate) retries_used: u32,
    pub(crate) sticky: bool,
    /// `Some(true)` once a probe passed, `Some(false)` once one failed.
    pub(crate) capable: Option<bool>,
    pub(crate) capability_reason: Option<String>,
    pub(crate) last_error: Option<String>,
    /// Generation of the timer this instance is waiting for.
    pub(crate) pending_timer: Option<u64>,
    /// Request order, used to break re-admission ties.
    pub(crate) requested_seq: u64,
}

impl AvatarInstance {
    pub(crate) fn new(
        id: InstanceId,
        priority: Priority,
        initial_tier: QualityTier,
        requested_seq: u64,
    ) -> Self {
        Self {
            id,
            priority,
            render_state: RenderState::Requested,
            degradation: DegradationState::Probing,
            health: ContextHealth::Healthy,
            quality: None,
            resume_tier: initial_tier,
            retries_used: 0,
            sticky: false,
            capable: None,
            capability_reason: None,
            last_error: None,
            pending_timer: None,
            requested_seq,
        }
    }

    /// Enters 3D rendering with a fresh controller at the resume tier.
    pub(crate) fn enter_3d(&mut self, quality: &QualityConfig) {
        let recovered = self.health != ContextHealth::Healthy;
        self.degradation = DegradationState::Render3D;
        self.render_state = RenderState::Active;
        self.health = ContextHealth::Healthy;
        self.quality = Some(QualityController::starting_at(
            quality.clone(),
            self.resume_tier,
        ));
        if recovered {
            log::info!(
                "Avatar: {} recovered, rendering 3D at {:?}",
                self.id,
                self.resume_tier
            );
        } else {
            log::info!("Avatar: {} rendering 3D at {:?}", self.id, self.resume_tier);
        }
    }

    /// Drops to the 2D fallback, remembering the tier to resume at.
    pub(crate) fn enter_2d(&mut self) {
        if let Some(quality) = self.quality.take() {
            self.resume_tier = quality.tier();
        }
        self.degradation = DegradationState::Render2D;
        self.render_state = RenderState::Suspended;
    }

    /// Records a lost context or a render fault.
    ///
    /// Falls back to 2D, or to `Error` when the retry budget is already spent.
    pub(crate) fn mark_lost(&mut self, reason: String, max_retries: u32) {
        self.enter_2d();
        self.health = ContextHealth::Lost;
        self.last_error = Some(reason);
        if self.retries_used >= max_retries {
            self.degradation = DegradationState::Error;
            self.sticky = true;
        }
    }

    pub(crate) fn retries_remaining(&self, max_retries: u32) -> bool {
        self.retries_used < max_retries
    }

    /// Waiting in 2D with a known-good capability and nothing in flight.
    pub(crate) fn is_waiting_for_slot(&self) -> bool {
        self.degradation == DegradationState::Render2D
            && self.health == ContextHealth::Healthy
            && self.capable == Some(true)
            && !self.sticky
            && self.pending_timer.is_none()
    }

    /// Returns `true` while rendering in 3D.
    pub fn is_rendering_3d(&self) -> bool {
        self.degradation == DegradationState::Render3D
    }

    /// Settings for the current tier while rendering in 3D.
    pub fn quality_settings(&self) -> Option<QualitySettings> {
        self.quality.as_ref().map(QualityController::settings)
    }

    /// What the view must show right now. Never "nothing".
    pub fn visual_output(&self) -> VisualOutput {
        match self.degradation {
            DegradationState::Probing => VisualOutput::Placeholder,
            DegradationState::Render3D => VisualOutput::Scene3D {
                settings: self.quality_settings().unwrap_or_default(),
            },
            DegradationState::Render2D | DegradationState::Error => VisualOutput::Avatar2D {
                retry_available: self.sticky,
            },
        }
    }

    /// A serializable view of this instance.
    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            id: self.id.clone(),
            priority: self.priority,
            render_state: self.render_state,
            degradation: self.degradation,
            health: self.health,
            tier: self.quality.as_ref().map(QualityController::tier),
            retries_used: self.retries_used,
            retry_required: self.sticky,
            last_error: self.last_error.clone(),
            capability_reason: self.capability_reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> AvatarInstance {
        AvatarInstance::new(InstanceId::from("aria#main"), Priority(1), QualityTier::High, 0)
    }

    #[test]
    fn test_new_instance_is_probing_placeholder() {
        let inst = instance();
        assert_eq!(inst.degradation, DegradationState::Probing);
        assert_eq!(inst.render_state, RenderState::Requested);
        assert_eq!(inst.visual_output(), VisualOutput::Placeholder);
    }

    #[test]
    fn test_enter_2d_remembers_tier() {
        let mut inst = instance();
        inst.resume_tier = QualityTier::Low;
        inst.enter_3d(&QualityConfig::default());
        assert_eq!(inst.snapshot().tier, Some(QualityTier::Low));

        inst.enter_2d();
        assert_eq!(inst.render_state, RenderState::Suspended);
        assert_eq!(inst.resume_tier, QualityTier::Low);
        assert_eq!(inst.snapshot().tier, None);
        assert_eq!(
            inst.visual_output(),
            VisualOutput::Avatar2D {
                retry_available: false
            }
        );
    }

    #[test]
    fn test_mark_lost_with_budget_left_is_2d() {
        let mut inst = instance();
        inst.enter_3d(&QualityConfig::default());
        inst.mark_lost("context lost".into(), 3);
        assert_eq!(inst.degradation, DegradationState::Render2D);
        assert_eq!(inst.health, ContextHealth::Lost);
        assert!(!inst.sticky);
    }

    #[test]
    fn test_mark_lost_with_spent_budget_is_error() {
        let mut inst = instance();
        inst.enter_3d(&QualityConfig::default());
        inst.retries_used = 3;
        inst.mark_lost("context lost".into(), 3);
        assert_eq!(inst.degradation, DegradationState::Error);
        assert_eq!(
            inst.visual_output(),
            VisualOutput::Avatar2D {
                retry_available: true
            }
        );
        assert!(inst.snapshot().retry_required);
    }

    #[test]
    fn test_waiting_requires_known_good_capability() {
        let mut inst = instance();
        inst.enter_2d();
        assert!(!inst.is_waiting_for_slot());
        inst.capable = Some(true);
        assert!(inst.is_waiting_for_slot());
        inst.pending_timer = Some(4);
        assert!(!inst.is_waiting_for_slot());
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(instance().snapshot()).unwrap();
        assert_eq!(json["id"], "aria#main");
        assert_eq!(json["degradation"], "Probing");
    }
}
