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

//! Identity and lifecycle types for avatar instances.

use crate::quality::QualitySettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable key of one avatar instance.
///
/// An instance is a persona (the therapist being shown) rendered inside one
/// view scope. The same persona shown in a focused chat panel and in a list
/// thumbnail yields two distinct instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(Arc<str>);

impl InstanceId {
    /// Creates an id from a persona identifier and a view-scope disambiguator.
    pub fn new(persona: &str, scope: &str) -> Self {
        Self(Arc::from(format!("{persona}#{scope}")))
    }

    /// Creates an id for a view that has no natural scope of its own.
    ///
    /// The scope is a random v4 UUID, so two mounts of the same persona never
    /// collide.
    pub fn unique(persona: &str) -> Self {
        Self::new(persona, &uuid::Uuid::new_v4().to_string())
    }

    /// Returns the persona part of the id.
    pub fn persona(&self) -> &str {
        self.0.split_once('#').map_or(&*self.0, |(persona, _)| persona)
    }

    /// Returns the full id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied render priority. Higher values are more important.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Priority(pub i32);

impl Priority {
    /// Avatars in lists, grids and other background surfaces.
    pub const BACKGROUND: Priority = Priority(0);
    /// Avatars visible on screen but not being interacted with.
    pub const VISIBLE: Priority = Priority(50);
    /// The avatar of the active conversation.
    pub const FOCUSED: Priority = Priority(100);
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot ownership of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderState {
    /// Mounted; admission not decided yet.
    #[default]
    Requested,
    /// Holding a render slot.
    Active,
    /// Waiting without a slot (refused, preempted or recovering).
    Suspended,
}

/// Health of the GPU context backing an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContextHealth {
    /// The context is usable (or no context has been lost).
    #[default]
    Healthy,
    /// The context was lost or the 3D path faulted.
    Lost,
    /// A recovery attempt is in flight.
    Restoring,
}

/// The externally observable rendering outcome of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DegradationState {
    /// Capability and admission are being decided.
    #[default]
    Probing,
    /// Rendering the full 3D scene.
    Render3D,
    /// Rendering the 2D fallback avatar.
    Render2D,
    /// Recovery budget exhausted while faulting. Shows the 2D avatar with a
    /// retry affordance.
    Error,
}

impl DegradationState {
    /// Returns `true` for the states that draw the 2D fallback.
    pub fn is_fallback(self) -> bool {
        matches!(self, DegradationState::Render2D | DegradationState::Error)
    }
}

impl fmt::Display for DegradationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DegradationState::Probing => "probing",
            DegradationState::Render3D => "3d",
            DegradationState::Render2D => "2d",
            DegradationState::Error => "error",
        };
        f.write_str(name)
    }
}

/// What a view must draw for an instance. Every state has one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VisualOutput {
    /// A loading placeholder while probing.
    Placeholder,
    /// The 3D scene at the given quality.
    Scene3D {
        /// Settings derived from the instance's current quality tier.
        settings: QualitySettings,
    },
    /// The 2D avatar (image or initials badge).
    Avatar2D {
        /// `true` when automatic recovery has stopped and the view should
        /// offer an explicit retry control.
        retry_available: bool,
    },
}

/// Occupancy of the render slot pool, for diagnostics and capacity messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Number of slots currently held.
    pub active: usize,
    /// Pool capacity.
    pub max: usize,
}

impl PoolStatus {
    /// Returns `true` when no slot is free.
    pub fn is_saturated(&self) -> bool {
        self.active >= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_persona_split() {
        let id = InstanceId::new("dr-maya", "chat-panel");
        assert_eq!(id.persona(), "dr-maya");
        assert_eq!(id.as_str(), "dr-maya#chat-panel");
    }

    #[test]
    fn test_instance_id_without_scope() {
        let id = InstanceId::from("dr-maya");
        assert_eq!(id.persona(), "dr-maya");
    }

    #[test]
    fn test_unique_ids_do_not_collide() {
        let a = InstanceId::unique("dr-maya");
        let b = InstanceId::unique("dr-maya");
        assert_ne!(a, b);
        assert_eq!(a.persona(), b.persona());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::FOCUSED > Priority::VISIBLE);
        assert!(Priority::VISIBLE > Priority::BACKGROUND);
        assert_eq!(Priority::from(7), Priority(7));
    }

    #[test]
    fn test_fallback_states() {
        assert!(DegradationState::Render2D.is_fallback());
        assert!(DegradationState::Error.is_fallback());
        assert!(!DegradationState::Render3D.is_fallback());
        assert!(!DegradationState::Probing.is_fallback());
    }

    #[test]
    fn test_state_serializes_by_name() {
        let json = serde_json::to_string(&DegradationState::Render3D).unwrap();
        assert_eq!(json, "\"Render3D\"");
    }

    #[test]
    fn test_pool_status_saturation() {
        assert!(PoolStatus { active: 3, max: 3 }.is_saturated());
        assert!(!PoolStatus { active: 2, max: 3 }.is_saturated());
        assert!(PoolStatus { active: 0, max: 0 }.is_saturated());
    }
}
