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

//! Discrete level-of-detail tiers and the render settings they imply.
//!
//! The ladder is ordered so that each step down removes exactly one cost
//! category, cheapest win first:
//!
//! | Step | Removed |
//! |---|---|
//! | High → Medium | antialiasing |
//! | Medium → Low | shadows and most of the particle budget |
//! | Low → Minimal | geometry detail |

use serde::{Deserialize, Serialize};

/// A quality rung. Ordered from cheapest to most expensive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum QualityTier {
    /// Reduced geometry, no shadows, minimal effects.
    Minimal,
    /// Full geometry without shadows and with a small particle budget.
    Low,
    /// Everything except antialiasing.
    Medium,
    /// Full quality.
    #[default]
    High,
}

impl QualityTier {
    /// All tiers, cheapest first.
    pub const ALL: [QualityTier; 4] = [
        QualityTier::Minimal,
        QualityTier::Low,
        QualityTier::Medium,
        QualityTier::High,
    ];

    /// The next cheaper tier, or `None` at the bottom of the ladder.
    pub fn lower(self) -> Option<QualityTier> {
        match self {
            QualityTier::High => Some(QualityTier::Medium),
            QualityTier::Medium => Some(QualityTier::Low),
            QualityTier::Low => Some(QualityTier::Minimal),
            QualityTier::Minimal => None,
        }
    }

    /// The next more expensive tier, or `None` at the top of the ladder.
    pub fn higher(self) -> Option<QualityTier> {
        match self {
            QualityTier::Minimal => Some(QualityTier::Low),
            QualityTier::Low => Some(QualityTier::Medium),
            QualityTier::Medium => Some(QualityTier::High),
            QualityTier::High => None,
        }
    }

    /// Continuous view of the tier in `0.0..=1.0`.
    pub fn scale(self) -> f32 {
        match self {
            QualityTier::Minimal => 0.0,
            QualityTier::Low => 1.0 / 3.0,
            QualityTier::Medium => 2.0 / 3.0,
            QualityTier::High => 1.0,
        }
    }

    /// Render settings derived from this tier.
    pub fn settings(self) -> QualitySettings {
        match self {
            QualityTier::High => QualitySettings {
                geometry_detail: 1.0,
                shadows: true,
                max_particles: 200,
                antialias: true,
                frame_rate_cap: 60,
            },
            QualityTier::Medium => QualitySettings {
                geometry_detail: 1.0,
                shadows: true,
                max_particles: 200,
                antialias: false,
                frame_rate_cap: 60,
            },
            QualityTier::Low => QualitySettings {
                geometry_detail: 1.0,
                shadows: false,
                max_particles: 50,
                antialias: false,
                frame_rate_cap: 45,
            },
            QualityTier::Minimal => QualitySettings {
                geometry_detail: 0.5,
                shadows: false,
                max_particles: 50,
                antialias: false,
                frame_rate_cap: 30,
            },
        }
    }
}

/// Concrete rendering parameters handed to a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    /// Geometry subdivision factor (1.0 = full mesh detail).
    pub geometry_detail: f32,
    /// Whether shadow maps are rendered.
    pub shadows: bool,
    /// Upper bound on live particles/effects.
    pub max_particles: u32,
    /// Whether antialiasing is enabled.
    pub antialias: bool,
    /// Frame rate the renderer should not exceed.
    pub frame_rate_cap: u32,
}

impl Default for QualitySettings {
    fn default() -> Self {
        QualityTier::default().settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_is_consistent() {
        for tier in QualityTier::ALL {
            if let Some(lower) = tier.lower() {
                assert!(lower < tier);
                assert_eq!(lower.higher(), Some(tier));
            }
        }
        assert_eq!(QualityTier::Minimal.lower(), None);
        assert_eq!(QualityTier::High.higher(), None);
    }

    #[test]
    fn test_settings_are_monotonic() {
        for pair in QualityTier::ALL.windows(2) {
            let (low, high) = (pair[0].settings(), pair[1].settings());
            assert!(high.geometry_detail >= low.geometry_detail);
            assert!(high.max_particles >= low.max_particles);
            assert!(high.frame_rate_cap >= low.frame_rate_cap);
            // Anything enabled on the cheaper rung stays enabled above it.
            assert!(!low.shadows || high.shadows);
            assert!(!low.antialias || high.antialias);
        }
    }

    #[test]
    fn test_downgrade_order_takes_cheapest_first() {
        let high = QualityTier::High.settings();
        let medium = QualityTier::Medium.settings();
        let low = QualityTier::Low.settings();
        let minimal = QualityTier::Minimal.settings();

        // 1. antialiasing only
        assert!(high.antialias && !medium.antialias);
        assert_eq!(high.shadows, medium.shadows);
        assert_eq!(high.geometry_detail, medium.geometry_detail);

        // 2. shadows and particles
        assert!(medium.shadows && !low.shadows);
        assert!(low.max_particles < medium.max_particles);
        assert_eq!(medium.geometry_detail, low.geometry_detail);

        // 3. geometry
        assert!(minimal.geometry_detail < low.geometry_detail);
    }

    #[test]
    fn test_scale_bounds() {
        approx::assert_relative_eq!(QualityTier::Minimal.scale(), 0.0);
        approx::assert_relative_eq!(QualityTier::High.scale(), 1.0);
        assert!(QualityTier::Low.scale() < QualityTier::Medium.scale());
    }
}
