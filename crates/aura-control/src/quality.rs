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

//! Performance-adaptive quality (LOD) control for one active render.
//!
//! The controller samples frame times into a rolling window and, on a
//! throttled cadence, moves the instance one rung along the [`QualityTier`]
//! ladder:
//!
//! - **Downgrade** when FPS < 25 or more than 10 frames in the window missed
//!   the 30 FPS budget.
//! - **Upgrade** when FPS > 55 and fewer than 2 frames missed it.
//!
//! An evaluation triggers at most one transition, and a transition clears the
//! window so the next decision only sees frames rendered at the new tier.

use crate::config::QualityConfig;
use crate::metrics::FrameWindow;
use aura_core::{QualitySettings, QualityTier};

/// A tier transition emitted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChange {
    /// Tier before the transition.
    pub from: QualityTier,
    /// Tier after the transition.
    pub to: QualityTier,
}

impl TierChange {
    /// Returns `true` if the transition lowered quality.
    pub fn is_downgrade(&self) -> bool {
        self.to < self.from
    }
}

/// The measurements behind one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowReport {
    /// Effective frames per second over the window.
    pub fps: f32,
    /// Frames slower than the drop threshold.
    pub dropped: usize,
}

/// Per-instance LOD feedback loop.
#[derive(Debug, Clone)]
pub struct QualityController {
    config: QualityConfig,
    tier: QualityTier,
    window: FrameWindow,
    frames_since_eval: u32,
    last_report: Option<WindowReport>,
}

impl QualityController {
    /// Creates a controller starting at the configured initial tier.
    pub fn new(config: QualityConfig) -> Self {
        let tier = config.initial_tier;
        Self::starting_at(config, tier)
    }

    /// Creates a controller starting at `tier`.
    pub fn starting_at(config: QualityConfig, tier: QualityTier) -> Self {
        Self {
            config,
            tier,
            window: FrameWindow::new(),
            frames_since_eval: 0,
            last_report: None,
        }
    }

    /// The current tier.
    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    /// Settings for the current tier.
    pub fn settings(&self) -> QualitySettings {
        self.tier.settings()
    }

    /// Measurements of the most recent evaluation.
    pub fn last_report(&self) -> Option<WindowReport> {
        self.last_report
    }

    /// Records one frame and evaluates if the cadence is due.
    pub fn record_frame(&mut self, frame_time_ms: f32) -> Option<TierChange> {
        self.window.push(frame_time_ms);
        self.frames_since_eval = self.frames_since_eval.saturating_add(1);

        if self.frames_since_eval < self.config.evaluation_interval || !self.window.is_full() {
            return None;
        }
        self.frames_since_eval = 0;
        self.evaluate()
    }

    fn evaluate(&mut self) -> Option<TierChange> {
        let report = WindowReport {
            fps: self.window.fps(),
            dropped: self.window.dropped_frames(self.config.drop_threshold_ms),
        };
        self.last_report = Some(report);
        log::trace!(
            "Quality: fps={:.1}, dropped={}, tier={:?}",
            report.fps,
            report.dropped,
            self.tier
        );

        let struggling = report.fps < self.config.downgrade_fps
            || report.dropped > self.config.max_drops_downgrade;
        let comfortable =
            report.fps > self.config.upgrade_fps && report.dropped < self.config.max_drops_upgrade;

        // Downgrade wins: one window never moves in both directions.
        let target = if struggling {
            self.tier.lower()
        } else if comfortable {
            self.tier.higher()
        } else {
            None
        };
        let target = target?;

        let change = TierChange {
            from: self.tier,
            to: target,
        };
        self.tier = target;
        self.window.clear();
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FRAME_WINDOW;

    fn controller(tier: QualityTier) -> QualityController {
        QualityController::starting_at(QualityConfig::default(), tier)
    }

    /// Feeds `n` frames and returns every transition observed.
    fn feed(c: &mut QualityController, frame_ms: f32, n: usize) -> Vec<TierChange> {
        (0..n).filter_map(|_| c.record_frame(frame_ms)).collect()
    }

    // ── Thresholds ───────────────────────────────────────────────────

    #[test]
    fn test_slow_window_downgrades_one_step() {
        let mut c = controller(QualityTier::High);
        let changes = feed(&mut c, 50.0, FRAME_WINDOW); // 20 FPS
        assert_eq!(
            changes,
            vec![TierChange {
                from: QualityTier::High,
                to: QualityTier::Medium
            }]
        );
        assert!(changes[0].is_downgrade());
        assert!(!c.settings().antialias);
    }

    #[test]
    fn test_fast_window_upgrades_one_step() {
        let mut c = controller(QualityTier::Low);
        let changes = feed(&mut c, 10.0, FRAME_WINDOW); // 100 FPS
        assert_eq!(changes.len(), 1);
        assert_eq!(c.tier(), QualityTier::Medium);
    }

    #[test]
    fn test_middle_band_holds_tier() {
        let mut c = controller(QualityTier::Medium);
        let changes = feed(&mut c, 25.0, FRAME_WINDOW * 3); // 40 FPS
        assert!(changes.is_empty());
        assert_eq!(c.tier(), QualityTier::Medium);
        let report = c.last_report().unwrap();
        assert!((report.fps - 40.0).abs() < 0.01);
    }

    #[test]
    fn test_frame_drops_alone_trigger_downgrade() {
        // Mean is fast (about 50 FPS) but 11 frames blow the 30 FPS budget.
        let mut c = controller(QualityTier::High);
        let mut changes = Vec::new();
        for i in 0..FRAME_WINDOW {
            let ms = if i < 11 { 40.0 } else { 12.0 };
            changes.extend(c.record_frame(ms));
        }
        assert!(c.last_report().unwrap().fps > 25.0);
        assert_eq!(changes.len(), 1);
        assert_eq!(c.tier(), QualityTier::Medium);
    }

    #[test]
    fn test_upgrade_blocked_by_drops() {
        // 58 fast frames and 2 slow ones: FPS above 55 but two drops.
        let mut c = controller(QualityTier::Low);
        for i in 0..FRAME_WINDOW {
            let ms = if i < 2 { 34.0 } else { 15.0 };
            assert!(c.record_frame(ms).is_none());
        }
        assert!(c.last_report().unwrap().fps > 55.0);
        assert_eq!(c.tier(), QualityTier::Low);
    }

    // ── Cadence & hysteresis ─────────────────────────────────────────

    #[test]
    fn test_no_evaluation_before_window_fills() {
        let mut c = controller(QualityTier::High);
        assert!(feed(&mut c, 100.0, FRAME_WINDOW - 1).is_empty());
        assert!(c.last_report().is_none());
    }

    #[test]
    fn test_oscillating_load_changes_at_most_once_per_window() {
        let mut c = controller(QualityTier::Medium);
        for window in 0..20 {
            let ms = if window % 2 == 0 { 60.0 } else { 8.0 };
            let changes = feed(&mut c, ms, FRAME_WINDOW);
            assert!(changes.len() <= 1, "window {window} changed tier twice");
        }
    }

    #[test]
    fn test_tier_is_clamped_at_ladder_ends() {
        let mut c = controller(QualityTier::Minimal);
        assert!(feed(&mut c, 100.0, FRAME_WINDOW * 2).is_empty());
        assert_eq!(c.tier(), QualityTier::Minimal);

        let mut c = controller(QualityTier::High);
        assert!(feed(&mut c, 5.0, FRAME_WINDOW * 2).is_empty());
        assert_eq!(c.tier(), QualityTier::High);
    }

    #[test]
    fn test_sustained_load_walks_down_the_ladder() {
        let mut c = controller(QualityTier::High);
        let changes = feed(&mut c, 80.0, FRAME_WINDOW * 4);
        let tiers: Vec<QualityTier> = changes.iter().map(|ch| ch.to).collect();
        assert_eq!(
            tiers,
            vec![QualityTier::Medium, QualityTier::Low, QualityTier::Minimal]
        );
    }

    #[test]
    fn test_longer_interval_throttles_evaluation() {
        let config = QualityConfig {
            evaluation_interval: 120,
            ..Default::default()
        };
        let mut c = QualityController::starting_at(config, QualityTier::High);
        assert!(feed(&mut c, 80.0, 119).is_empty());
        assert_eq!(feed(&mut c, 80.0, 1).len(), 1);
    }
}
