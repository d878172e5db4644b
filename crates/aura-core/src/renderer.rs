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

//! The opaque 3D renderer contract.

use crate::error::RenderError;
use crate::quality::QualitySettings;
use std::time::Duration;

/// Per-frame measurements reported by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    /// Wall time spent producing the frame.
    pub frame_time: Duration,
}

impl FrameStats {
    /// Frame time in milliseconds.
    pub fn frame_time_ms(&self) -> f32 {
        self.frame_time.as_secs_f32() * 1000.0
    }
}

/// A 3D avatar renderer bound to one render surface.
///
/// The control plane only starts, stops, reconfigures and draws it. What it
/// draws is none of the control plane's business.
pub trait AvatarRenderer {
    /// Acquires GPU resources and prepares to draw at the given quality.
    fn start(&mut self, settings: &QualitySettings) -> Result<(), RenderError>;

    /// Switches to new quality settings. Called only while started.
    ///
    /// A failure is handled like a failed draw.
    fn apply_quality(&mut self, settings: &QualitySettings) -> Result<(), RenderError>;

    /// Draws one frame. `dt` is the time elapsed since the previous frame.
    fn draw(&mut self, dt: Duration) -> Result<FrameStats, RenderError>;

    /// Releases GPU resources. Must be safe to call when not started.
    fn stop(&mut self);
}
