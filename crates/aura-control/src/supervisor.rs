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

//! Binds one opaque renderer to one coordinated instance.

use crate::boundary::render_with_fallback;
use crate::coordinator::RenderCoordinator;
use aura_core::{AvatarRenderer, FrameStats, InstanceId, QualitySettings, VisualOutput};
use std::time::Duration;

enum Drawn {
    Scene(FrameStats, QualitySettings),
    Fallback(VisualOutput),
}

/// Drives an [`AvatarRenderer`] from the coordinator's decisions.
///
/// The renderer is started when the instance is allowed to render 3D,
/// stopped as soon as it is not, reconfigured on tier changes and fed back
/// into the quality controller through the measured frame times.
pub struct RenderSupervisor<R: AvatarRenderer> {
    id: InstanceId,
    renderer: R,
    running: bool,
    applied: Option<QualitySettings>,
}

impl<R: AvatarRenderer> RenderSupervisor<R> {
    /// Wraps `renderer` for the instance `id`. Does not mount it.
    pub fn new(id: InstanceId, renderer: R) -> Self {
        Self {
            id,
            renderer,
            running: false,
            applied: None,
        }
    }

    /// The supervised instance.
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Returns `true` while the renderer holds GPU resources.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The wrapped renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Produces one frame of this instance and returns what was shown.
    pub fn frame(&mut self, coordinator: &mut RenderCoordinator, dt: Duration) -> VisualOutput {
        let settings = match coordinator.quality_settings(&self.id) {
            Some(settings) if coordinator.is_allowed_to_render(&self.id) => settings,
            _ => {
                self.halt();
                return coordinator
                    .visual_output(&self.id)
                    .unwrap_or(VisualOutput::Placeholder);
            }
        };

        let id = self.id.clone();
        let renderer = &mut self.renderer;
        let running = &mut self.running;
        let applied = &mut self.applied;
        let drawn = render_with_fallback(
            coordinator,
            &id,
            || {
                if !*running {
                    // Marked running before start so a failed start is stopped.
                    *running = true;
                    renderer.start(&settings)?;
                    *applied = Some(settings);
                } else if *applied != Some(settings) {
                    renderer.apply_quality(&settings)?;
                    *applied = Some(settings);
                }
                renderer.draw(dt).map(|stats| Drawn::Scene(stats, settings))
            },
            Drawn::Fallback,
        );

        match drawn {
            Drawn::Scene(stats, settings) => {
                coordinator.on_frame(&self.id, stats.frame_time);
                VisualOutput::Scene3D { settings }
            }
            Drawn::Fallback(visual) => {
                self.halt();
                visual
            }
        }
    }

    /// Stops the renderer and unmounts the instance.
    pub fn detach(mut self, coordinator: &mut RenderCoordinator) -> R {
        self.halt();
        coordinator.release_render(&self.id);
        self.renderer
    }

    fn halt(&mut self) {
        if self.running {
            self.renderer.stop();
            self.running = false;
            self.applied = None;
            log::debug!("Supervisor: Stopped renderer of {}", self.id);
        }
    }
}
