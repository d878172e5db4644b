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

//! Simulated therapist dashboard.
//!
//! Mounts a handful of avatars with different priorities, renders them
//! through simulated renderers under load, drops a GPU context, recovers it
//! and unmounts a view, printing the coordinator state as JSON after each
//! step.
//!
//! Usage: `sandbox [--assume-gpu] [config.ron]`

use anyhow::{Context as _, Result};
use aura_control::{AuraConfig, RenderCoordinator, RenderSupervisor};
use aura_core::{
    AvatarRenderer, ContextTrial, FrameStats, InstanceId, ManualClock, Priority, ProbeError,
    QualitySettings, RenderError,
};
use aura_infra::{SysinfoHardware, WgpuContextTrial};
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(16);

/// Pretends the host has a working GPU.
struct AssumedGpu;

impl ContextTrial for AssumedGpu {
    fn run(&self) -> Result<(), ProbeError> {
        Ok(())
    }
}

/// A renderer whose frame cost follows its quality settings and a load
/// factor controlled by the script.
struct SimulatedRenderer {
    load: f32,
    settings: Option<QualitySettings>,
}

impl SimulatedRenderer {
    fn new(load: f32) -> Self {
        Self {
            load,
            settings: None,
        }
    }

    fn frame_cost_ms(&self, settings: &QualitySettings) -> f32 {
        let mut cost = 8.0 + 10.0 * settings.geometry_detail;
        if settings.shadows {
            cost += 6.0;
        }
        if settings.antialias {
            cost += 4.0;
        }
        cost += settings.max_particles as f32 * 0.02;
        cost * self.load
    }
}

impl AvatarRenderer for SimulatedRenderer {
    fn start(&mut self, settings: &QualitySettings) -> Result<(), RenderError> {
        self.settings = Some(*settings);
        Ok(())
    }

    fn apply_quality(&mut self, settings: &QualitySettings) -> Result<(), RenderError> {
        self.settings = Some(*settings);
        Ok(())
    }

    fn draw(&mut self, _dt: Duration) -> Result<FrameStats, RenderError> {
        let settings = self
            .settings
            .ok_or_else(|| RenderError::Draw("renderer not started".into()))?;
        let ms = self.frame_cost_ms(&settings);
        Ok(FrameStats {
            frame_time: Duration::from_secs_f32(ms / 1000.0),
        })
    }

    fn stop(&mut self) {
        self.settings = None;
    }
}

struct Dashboard {
    coordinator: RenderCoordinator,
    clock: ManualClock,
    views: Vec<RenderSupervisor<SimulatedRenderer>>,
}

impl Dashboard {
    fn mount(&mut self, persona: &str, priority: Priority, load: f32) -> InstanceId {
        let id = InstanceId::new(persona, "dashboard");
        let allowed = self.coordinator.request_render(&id, priority);
        log::info!("Sandbox: Mounted {} (priority={}, 3D={})", id, priority, allowed);
        self.views.push(RenderSupervisor::new(id.clone(), SimulatedRenderer::new(load)));
        id
    }

    fn unmount(&mut self, id: &InstanceId) {
        if let Some(index) = self.views.iter().position(|v| v.id() == id) {
            let view = self.views.swap_remove(index);
            view.detach(&mut self.coordinator);
        }
    }

    fn run_frames(&mut self, frames: usize) {
        for _ in 0..frames {
            self.clock.advance(FRAME);
            self.coordinator.advance();
            for view in &mut self.views {
                view.frame(&mut self.coordinator, FRAME);
            }
        }
    }

    fn settle(&mut self, by: Duration) {
        self.clock.advance(by);
        self.coordinator.advance();
    }

    fn report(&self, step: &str) -> Result<()> {
        let status = self.coordinator.pool_status();
        println!("== {step} (slots {}/{}) ==", status.active, status.max);
        let snapshots = self.coordinator.snapshots();
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshots).context("Failed to serialize snapshots")?
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .init();

    let mut assume_gpu = false;
    let mut config_path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--assume-gpu" => assume_gpu = true,
            path => config_path = Some(path.to_owned()),
        }
    }

    let config = match &config_path {
        Some(path) => AuraConfig::load(path)
            .with_context(|| format!("Failed to load configuration from '{path}'"))?,
        None => AuraConfig::default(),
    };

    let trial: Box<dyn ContextTrial> = if assume_gpu {
        log::info!("Sandbox: Assuming a capable GPU");
        Box::new(AssumedGpu)
    } else {
        let trial = WgpuContextTrial::new();
        match trial.adapter_summary() {
            Ok(adapter) => log::info!(
                "Sandbox: Adapter \"{}\" ({}, {})",
                adapter.name,
                adapter.backend,
                adapter.device_type
            ),
            Err(e) => log::warn!("Sandbox: {e:#}"),
        }
        Box::new(trial)
    };

    let clock = ManualClock::new();
    let coordinator = RenderCoordinator::with_clock(
        config,
        Box::new(SysinfoHardware::new()),
        trial,
        Box::new(clock.clone()),
    );
    let mut dashboard = Dashboard {
        coordinator,
        clock,
        views: Vec::new(),
    };

    let report = dashboard.coordinator.prime_capability();
    if let Some(reason) = &report.reason {
        log::warn!("Sandbox: Avatars will render in 2D: {}", reason);
    }

    // 1. A focused conversation, two visible cards and a background list.
    let focused = dashboard.mount("aria", Priority::FOCUSED, 1.6);
    let card = dashboard.mount("milo", Priority::VISIBLE, 1.0);
    dashboard.mount("noor", Priority::VISIBLE, 1.0);
    let background = dashboard.mount("sage", Priority::BACKGROUND, 1.0);
    dashboard.report("Mounted")?;

    // 2. The focused avatar is expensive: its tier walks down under load.
    dashboard.run_frames(240);
    dashboard.report("After 240 frames")?;

    // 3. The focused avatar loses its GPU context and gets it back.
    dashboard.coordinator.on_context_lost(&focused);
    dashboard.report("Context lost")?;
    dashboard.coordinator.on_context_restored(&focused);
    dashboard.settle(dashboard.coordinator.config().recovery.restore_settle());
    dashboard.report("Context restored")?;

    // 4. Closing a card hands its slot to the background avatar.
    dashboard.unmount(&card);
    dashboard.run_frames(10);
    dashboard.report("Card closed")?;
    log::info!(
        "Sandbox: Background avatar renders 3D: {}",
        dashboard.coordinator.is_allowed_to_render(&background)
    );

    dashboard.coordinator.shutdown();
    Ok(())
}
