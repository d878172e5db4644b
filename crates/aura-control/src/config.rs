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

//! Configuration for the render coordination control plane.
//!
//! Every section has a `Default` carrying the production defaults, and every
//! field is optional in RON, so a config file only lists what it overrides:
//!
//! ```ron
//! (
//!     pool: (max_slots: 2),
//!     recovery: (max_retries: 2),
//! )
//! ```

use aura_core::{ConfigError, DeviceClass, QualityTier};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Render slot pool settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of simultaneously active 3D renders.
    pub max_slots: usize,
    /// Offer freed slots to waiting instances.
    pub readmit_on_release: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_slots: 3,
            readmit_on_release: true,
        }
    }
}

/// Capability probe settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Hosts reporting fewer hardware threads never attempt 3D.
    pub min_hardware_threads: usize,
    /// Device classes that never attempt 3D.
    pub constrained_classes: Vec<DeviceClass>,
    /// How long a probe result is reused before re-probing.
    pub cache_ttl_ms: u64,
    /// Settling delay between mounting and probing.
    pub probe_settle_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            min_hardware_threads: 4,
            constrained_classes: vec![DeviceClass::LowEnd],
            cache_ttl_ms: 30_000,
            probe_settle_ms: 1_000,
        }
    }
}

impl ProbeConfig {
    /// Probe result lifetime.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Settling delay before the first probe of an instance.
    pub fn probe_settle(&self) -> Duration {
        Duration::from_millis(self.probe_settle_ms)
    }
}

/// Quality (LOD) controller settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Tier a newly admitted render starts at.
    pub initial_tier: QualityTier,
    /// Frames between two evaluations.
    pub evaluation_interval: u32,
    /// Below this FPS the tier is lowered.
    pub downgrade_fps: f32,
    /// Above this FPS (with few drops) the tier is raised.
    pub upgrade_fps: f32,
    /// Frames slower than this count as dropped (30 FPS budget).
    pub drop_threshold_ms: f32,
    /// More drops than this in a window lowers the tier.
    pub max_drops_downgrade: usize,
    /// Fewer drops than this in a window is required to raise the tier.
    pub max_drops_upgrade: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            initial_tier: QualityTier::High,
            evaluation_interval: 60,
            downgrade_fps: 25.0,
            upgrade_fps: 55.0,
            drop_threshold_ms: 33.33,
            max_drops_downgrade: 10,
            max_drops_upgrade: 2,
        }
    }
}

/// Context-loss recovery settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Automatic restore attempts per instance before manual retry is needed.
    pub max_retries: u32,
    /// Settling delay between a restore signal and the re-probe.
    pub restore_settle_ms: u64,
    /// Delay before retrying after a render fault (which has no restore signal).
    pub fault_restore_delay_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            restore_settle_ms: 1_500,
            fault_restore_delay_ms: 2_000,
        }
    }
}

impl RecoveryConfig {
    /// Settling delay after a restore signal.
    pub fn restore_settle(&self) -> Duration {
        Duration::from_millis(self.restore_settle_ms)
    }

    /// Delay before an automatic restore after a fault.
    pub fn fault_restore_delay(&self) -> Duration {
        Duration::from_millis(self.fault_restore_delay_ms)
    }
}

/// Background service settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Frequency of the timer/event pump in Hz.
    pub tick_rate: u32,
    /// Maximum number of platform signals to buffer.
    /// If the buffer is full, new signals are dropped.
    pub event_buffer_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30,
            event_buffer_size: 1000,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuraConfig {
    /// Render slot pool.
    pub pool: PoolConfig,
    /// Capability probe.
    pub probe: ProbeConfig,
    /// Quality controller.
    pub quality: QualityConfig,
    /// Recovery state machine.
    pub recovery: RecoveryConfig,
    /// Background service.
    pub service: ServiceConfig,
}

impl AuraConfig {
    /// Parses and validates a RON document.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: AuraConfig =
            ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_ron_str(&text)?;
        log::info!("Config: Loaded '{}'", path.display());
        Ok(config)
    }

    /// Rejects values the control plane cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality.evaluation_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "quality.evaluation_interval",
                reason: "must be at least 1 frame".into(),
            });
        }
        if !(self.quality.downgrade_fps < self.quality.upgrade_fps) {
            return Err(ConfigError::Invalid {
                field: "quality.upgrade_fps",
                reason: format!(
                    "must be above downgrade_fps ({} <= {})",
                    self.quality.upgrade_fps, self.quality.downgrade_fps
                ),
            });
        }
        if !(self.quality.drop_threshold_ms > 0.0) {
            return Err(ConfigError::Invalid {
                field: "quality.drop_threshold_ms",
                reason: "must be positive".into(),
            });
        }
        if self.service.tick_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "service.tick_rate",
                reason: "must be at least 1 Hz".into(),
            });
        }
        if self.service.event_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "service.event_buffer_size",
                reason: "must hold at least one event".into(),
            });
        }
        Ok(())
    }
}
