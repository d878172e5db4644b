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

//! A throwaway wgpu context used to prove the host can render in 3D.

use anyhow::Context as _;
use aura_core::error::panic_message;
use aura_core::{ContextTrial, ProbeError};
use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};

const TRIAL_SHADER: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(index) - 1);
    let y = f32(i32(index & 1u) * 2 - 1);
    return vec4<f32>(x, y, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

/// Identity of the adapter a trial would use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    /// Driver-reported adapter name.
    pub name: String,
    /// Graphics API backend.
    pub backend: String,
    /// Kind of device.
    pub device_type: String,
}

/// Creates an adapter, a device and a trivial shader module, then drops them.
///
/// CPU rasterizers and adapters of unknown type are rejected: they can
/// create a context but cannot sustain a 3D avatar next to the UI.
#[derive(Debug, Clone)]
pub struct WgpuContextTrial {
    power_preference: wgpu::PowerPreference,
    allow_software: bool,
}

impl Default for WgpuContextTrial {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::LowPower,
            allow_software: false,
        }
    }
}

impl WgpuContextTrial {
    /// Creates a trial preferring low-power adapters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the adapter power preference.
    pub fn with_power_preference(mut self, power_preference: wgpu::PowerPreference) -> Self {
        self.power_preference = power_preference;
        self
    }

    /// Accepts software adapters. Useful on CI machines only.
    pub fn allow_software(mut self, allow: bool) -> Self {
        self.allow_software = allow;
        self
    }

    /// Describes the adapter the trial would pick, without creating a device.
    pub fn adapter_summary(&self) -> anyhow::Result<AdapterSummary> {
        let adapter = self
            .request_adapter()
            .context("Failed to find a graphics adapter")?;
        let info = adapter.get_info();
        Ok(AdapterSummary {
            name: info.name,
            backend: format!("{:?}", info.backend),
            device_type: format!("{:?}", info.device_type),
        })
    }

    fn request_adapter(&self) -> Result<wgpu::Adapter, ProbeError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: self.power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| ProbeError::ContextCreation(e.to_string()))
    }

    fn is_software(device_type: wgpu::DeviceType) -> bool {
        matches!(device_type, wgpu::DeviceType::Cpu | wgpu::DeviceType::Other)
    }
}

impl ContextTrial for WgpuContextTrial {
    fn run(&self) -> Result<(), ProbeError> {
        let adapter = self.request_adapter()?;
        let info = adapter.get_info();
        log::debug!(
            "WgpuTrial: Adapter \"{}\" (Backend: {:?}, Type: {:?})",
            info.name,
            info.backend,
            info.device_type
        );
        if !self.allow_software && Self::is_software(info.device_type) {
            return Err(ProbeError::SoftwareAdapter(info.name));
        }

        let (device, _queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Aura Trial Device"),
            ..Default::default()
        }))
        .map_err(|e| ProbeError::ContextCreation(e.to_string()))?;

        // Validation errors surface as panics from the default error handler.
        catch_unwind(AssertUnwindSafe(|| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Aura Trial Shader"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(TRIAL_SHADER)),
            })
        }))
        .map_err(|payload| ProbeError::ShaderCompilation(panic_message(payload.as_ref())))?;

        log::debug!("WgpuTrial: Trial context created and disposed");
        Ok(())
    }
}
