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

#![allow(dead_code)]

use aura_control::{AuraConfig, RenderCoordinator};
use aura_core::{
    ContextTrial, DeviceClass, HardwareHints, HardwareInfo, InstanceId, ManualClock, ProbeError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct FixedHardware(pub HardwareHints);

impl HardwareInfo for FixedHardware {
    fn hints(&self) -> HardwareHints {
        self.0
    }
}

/// A trial whose outcome can be flipped while the coordinator owns it.
#[derive(Clone, Default)]
pub struct GpuSwitch {
    broken: Arc<AtomicBool>,
    runs: Arc<AtomicUsize>,
}

impl GpuSwitch {
    pub fn set_available(&self, available: bool) {
        self.broken.store(!available, Ordering::SeqCst);
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl ContextTrial for GpuSwitch {
    fn run(&self) -> Result<(), ProbeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) {
            Err(ProbeError::ContextCreation("no compatible adapter".into()))
        } else {
            Ok(())
        }
    }
}

pub struct Harness {
    pub coordinator: RenderCoordinator,
    pub clock: ManualClock,
    pub gpu: GpuSwitch,
}

impl Harness {
    pub fn new(config: AuraConfig) -> Self {
        Self::with_hints(
            config,
            HardwareHints {
                hardware_concurrency: 8,
                device_class: DeviceClass::Desktop,
            },
        )
    }

    pub fn with_hints(config: AuraConfig, hints: HardwareHints) -> Self {
        let clock = ManualClock::new();
        let gpu = GpuSwitch::default();
        let coordinator = RenderCoordinator::with_clock(
            config,
            Box::new(FixedHardware(hints)),
            Box::new(gpu.clone()),
            Box::new(clock.clone()),
        );
        Self {
            coordinator,
            clock,
            gpu,
        }
    }

    /// Moves time forward and fires whatever became due.
    pub fn elapse(&mut self, by: Duration) -> usize {
        self.clock.advance(by);
        self.coordinator.advance()
    }
}

pub fn id(name: &str) -> InstanceId {
    InstanceId::from(name)
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
