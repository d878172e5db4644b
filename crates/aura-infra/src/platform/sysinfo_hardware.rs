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

//! sysinfo-based implementation of the HardwareInfo trait.

use aura_core::{DeviceClass, HardwareHints, HardwareInfo};
use std::sync::{Mutex, PoisonError};
use sysinfo::System;

const GIB: u64 = 1024 * 1024 * 1024;

/// Hosts below either threshold are classified as [`DeviceClass::LowEnd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowEndThresholds {
    /// Minimum total memory in bytes.
    pub min_memory_bytes: u64,
    /// Minimum logical CPU count.
    pub min_cpus: usize,
}

impl Default for LowEndThresholds {
    fn default() -> Self {
        Self {
            min_memory_bytes: 4 * GIB,
            min_cpus: 2,
        }
    }
}

/// Hardware hints read from the `sysinfo` crate.
pub struct SysinfoHardware {
    system: Mutex<System>,
    thresholds: LowEndThresholds,
}

impl SysinfoHardware {
    /// Creates a provider with the default low-end thresholds.
    pub fn new() -> Self {
        Self::with_thresholds(LowEndThresholds::default())
    }

    /// Creates a provider with custom low-end thresholds.
    pub fn with_thresholds(thresholds: LowEndThresholds) -> Self {
        Self {
            system: Mutex::new(System::new()),
            thresholds,
        }
    }

    fn classify(&self, cpus: usize, total_memory: u64) -> DeviceClass {
        // Zero means sysinfo could not read the value on this platform.
        if cpus == 0 && total_memory == 0 {
            return DeviceClass::Unknown;
        }
        if (cpus != 0 && cpus < self.thresholds.min_cpus)
            || (total_memory != 0 && total_memory < self.thresholds.min_memory_bytes)
        {
            DeviceClass::LowEnd
        } else {
            DeviceClass::Desktop
        }
    }
}

impl HardwareInfo for SysinfoHardware {
    fn hints(&self) -> HardwareHints {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu_all();
        system.refresh_memory();

        let cpus = system.cpus().len();
        let total_memory = system.total_memory();
        let device_class = self.classify(cpus, total_memory);
        log::debug!(
            "Sysinfo: {} logical CPUs, {} MiB total memory, class {}",
            cpus,
            total_memory / (1024 * 1024),
            device_class
        );

        HardwareHints {
            hardware_concurrency: cpus,
            device_class,
        }
    }
}

impl Default for SysinfoHardware {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_thresholds() {
        let hw = SysinfoHardware::new();
        assert_eq!(hw.classify(8, 16 * GIB), DeviceClass::Desktop);
        assert_eq!(hw.classify(1, 16 * GIB), DeviceClass::LowEnd);
        assert_eq!(hw.classify(8, 2 * GIB), DeviceClass::LowEnd);
        assert_eq!(hw.classify(0, 0), DeviceClass::Unknown);
        assert_eq!(hw.classify(0, 16 * GIB), DeviceClass::Desktop);
    }

    #[test]
    fn test_custom_thresholds() {
        let hw = SysinfoHardware::with_thresholds(LowEndThresholds {
            min_memory_bytes: 32 * GIB,
            min_cpus: 16,
        });
        assert_eq!(hw.classify(8, 16 * GIB), DeviceClass::LowEnd);
    }

    #[test]
    fn test_reads_current_host() {
        let hints = SysinfoHardware::new().hints();
        // Every supported CI host reports at least one CPU.
        assert!(hints.hardware_concurrency >= 1);
    }
}
