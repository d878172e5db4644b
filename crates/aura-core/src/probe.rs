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

//! Contracts for detecting whether the host can sustain GPU rendering.
//!
//! The environment supplies two things: coarse hardware hints
//! ([`HardwareInfo`]) and a disposable trial context ([`ContextTrial`]). The
//! control plane combines them into a cached [`ProbeReport`].

use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of the host device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceClass {
    /// Workstation or laptop with a dedicated or modern integrated GPU.
    Desktop,
    /// Phone or tablet class hardware.
    Mobile,
    /// Known constrained hardware (little memory, few cores).
    LowEnd,
    /// Classification was not possible.
    #[default]
    Unknown,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Hardware hints observed from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HardwareHints {
    /// Number of logical hardware threads.
    pub hardware_concurrency: usize,
    /// Device classification.
    pub device_class: DeviceClass,
}

/// Source of hardware hints.
pub trait HardwareInfo: Send + Sync {
    /// Returns the current hardware hints. Must not fail; unknown values are
    /// reported as `0` / [`DeviceClass::Unknown`].
    fn hints(&self) -> HardwareHints;
}

/// A disposable trial of the GPU rendering path.
///
/// Implementations create a minimal rendering context, compile a trivial
/// shader program and immediately dispose both. The trial must not leave any
/// resources behind.
pub trait ContextTrial: Send + Sync {
    /// Runs the trial.
    fn run(&self) -> Result<(), ProbeError>;
}

/// The outcome of a capability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Whether 3D rendering should be attempted at all.
    pub supported: bool,
    /// Why 3D is unsupported. `None` when supported.
    pub reason: Option<String>,
}

impl ProbeReport {
    /// A report allowing 3D.
    pub fn supported() -> Self {
        Self {
            supported: true,
            reason: None,
        }
    }

    /// A report refusing 3D for the given reason.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            supported: false,
            reason: Some(reason.into()),
        }
    }
}

impl From<Result<(), ProbeError>> for ProbeReport {
    fn from(result: Result<(), ProbeError>) -> Self {
        match result {
            Ok(()) => ProbeReport::supported(),
            Err(err) => ProbeReport::unsupported(err.to_string()),
        }
    }
}
