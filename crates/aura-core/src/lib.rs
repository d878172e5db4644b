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

//! # Aura Core
//!
//! Foundational crate containing the types, traits and error contracts shared
//! by the avatar render-coordination control plane and its environment
//! backends.

#![warn(missing_docs)]

pub mod avatar;
pub mod clock;
pub mod error;
pub mod probe;
pub mod quality;
pub mod renderer;

pub use avatar::{
    ContextHealth, DegradationState, InstanceId, PoolStatus, Priority, RenderState, VisualOutput,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, ProbeError, RenderError};
pub use probe::{ContextTrial, DeviceClass, HardwareHints, HardwareInfo, ProbeReport};
pub use quality::{QualitySettings, QualityTier};
pub use renderer::{AvatarRenderer, FrameStats};
