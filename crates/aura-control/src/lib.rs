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

//! # Aura Control
//!
//! The control plane deciding which avatars render in 3D, at what quality,
//! and when they fall back to 2D.
//!
//! - [`pool`] / [`scheduler`]: bounded render slots with priority preemption.
//! - [`capability`]: hardware heuristics and the trial context, cached.
//! - [`quality`]: the per-instance LOD feedback loop.
//! - [`coordinator`]: the degradation state machine over all of the above.
//! - [`boundary`] / [`supervisor`]: what a view calls every frame.
//! - [`service`]: a threaded front with an asynchronous signal channel.

#![warn(missing_docs)]

pub mod boundary;
pub mod capability;
pub mod config;
pub mod coordinator;
pub mod instance;
pub mod metrics;
pub mod pool;
pub mod quality;
pub mod scheduler;
pub mod service;
pub mod supervisor;
pub mod timers;

pub use boundary::render_with_fallback;
pub use capability::{CapabilityProbe, ProbeCache};
pub use config::AuraConfig;
pub use coordinator::RenderCoordinator;
pub use instance::InstanceSnapshot;
pub use pool::{Admission, RenderSlotPool};
pub use quality::{QualityController, TierChange};
pub use service::{AvatarHandle, AvatarService, AvatarSignal};
pub use supervisor::RenderSupervisor;
