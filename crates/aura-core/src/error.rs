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

//! Defines the error types of the render-coordination subsystem.
//!
//! None of these ever reach the end user: the control plane absorbs them into
//! state transitions. They exist for logging and diagnostics.

use thiserror::Error;

/// Why the environment cannot sustain a GPU rendering context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    /// No adapter or context could be created.
    #[error("GPU context creation failed: {0}")]
    ContextCreation(String),
    /// A trivial shader failed to compile on the trial context.
    #[error("trial shader compilation failed: {0}")]
    ShaderCompilation(String),
    /// The only available adapter is a software rasterizer.
    #[error("software adapter '{0}' is not accelerated")]
    SoftwareAdapter(String),
    /// Too few hardware threads to sustain 3D rendering alongside the UI.
    #[error("hardware concurrency {found} below minimum {required}")]
    InsufficientConcurrency {
        /// Reported hardware thread count.
        found: usize,
        /// Configured minimum.
        required: usize,
    },
    /// The device belongs to a class configured as too constrained.
    #[error("device class {0} is excluded from 3D rendering")]
    ConstrainedDevice(String),
    /// The trial panicked. The payload message is kept when it is a string.
    #[error("capability trial panicked: {0}")]
    Panicked(String),
}

/// A failure in the 3D render path of one instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// The GPU context backing the render surface was lost.
    #[error("GPU context lost")]
    ContextLost,
    /// The renderer could not be started.
    #[error("renderer failed to start: {0}")]
    Startup(String),
    /// Drawing a frame failed.
    #[error("draw failed: {0}")]
    Draw(String),
    /// The 3D drawing code panicked.
    #[error("renderer panicked: {0}")]
    Panicked(String),
}

/// Failure to load or validate configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration text is not valid RON for the schema.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// A value is out of its valid range.
    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Extracts a readable message from a `catch_unwind` payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
