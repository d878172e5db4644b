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

//! Capability probing: hardware heuristics, the trial context, and the
//! process-wide result cache.

use crate::config::ProbeConfig;
use aura_core::error::panic_message;
use aura_core::{ContextTrial, HardwareInfo, ProbeError, ProbeReport};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Combines hardware heuristics with a trial context.
///
/// Heuristics run first because they are free; the trial only runs on hosts
/// that pass them. The probe never panics: a panicking trial is reported as
/// unsupported.
pub struct CapabilityProbe {
    hardware: Box<dyn HardwareInfo>,
    trial: Box<dyn ContextTrial>,
    config: ProbeConfig,
}

impl CapabilityProbe {
    /// Creates a probe from environment backends.
    pub fn new(
        hardware: Box<dyn HardwareInfo>,
        trial: Box<dyn ContextTrial>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            hardware,
            trial,
            config,
        }
    }

    /// Runs the full probe.
    pub fn probe(&self) -> ProbeReport {
        let report = ProbeReport::from(self.check());
        match &report.reason {
            None => log::info!("Probe: 3D rendering supported"),
            Some(reason) => log::warn!("Probe: 3D rendering unsupported ({})", reason),
        }
        report
    }

    fn check(&self) -> Result<(), ProbeError> {
        let hints = self.hardware.hints();
        log::debug!(
            "Probe: hardware_concurrency={}, device_class={}",
            hints.hardware_concurrency,
            hints.device_class
        );

        // Zero means the host did not report a value; do not punish that.
        if hints.hardware_concurrency != 0
            && hints.hardware_concurrency < self.config.min_hardware_threads
        {
            return Err(ProbeError::InsufficientConcurrency {
                found: hints.hardware_concurrency,
                required: self.config.min_hardware_threads,
            });
        }

        if self.config.constrained_classes.contains(&hints.device_class) {
            return Err(ProbeError::ConstrainedDevice(hints.device_class.to_string()));
        }

        match catch_unwind(AssertUnwindSafe(|| self.trial.run())) {
            Ok(result) => result,
            Err(payload) => Err(ProbeError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

/// Reuses a probe result for a bounded time.
///
/// Probing creates a real GPU context, so it is shared across every instance
/// instead of repeated per mount. Context loss invalidates the cache because
/// capability can degrade at runtime.
pub struct ProbeCache {
    probe: CapabilityProbe,
    ttl: Duration,
    cached: Option<(ProbeReport, Instant)>,
}

impl ProbeCache {
    /// Wraps a probe with a cache of the given lifetime.
    pub fn new(probe: CapabilityProbe, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            cached: None,
        }
    }

    /// Returns the cached report if still fresh at `now`.
    pub fn peek(&self, now: Instant) -> Option<&ProbeReport> {
        self.cached
            .as_ref()
            .filter(|(_, at)| now.saturating_duration_since(*at) < self.ttl)
            .map(|(report, _)| report)
    }

    /// Returns a fresh-enough report, probing if needed.
    pub fn get(&mut self, now: Instant) -> ProbeReport {
        if let Some(report) = self.peek(now) {
            return report.clone();
        }
        self.refresh(now)
    }

    /// Probes unconditionally and caches the result.
    pub fn refresh(&mut self, now: Instant) -> ProbeReport {
        let report = self.probe.probe();
        self.cached = Some((report.clone(), now));
        report
    }

    /// Forgets the cached result.
    pub fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            log::debug!("Probe: Cache invalidated");
        }
    }
}
