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

//! The render-with-fallback boundary applied by every avatar view.

use crate::coordinator::RenderCoordinator;
use aura_core::error::panic_message;
use aura_core::{InstanceId, RenderError, VisualOutput};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Draws `id` in 3D if allowed, in 2D otherwise.
///
/// The 3D closure runs under `catch_unwind`. An `Err` or a panic is reported
/// to the coordinator as a render fault and the 2D closure is drawn in the
/// same call, so a failing renderer never escapes its instance. The 2D
/// closure receives the visual the view must show.
pub fn render_with_fallback<T>(
    coordinator: &mut RenderCoordinator,
    id: &InstanceId,
    render_3d: impl FnOnce() -> Result<T, RenderError>,
    render_2d: impl FnOnce(VisualOutput) -> T,
) -> T {
    if coordinator.is_allowed_to_render(id) {
        let error = match catch_unwind(AssertUnwindSafe(render_3d)) {
            Ok(Ok(drawn)) => return drawn,
            Ok(Err(error)) => error,
            Err(payload) => RenderError::Panicked(panic_message(payload.as_ref())),
        };
        log::warn!("Boundary: 3D render of {} failed: {}", id, error);
        coordinator.on_render_fault(id, &error);
    }

    let visual = coordinator
        .visual_output(id)
        .unwrap_or(VisualOutput::Placeholder);
    render_2d(visual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuraConfig;
    use aura_core::{
        ContextTrial, DegradationState, DeviceClass, HardwareHints, HardwareInfo, ManualClock,
        Priority, ProbeError,
    };

    struct Desktop;

    impl HardwareInfo for Desktop {
        fn hints(&self) -> HardwareHints {
            HardwareHints {
                hardware_concurrency: 8,
                device_class: DeviceClass::Desktop,
            }
        }
    }

    struct Capable;

    impl ContextTrial for Capable {
        fn run(&self) -> Result<(), ProbeError> {
            Ok(())
        }
    }

    fn mounted() -> (RenderCoordinator, InstanceId) {
        let mut coordinator = RenderCoordinator::with_clock(
            AuraConfig::default(),
            Box::new(Desktop),
            Box::new(Capable),
            Box::new(ManualClock::new()),
        );
        coordinator.prime_capability();
        let id = InstanceId::from("aria#main");
        assert!(coordinator.request_render(&id, Priority::FOCUSED));
        (coordinator, id)
    }

    #[test]
    fn test_successful_3d_draw_passes_through() {
        let (mut c, id) = mounted();
        let drawn = render_with_fallback(&mut c, &id, || Ok("3d"), |_| "2d");
        assert_eq!(drawn, "3d");
        assert!(c.is_allowed_to_render(&id));
    }

    #[test]
    fn test_error_falls_back_in_same_call() {
        let (mut c, id) = mounted();
        let drawn = render_with_fallback(
            &mut c,
            &id,
            || Err(RenderError::Draw("pipeline invalid".into())),
            |visual| visual,
        );
        assert_eq!(
            drawn,
            VisualOutput::Avatar2D {
                retry_available: false
            }
        );
        assert_eq!(c.current_degradation_state(&id), Some(DegradationState::Render2D));
        assert_eq!(c.pool_status().active, 0);
        assert!(c.snapshot(&id).unwrap().last_error.unwrap().contains("pipeline invalid"));
    }

    #[test]
    fn test_panic_is_contained() {
        let (mut c, id) = mounted();
        let drawn = render_with_fallback(
            &mut c,
            &id,
            || -> Result<&str, RenderError> { panic!("shader exploded") },
            |_| "2d",
        );
        assert_eq!(drawn, "2d");
        assert!(c
            .snapshot(&id)
            .unwrap()
            .last_error
            .unwrap()
            .contains("shader exploded"));
    }

    #[test]
    fn test_disallowed_instance_never_runs_3d() {
        let (mut c, _) = mounted();
        let ghost = InstanceId::from("ghost");
        let drawn = render_with_fallback(
            &mut c,
            &ghost,
            || -> Result<VisualOutput, RenderError> { unreachable!() },
            |visual| visual,
        );
        assert_eq!(drawn, VisualOutput::Placeholder);
    }
}
