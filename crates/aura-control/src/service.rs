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

//! Threaded front for the render coordinator.

use crate::config::ServiceConfig;
use crate::coordinator::RenderCoordinator;
use crate::instance::InstanceSnapshot;
use aura_core::{DegradationState, InstanceId, PoolStatus, Priority, RenderError, VisualOutput};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Asynchronous platform signals, delivered through the service channel.
#[derive(Debug, Clone, PartialEq)]
pub enum AvatarSignal {
    /// The GPU context of an instance was lost.
    ContextLost(InstanceId),
    /// The platform restored the GPU context of an instance.
    ContextRestored(InstanceId),
    /// One rendered frame of an instance.
    FrameTime {
        /// The instance that rendered.
        id: InstanceId,
        /// Wall time of the frame.
        frame_time: Duration,
    },
    /// The 3D path of an instance failed.
    RenderFault {
        /// The failing instance.
        id: InstanceId,
        /// What failed.
        error: RenderError,
    },
}

fn lock(coordinator: &Mutex<RenderCoordinator>) -> MutexGuard<'_, RenderCoordinator> {
    coordinator.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable UI-facing handle onto a shared coordinator.
#[derive(Clone)]
pub struct AvatarHandle {
    coordinator: Arc<Mutex<RenderCoordinator>>,
    signals: Sender<AvatarSignal>,
}

impl AvatarHandle {
    /// See [`RenderCoordinator::request_render`].
    pub fn request_render(&self, id: &InstanceId, priority: Priority) -> bool {
        lock(&self.coordinator).request_render(id, priority)
    }

    /// See [`RenderCoordinator::release_render`].
    pub fn release_render(&self, id: &InstanceId) {
        lock(&self.coordinator).release_render(id);
    }

    /// See [`RenderCoordinator::is_allowed_to_render`].
    pub fn is_allowed_to_render(&self, id: &InstanceId) -> bool {
        lock(&self.coordinator).is_allowed_to_render(id)
    }

    /// See [`RenderCoordinator::current_degradation_state`].
    pub fn current_degradation_state(&self, id: &InstanceId) -> Option<DegradationState> {
        lock(&self.coordinator).current_degradation_state(id)
    }

    /// See [`RenderCoordinator::pool_status`].
    pub fn pool_status(&self) -> PoolStatus {
        lock(&self.coordinator).pool_status()
    }

    /// See [`RenderCoordinator::visual_output`].
    pub fn visual_output(&self, id: &InstanceId) -> Option<VisualOutput> {
        lock(&self.coordinator).visual_output(id)
    }

    /// See [`RenderCoordinator::update_priority`].
    pub fn update_priority(&self, id: &InstanceId, priority: Priority) -> bool {
        lock(&self.coordinator).update_priority(id, priority)
    }

    /// See [`RenderCoordinator::retry`].
    pub fn retry(&self, id: &InstanceId) -> bool {
        lock(&self.coordinator).retry(id)
    }

    /// See [`RenderCoordinator::snapshot`].
    pub fn snapshot(&self, id: &InstanceId) -> Option<InstanceSnapshot> {
        lock(&self.coordinator).snapshot(id)
    }

    /// See [`RenderCoordinator::snapshots`].
    pub fn snapshots(&self) -> Vec<InstanceSnapshot> {
        lock(&self.coordinator).snapshots()
    }

    /// Reports a lost context. Unlike [`signal`](Self::signal), the
    /// fallback to 2D is visible when this returns.
    pub fn on_context_lost(&self, id: &InstanceId) {
        lock(&self.coordinator).on_context_lost(id);
    }

    /// See [`RenderCoordinator::on_context_restored`].
    pub fn on_context_restored(&self, id: &InstanceId) {
        lock(&self.coordinator).on_context_restored(id);
    }

    /// Queues a platform signal for the pump thread.
    ///
    /// Returns `false` if the buffer is full or the service is gone; the
    /// signal is dropped in that case.
    pub fn signal(&self, signal: AvatarSignal) -> bool {
        match self.signals.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(signal)) => {
                log::warn!("Service: Signal buffer full, dropped {:?}", signal);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Runs `f` with exclusive access to the coordinator.
    pub fn with_coordinator<T>(&self, f: impl FnOnce(&mut RenderCoordinator) -> T) -> T {
        f(&mut lock(&self.coordinator))
    }
}

/// Owns the coordinator and the pump thread that fires its timers and
/// applies queued platform signals.
pub struct AvatarService {
    config: ServiceConfig,
    coordinator: Arc<Mutex<RenderCoordinator>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    signal_tx: Sender<AvatarSignal>,
}

impl AvatarService {
    /// Creates the service. Pass the receiver to [`start`](Self::start).
    pub fn new(
        coordinator: RenderCoordinator,
        config: ServiceConfig,
    ) -> (Self, Receiver<AvatarSignal>) {
        let (tx, rx) = crossbeam_channel::bounded(config.event_buffer_size);
        let service = Self {
            config,
            coordinator: Arc::new(Mutex::new(coordinator)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            signal_tx: tx,
        };
        (service, rx)
    }

    /// Starts the pump thread. Does nothing if already running.
    pub fn start(&mut self, signal_rx: Receiver<AvatarSignal>) {
        if self.running.load(Ordering::SeqCst) {
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let coordinator = Arc::clone(&self.coordinator);
        let tick_duration = Duration::from_secs_f32(1.0 / self.config.tick_rate.max(1) as f32);

        let handle = thread::spawn(move || {
            log::info!("Service: Pump thread started.");

            while running.load(Ordering::Relaxed) {
                let start_time = Instant::now();
                {
                    let mut guard = lock(&coordinator);

                    // 1. Apply every queued platform signal
                    while let Ok(signal) = signal_rx.try_recv() {
                        apply(&mut guard, signal);
                    }

                    // 2. Fire due settle timers
                    guard.advance();
                }

                // 3. Sleep until next tick
                let elapsed = start_time.elapsed();
                if elapsed < tick_duration {
                    thread::sleep(tick_duration - elapsed);
                }
            }
            log::info!("Service: Pump thread stopped.");
        });

        self.handle = Some(handle);
    }

    /// Stops the pump thread, waits for it and frees every slot.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            lock(&self.coordinator).shutdown();
        }
    }

    /// Returns `true` while the pump thread runs.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// A new handle onto the shared coordinator.
    pub fn handle(&self) -> AvatarHandle {
        AvatarHandle {
            coordinator: Arc::clone(&self.coordinator),
            signals: self.signal_tx.clone(),
        }
    }
}

impl Drop for AvatarService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn apply(coordinator: &mut RenderCoordinator, signal: AvatarSignal) {
    match signal {
        AvatarSignal::ContextLost(id) => coordinator.on_context_lost(&id),
        AvatarSignal::ContextRestored(id) => coordinator.on_context_restored(&id),
        AvatarSignal::FrameTime { id, frame_time } => {
            coordinator.on_frame(&id, frame_time);
        }
        AvatarSignal::RenderFault { id, error } => coordinator.on_render_fault(&id, &error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuraConfig;
    use aura_core::{
        ContextHealth, ContextTrial, DeviceClass, HardwareHints, HardwareInfo, ProbeError,
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

    fn service() -> (AvatarService, Receiver<AvatarSignal>) {
        let mut config = AuraConfig::default();
        config.probe.probe_settle_ms = 0;
        let coordinator = RenderCoordinator::new(config, Box::new(Desktop), Box::new(Capable));
        AvatarService::new(
            coordinator,
            ServiceConfig {
                tick_rate: 200,
                ..Default::default()
            },
        )
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_service_lifecycle() {
        let (mut service, rx) = service();
        service.start(rx);
        assert!(service.is_running());
        service.stop();
        assert!(!service.is_running());
    }

    #[test]
    fn test_pump_resolves_pending_probe() {
        let (mut service, rx) = service();
        let handle = service.handle();
        service.start(rx);

        let id = InstanceId::from("aria#main");
        handle.request_render(&id, Priority::FOCUSED);
        assert!(wait_until(|| handle.is_allowed_to_render(&id)));
        assert_eq!(handle.pool_status().active, 1);

        service.stop();
        assert_eq!(handle.pool_status().active, 0);
    }

    #[test]
    fn test_context_loss_signal_is_applied() {
        let (mut service, rx) = service();
        let handle = service.handle();
        service.start(rx);

        let id = InstanceId::from("aria#main");
        handle.request_render(&id, Priority::FOCUSED);
        assert!(wait_until(|| handle.is_allowed_to_render(&id)));

        assert!(handle.signal(AvatarSignal::ContextLost(id.clone())));
        assert!(wait_until(|| {
            handle.current_degradation_state(&id) == Some(DegradationState::Render2D)
        }));
        service.stop();
    }

    #[test]
    fn test_direct_context_loss_is_synchronous() {
        let (service, _rx) = service();
        let handle = service.handle();
        handle.with_coordinator(|c| c.prime_capability());

        let id = InstanceId::from("aria#main");
        assert!(handle.request_render(&id, Priority::FOCUSED));

        // No pump thread runs: the transition happens inside the call.
        handle.on_context_lost(&id);
        assert_eq!(
            handle.current_degradation_state(&id),
            Some(DegradationState::Render2D)
        );
        assert!(!handle.is_allowed_to_render(&id));

        handle.on_context_restored(&id);
        assert_eq!(
            handle.snapshot(&id).map(|s| s.health),
            Some(ContextHealth::Restoring)
        );
    }

    #[test]
    fn test_full_buffer_drops_signals() {
        let mut config = AuraConfig::default();
        config.service.event_buffer_size = 1;
        let coordinator =
            RenderCoordinator::new(config.clone(), Box::new(Desktop), Box::new(Capable));
        let (service, _rx) = AvatarService::new(coordinator, config.service);
        let handle = service.handle();

        let id = InstanceId::from("aria#main");
        assert!(handle.signal(AvatarSignal::ContextRestored(id.clone())));
        assert!(!handle.signal(AvatarSignal::ContextRestored(id)));
    }
}
