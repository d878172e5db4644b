use aura_control::{AuraConfig, QualityController, RenderCoordinator, RenderSlotPool};
use aura_core::{
    ContextTrial, DeviceClass, HardwareHints, HardwareInfo, InstanceId, ManualClock, Priority,
    ProbeError,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

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

fn bench_admission(c: &mut Criterion) {
    let ids: Vec<InstanceId> = (0..64).map(|i| InstanceId::new("persona", &i.to_string())).collect();

    let mut group = c.benchmark_group("Admission");

    group.bench_function("Pool churn (64 requesters, 3 slots)", |b| {
        b.iter(|| {
            let mut pool = RenderSlotPool::new(3);
            for (i, id) in ids.iter().enumerate() {
                black_box(pool.acquire(id, Priority((i % 7) as i32)));
                if i % 4 == 0 {
                    pool.release(&ids[i / 2]);
                }
            }
            black_box(pool.status());
        });
    });

    group.bench_function("Coordinator mount/unmount dashboard", |b| {
        let mut coordinator = RenderCoordinator::with_clock(
            AuraConfig::default(),
            Box::new(Desktop),
            Box::new(Capable),
            Box::new(ManualClock::new()),
        );
        coordinator.prime_capability();
        b.iter(|| {
            for (i, id) in ids.iter().enumerate() {
                black_box(coordinator.request_render(id, Priority((i % 5) as i32)));
            }
            for id in &ids {
                coordinator.release_render(id);
            }
        });
    });

    group.finish();
}

fn bench_quality(c: &mut Criterion) {
    let mut group = c.benchmark_group("Quality");

    group.bench_function("Record 600 frames", |b| {
        b.iter(|| {
            let mut controller = QualityController::new(Default::default());
            for i in 0..600 {
                let ms = if i % 90 < 45 { 14.0 } else { 42.0 };
                black_box(controller.record_frame(ms));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_admission, bench_quality);
criterion_main!(benches);
