use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use freqvalve::{CheckOptions, Static, Throttle, Valve};
use std::hint::black_box;
use std::time::Duration;

fn benchmark_lazy_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("lazy_check");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(10));

    // Bucket stays full, every call is dropped
    group.bench_function("saturated_unkeyed", |b| {
        let mut throttle = Static::new();
        let options = CheckOptions::new();
        let mut counter = 0u64;

        b.iter(|| {
            counter += 1;
            let left = throttle
                .check(
                    black_box(Duration::from_secs(3600)),
                    black_box(100),
                    black_box(counter),
                    &options,
                )
                .unwrap();

            black_box(left)
        });
    });

    // Entries expire as fast as they come in
    group.bench_function("zero_delay_churn", |b| {
        let mut throttle = Static::new();
        let options = CheckOptions::new();

        b.iter(|| {
            let left = throttle
                .check(black_box(Duration::ZERO), black_box(10), black_box(1u8), &options)
                .unwrap();

            black_box(left)
        });
    });

    group.finish();
}

fn benchmark_keyed_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_scan");
    group.throughput(Throughput::Elements(1));

    // Cost of the key predicate across growing buckets
    for tracked in [10u64, 100, 1000] {
        group.bench_with_input(format!("tracked_{tracked}"), &tracked, |b, &tracked| {
            let mut throttle = Static::new();
            let fill = CheckOptions::new().bypass(true);
            for value in 0..tracked {
                throttle
                    .check(Duration::from_secs(3600), 0, value % 10, &fill)
                    .unwrap();
            }

            let is_seven = |value: &u64| *value == 7;
            let options = CheckOptions::new().key(&is_seven);

            b.iter(|| {
                let left = throttle
                    .check(
                        black_box(Duration::from_secs(3600)),
                        black_box(1),
                        black_box(7),
                        &options,
                    )
                    .unwrap();

                black_box(left)
            });
        });
    }

    group.finish();
}

fn benchmark_valve_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("valve_check");
    group.throughput(Throughput::Elements(1));

    // Dropped calls never reach the scheduler
    group.bench_function("saturated_threaded", |b| {
        let mut valve = Valve::threaded();
        let options = CheckOptions::new();
        for value in 0..10u64 {
            valve
                .check(Duration::from_secs(3600), 10, value, &options)
                .unwrap();
        }

        b.iter(|| {
            let left = valve
                .check(
                    black_box(Duration::from_secs(3600)),
                    black_box(10),
                    black_box(99),
                    &options,
                )
                .unwrap();

            black_box(left)
        });
    });

    // Admission cost, including spawning the removal task
    group.bench_function("admitted_on_runtime", |b| {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let options = CheckOptions::new();

        b.iter_batched(
            || Valve::new(freqvalve::LoopScheduler::new(runtime.handle().clone())),
            |mut valve| {
                let left = valve
                    .check(
                        black_box(Duration::from_secs(1)),
                        black_box(1),
                        black_box(1u64),
                        &options,
                    )
                    .unwrap();

                black_box(left)
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_lazy_check,
    benchmark_keyed_scan,
    benchmark_valve_check
);
criterion_main!(benches);
