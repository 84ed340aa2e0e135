use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use serialbox::{
    AllocationRequest, RequestContext, SerialBox,
    discovery::{Discovery, RegionRegistry},
    generator::carve_out,
    model::{NewPool, NewSequentialRegion, Response, ResponseType, SequentialRegion},
};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};

// Number of allocations per benchmark iteration (split across threads for
// contended runs).
const TOTAL_REQUESTS: usize = 4096;

/// A fresh instance with one pool backed by a region large enough for
/// every request of an iteration.
fn fresh(sizes: u64) -> SerialBox {
    let serialbox = SerialBox::in_memory().unwrap();
    let admin = serialbox.admin();
    admin
        .create_pool(NewPool::new("Bench", "bench").request_threshold(0))
        .unwrap();
    admin
        .create_region(NewSequentialRegion::new(
            "Bench",
            "bench",
            "bench",
            1,
            TOTAL_REQUESTS as u64 * sizes + 1,
        ))
        .unwrap();
    serialbox
}

fn bench_carve_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("carve_out");
    group.throughput(Throughput::Elements(TOTAL_REQUESTS as u64));

    group.bench_function(format!("elems/{}", TOTAL_REQUESTS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let mut region =
                    SequentialRegion::new("Bench", "bench", "bench", 1, 1, u64::MAX - 1);
                for _ in 0..TOTAL_REQUESTS {
                    let mut response =
                        Response::draft(ResponseType::Sequential, "bench", "bench", 8, None);
                    carve_out(&mut region, &mut response, 8).unwrap();
                    black_box(response);
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

fn bench_total_remaining(c: &mut Criterion) {
    let serialbox = fresh(1);
    for i in 0..32u64 {
        let start = 1_000_000 * (i + 1);
        serialbox
            .admin()
            .create_region(NewSequentialRegion::new(
                format!("Extra {i}"),
                format!("extra-{i}"),
                "bench",
                start,
                start + 999,
            ))
            .unwrap();
    }
    let discovery = Discovery::new(Arc::clone(serialbox.store()), RegionRegistry::default());

    c.bench_function("discovery/total_remaining/regions/33", |b| {
        b.iter(|| black_box(discovery.total_remaining("bench").unwrap()));
    });
}

/// Benchmarks allocations served one after another from a single thread.
fn bench_allocate_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate/sequential");
    group.throughput(Throughput::Elements(TOTAL_REQUESTS as u64));

    for size in [1u64, 100] {
        group.bench_function(format!("elems/{}/size/{}", TOTAL_REQUESTS, size), |b| {
            b.iter_custom(|iters| {
                let ctx = RequestContext::new("127.0.0.1");
                let request = AllocationRequest::new("bench", size);
                let mut elapsed = core::time::Duration::ZERO;
                for _ in 0..iters {
                    let serialbox = fresh(size);
                    let start = Instant::now();
                    for _ in 0..TOTAL_REQUESTS {
                        black_box(serialbox.allocate(&ctx, &request).unwrap());
                    }
                    elapsed += start.elapsed();
                }
                elapsed
            });
        });
    }

    group.finish();
}

/// Benchmarks one shared instance hammered by several threads; every
/// thread competes for the same region.
fn bench_allocate_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate/contended");
    let max_threads = num_cpus::get().max(2);

    for thread_count in [1, 2, 4, 8, 16].into_iter().filter(|n| *n <= max_threads) {
        let requests_per_thread = TOTAL_REQUESTS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_REQUESTS as u64));
        group.bench_function(
            format!("elems/{}/threads/{}", TOTAL_REQUESTS, thread_count),
            |b| {
                b.iter_custom(|iters| {
                    let mut elapsed = core::time::Duration::ZERO;
                    for _ in 0..iters {
                        let serialbox = fresh(1);
                        let barrier = Arc::new(Barrier::new(thread_count + 1));
                        let start = Instant::now();
                        scope(|s| {
                            for _ in 0..thread_count {
                                let serialbox = &serialbox;
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    let ctx = RequestContext::new("127.0.0.1");
                                    let request = AllocationRequest::new("bench", 1);
                                    barrier.wait();
                                    for _ in 0..requests_per_thread {
                                        black_box(serialbox.allocate(&ctx, &request).unwrap());
                                    }
                                });
                            }
                            barrier.wait();
                        });
                        elapsed += start.elapsed();
                    }
                    elapsed
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_carve_out,
    bench_total_remaining,
    bench_allocate_sequential,
    bench_allocate_contended,
);

criterion_main!(benches);
