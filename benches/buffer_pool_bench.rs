// Buffer pool performance benchmarks.
// Tests acquire/recycle throughput under the global pool and per-worker
// local pools, and unpooled arena reuse for oversized payloads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use streamforge_runtime::buffer::GlobalBufferPool;

fn bench_global_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("global_acquire_release");

    for segments in [64usize, 1024, 8192] {
        group.bench_with_input(BenchmarkId::from_parameter(segments), &segments, |b, &segments| {
            let pool = GlobalBufferPool::new(segments, 4096);
            b.iter(|| {
                let buf = pool.acquire_blocking().unwrap();
                black_box(&buf);
            });
        });
    }

    group.finish();
}

fn bench_local_pool_acquire(c: &mut Criterion) {
    let pool = GlobalBufferPool::new(4096, 4096);
    let local = pool.create_local_pool(256).unwrap();

    c.bench_function("local_pool_acquire_release", |b| {
        b.iter(|| {
            let buf = local.acquire_blocking().unwrap();
            black_box(&buf);
        });
    });
}

fn bench_concurrent_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_acquire");

    for num_threads in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(num_threads), &num_threads, |b, &num_threads| {
            let pool = GlobalBufferPool::new(4096, 4096);
            b.iter(|| {
                let handles: Vec<_> = (0..num_threads)
                    .map(|_| {
                        let pool = pool.clone();
                        std::thread::spawn(move || {
                            for _ in 0..32 {
                                let buf = pool.acquire_blocking().unwrap();
                                black_box(&buf);
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().ok();
                }
            });
        });
    }

    group.finish();
}

fn bench_unpooled_reuse(c: &mut Criterion) {
    let pool = GlobalBufferPool::new(16, 4096);

    c.bench_function("unpooled_acquire_reuse", |b| {
        b.iter(|| {
            let buf = pool.acquire_unpooled(black_box(64 * 1024)).unwrap();
            black_box(&buf);
        });
    });
}

criterion_group!(benches, bench_global_acquire_release, bench_local_pool_acquire, bench_concurrent_acquire, bench_unpooled_reuse);
criterion_main!(benches);
