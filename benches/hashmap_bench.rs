// Chained hash map performance benchmarks.
// Tests insertion, lookup-heavy find_or_insert traffic, and variable-sized
// arena allocation across page boundaries.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use streamforge_runtime::buffer::GlobalBufferPool;
use streamforge_runtime::hashmap::ChainedHashMap;

const ENTRY_SIZE: usize = 32; // 16-byte header + 8-byte key + 8-byte value

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashmap_insert");

    for size in [1_000u64, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let pool = GlobalBufferPool::new((size as usize / 100).max(16), 4096);
                let mut map = ChainedHashMap::init_with_provider(&pool, ENTRY_SIZE, size, 4096).unwrap();
                for k in 0..size {
                    let (entry, _) = map.find_or_insert(k, |_| false, &pool).unwrap();
                    entry.payload_mut()[0..8].copy_from_slice(&k.to_le_bytes());
                    entry.payload_mut()[8..16].copy_from_slice(&(k * 2).to_le_bytes());
                }
                black_box(&map);
            });
        });
    }

    group.finish();
}

fn bench_find_existing(c: &mut Criterion) {
    let pool = GlobalBufferPool::new(256, 4096);
    let mut map = ChainedHashMap::init_with_provider(&pool, ENTRY_SIZE, 100_000, 4096).unwrap();
    for k in 0..100_000u64 {
        let (entry, _) = map.find_or_insert(k, |_| false, &pool).unwrap();
        entry.payload_mut()[0..8].copy_from_slice(&k.to_le_bytes());
    }

    c.bench_function("find_existing_hit", |b| {
        b.iter(|| {
            for k in (0..100_000u64).step_by(97) {
                let (entry, inserted) = map
                    .find_or_insert(black_box(k), |payload| u64::from_le_bytes(payload[0..8].try_into().unwrap()) == k, &pool)
                    .unwrap();
                black_box(&entry);
                debug_assert!(!inserted);
            }
        });
    });
}

fn bench_var_sized_allocation(c: &mut Criterion) {
    c.bench_function("var_sized_allocate", |b| {
        b.iter(|| {
            let pool = GlobalBufferPool::new(16, 4096);
            let mut map = ChainedHashMap::init_with_provider(&pool, ENTRY_SIZE, 16, 4096).unwrap();
            for size in [16usize, 128, 1024, 8192] {
                let span = map.allocate_var_sized(black_box(size), &pool).unwrap();
                map.var_sized_bytes_mut(span).fill(1);
            }
        });
    });
}

criterion_group!(benches, bench_insert, bench_find_existing, bench_var_sized_allocation);
criterion_main!(benches);
