//! Criterion micro-benchmarks for arena push, rewind, and block reuse.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use strata_arena::{Arena, ArenaConfig};
use strata_bench::{mixed_sizes, push_many, reference_profile, stress_profile};
use strata_platform::OsMemory;
use strata_test_utils::CountingProvider;

/// Benchmark: create and drop an arena with the default profile.
fn bench_arena_create(c: &mut Criterion) {
    c.bench_function("arena_create_default", |b| {
        b.iter(|| {
            let arena = Arena::new(reference_profile());
            black_box(arena.position());
        });
    });
}

/// Benchmark: 10K small pushes within one committed block, then clear.
fn bench_push_small(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_small");
    group.throughput(Throughput::Elements(10_000));
    let mut arena = Arena::new(reference_profile());
    group.bench_function("16b_align8", |b| {
        b.iter(|| {
            black_box(push_many(&arena, 10_000, 16, 8));
            arena.clear();
        });
    });
    group.finish();
}

/// Benchmark: the same push loop on tiny blocks, where every round
/// chains blocks taken from the free list.
fn bench_push_with_reuse(c: &mut Criterion) {
    let provider = CountingProvider::new(OsMemory::new().with_large_page_size(4096));
    let mut arena = Arena::with_provider(stress_profile(), provider);
    // Warm the free list.
    push_many(&arena, 10_000, 16, 8);
    arena.clear();
    let warm = arena.provider().stats().reserve_calls;

    c.bench_function("push_with_block_reuse", |b| {
        b.iter(|| {
            black_box(push_many(&arena, 10_000, 16, 8));
            arena.clear();
        });
    });
    assert_eq!(arena.provider().stats().reserve_calls, warm, "replay reserved new blocks");
}

/// Benchmark: zeroed typed allocations of mixed sizes.
fn bench_alloc_zeroed_mixed(c: &mut Criterion) {
    let mut arena = Arena::new(reference_profile());
    c.bench_function("alloc_zeroed_mixed", |b| {
        b.iter(|| {
            for (size, _) in mixed_sizes(1_000) {
                black_box(arena.alloc_zeroed::<u8>(size));
            }
            arena.clear();
        });
    });
}

/// Benchmark: nested scratch scopes, the common temporary-allocation pattern.
fn bench_scratch_nesting(c: &mut Criterion) {
    let mut arena = Arena::new(reference_profile());
    c.bench_function("scratch_nested_3", |b| {
        b.iter(|| {
            let mut outer = arena.scratch_begin();
            black_box(outer.alloc_slice_fill(64, 1u32));
            let mut mid = outer.scratch_begin();
            black_box(mid.alloc_slice_fill(64, 2u32));
            let inner = mid.scratch_begin();
            black_box(inner.alloc_str("scratch"));
        });
    });
}

/// Benchmark: first-time growth on a cold arena with small blocks.
fn bench_cold_growth(c: &mut Criterion) {
    c.bench_function("cold_growth_1mb", |b| {
        b.iter_batched(
            || Arena::with_provider(ArenaConfig::new(65_536, 4096), OsMemory::new().with_large_page_size(4096)),
            |arena| {
                black_box(push_many(&arena, 256, 4096, 16));
                arena
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_arena_create,
    bench_push_small,
    bench_push_with_reuse,
    bench_alloc_zeroed_mixed,
    bench_scratch_nesting,
    bench_cold_growth
);
criterion_main!(benches);
