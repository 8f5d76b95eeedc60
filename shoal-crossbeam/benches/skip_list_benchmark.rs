//! Benchmark comparing shoal skip lists against crossbeam-skiplist:
//! - heap and arena node stores vs SkipMap
//! - unique and duplicate-list value modes
//!
//! Run with: cargo bench --package shoal-crossbeam --bench skip_list_benchmark

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use crossbeam_skiplist::SkipMap;
use mimalloc::MiMalloc;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::thread;

use shoal_core::{NaturalOrder, NodeStore, SkipList, SkipListConfig, ValueMode};
use shoal_crossbeam::EpochGuard;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const OPS_PER_THREAD: usize = 10_000;

type EpochList<S> = SkipList<i64, u64, EpochGuard, S>;

fn new_list<S: NodeStore>(mode: ValueMode) -> Arc<EpochList<S>> {
    Arc::new(SkipList::new(SkipListConfig::new(mode), NaturalOrder).unwrap())
}

/// Per-thread keys, shuffled so inserts do not all land at the tail
fn shuffled_keys(thread: usize, count: usize) -> Vec<i64> {
    let base = (thread * count) as i64;
    let mut keys: Vec<i64> = (0..count as i64).map(|i| base + i).collect();
    keys.shuffle(&mut rand::rng());
    keys
}

// ============================================================================
// Insert-only benchmarks
// ============================================================================

fn bench_shoal_insert<S: NodeStore + 'static>(thread_count: usize, ops_per_thread: usize) {
    let list = new_list::<S>(ValueMode::Unique);
    let handles: Vec<_> = (0..thread_count)
        .map(|t| {
            let list = Arc::clone(&list);
            let keys = shuffled_keys(t, ops_per_thread);
            thread::spawn(move || {
                for key in keys {
                    let _ = list.insert(key, key as u64, false);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_crossbeam_insert(thread_count: usize, ops_per_thread: usize) {
    let map: Arc<SkipMap<i64, u64>> = Arc::new(SkipMap::new());
    let handles: Vec<_> = (0..thread_count)
        .map(|t| {
            let map = Arc::clone(&map);
            let keys = shuffled_keys(t, ops_per_thread);
            thread::spawn(move || {
                for key in keys {
                    map.insert(key, key as u64);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Mixed insert/remove benchmarks (50% insert, 50% remove)
// ============================================================================

fn bench_shoal_mixed<S: NodeStore + 'static>(thread_count: usize, ops_per_thread: usize) {
    let list = new_list::<S>(ValueMode::Unique);

    // Pre-populate with half the keys
    for i in 0..(thread_count * ops_per_thread / 2) {
        let _ = list.insert(i as i64, 0, false);
    }

    let handles: Vec<_> = (0..thread_count)
        .map(|t| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                let base = (t * ops_per_thread) as i64;
                for i in 0..ops_per_thread {
                    if i % 2 == 0 {
                        let _ = list.insert(base + i as i64 + 1_000_000, 0, false);
                    } else {
                        let _ = list.remove_first(&(i as i64 / 2));
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_crossbeam_mixed(thread_count: usize, ops_per_thread: usize) {
    let map: Arc<SkipMap<i64, u64>> = Arc::new(SkipMap::new());

    for i in 0..(thread_count * ops_per_thread / 2) {
        map.insert(i as i64, 0);
    }

    let handles: Vec<_> = (0..thread_count)
        .map(|t| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                let base = (t * ops_per_thread) as i64;
                for i in 0..ops_per_thread {
                    if i % 2 == 0 {
                        map.insert(base + i as i64 + 1_000_000, 0);
                    } else {
                        map.remove(&(i as i64 / 2));
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// High contention benchmark (all threads work on the same keys)
// ============================================================================

fn bench_shoal_contention<S: NodeStore + 'static>(
    mode: ValueMode,
    thread_count: usize,
    ops_per_thread: usize,
) {
    let list = new_list::<S>(mode);

    // Small key range to maximize contention
    let key_range = 100i64;

    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let key = (i as i64) % key_range;
                    if i % 2 == 0 {
                        let _ = list.insert(key, i as u64, false);
                    } else {
                        let _ = list.remove_first(&key);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_crossbeam_contention(thread_count: usize, ops_per_thread: usize) {
    let map: Arc<SkipMap<i64, u64>> = Arc::new(SkipMap::new());
    let key_range = 100i64;

    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let key = (i as i64) % key_range;
                    if i % 2 == 0 {
                        map.insert(key, i as u64);
                    } else {
                        map.remove(&key);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Criterion benchmark groups
// ============================================================================

fn insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_benchmark");

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("shoal_heap", threads), &threads, |b, &t| {
            b.iter(|| bench_shoal_insert::<shoal_core::HeapStore>(black_box(t), OPS_PER_THREAD))
        });
        group.bench_with_input(BenchmarkId::new("shoal_arena", threads), &threads, |b, &t| {
            b.iter(|| bench_shoal_insert::<shoal_core::ArenaStore>(black_box(t), OPS_PER_THREAD))
        });
        group.bench_with_input(BenchmarkId::new("crossbeam", threads), &threads, |b, &t| {
            b.iter(|| bench_crossbeam_insert(black_box(t), OPS_PER_THREAD))
        });
    }

    group.finish();
}

fn mixed_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_benchmark");

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("shoal_heap", threads), &threads, |b, &t| {
            b.iter(|| bench_shoal_mixed::<shoal_core::HeapStore>(black_box(t), OPS_PER_THREAD))
        });
        group.bench_with_input(BenchmarkId::new("crossbeam", threads), &threads, |b, &t| {
            b.iter(|| bench_crossbeam_mixed(black_box(t), OPS_PER_THREAD))
        });
    }

    group.finish();
}

fn contention_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention_benchmark");

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("shoal_unique", threads), &threads, |b, &t| {
            b.iter(|| {
                bench_shoal_contention::<shoal_core::HeapStore>(
                    ValueMode::Unique,
                    black_box(t),
                    OPS_PER_THREAD,
                )
            })
        });
        group.bench_with_input(
            BenchmarkId::new("shoal_duplicate_list", threads),
            &threads,
            |b, &t| {
                b.iter(|| {
                    bench_shoal_contention::<shoal_core::HeapStore>(
                        ValueMode::DuplicateList,
                        black_box(t),
                        OPS_PER_THREAD,
                    )
                })
            },
        );
        group.bench_with_input(BenchmarkId::new("crossbeam", threads), &threads, |b, &t| {
            b.iter(|| bench_crossbeam_contention(black_box(t), OPS_PER_THREAD))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    insert_benchmark,
    mixed_benchmark,
    contention_benchmark
);
criterion_main!(benches);
