//! Benchmarks for allocsite.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use allocsite::{site_tracker, AllocKind, Malloc, PointerIndex, RawAllocator, SiteAlloc, TrackingConfig};

fn bench_alloc_release(c: &mut Criterion) {
    let alloc = SiteAlloc::with_parts(
        TrackingConfig::default(),
        Malloc,
        allocsite::diagnostics::NullSink,
    );

    let mut group = c.benchmark_group("alloc_release");

    for size in [16usize, 256, 4096] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("tracked", size), &size, |b, &size| {
            let tracker = site_tracker!();
            b.iter(|| {
                let ptr = alloc
                    .allocate(size, None, tracker, AllocKind::HeapAlloc, "bench")
                    .unwrap();
                unsafe { alloc.release(black_box(ptr.as_ptr()), None) };
            })
        });

        // Baseline: the same raw allocator without tracking.
        group.bench_with_input(BenchmarkId::new("raw_malloc", size), &size, |b, &size| {
            b.iter(|| unsafe {
                let ptr = Malloc.raw_alloc(size, None);
                Malloc.raw_free(black_box(ptr));
            })
        });
    }

    group.finish();
}

fn bench_many_live(c: &mut Criterion) {
    let alloc = SiteAlloc::with_parts(
        TrackingConfig::default(),
        Malloc,
        allocsite::diagnostics::NullSink,
    );
    let tracker = site_tracker!();

    let mut group = c.benchmark_group("many_live");

    group.bench_function("alloc_1000_then_release", |b| {
        let mut ptrs = Vec::with_capacity(1000);
        b.iter(|| {
            for _ in 0..1000 {
                ptrs.push(
                    alloc
                        .allocate(64, None, tracker, AllocKind::HeapAlloc, "bench")
                        .unwrap(),
                );
            }
            for ptr in ptrs.drain(..) {
                unsafe { alloc.release(ptr.as_ptr(), None) };
            }
        })
    });

    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(alloc.snapshot()))
    });

    group.finish();
}

fn bench_index(c: &mut Criterion) {
    let index = PointerIndex::with_capacity(1 << 16);
    for i in 0..10_000usize {
        let _ = index.insert((i + 1) * 16, i);
    }

    let mut group = c.benchmark_group("pointer_index");

    group.bench_function("lookup_hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 7) % 10_000;
            black_box(index.lookup((i + 1) * 16))
        })
    });

    group.bench_function("lookup_miss", |b| {
        b.iter(|| black_box(index.lookup(black_box(0xdead_b000))))
    });

    group.bench_function("insert_remove", |b| {
        b.iter(|| {
            let _ = index.insert(0x7fff_0000, 1);
            index.remove(0x7fff_0000)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_alloc_release, bench_many_live, bench_index);
criterion_main!(benches);
