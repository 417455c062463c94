//! Record store benchmarks
//!
//! Measures the hot paths of the cache:
//! - bulk breed write-through
//! - valid-breed reads
//! - primary image replacement with per-breed trimming
//! - an optimizer pass over an over-budget image table
//!
//! Run with:
//! ```bash
//! cargo bench --bench store_bench
//! ```

use chrono::{Duration, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dogquiz_core::models::{BreedRecord, ImageRecord, ImageType};
use dogquiz_core::{CacheOptimizer, RecordStore};
use std::sync::Arc;

fn breeds(n: usize) -> Vec<BreedRecord> {
    let now = Utc::now();
    (0..n)
        .map(|i| {
            let key = format!("breed{}", i);
            BreedRecord::new(key.clone(), None, key, now, Duration::days(7))
        })
        .collect()
}

fn bench_upsert_breeds(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert_breeds");

    for size in [50, 200, 1000] {
        let records = breeds(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            let store = RecordStore::open_in_memory().unwrap();
            b.iter(|| store.upsert_breeds(records).unwrap());
        });
    }

    group.finish();
}

fn bench_valid_breeds(c: &mut Criterion) {
    let store = RecordStore::open_in_memory().unwrap();
    store.upsert_breeds(&breeds(200)).unwrap();

    c.bench_function("valid_breeds_200", |b| {
        b.iter(|| store.valid_breeds(Utc::now()).unwrap())
    });
}

fn bench_set_primary_image(c: &mut Criterion) {
    let store = RecordStore::open_in_memory().unwrap();
    store.upsert_breeds(&breeds(1)).unwrap();
    let mut n = 0u64;

    c.bench_function("set_primary_image", |b| {
        b.iter(|| {
            n += 1;
            let image = ImageRecord::new(
                "breed0",
                format!("https://images.test/{}.jpg", n),
                ImageType::Primary,
                2048,
                Utc::now(),
                Duration::days(7),
            );
            store.set_primary_image(&image, 5).unwrap()
        })
    });
}

fn bench_optimize(c: &mut Criterion) {
    c.bench_function("optimize_over_budget", |b| {
        b.iter_batched(
            || {
                let store = Arc::new(RecordStore::open_in_memory().unwrap());
                store.upsert_breeds(&breeds(100)).unwrap();
                let now = Utc::now();
                for i in 0..100 {
                    let images: Vec<ImageRecord> = (0..4)
                        .map(|j| {
                            ImageRecord::new(
                                format!("breed{}", i),
                                format!("https://images.test/{}/{}.jpg", i, j),
                                ImageType::Gallery,
                                10_000,
                                now,
                                Duration::days(7),
                            )
                        })
                        .collect();
                    store.upsert_images(&images, 5).unwrap();
                }
                store
            },
            |store| {
                CacheOptimizer::new(store, 200)
                    .optimize(1_000_000, Utc::now())
                    .unwrap()
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_upsert_breeds,
    bench_valid_breeds,
    bench_set_primary_image,
    bench_optimize
);
criterion_main!(benches);
