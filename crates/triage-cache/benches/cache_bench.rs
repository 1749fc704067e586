//! Criterion benchmarks for the response cache.
//!
//! Measures key identity, predicate sweeps over a full cache, and in-place
//! envelope updates.

use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};

use triage_cache::{CacheConfig, CacheStore, QueryKey, RequestDescriptor, ResponseCache, matches};

const ENTRIES: usize = 2_000;

fn search_key(i: usize) -> QueryKey {
    QueryKey::new(format!("/api/v4/search/{}/", ["alert", "submission"][i % 2]), "POST").with_body(
        &json!({"rows": 25, "offset": i, "fq": ["status:MALICIOUS", format!("owner:user{}", i % 7)]}),
    )
}

fn filled_cache() -> ResponseCache {
    let cache = ResponseCache::new(CacheConfig {
        max_entries: ENTRIES,
        ..CacheConfig::default()
    });
    for i in 0..ENTRIES {
        cache.put(&search_key(i), json!({"api_response": {"items": [i]}}));
    }
    cache
}

fn bench_key_identity(c: &mut Criterion) {
    let key = search_key(42);
    let opaque = key.to_value();
    c.bench_function("query_key/stable_id", |b| {
        b.iter(|| black_box(&key).stable_id());
    });
    c.bench_function("query_key/matches", |b| {
        b.iter(|| matches(black_box(&opaque), &|r| r.url.contains("alert")));
    });
}

fn bench_sweeps(c: &mut Criterion) {
    c.bench_function("cache/invalidate_half_2000", |b| {
        b.iter_batched(
            filled_cache,
            |cache| {
                let removed = cache.invalidate(
                    Box::new(|r: &RequestDescriptor| r.url.contains("submission")),
                    Duration::ZERO,
                );
                black_box(removed);
            },
            criterion::BatchSize::LargeInput,
        );
    });

    let cache = filled_cache();
    c.bench_function("cache/update_owner_2000", |b| {
        b.iter(|| {
            cache.update(
                &|r| r.body_field("fq").and_then(Value::as_array).is_some_and(|fq| fq.len() == 2),
                &mut |cached| {
                    let mut next = cached.clone();
                    next["api_response"]["owner"] = json!("analyst");
                    next
                },
            )
        });
    });
}

criterion_group!(benches, bench_key_identity, bench_sweeps);
criterion_main!(benches);
