//! Criterion benchmarks for stable serialization hot paths.
//!
//! Covers: flat request bodies, nested filter bodies, and wide objects whose
//! keys arrive in reverse order.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Map, Value, json};

use triage_core::canonical::{stable_stringify, stable_stringify_value};

fn search_body() -> Value {
    json!({
        "rows": 25,
        "offset": 0,
        "query": "status:MALICIOUS",
        "filters": ["label:phishing", "NOT(owner:admin)", "!(priority:LOW)"],
        "track_total_hits": true,
        "group_by": "file.sha256",
    })
}

fn nested_body() -> Value {
    json!({
        "params": {
            "tc": "4d",
            "tc_start": "2024-01-02T03:04:05.000Z",
            "sort": {"reporting_ts": "desc", "owner": "asc"},
        },
        "fields": [{"name": "sha256", "boost": 2.0}, {"name": "md5"}],
        "meta": null,
    })
}

fn wide_body(width: usize) -> Value {
    let mut map = Map::new();
    for i in (0..width).rev() {
        map.insert(format!("field_{i:04}"), Value::from(i));
    }
    Value::Object(map)
}

fn bench_stable_stringify(c: &mut Criterion) {
    let flat = search_body();
    let nested = nested_body();
    let wide = wide_body(256);

    c.bench_function("stable_stringify/flat", |b| {
        b.iter(|| stable_stringify_value(black_box(&flat)));
    });
    c.bench_function("stable_stringify/nested", |b| {
        b.iter(|| stable_stringify_value(black_box(&nested)));
    });
    c.bench_function("stable_stringify/wide_256", |b| {
        b.iter(|| stable_stringify_value(black_box(&wide)));
    });
    c.bench_function("stable_stringify/serialize_struct", |b| {
        let pairs: Vec<(&str, u32)> = vec![("rows", 25), ("offset", 50)];
        b.iter(|| stable_stringify(black_box(&pairs)));
    });
}

criterion_group!(benches, bench_stable_stringify);
criterion_main!(benches);
