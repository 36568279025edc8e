//! Benchmarks for the access policy decision.
//!
//! The decision runs on every keypress of a partial code, so it should stay
//! well under a microsecond even for codes carrying every tag.
//!
//! ```sh
//! cargo bench --bench policy_bench
//! cargo bench --bench policy_bench -- policy_decide/all_tags
//! ```

use chrono::{DateTime, FixedOffset};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use doorkeep_core::{AccessCode, CodeKind, IsoTimestamp};
use doorkeep_storage::policy::{decide, record_admission};
use std::hint::black_box;

fn now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2025-06-10T12:00:00+02:00").expect("valid timestamp")
}

fn scenarios() -> Vec<(&'static str, AccessCode)> {
    let plain = AccessCode::new("1357", "Plain").with_kinds([CodeKind::Active]);

    let mut counted = AccessCode::new("2468", "Counted")
        .with_kinds([CodeKind::Active, CodeKind::Count]);
    counted.max_usage = 10;
    counted.usage = 4;

    let mut all_tags = AccessCode::new("3690", "Everything").with_kinds(CodeKind::ALL);
    all_tags.max_usage = 10;
    all_tags.usage = 4;
    all_tags.validity_hours = 72;
    all_tags.first_use = IsoTimestamp::new("2025-06-09T08:00:00+0200");
    all_tags.valid_from = IsoTimestamp::new("2025-06-01T00:00:00+0200");
    all_tags.expiration = IsoTimestamp::new("2025-07-01T00:00:00+0200");

    let inactive = AccessCode::new("0000", "Rescinded").with_kinds([CodeKind::Count]);

    vec![
        ("plain", plain),
        ("counted", counted),
        ("all_tags", all_tags),
        ("inactive", inactive),
    ]
}

fn bench_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_decide");
    let now = now();

    for (name, code) in scenarios() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &code, |b, code| {
            b.iter(|| black_box(decide(black_box(code), black_box(&now))))
        });
    }

    group.finish();
}

fn bench_record_admission(c: &mut Criterion) {
    let now = now();
    let fresh = AccessCode::new("1357", "Plain").with_kinds([CodeKind::Active]);

    c.bench_function("policy_record_first_admission", |b| {
        b.iter(|| {
            let mut code = fresh.clone();
            record_admission(&mut code, black_box(&now));
            black_box(code)
        })
    });
}

criterion_group!(benches, bench_decide, bench_record_admission);
criterion_main!(benches);
