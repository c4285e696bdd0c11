use criterion::{Criterion, black_box, criterion_group, criterion_main};
use dial9_trace_collector::static_key;
use dial9_trace_collector::trace::{CategoryId, DynamicKey, TraceCollector};

fn bench_disabled(c: &mut Criterion) {
    let collector = TraceCollector::new("bench");
    let key = static_key!("disabled");

    c.bench_function("disabled_begin_end_scope", |b| {
        b.iter(|| {
            collector.begin_scope(black_box(key), CategoryId::DEFAULT);
            collector.end_scope(black_box(key), CategoryId::DEFAULT);
        });
    });
}

fn bench_enabled(c: &mut Criterion) {
    let collector = TraceCollector::new("bench");
    collector.set_enabled(true);
    let key = static_key!("enabled");
    let dynamic = DynamicKey::from("dynamic counter");

    // Drain every so often so the buffer does not grow without bound.
    let mut recorded = 0u32;
    let mut drain = |collector: &TraceCollector| {
        recorded += 1;
        if recorded % 100_000 == 0 {
            collector.clear();
        }
    };

    c.bench_function("enabled_begin_end_scope", |b| {
        b.iter(|| {
            collector.begin_scope(black_box(key), CategoryId::DEFAULT);
            collector.end_scope(black_box(key), CategoryId::DEFAULT);
            drain(&collector);
        });
    });

    c.bench_function("enabled_timespan", |b| {
        b.iter(|| {
            let start = collector.now();
            collector.scope(black_box(key), start, CategoryId::DEFAULT);
            drain(&collector);
        });
    });

    c.bench_function("enabled_store_inline", |b| {
        b.iter(|| {
            collector.store_data(key, black_box(&1234u64), CategoryId::DEFAULT);
            drain(&collector);
        });
    });

    c.bench_function("enabled_store_string", |b| {
        b.iter(|| {
            collector.store_data(key, black_box("a short label that is not inline"), CategoryId::DEFAULT);
            drain(&collector);
        });
    });

    c.bench_function("enabled_dynamic_counter", |b| {
        b.iter(|| {
            collector.record_counter_delta(&dynamic, black_box(1.0), CategoryId::DEFAULT);
            drain(&collector);
        });
    });
}

fn bench_drain(c: &mut Criterion) {
    let collector = TraceCollector::new("bench");
    collector.set_enabled(true);
    let key = static_key!("drain");

    c.bench_function("create_collection_1k_events", |b| {
        b.iter(|| {
            for _ in 0..1_000 {
                collector.begin_scope(key, CategoryId::DEFAULT);
            }
            black_box(collector.create_collection());
        });
    });
}

criterion_group!(benches, bench_disabled, bench_enabled, bench_drain);
criterion_main!(benches);
