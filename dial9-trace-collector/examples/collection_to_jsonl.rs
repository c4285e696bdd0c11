//! Record a small multi-threaded workload and write the drained collection
//! as JSONL (one JSON object per event).
//!
//! Usage:
//!   cargo run --example collection_to_jsonl -- [output.jsonl]
//!
//! If output is omitted, writes to stdout. Set `RUST_LOG=debug` to see the
//! collector's own log messages on stderr.

use dial9_trace_collector::trace::{
    CategoryId, CounterAccumulator, DynamicKey, TraceCollector, print_summary,
};
use dial9_trace_collector::{static_key, trace_function};
use std::io::{BufWriter, Write};
use std::sync::Arc;

fn simulate_frame(collector: &TraceCollector, frame: u32) {
    let update = static_key!("update");
    let physics = CategoryId::from_name("physics");
    collector.begin_scope_with_args(update, physics, &[(static_key!("frame"), &frame)]);
    for body in 0..3u32 {
        let start = collector.now();
        std::hint::black_box((0..10_000u64).map(|x| x * u64::from(body)).sum::<u64>());
        collector.scope(static_key!("integrate"), start, physics);
    }
    collector.record_counter_delta(&DynamicKey::from("bodies"), 3.0, physics);
    collector.end_scope(update, physics);
}

fn load_assets() {
    trace_function!(CategoryId::from_name("io"));
    std::thread::sleep(std::time::Duration::from_millis(1));
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let collector = Arc::new(
        TraceCollector::builder()
            .with_label("collection_to_jsonl")
            .with_enabled(true)
            .build()
            .map_err(std::io::Error::other)?,
    );
    collector.categories().register_name("physics");
    collector.categories().register_name("io");

    let workers: Vec<_> = (0..3)
        .map(|i| {
            let collector = collector.clone();
            std::thread::Builder::new()
                .name(format!("sim-{i}"))
                .spawn(move || {
                    for frame in 0..5 {
                        simulate_frame(&collector, frame);
                    }
                })
        })
        .collect::<std::io::Result<_>>()?;
    for worker in workers {
        worker
            .join()
            .map_err(|_| std::io::Error::other("worker panicked"))?;
    }

    // `trace_function!` records into the global collector.
    TraceCollector::global().set_enabled(true);
    load_assets();
    let global = TraceCollector::global().create_collection();

    let collection = collector.create_collection();

    let path = std::env::args().nth(1);
    let out: Box<dyn Write> = if let Some(path) = &path {
        Box::new(std::fs::File::create(path)?)
    } else {
        Box::new(std::io::stdout().lock())
    };
    let mut w = BufWriter::new(out);

    let mut count = 0u64;
    for event in collection.resolved_events().chain(global.resolved_events()) {
        serde_json::to_writer(&mut w, &event).map_err(std::io::Error::other)?;
        w.write_all(b"\n")?;
        count += 1;
    }
    w.flush()?;
    eprintln!("{count} events written");

    let counters = CounterAccumulator::accumulate(&collection);
    eprintln!("bodies integrated: {:?}", counters.total("bodies"));
    if path.is_some() {
        print_summary(&collection);
    }
    Ok(())
}
