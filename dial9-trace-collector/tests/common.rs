use dial9_trace_collector::trace::{
    CollectionListener, EventKind, ThreadId, TraceCollection, TraceCollector,
};
use std::sync::{Arc, Mutex};

/// Install a `tracing` subscriber honouring `RUST_LOG`. Safe to call from
/// every test; only the first call wins.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An enabled collector private to one test.
#[allow(dead_code)]
pub fn enabled_collector(label: &str) -> Arc<TraceCollector> {
    init_logging();
    let collector = TraceCollector::builder()
        .with_label(label)
        .with_enabled(true)
        .build()
        .unwrap();
    Arc::new(collector)
}

/// A [`CollectionListener`] that keeps every collection it is handed.
///
/// ```rust,ignore
/// let listener = CapturingListener::new();
/// collector.subscribe(listener.clone());
/// collector.create_collection();
/// assert_eq!(listener.collections().len(), 1);
/// ```
#[derive(Default)]
#[allow(dead_code)]
pub struct CapturingListener(Mutex<Vec<Arc<TraceCollection>>>);

#[allow(dead_code)]
impl CapturingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn collections(&self) -> Vec<Arc<TraceCollection>> {
        self.0.lock().unwrap().clone()
    }
}

impl CollectionListener for CapturingListener {
    fn collection_available(&self, collection: &Arc<TraceCollection>) {
        self.0.lock().unwrap().push(collection.clone());
    }
}

/// `(kind, key name)` for each event recorded by `thread`, in order.
#[allow(dead_code)]
pub fn thread_events(collection: &TraceCollection, thread: ThreadId) -> Vec<(EventKind, String)> {
    collection
        .events_for(thread)
        .map(|events| {
            events
                .iter()
                .map(|e| (e.kind(), e.key().name().to_owned()))
                .collect()
        })
        .unwrap_or_default()
}
