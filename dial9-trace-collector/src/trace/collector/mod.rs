mod builder;
mod interpreter;

pub use builder::{
    ConfigError, DEFAULT_LABEL, ENV_CAPACITY, ENV_ENABLED, ENV_LABEL, TraceCollectorBuilder,
};
pub use interpreter::{InterpreterPhase, InterpreterTraceInfo};

use crate::trace::category::{CategoryId, CategoryRegistry};
use crate::trace::collection::{
    CollectionListener, ListenerId, Listeners, ThreadEvents, TraceCollection,
};
use crate::trace::events::{EventData, TimeStamp, TraceClock, TraceValue};
use crate::trace::key::{DynamicKey, Key, StaticKey};
use crate::trace::registry::ThreadRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Key argument accepted by the counter recording calls.
///
/// Static keys go straight into the event; dynamic keys are resolved through
/// the recording thread's key cache first.
#[derive(Debug, Clone, Copy)]
pub enum CounterKey<'a> {
    Static(&'static StaticKey),
    Dynamic(&'a DynamicKey),
}

impl From<&'static StaticKey> for CounterKey<'_> {
    fn from(key: &'static StaticKey) -> Self {
        CounterKey::Static(key)
    }
}

impl<'a> From<&'a DynamicKey> for CounterKey<'a> {
    fn from(key: &'a DynamicKey) -> Self {
        CounterKey::Dynamic(key)
    }
}

/// A `(key, value)` pair recorded as one `Data` event.
pub type DataArg<'a> = (&'static StaticKey, &'a dyn TraceValue);

/// Records events from any thread into per-thread buffers and drains them
/// into [`TraceCollection`]s.
///
/// Every method takes `&self` and may be called from any thread, concurrently
/// with [`create_collection`](Self::create_collection). While disabled, every
/// recording call returns after a single flag check. Calls made from a
/// thread-local destructor after the thread's buffer cache is gone are
/// dropped.
///
/// Use [`TraceCollector::global`] for the process-wide instance, or build an
/// isolated one with [`TraceCollectorBuilder`].
pub struct TraceCollector {
    enabled: AtomicBool,
    interpreter_tracing: AtomicBool,
    label: String,
    clock: TraceClock,
    registry: ThreadRegistry,
    listeners: Listeners,
    categories: CategoryRegistry,
}

static GLOBAL: OnceLock<TraceCollector> = OnceLock::new();

impl TraceCollector {
    /// A disabled collector with default settings and the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self::from_parts(
            label.into(),
            false,
            crate::trace::event_list::DEFAULT_CAPACITY,
            Instant::now(),
        )
    }

    pub fn builder() -> TraceCollectorBuilder {
        TraceCollectorBuilder::new()
    }

    pub(crate) fn from_parts(
        label: String,
        enabled: bool,
        initial_capacity: usize,
        start: Instant,
    ) -> Self {
        let clock = TraceClock::new(start);
        tracing::debug!(%label, enabled, initial_capacity, "creating trace collector");
        Self {
            enabled: AtomicBool::new(enabled),
            interpreter_tracing: AtomicBool::new(false),
            label,
            clock,
            registry: ThreadRegistry::new(clock, initial_capacity),
            listeners: Listeners::default(),
            categories: CategoryRegistry::new(),
        }
    }

    /// The process-wide collector, configured from the environment on first
    /// access (see [`TraceCollectorBuilder::from_env_lenient`]). A malformed
    /// variable is logged and left at its default.
    pub fn global() -> &'static TraceCollector {
        GLOBAL.get_or_init(|| {
            let (builder, errors) = TraceCollectorBuilder::from_env_lenient();
            for error in errors {
                tracing::warn!(%error, "ignoring trace collector environment variable");
            }
            builder
                .build()
                .unwrap_or_else(|_| TraceCollector::new(DEFAULT_LABEL))
        })
    }

    /// Enable or disable recording. Already-recorded events are kept.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::Release);
        if was != enabled {
            tracing::info!(label = %self.label, enabled, "trace collection toggled");
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Instant that timestamp zero corresponds to.
    pub fn start_time(&self) -> Instant {
        self.clock.start()
    }

    /// Current reading of the collector's clock.
    pub fn now(&self) -> TimeStamp {
        self.clock.now()
    }

    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    /// Number of threads that have recorded into this collector.
    pub fn thread_count(&self) -> usize {
        self.registry.len()
    }

    /// Record a begin event for a runtime key.
    ///
    /// Returns the recorded timestamp, or [`TimeStamp::ZERO`] when disabled.
    /// Prefer [`begin_scope`](Self::begin_scope) when the key is static.
    pub fn begin_event(&self, key: &DynamicKey, cat: CategoryId) -> TimeStamp {
        if !self.is_enabled() {
            return TimeStamp::ZERO;
        }
        self.registry
            .with_current(|buf| buf.begin_event(key, cat))
            .unwrap_or(TimeStamp::ZERO)
    }

    /// Record an end event for a runtime key.
    ///
    /// Returns the recorded timestamp, or [`TimeStamp::ZERO`] when disabled.
    pub fn end_event(&self, key: &DynamicKey, cat: CategoryId) -> TimeStamp {
        if !self.is_enabled() {
            return TimeStamp::ZERO;
        }
        self.registry
            .with_current(|buf| buf.end_event(key, cat))
            .unwrap_or(TimeStamp::ZERO)
    }

    /// Record a begin event at `ms` milliseconds on the collector clock instead
    /// of now. For tests and debugging.
    pub fn begin_event_at_time(&self, key: &DynamicKey, ms: f64, cat: CategoryId) {
        if !self.is_enabled() {
            return;
        }
        self.registry
            .with_current(|buf| buf.begin_event_at_time(key, ms, cat));
    }

    /// Record an end event at `ms` milliseconds on the collector clock instead
    /// of now. For tests and debugging.
    pub fn end_event_at_time(&self, key: &DynamicKey, ms: f64, cat: CategoryId) {
        if !self.is_enabled() {
            return;
        }
        self.registry
            .with_current(|buf| buf.end_event_at_time(key, ms, cat));
    }

    /// Record the start of a scope with a static key.
    ///
    /// A single [`scope`](Self::scope) call is cheaper than a begin/end pair.
    #[inline]
    pub fn begin_scope(&self, key: &'static StaticKey, cat: CategoryId) {
        if !self.is_enabled() {
            return;
        }
        self.registry.with_current(|buf| buf.begin_scope(key, cat));
    }

    /// Record the start of a scope followed by one `Data` event per pair.
    pub fn begin_scope_with_args(
        &self,
        key: &'static StaticKey,
        cat: CategoryId,
        args: &[DataArg<'_>],
    ) {
        if !self.is_enabled() {
            return;
        }
        self.registry
            .with_current(|buf| buf.begin_scope_with_args(key, cat, args));
    }

    #[inline]
    pub fn end_scope(&self, key: &'static StaticKey, cat: CategoryId) {
        if !self.is_enabled() {
            return;
        }
        self.registry.with_current(|buf| buf.end_scope(key, cat));
    }

    /// Record a completed span from `start` until now.
    #[inline]
    pub fn scope(&self, key: &'static StaticKey, start: TimeStamp, cat: CategoryId) {
        if !self.is_enabled() {
            return;
        }
        self.registry.with_current(|buf| {
            buf.emplace_event(Key::Static(key), EventData::Timespan { start }, cat)
        });
    }

    /// Record one `Data` event per pair, all with category `cat`.
    ///
    /// Cheaper than calling [`store_data`](Self::store_data) once per value.
    pub fn scope_args(&self, cat: CategoryId, args: &[DataArg<'_>]) {
        if !self.is_enabled() {
            return;
        }
        self.registry.with_current(|buf| buf.store_args(cat, args));
    }

    /// Record a `Data` event.
    ///
    /// Scalars are stored inline in the event; strings and byte slices are
    /// copied into the recording thread's payload store.
    pub fn store_data<V: TraceValue + ?Sized>(
        &self,
        key: &'static StaticKey,
        value: &V,
        cat: CategoryId,
    ) {
        if !self.is_enabled() {
            return;
        }
        let value = value.as_data_value();
        self.registry.with_current(|buf| match value.to_inline() {
            Some(payload) => buf.store_data(key, payload, cat),
            None => buf.store_large_data(key, value, cat),
        });
    }

    /// Record a change to a counter.
    pub fn record_counter_delta<'a>(
        &self,
        key: impl Into<CounterKey<'a>>,
        delta: f64,
        cat: CategoryId,
    ) {
        if !self.is_enabled() {
            return;
        }
        match key.into() {
            CounterKey::Static(key) => self.registry.with_current(|buf| {
                buf.emplace_event(Key::Static(key), EventData::CounterDelta(delta), cat)
            }),
            CounterKey::Dynamic(key) => self
                .registry
                .with_current(|buf| buf.counter_delta(key, delta, cat)),
        };
    }

    /// Record the absolute value of a counter.
    pub fn record_counter_value<'a>(
        &self,
        key: impl Into<CounterKey<'a>>,
        value: f64,
        cat: CategoryId,
    ) {
        if !self.is_enabled() {
            return;
        }
        match key.into() {
            CounterKey::Static(key) => self.registry.with_current(|buf| {
                buf.emplace_event(Key::Static(key), EventData::CounterValue(value), cat)
            }),
            CounterKey::Dynamic(key) => self
                .registry
                .with_current(|buf| buf.counter_value(key, value, cat)),
        };
    }

    /// Drain every thread's events into a new collection, publish it to the
    /// listeners and return it.
    ///
    /// Events recorded before a thread's buffer is swapped are in this
    /// collection; anything later goes to the next one. Recording continues
    /// throughout.
    pub fn create_collection(&self) -> Arc<TraceCollection> {
        let buffers = self.registry.snapshot();
        let mut threads = Vec::with_capacity(buffers.len());
        let mut event_count = 0;
        let mut payload_bytes = 0;
        for buf in buffers.iter() {
            let events = buf.take_collection_data();
            event_count += events.len();
            payload_bytes += events.payload_size();
            threads.push(ThreadEvents::new(
                buf.thread_id(),
                buf.thread_name().map(str::to_owned),
                buf.os_tid(),
                events,
            ));
        }
        let collection = Arc::new(TraceCollection::new(
            self.label.clone(),
            self.clock.now(),
            threads,
        ));
        tracing::debug!(
            label = %self.label,
            threads = buffers.len(),
            events = event_count,
            payload_bytes,
            "created trace collection"
        );
        self.listeners.publish(&collection);
        collection
    }

    /// Discard every pending event without producing a collection.
    pub fn clear(&self) {
        let buffers = self.registry.snapshot();
        for buf in buffers.iter() {
            buf.clear();
        }
        tracing::debug!(label = %self.label, threads = buffers.len(), "cleared trace buffers");
    }

    /// Register `listener` to receive every collection this collector creates.
    pub fn subscribe(&self, listener: Arc<dyn CollectionListener>) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for TraceCollector {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL)
    }
}

impl std::fmt::Debug for TraceCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceCollector")
            .field("label", &self.label)
            .field("enabled", &self.is_enabled())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
