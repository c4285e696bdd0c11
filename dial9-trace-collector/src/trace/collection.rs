use crate::trace::buffer::ThreadId;
use crate::trace::category::CategoryId;
use crate::trace::event_list::EventList;
use crate::trace::events::{DataValue, Event, EventKind, TimeStamp};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Events drained from one thread.
#[derive(Debug)]
pub struct ThreadEvents {
    thread_id: ThreadId,
    thread_name: Option<String>,
    os_tid: Option<u32>,
    events: Box<EventList>,
}

impl ThreadEvents {
    pub(crate) fn new(
        thread_id: ThreadId,
        thread_name: Option<String>,
        os_tid: Option<u32>,
        events: Box<EventList>,
    ) -> Self {
        Self {
            thread_id,
            thread_name,
            os_tid,
            events,
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// OS thread id of the recording thread, where the platform exposes one.
    pub fn os_tid(&self) -> Option<u32> {
        self.os_tid
    }

    pub fn events(&self) -> &EventList {
        &self.events
    }
}

/// Immutable snapshot of every thread's events at one drain.
///
/// Threads appear in registration order; events within a thread are in the
/// order they were recorded. No order is implied across threads.
#[derive(Debug)]
pub struct TraceCollection {
    label: String,
    collected_at: TimeStamp,
    threads: Vec<ThreadEvents>,
}

impl TraceCollection {
    pub(crate) fn new(label: String, collected_at: TimeStamp, threads: Vec<ThreadEvents>) -> Self {
        Self {
            label,
            collected_at,
            threads,
        }
    }

    /// Label of the collector that produced this collection.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Collector clock reading when the drain finished.
    pub fn collected_at(&self) -> TimeStamp {
        self.collected_at
    }

    pub fn threads(&self) -> impl Iterator<Item = &ThreadEvents> {
        self.threads.iter()
    }

    pub fn thread_ids(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads.iter().map(|t| t.thread_id)
    }

    /// Events drained from `thread`, if it had registered by drain time.
    pub fn events_for(&self, thread: ThreadId) -> Option<&EventList> {
        self.threads
            .iter()
            .find(|t| t.thread_id == thread)
            .map(|t| t.events())
    }

    pub fn thread_name(&self, thread: ThreadId) -> Option<&str> {
        self.threads
            .iter()
            .find(|t| t.thread_id == thread)
            .and_then(|t| t.thread_name())
    }

    pub fn os_tid(&self, thread: ThreadId) -> Option<u32> {
        self.threads
            .iter()
            .find(|t| t.thread_id == thread)
            .and_then(|t| t.os_tid())
    }

    pub fn event_count(&self) -> usize {
        self.threads.iter().map(|t| t.events.len()).sum()
    }

    /// True when no thread recorded anything.
    pub fn is_empty(&self) -> bool {
        self.threads.iter().all(|t| t.events.is_empty())
    }

    /// Walk every thread's events front to back.
    pub fn iterate(&self, visitor: &mut dyn CollectionVisitor) {
        visitor.on_begin_collection();
        for thread in &self.threads {
            visit_thread(thread, thread.events.iter(), visitor);
        }
        visitor.on_end_collection();
    }

    /// Walk every thread's events back to front. Threads are still visited in
    /// registration order.
    pub fn reverse_iterate(&self, visitor: &mut dyn CollectionVisitor) {
        visitor.on_begin_collection();
        for thread in &self.threads {
            visit_thread(thread, thread.events.iter().rev(), visitor);
        }
        visitor.on_end_collection();
    }

    /// Every event with keys and payloads resolved, thread by thread.
    pub fn resolved_events(&self) -> impl Iterator<Item = ResolvedEvent<'_>> {
        self.threads.iter().flat_map(|thread| {
            thread
                .events
                .iter()
                .map(move |event| ResolvedEvent::new(thread.thread_id, event, &thread.events))
        })
    }
}

fn visit_thread<'a>(
    thread: &'a ThreadEvents,
    events: impl Iterator<Item = &'a Event>,
    visitor: &mut dyn CollectionVisitor,
) {
    visitor.on_begin_thread(thread.thread_id);
    for event in events {
        if visitor.accepts_category(event.category()) {
            visitor.on_event(thread.thread_id, event, &thread.events);
        }
    }
    visitor.on_end_thread(thread.thread_id);
}

/// Callbacks for [`TraceCollection::iterate`].
///
/// Events whose category the visitor rejects are skipped.
pub trait CollectionVisitor {
    fn on_begin_collection(&mut self) {}

    fn on_end_collection(&mut self) {}

    fn on_begin_thread(&mut self, _thread: ThreadId) {}

    fn on_end_thread(&mut self, _thread: ThreadId) {}

    fn accepts_category(&self, _category: CategoryId) -> bool {
        true
    }

    /// `events` is the list `event` belongs to, for resolving its payload.
    fn on_event(&mut self, thread: ThreadId, event: &Event, events: &EventList);
}

/// One event with everything a consumer needs to render it.
///
/// NOTE: the `Serialize` impl is for convenience of writing JSON; it is not a
/// stable interchange format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEvent<'a> {
    pub thread: ThreadId,
    pub key: &'a str,
    pub category: CategoryId,
    pub kind: EventKind,
    #[serde(rename = "time_ns")]
    pub time: TimeStamp,
    #[serde(rename = "start_ns", skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeStamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<DataValue<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<f64>,
}

impl<'a> ResolvedEvent<'a> {
    fn new(thread: ThreadId, event: &'a Event, events: &'a EventList) -> Self {
        Self {
            thread,
            key: event.key().name(),
            category: event.category(),
            kind: event.kind(),
            time: event.time(),
            start: event.start_time(),
            value: events.data_value(event),
            counter: event.counter_value(),
        }
    }
}

/// Receives each collection as it is published.
///
/// Called synchronously on the thread running
/// [`create_collection`](crate::trace::TraceCollector::create_collection).
pub trait CollectionListener: Send + Sync {
    fn collection_available(&self, collection: &Arc<TraceCollection>);
}

impl<F> CollectionListener for F
where
    F: Fn(&Arc<TraceCollection>) + Send + Sync,
{
    fn collection_available(&self, collection: &Arc<TraceCollection>) {
        self(collection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn CollectionListener>)>>,
}

impl Listeners {
    pub(crate) fn subscribe(&self, listener: Arc<dyn CollectionListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().unwrap().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Deliver to a copy of the listener list so listeners may subscribe or
    /// unsubscribe from inside the callback.
    pub(crate) fn publish(&self, collection: &Arc<TraceCollection>) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener.collection_available(collection);
        }
    }
}
