use crate::trace::category::CategoryId;
use crate::trace::event_list::EventList;
use crate::trace::events::{DataValue, EventData, Payload, TimeStamp, TraceClock, TraceValue};
use crate::trace::key::{DynamicKey, Key, StaticKey};
use serde::Serialize;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, Ordering};

/// Small process-wide identifier for a recording thread.
///
/// Assigned on the thread's first use and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    pub fn current() -> Self {
        static NEXT_ID: AtomicU32 = AtomicU32::new(1);
        thread_local! {
            static ID: ThreadId = ThreadId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        }
        ID.with(|id| *id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn from_u32(val: u32) -> Self {
        ThreadId(val)
    }
}

/// Get the OS thread ID (tid) of the calling thread via `gettid()`.
#[cfg(target_os = "linux")]
fn current_os_tid() -> Option<u32> {
    // SAFETY: SYS_gettid takes no arguments and always succeeds.
    Some(unsafe { libc::syscall(libc::SYS_gettid) } as u32)
}

#[cfg(not(target_os = "linux"))]
fn current_os_tid() -> Option<u32> {
    None
}

/// Raises the buffer's write flag for the duration of one append.
///
/// Not a lock: the owning thread is the only one that ever raises it, and the
/// drain only ever reads it.
struct WriteGuard<'a> {
    writing: &'a AtomicBool,
}

impl<'a> WriteGuard<'a> {
    fn acquire(writing: &'a AtomicBool) -> Self {
        writing.store(true, Ordering::SeqCst);
        Self { writing }
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.writing.store(false, Ordering::Release);
    }
}

/// Event log for one thread.
///
/// The owning thread appends through the `pub(crate)` recording methods; the
/// drain replaces the active list with [`take_collection_data`](Self::take_collection_data).
///
/// Invariant: `events` always holds a pointer obtained from `Box::into_raw`.
/// A list is mutated only by the owner while `writing` is raised, and only
/// after the owner loaded its pointer from `events`.
pub struct ThreadBuffer {
    thread_id: ThreadId,
    thread_name: Option<String>,
    os_tid: Option<u32>,
    clock: TraceClock,
    capacity: usize,
    writing: AtomicBool,
    events: AtomicPtr<EventList>,
    /// Keys of interpreter frames entered on this thread and not yet returned.
    /// Owner-only, like the active list.
    interpreter_scopes: UnsafeCell<Vec<Key>>,
}

// SAFETY: `interpreter_scopes` is the only field that is not `Sync`. It is
// reached solely through `with_interpreter_scopes`, which runs on the owning
// thread; other threads only touch the atomics and immutable fields.
unsafe impl Sync for ThreadBuffer {}

impl ThreadBuffer {
    /// Create a buffer owned by the calling thread.
    pub(crate) fn for_current_thread(clock: TraceClock, capacity: usize) -> Self {
        Self {
            thread_id: ThreadId::current(),
            thread_name: std::thread::current().name().map(str::to_owned),
            os_tid: current_os_tid(),
            clock,
            capacity,
            writing: AtomicBool::new(false),
            events: AtomicPtr::new(Box::into_raw(Box::new(EventList::with_capacity(capacity)))),
            interpreter_scopes: UnsafeCell::new(Vec::new()),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// OS thread id, where the platform exposes one.
    pub fn os_tid(&self) -> Option<u32> {
        self.os_tid
    }

    /// Run `f` against the active list with the write flag raised.
    fn with_events<R>(&self, f: impl FnOnce(&mut EventList, TimeStamp) -> R) -> R {
        debug_assert_eq!(
            ThreadId::current(),
            self.thread_id,
            "thread buffer written from a thread that does not own it"
        );
        let _guard = WriteGuard::acquire(&self.writing);
        let ptr = self.events.load(Ordering::SeqCst);
        // SAFETY: `ptr` came from `Box::into_raw` and stays allocated until a
        // drain swaps it out and then observes `writing == false`. We raised
        // `writing` before loading `ptr` (both SeqCst), so any drain that
        // swapped after our load sees the flag raised and waits for the guard
        // to drop. Only the owning thread creates a `&mut` to the list.
        let events = unsafe { &mut *ptr };
        f(events, self.clock.now())
    }

    pub(crate) fn begin_scope(&self, key: &'static StaticKey, cat: CategoryId) {
        self.with_events(|events, now| events.emplace(Key::Static(key), cat, now, EventData::Begin));
    }

    pub(crate) fn end_scope(&self, key: &'static StaticKey, cat: CategoryId) {
        self.with_events(|events, now| events.emplace(Key::Static(key), cat, now, EventData::End));
    }

    /// Record `Begin` followed by one `Data` event per pair, under one guard.
    pub(crate) fn begin_scope_with_args(
        &self,
        key: &'static StaticKey,
        cat: CategoryId,
        args: &[(&'static StaticKey, &dyn TraceValue)],
    ) {
        self.with_events(|events, now| {
            events.emplace(Key::Static(key), cat, now, EventData::Begin);
            store_args(events, now, cat, args);
        });
    }

    pub(crate) fn store_args(&self, cat: CategoryId, args: &[(&'static StaticKey, &dyn TraceValue)]) {
        self.with_events(|events, now| store_args(events, now, cat, args));
    }

    pub(crate) fn begin_event(&self, key: &DynamicKey, cat: CategoryId) -> TimeStamp {
        self.with_events(|events, now| {
            let key = events.cache_key(key);
            events.emplace(key, cat, now, EventData::Begin);
            now
        })
    }

    pub(crate) fn end_event(&self, key: &DynamicKey, cat: CategoryId) -> TimeStamp {
        self.with_events(|events, now| {
            let key = events.cache_key(key);
            events.emplace(key, cat, now, EventData::End);
            now
        })
    }

    pub(crate) fn begin_event_at_time(&self, key: &DynamicKey, ms: f64, cat: CategoryId) {
        self.with_events(|events, _| {
            let key = events.cache_key(key);
            events.emplace(key, cat, TimeStamp::from_millis_f64(ms), EventData::Begin);
        });
    }

    pub(crate) fn end_event_at_time(&self, key: &DynamicKey, ms: f64, cat: CategoryId) {
        self.with_events(|events, _| {
            let key = events.cache_key(key);
            events.emplace(key, cat, TimeStamp::from_millis_f64(ms), EventData::End);
        });
    }

    /// Generic append stamped with the current time.
    pub(crate) fn emplace_event(&self, key: Key, data: EventData, cat: CategoryId) {
        self.with_events(|events, now| events.emplace(key, cat, now, data));
    }

    /// Append a `Data` event whose payload is already inline.
    pub(crate) fn store_data(&self, key: &'static StaticKey, payload: Payload, cat: CategoryId) {
        debug_assert!(payload.is_inline());
        self.with_events(|events, now| {
            events.emplace(Key::Static(key), cat, now, EventData::Data(payload))
        });
    }

    /// Copy `value` into the payload store, then append a `Data` event
    /// referencing it.
    pub(crate) fn store_large_data(
        &self,
        key: &'static StaticKey,
        value: DataValue<'_>,
        cat: CategoryId,
    ) {
        self.with_events(|events, now| {
            let payload = events.store_data(value);
            events.emplace(Key::Static(key), cat, now, EventData::Data(payload));
        });
    }

    pub(crate) fn counter_delta(&self, key: &DynamicKey, delta: f64, cat: CategoryId) {
        self.with_events(|events, now| {
            let key = events.cache_key(key);
            events.emplace(key, cat, now, EventData::CounterDelta(delta));
        });
    }

    pub(crate) fn counter_value(&self, key: &DynamicKey, value: f64, cat: CategoryId) {
        self.with_events(|events, now| {
            let key = events.cache_key(key);
            events.emplace(key, cat, now, EventData::CounterValue(value));
        });
    }

    /// Track an interpreter call; records `Begin` when `record` is set.
    pub(crate) fn push_interpreter_scope(&self, key: &DynamicKey, record: bool) {
        let key = self.with_events(|events, now| {
            let key = events.cache_key(key);
            if record {
                events.emplace(key.clone(), CategoryId::DEFAULT, now, EventData::Begin);
            }
            key
        });
        self.with_interpreter_scopes(|scopes| scopes.push(key));
    }

    /// Track an interpreter return; records `End` for the innermost pending
    /// call when `record` is set. Returns without recording on an empty stack.
    pub(crate) fn pop_interpreter_scope(&self, record: bool) {
        let Some(key) = self.with_interpreter_scopes(|scopes| scopes.pop()) else {
            return;
        };
        if record {
            self.emplace_event(key, EventData::End, CategoryId::DEFAULT);
        }
    }

    pub(crate) fn interpreter_depth(&self) -> usize {
        self.with_interpreter_scopes(|scopes| scopes.len())
    }

    fn with_interpreter_scopes<R>(&self, f: impl FnOnce(&mut Vec<Key>) -> R) -> R {
        debug_assert_eq!(
            ThreadId::current(),
            self.thread_id,
            "interpreter stack touched from a thread that does not own it"
        );
        // SAFETY: only the owning thread gets here, and `f` never re-enters
        // the buffer, so this is the only live reference to the stack.
        f(unsafe { &mut *self.interpreter_scopes.get() })
    }

    /// Swap the active list for an empty one and return the old list once no
    /// append is in flight on it. Only the drain calls this.
    pub(crate) fn take_collection_data(&self) -> Box<EventList> {
        let fresh = Box::into_raw(Box::new(EventList::with_capacity(self.capacity)));
        let old = self.events.swap(fresh, Ordering::SeqCst);
        self.wait_for_writer();
        // SAFETY: `old` came from `Box::into_raw`. After the swap the owner
        // can no longer load it, and `wait_for_writer` observed the guard of
        // any append that loaded it before the swap being released.
        unsafe { Box::from_raw(old) }
    }

    /// Discard the active list without producing output.
    pub(crate) fn clear(&self) {
        drop(self.take_collection_data());
    }

    fn wait_for_writer(&self) {
        let mut spins = 0u32;
        while self.writing.load(Ordering::SeqCst) {
            if spins < 64 {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
            spins = spins.saturating_add(1);
        }
    }
}

fn store_args(
    events: &mut EventList,
    now: TimeStamp,
    cat: CategoryId,
    args: &[(&'static StaticKey, &dyn TraceValue)],
) {
    for &(key, value) in args {
        let payload = events.store_data(value.as_data_value());
        events.emplace(Key::Static(key), cat, now, EventData::Data(payload));
    }
}

impl Drop for ThreadBuffer {
    fn drop(&mut self) {
        let ptr = *self.events.get_mut();
        // SAFETY: `&mut self` rules out any writer or drain, and `ptr` came
        // from `Box::into_raw`.
        drop(unsafe { Box::from_raw(ptr) });
    }
}

impl std::fmt::Debug for ThreadBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadBuffer")
            .field("thread_id", &self.thread_id)
            .field("thread_name", &self.thread_name)
            .field("os_tid", &self.os_tid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::events::EventKind;
    use std::time::Instant;

    fn buffer() -> ThreadBuffer {
        ThreadBuffer::for_current_thread(TraceClock::new(Instant::now()), 16)
    }

    fn kinds(list: &EventList) -> Vec<EventKind> {
        list.iter().map(|e| e.kind()).collect()
    }

    #[test]
    fn test_thread_id_is_stable_per_thread() {
        let here = ThreadId::current();
        assert_eq!(here, ThreadId::current());
        let there = std::thread::spawn(ThreadId::current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_buffer_identity() {
        let buf = buffer();
        assert_eq!(buf.thread_id(), ThreadId::current());
        #[cfg(target_os = "linux")]
        assert!(buf.os_tid().is_some());
    }

    #[test]
    fn test_scope_events_in_order() {
        let buf = buffer();
        let key = crate::static_key!("scope");
        buf.begin_scope(key, CategoryId::DEFAULT);
        buf.end_scope(key, CategoryId::DEFAULT);
        let list = buf.take_collection_data();
        assert_eq!(kinds(&list), vec![EventKind::Begin, EventKind::End]);
        assert!(list.events()[0].time() <= list.events()[1].time());
    }

    #[test]
    fn test_take_resets_contents() {
        let buf = buffer();
        buf.emplace_event(
            Key::from(crate::static_key!("c")),
            EventData::CounterValue(1.0),
            CategoryId::DEFAULT,
        );
        assert_eq!(buf.take_collection_data().len(), 1);
        assert!(buf.take_collection_data().is_empty());
    }

    #[test]
    fn test_clear_discards() {
        let buf = buffer();
        buf.begin_event(&DynamicKey::from("x"), CategoryId::DEFAULT);
        buf.clear();
        assert!(buf.take_collection_data().is_empty());
    }

    #[test]
    fn test_guard_released_after_append() {
        let buf = buffer();
        buf.begin_scope(crate::static_key!("g"), CategoryId::DEFAULT);
        assert!(!buf.writing.load(Ordering::SeqCst));
    }

    #[test]
    fn test_begin_scope_with_args_stores_pairs() {
        let buf = buffer();
        let count = crate::static_key!("count");
        let name = crate::static_key!("name");
        buf.begin_scope_with_args(
            crate::static_key!("load"),
            CategoryId::from_u32(3),
            &[(count, &4u32), (name, &"a string longer than eight bytes")],
        );
        let list = buf.take_collection_data();
        assert_eq!(
            kinds(&list),
            vec![EventKind::Begin, EventKind::Data, EventKind::Data]
        );
        assert!(list.iter().all(|e| e.category() == CategoryId::from_u32(3)));
        assert_eq!(list.data_value(&list.events()[1]), Some(DataValue::UInt(4)));
        assert_eq!(
            list.data_value(&list.events()[2]),
            Some(DataValue::Str("a string longer than eight bytes"))
        );
    }

    #[test]
    fn test_at_time_events_use_given_time() {
        let buf = buffer();
        let key = DynamicKey::from("fixture");
        buf.begin_event_at_time(&key, 2.0, CategoryId::DEFAULT);
        buf.end_event_at_time(&key, 5.5, CategoryId::DEFAULT);
        let list = buf.take_collection_data();
        let times: Vec<_> = list.iter().map(|e| e.time().as_nanos()).collect();
        assert_eq!(times, vec![2_000_000, 5_500_000]);
    }

    #[test]
    fn test_dynamic_counters_share_key_allocation() {
        let buf = buffer();
        let key = DynamicKey::from("allocs");
        buf.counter_delta(&key, 1.0, CategoryId::DEFAULT);
        buf.counter_value(&key, 3.0, CategoryId::DEFAULT);
        let list = buf.take_collection_data();
        let (Key::Dynamic(a), Key::Dynamic(b)) = (list.events()[0].key(), list.events()[1].key())
        else {
            panic!("expected dynamic keys");
        };
        assert!(std::sync::Arc::ptr_eq(a, b));
        assert_eq!(
            kinds(&list),
            vec![EventKind::CounterDelta, EventKind::CounterValue]
        );
    }

    #[test]
    fn test_interpreter_stack() {
        let buf = buffer();
        buf.push_interpreter_scope(&DynamicKey::from("outer"), true);
        buf.push_interpreter_scope(&DynamicKey::from("inner"), false);
        assert_eq!(buf.interpreter_depth(), 2);
        buf.pop_interpreter_scope(false);
        buf.pop_interpreter_scope(true);
        buf.pop_interpreter_scope(true);
        assert_eq!(buf.interpreter_depth(), 0);
        let list = buf.take_collection_data();
        let names: Vec<_> = list.iter().map(|e| (e.kind(), e.key().name().to_owned())).collect();
        assert_eq!(
            names,
            vec![
                (EventKind::Begin, "outer".to_owned()),
                (EventKind::End, "outer".to_owned()),
            ]
        );
    }
}
