use crate::trace::category::CategoryId;
use crate::trace::events::{DataValue, Event, EventData, Payload, TimeStamp};
use crate::trace::key::{DynamicKey, Key};
use crate::trace::payload::PayloadStore;
use std::collections::HashSet;
use std::sync::Arc;

pub(crate) const DEFAULT_CAPACITY: usize = 1024;

/// Ordered events recorded by one thread, with the storage their keys and
/// out-of-line payloads point into.
///
/// This is the unit a drain swaps out of a thread buffer and moves into a
/// [`TraceCollection`](crate::trace::TraceCollection).
#[derive(Debug)]
pub struct EventList {
    events: Vec<Event>,
    store: PayloadStore,
    /// Interned dynamic key names, one allocation per distinct name.
    keys: HashSet<Arc<str>>,
}

impl Default for EventList {
    fn default() -> Self {
        Self::new()
    }
}

impl EventList {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            store: PayloadStore::new(),
            keys: HashSet::new(),
        }
    }

    pub(crate) fn emplace(
        &mut self,
        key: Key,
        category: CategoryId,
        time: TimeStamp,
        data: EventData,
    ) {
        self.events.push(Event::new(key, category, time, data));
    }

    /// Resolve a dynamic key to the list's interned copy of its name.
    pub(crate) fn cache_key(&mut self, key: &DynamicKey) -> Key {
        if let Some(name) = self.keys.get(key.name()) {
            return Key::Dynamic(name.clone());
        }
        let name: Arc<str> = Arc::from(key.name());
        self.keys.insert(name.clone());
        Key::Dynamic(name)
    }

    /// Turn a value into a payload, copying it into the store when it does
    /// not fit inline.
    pub(crate) fn store_data(&mut self, value: DataValue<'_>) -> Payload {
        match value {
            DataValue::Str(s) => Payload::Str(self.store.store(s.as_bytes())),
            DataValue::Bytes(b) => Payload::Bytes(self.store.store(b)),
            DataValue::Bool(v) => Payload::Bool(v),
            DataValue::Int(v) => Payload::Int(v),
            DataValue::UInt(v) => Payload::UInt(v),
            DataValue::Float(v) => Payload::Float(v),
        }
    }

    /// Read a payload recorded into this list.
    ///
    /// # Panics
    /// If an out-of-line payload was recorded into a different list and
    /// points past the end of this one's store.
    pub fn resolve(&self, payload: &Payload) -> DataValue<'_> {
        match *payload {
            Payload::Bool(v) => DataValue::Bool(v),
            Payload::Int(v) => DataValue::Int(v),
            Payload::UInt(v) => DataValue::UInt(v),
            Payload::Float(v) => DataValue::Float(v),
            Payload::Str(r) => {
                let bytes = self.store.get(r);
                match std::str::from_utf8(bytes) {
                    Ok(s) => DataValue::Str(s),
                    Err(_) => DataValue::Bytes(bytes),
                }
            }
            Payload::Bytes(r) => DataValue::Bytes(self.store.get(r)),
        }
    }

    /// The resolved value of a `Data` event, `None` for other kinds.
    ///
    /// Panics like [`resolve`](Self::resolve) when `event` belongs to
    /// another list.
    pub fn data_value(&self, event: &Event) -> Option<DataValue<'_>> {
        match event.data() {
            EventData::Data(payload) => Some(self.resolve(payload)),
            _ => None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Bytes held out of line for this list's payloads.
    pub fn payload_size(&self) -> usize {
        self.store.size()
    }
}

impl<'a> IntoIterator for &'a EventList {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
