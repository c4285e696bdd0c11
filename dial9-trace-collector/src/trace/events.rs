use crate::trace::category::CategoryId;
use crate::trace::key::Key;
use crate::trace::payload::PayloadRef;
use serde::Serialize;
use std::time::Instant;

/// Clock reading in nanoseconds since the owning collector started.
///
/// `TimeStamp::ZERO` doubles as the "collector was disabled" sentinel returned
/// by [`TraceCollector::begin_event`](crate::trace::TraceCollector::begin_event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct TimeStamp(u64);

impl TimeStamp {
    pub const ZERO: TimeStamp = TimeStamp(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        TimeStamp(nanos)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Convert an elapsed time in milliseconds into a timestamp.
    /// Negative and NaN inputs clamp to zero.
    pub fn from_millis_f64(ms: f64) -> Self {
        TimeStamp((ms * 1_000_000.0).max(0.0) as u64)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, earlier: TimeStamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Monotonic clock shared by a collector and its thread buffers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TraceClock {
    start: Instant,
}

impl TraceClock {
    pub(crate) fn new(start: Instant) -> Self {
        Self { start }
    }

    pub(crate) fn start(&self) -> Instant {
        self.start
    }

    pub(crate) fn now(&self) -> TimeStamp {
        TimeStamp(self.start.elapsed().as_nanos() as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    Begin,
    End,
    Timespan,
    Data,
    CounterDelta,
    CounterValue,
}

/// Payload of a `Data` event.
///
/// Word-sized scalars live inline; text and byte strings live in the owning
/// event list's payload store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(PayloadRef),
    Bytes(PayloadRef),
}

impl Payload {
    pub fn is_inline(&self) -> bool {
        !matches!(self, Payload::Str(_) | Payload::Bytes(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventData {
    Begin,
    End,
    /// A completed span ending at the event's `time`.
    Timespan {
        start: TimeStamp,
    },
    Data(Payload),
    CounterDelta(f64),
    CounterValue(f64),
}

/// One recorded instrumentation event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    key: Key,
    category: CategoryId,
    time: TimeStamp,
    data: EventData,
}

impl Event {
    pub fn new(key: Key, category: CategoryId, time: TimeStamp, data: EventData) -> Self {
        Self {
            key,
            category,
            time,
            data,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn category(&self) -> CategoryId {
        self.category
    }

    /// When the event was recorded. For a timespan this is its end.
    pub fn time(&self) -> TimeStamp {
        self.time
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    pub fn kind(&self) -> EventKind {
        match self.data {
            EventData::Begin => EventKind::Begin,
            EventData::End => EventKind::End,
            EventData::Timespan { .. } => EventKind::Timespan,
            EventData::Data(_) => EventKind::Data,
            EventData::CounterDelta(_) => EventKind::CounterDelta,
            EventData::CounterValue(_) => EventKind::CounterValue,
        }
    }

    /// Start of the span for `Timespan` events.
    pub fn start_time(&self) -> Option<TimeStamp> {
        match self.data {
            EventData::Timespan { start } => Some(start),
            _ => None,
        }
    }

    /// Counter amount for `CounterDelta` / `CounterValue` events.
    pub fn counter_value(&self) -> Option<f64> {
        match self.data {
            EventData::CounterDelta(v) | EventData::CounterValue(v) => Some(v),
            _ => None,
        }
    }
}

/// A data value, either handed to the recorder or read back out of a
/// collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataValue<'a> {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(&'a str),
    Bytes(&'a [u8]),
}

impl DataValue<'_> {
    /// Inline payload for values that fit in one word and are not addresses,
    /// `None` for values that must be copied out of line.
    pub fn to_inline(self) -> Option<Payload> {
        match self {
            DataValue::Bool(v) => Some(Payload::Bool(v)),
            DataValue::Int(v) => Some(Payload::Int(v)),
            DataValue::UInt(v) => Some(Payload::UInt(v)),
            DataValue::Float(v) => Some(Payload::Float(v)),
            DataValue::Str(_) | DataValue::Bytes(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Types that can be recorded as the value of a `Data` event.
pub trait TraceValue {
    fn as_data_value(&self) -> DataValue<'_>;
}

macro_rules! impl_trace_value {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl TraceValue for $ty {
                fn as_data_value(&self) -> DataValue<'_> {
                    DataValue::$variant((*self).into())
                }
            }
        )*
    };
}

impl_trace_value!(Bool: bool);
impl_trace_value!(Int: i8, i16, i32, i64);
impl_trace_value!(UInt: u8, u16, u32, u64);
impl_trace_value!(Float: f32, f64);

impl TraceValue for isize {
    fn as_data_value(&self) -> DataValue<'_> {
        DataValue::Int(*self as i64)
    }
}

impl TraceValue for usize {
    fn as_data_value(&self) -> DataValue<'_> {
        DataValue::UInt(*self as u64)
    }
}

impl TraceValue for str {
    fn as_data_value(&self) -> DataValue<'_> {
        DataValue::Str(self)
    }
}

impl TraceValue for String {
    fn as_data_value(&self) -> DataValue<'_> {
        DataValue::Str(self)
    }
}

impl TraceValue for [u8] {
    fn as_data_value(&self) -> DataValue<'_> {
        DataValue::Bytes(self)
    }
}

impl TraceValue for Vec<u8> {
    fn as_data_value(&self) -> DataValue<'_> {
        DataValue::Bytes(self)
    }
}

impl<T: TraceValue + ?Sized> TraceValue for &T {
    fn as_data_value(&self) -> DataValue<'_> {
        (**self).as_data_value()
    }
}
