pub mod analysis;
pub mod buffer;
pub mod category;
pub mod collection;
pub mod collector;
pub mod event_list;
pub mod events;
pub mod key;
pub mod payload;
pub mod registry;
pub mod scope;

pub use analysis::{CounterAccumulator, ScopeStats, ScopeSummary, print_summary};
pub use buffer::{ThreadBuffer, ThreadId};
pub use category::{CategoryId, CategoryRegistry};
pub use collection::{
    CollectionListener, CollectionVisitor, ListenerId, ResolvedEvent, ThreadEvents,
    TraceCollection,
};
pub use collector::{
    ConfigError, CounterKey, DataArg, InterpreterPhase, InterpreterTraceInfo, TraceCollector,
    TraceCollectorBuilder,
};
pub use event_list::EventList;
pub use events::{DataValue, Event, EventData, EventKind, Payload, TimeStamp, TraceValue};
pub use key::{DynamicKey, Key, StaticKey};
pub use payload::{PayloadRef, PayloadStore};
pub use scope::ScopeGuard;
