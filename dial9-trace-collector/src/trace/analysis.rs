use crate::trace::buffer::ThreadId;
use crate::trace::category::CategoryId;
use crate::trace::collection::{CollectionVisitor, TraceCollection};
use crate::trace::event_list::EventList;
use crate::trace::events::{Event, EventData, EventKind, TimeStamp};
use crate::trace::key::Key;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
enum CounterUpdate {
    Delta(f64),
    Value(f64),
}

/// Folds counter events into a running value per key.
///
/// Samples from all threads are merged by timestamp once the walk finishes.
/// A `CounterValue` resets the running value; a `CounterDelta` adds to it.
#[derive(Debug, Default)]
pub struct CounterAccumulator {
    category: Option<CategoryId>,
    pending: Vec<(TimeStamp, Key, CounterUpdate)>,
    series: HashMap<Key, Vec<(TimeStamp, f64)>>,
}

impl CounterAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accumulate counters recorded under `category`.
    pub fn with_category(category: CategoryId) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    /// Convenience for `collection.iterate(&mut accumulator)`.
    pub fn accumulate(collection: &TraceCollection) -> Self {
        let mut acc = Self::new();
        collection.iterate(&mut acc);
        acc
    }

    /// Running value after each update, in timestamp order.
    pub fn series(&self, name: &str) -> Option<&[(TimeStamp, f64)]> {
        self.series
            .iter()
            .find(|(key, _)| key.name() == name)
            .map(|(_, series)| series.as_slice())
    }

    /// Final value of the counter named `name`.
    pub fn total(&self, name: &str) -> Option<f64> {
        self.series(name)
            .and_then(|series| series.last())
            .map(|&(_, value)| value)
    }

    /// Final value of every counter, sorted by key name.
    pub fn totals(&self) -> Vec<(&Key, f64)> {
        let mut totals: Vec<_> = self
            .series
            .iter()
            .filter_map(|(key, series)| series.last().map(|&(_, v)| (key, v)))
            .collect();
        totals.sort_by(|a, b| a.0.name().cmp(b.0.name()));
        totals
    }
}

impl CollectionVisitor for CounterAccumulator {
    fn on_begin_collection(&mut self) {
        self.pending.clear();
    }

    fn on_end_collection(&mut self) {
        // Stable so same-timestamp updates from one thread keep their order.
        self.pending.sort_by_key(|(time, _, _)| *time);
        for (time, key, update) in self.pending.drain(..) {
            let series = self.series.entry(key).or_default();
            let current = series.last().map_or(0.0, |&(_, v)| v);
            let next = match update {
                CounterUpdate::Delta(delta) => current + delta,
                CounterUpdate::Value(value) => value,
            };
            series.push((time, next));
        }
    }

    fn accepts_category(&self, category: CategoryId) -> bool {
        self.category.is_none_or(|only| only == category)
    }

    fn on_event(&mut self, _thread: ThreadId, event: &Event, _events: &EventList) {
        let update = match *event.data() {
            EventData::CounterDelta(delta) => CounterUpdate::Delta(delta),
            EventData::CounterValue(value) => CounterUpdate::Value(value),
            _ => return,
        };
        self.pending.push((event.time(), event.key().clone(), update));
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScopeStats {
    pub count: usize,
    pub total_ns: u64,
    pub max_ns: u64,
}

impl ScopeStats {
    fn add(&mut self, duration: u64) {
        self.count += 1;
        self.total_ns += duration;
        self.max_ns = self.max_ns.max(duration);
    }

    pub fn mean_ns(&self) -> f64 {
        if self.count > 0 {
            self.total_ns as f64 / self.count as f64
        } else {
            0.0
        }
    }
}

/// Per-key durations from `Timespan` events and matched `Begin`/`End` pairs.
///
/// Pairs are matched per thread, innermost first. An `End` whose key differs
/// from the innermost open `Begin` is counted in `unmatched` and skipped.
#[derive(Debug, Default)]
pub struct ScopeSummary {
    pub scopes: HashMap<Key, ScopeStats>,
    pub unmatched: usize,
    open: Vec<(Key, TimeStamp)>,
}

impl ScopeSummary {
    pub fn summarize(collection: &TraceCollection) -> Self {
        let mut summary = Self::default();
        collection.iterate(&mut summary);
        summary
    }

    pub fn get(&self, name: &str) -> Option<&ScopeStats> {
        self.scopes
            .iter()
            .find(|(key, _)| key.name() == name)
            .map(|(_, stats)| stats)
    }

    /// Scopes sorted by total time, longest first.
    pub fn by_total_time(&self) -> Vec<(&Key, &ScopeStats)> {
        let mut scopes: Vec<_> = self.scopes.iter().collect();
        scopes.sort_by(|a, b| b.1.total_ns.cmp(&a.1.total_ns));
        scopes
    }
}

impl CollectionVisitor for ScopeSummary {
    fn on_begin_thread(&mut self, _thread: ThreadId) {
        self.open.clear();
    }

    fn on_end_thread(&mut self, _thread: ThreadId) {
        self.unmatched += self.open.len();
        self.open.clear();
    }

    fn on_event(&mut self, _thread: ThreadId, event: &Event, _events: &EventList) {
        match event.kind() {
            EventKind::Begin => self.open.push((event.key().clone(), event.time())),
            EventKind::End => {
                let matched = self.open.last().is_some_and(|(key, _)| key == event.key());
                match self.open.pop() {
                    Some((key, start)) if matched => {
                        let duration = event.time().saturating_sub(start);
                        self.scopes.entry(key).or_default().add(duration);
                    }
                    Some(open) => {
                        self.open.push(open);
                        self.unmatched += 1;
                    }
                    None => self.unmatched += 1,
                }
            }
            EventKind::Timespan => {
                if let Some(start) = event.start_time() {
                    let duration = event.time().saturating_sub(start);
                    self.scopes
                        .entry(event.key().clone())
                        .or_default()
                        .add(duration);
                }
            }
            EventKind::Data | EventKind::CounterDelta | EventKind::CounterValue => {}
        }
    }
}

/// Print scope and counter statistics for a collection to stdout.
pub fn print_summary(collection: &TraceCollection) {
    let scopes = ScopeSummary::summarize(collection);
    let counters = CounterAccumulator::accumulate(collection);

    println!("\n=== {} ===", collection.label());
    println!("Threads: {}", collection.thread_ids().count());
    println!("Events: {}", collection.event_count());

    if !scopes.scopes.is_empty() {
        println!("\n=== Scopes (by total time) ===");
        for (key, stats) in scopes.by_total_time() {
            println!(
                "  {}: {} calls, total {:.2}µs, avg {:.2}µs, max {:.2}µs",
                key,
                stats.count,
                stats.total_ns as f64 / 1000.0,
                stats.mean_ns() / 1000.0,
                stats.max_ns as f64 / 1000.0,
            );
        }
        if scopes.unmatched > 0 {
            println!("  ({} unmatched begin/end events)", scopes.unmatched);
        }
    }

    let totals = counters.totals();
    if !totals.is_empty() {
        println!("\n=== Counters ===");
        for (key, total) in totals {
            println!("  {}: {}", key, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::collection::ThreadEvents;
    use std::sync::Arc;

    fn thread(id: u32, entries: &[(&str, u64, EventData)]) -> ThreadEvents {
        let mut list = EventList::new();
        for (name, time, data) in entries {
            list.emplace(
                Key::Dynamic(Arc::from(*name)),
                CategoryId::DEFAULT,
                TimeStamp::from_nanos(*time),
                *data,
            );
        }
        ThreadEvents::new(ThreadId::from_u32(id), None, None, Box::new(list))
    }

    fn collection(threads: Vec<ThreadEvents>) -> TraceCollection {
        TraceCollection::new("test".into(), TimeStamp::ZERO, threads)
    }

    #[test]
    fn test_counter_values_then_deltas() {
        let c = collection(vec![thread(
            1,
            &[
                ("hp", 1, EventData::CounterValue(5.0)),
                ("hp", 2, EventData::CounterValue(7.0)),
                ("hp", 3, EventData::CounterDelta(2.0)),
                ("hp", 4, EventData::CounterDelta(2.0)),
            ],
        )]);
        let acc = CounterAccumulator::accumulate(&c);
        let values: Vec<f64> = acc.series("hp").unwrap().iter().map(|&(_, v)| v).collect();
        assert_eq!(values, vec![5.0, 7.0, 9.0, 11.0]);
        assert_eq!(acc.total("hp"), Some(11.0));
    }

    #[test]
    fn test_counters_merge_threads_by_time() {
        let c = collection(vec![
            thread(1, &[("n", 10, EventData::CounterValue(100.0))]),
            thread(
                2,
                &[
                    ("n", 5, EventData::CounterDelta(1.0)),
                    ("n", 20, EventData::CounterDelta(1.0)),
                ],
            ),
        ]);
        let acc = CounterAccumulator::accumulate(&c);
        assert_eq!(
            acc.series("n").unwrap(),
            &[
                (TimeStamp::from_nanos(5), 1.0),
                (TimeStamp::from_nanos(10), 100.0),
                (TimeStamp::from_nanos(20), 101.0),
            ]
        );
        assert!(acc.total("missing").is_none());
    }

    #[test]
    fn test_counter_category_filter() {
        let mut list = EventList::new();
        list.emplace(
            Key::Dynamic(Arc::from("a")),
            CategoryId::from_u32(1),
            TimeStamp::from_nanos(1),
            EventData::CounterDelta(3.0),
        );
        list.emplace(
            Key::Dynamic(Arc::from("b")),
            CategoryId::from_u32(2),
            TimeStamp::from_nanos(2),
            EventData::CounterDelta(4.0),
        );
        let c = collection(vec![ThreadEvents::new(
            ThreadId::from_u32(1),
            None,
            None,
            Box::new(list),
        )]);
        let mut acc = CounterAccumulator::with_category(CategoryId::from_u32(2));
        c.iterate(&mut acc);
        let totals: Vec<_> = acc.totals().into_iter().map(|(k, v)| (k.name().to_owned(), v)).collect();
        assert_eq!(totals, vec![("b".to_owned(), 4.0)]);
    }

    #[test]
    fn test_scope_summary_pairs_and_timespans() {
        let c = collection(vec![
            thread(
                1,
                &[
                    ("frame", 0, EventData::Begin),
                    ("draw", 10, EventData::Begin),
                    ("draw", 30, EventData::End),
                    ("frame", 100, EventData::End),
                    ("stray", 110, EventData::End),
                    ("open", 120, EventData::Begin),
                ],
            ),
            thread(
                2,
                &[(
                    "draw",
                    50,
                    EventData::Timespan {
                        start: TimeStamp::from_nanos(10),
                    },
                )],
            ),
        ]);
        let summary = ScopeSummary::summarize(&c);
        assert_eq!(
            summary.get("frame"),
            Some(&ScopeStats {
                count: 1,
                total_ns: 100,
                max_ns: 100
            })
        );
        assert_eq!(
            summary.get("draw"),
            Some(&ScopeStats {
                count: 2,
                total_ns: 60,
                max_ns: 40
            })
        );
        assert_eq!(summary.get("draw").unwrap().mean_ns(), 30.0);
        assert_eq!(summary.unmatched, 2);
        assert_eq!(summary.by_total_time()[0].0.name(), "frame");
    }
}
