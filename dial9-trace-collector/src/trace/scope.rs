//! RAII scopes that record a single `Timespan` when they end.

use crate::trace::category::CategoryId;
use crate::trace::collector::TraceCollector;
use crate::trace::events::TimeStamp;
use crate::trace::key::StaticKey;

/// Records one `Timespan` from construction to drop.
///
/// If the collector is disabled when the guard is created nothing is recorded,
/// even if it is enabled before the guard drops.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard<'a> {
    collector: &'a TraceCollector,
    key: &'static StaticKey,
    category: CategoryId,
    start: Option<TimeStamp>,
}

impl ScopeGuard<'static> {
    /// Start a scope on the global collector.
    pub fn new(key: &'static StaticKey, category: CategoryId) -> Self {
        ScopeGuard::new_in(TraceCollector::global(), key, category)
    }
}

impl<'a> ScopeGuard<'a> {
    pub fn new_in(
        collector: &'a TraceCollector,
        key: &'static StaticKey,
        category: CategoryId,
    ) -> Self {
        let start = collector.is_enabled().then(|| collector.now());
        Self {
            collector,
            key,
            category,
            start,
        }
    }

    pub fn key(&self) -> &'static StaticKey {
        self.key
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            self.collector.scope(self.key, start, self.category);
        }
    }
}

#[doc(hidden)]
pub fn function_name(marker: &'static str) -> &'static str {
    let name = marker.strip_suffix("::__here").unwrap_or(marker);
    let mut name = name;
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name
}

/// Record a `Timespan` on the global collector covering the rest of the
/// enclosing block.
///
/// ```
/// use dial9_trace_collector::trace_scope;
/// use dial9_trace_collector::trace::CategoryId;
///
/// fn load_level() {
///     trace_scope!("load_level");
///     {
///         trace_scope!("parse", CategoryId::from_name("io"));
///     }
/// }
/// # load_level();
/// ```
#[macro_export]
macro_rules! trace_scope {
    ($name:expr) => {
        let _dial9_scope = $crate::trace::ScopeGuard::new(
            $crate::static_key!($name),
            $crate::trace::CategoryId::DEFAULT,
        );
    };
    ($name:expr, $cat:expr) => {
        let _dial9_scope = $crate::trace::ScopeGuard::new($crate::static_key!($name), $cat);
    };
}

/// Like [`trace_scope!`], keyed by the enclosing function's path.
#[macro_export]
macro_rules! trace_function {
    () => {
        let _dial9_scope = $crate::__function_scope_guard!($crate::trace::CategoryId::DEFAULT);
    };
    ($cat:expr) => {
        let _dial9_scope = $crate::__function_scope_guard!($cat);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __function_scope_guard {
    ($cat:expr) => {{
        fn __here() {}
        static KEY: ::std::sync::OnceLock<$crate::trace::StaticKey> = ::std::sync::OnceLock::new();
        let key = KEY.get_or_init(|| {
            $crate::trace::StaticKey::new(
                $crate::trace::scope::function_name(::std::any::type_name_of_val(&__here)),
                file!(),
                line!(),
            )
        });
        $crate::trace::ScopeGuard::new(key, $cat)
    }};
}
