//! `Traced<F>` future wrapper that records a scope around every poll.

use crate::trace::{CategoryId, StaticKey, TraceCollector};
use pin_project_lite::pin_project;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Collector a `Traced<F>` records into.
#[derive(Clone, Debug)]
pub enum TracedHandle {
    Global,
    Shared(Arc<TraceCollector>),
}

impl Deref for TracedHandle {
    type Target = TraceCollector;

    fn deref(&self) -> &TraceCollector {
        match self {
            TracedHandle::Global => TraceCollector::global(),
            TracedHandle::Shared(collector) => collector,
        }
    }
}

impl From<Arc<TraceCollector>> for TracedHandle {
    fn from(collector: Arc<TraceCollector>) -> Self {
        TracedHandle::Shared(collector)
    }
}

pin_project! {
    /// Future wrapper that records `Begin`/`End` under one key for every poll
    /// of the inner future.
    ///
    /// Each poll is a separate scope, so a future that yields N times shows up
    /// as N+1 spans on whichever threads polled it.
    pub struct Traced<F> {
        #[pin]
        inner: F,
        handle: TracedHandle,
        key: &'static StaticKey,
        category: CategoryId,
    }
}

impl<F> Traced<F> {
    /// Record into the global collector.
    pub fn new(inner: F, key: &'static StaticKey, category: CategoryId) -> Self {
        Self::with_handle(inner, TracedHandle::Global, key, category)
    }

    pub fn with_handle(
        inner: F,
        handle: impl Into<TracedHandle>,
        key: &'static StaticKey,
        category: CategoryId,
    ) -> Self {
        Self {
            inner,
            handle: handle.into(),
            key,
            category,
        }
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

/// Ends the poll scope even if the inner poll panics.
struct PollScope<'a> {
    collector: &'a TraceCollector,
    key: &'static StaticKey,
    category: CategoryId,
}

impl Drop for PollScope<'_> {
    fn drop(&mut self) {
        self.collector.end_scope(self.key, self.category);
    }
}

impl<F: Future> Future for Traced<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let collector: &TraceCollector = this.handle;
        if !collector.is_enabled() {
            return this.inner.poll(cx);
        }

        collector.begin_scope(*this.key, *this.category);
        let _scope = PollScope {
            collector,
            key: *this.key,
            category: *this.category,
        };
        this.inner.poll(cx)
    }
}

/// Adds [`traced`](TraceFutureExt::traced) to every future.
pub trait TraceFutureExt: Future + Sized {
    fn traced(self, key: &'static StaticKey, category: CategoryId) -> Traced<Self> {
        Traced::new(self, key, category)
    }

    fn traced_in(
        self,
        collector: Arc<TraceCollector>,
        key: &'static StaticKey,
        category: CategoryId,
    ) -> Traced<Self> {
        Traced::with_handle(self, collector, key, category)
    }
}

impl<F: Future> TraceFutureExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_key;
    use crate::trace::EventKind;
    use std::task::Waker;

    /// Returns `Pending` `n` times before completing.
    struct YieldN(usize);

    impl Future for YieldN {
        type Output = &'static str;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            if self.0 == 0 {
                Poll::Ready("done")
            } else {
                self.0 -= 1;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    fn poll_to_completion<F: Future>(fut: F) -> F::Output {
        let mut fut = std::pin::pin!(fut);
        let mut cx = Context::from_waker(Waker::noop());
        loop {
            if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
                return out;
            }
        }
    }

    #[test]
    fn test_each_poll_is_a_scope() {
        let collector = Arc::new(TraceCollector::new("traced"));
        collector.set_enabled(true);
        let fut = YieldN(2).traced_in(collector.clone(), static_key!("yield"), CategoryId::DEFAULT);
        assert_eq!(poll_to_completion(fut), "done");

        let collection = collector.create_collection();
        let kinds: Vec<_> = collection
            .threads()
            .flat_map(|t| t.events().iter())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds.len(), 6);
        assert!(
            kinds
                .chunks(2)
                .all(|pair| pair == [EventKind::Begin, EventKind::End])
        );
    }

    #[test]
    fn test_disabled_passes_through() {
        let collector = Arc::new(TraceCollector::new("traced"));
        let fut = Traced::with_handle(YieldN(1), collector.clone(), static_key!("x"), CategoryId::DEFAULT);
        assert_eq!(poll_to_completion(fut), "done");
        assert_eq!(collector.thread_count(), 0);
    }
}
