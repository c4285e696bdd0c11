use crate::trace::buffer::ThreadBuffer;
use crate::trace::events::TraceClock;
use arc_swap::ArcSwap;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// This thread's buffer in one registry. `alive` tracks the registry, so
/// entries for dropped registries can be pruned from any thread.
struct CachedBuffer {
    registry: u64,
    alive: Weak<()>,
    buffer: Arc<ThreadBuffer>,
}

thread_local! {
    /// This thread's buffer in each live registry it has recorded into.
    /// Almost always a single entry (the global collector).
    static CACHED_BUFFERS: RefCell<SmallVec<[CachedBuffer; 2]>> =
        RefCell::new(SmallVec::new());
}

/// Append-only set of thread buffers, one per thread that has recorded.
///
/// Readers take a snapshot of the current entries without locking. Inserts
/// publish a new snapshot; entries are never removed, so a handle obtained
/// from any snapshot stays valid.
pub struct ThreadRegistry {
    id: u64,
    alive: Arc<()>,
    clock: TraceClock,
    capacity: usize,
    buffers: ArcSwap<Vec<Arc<ThreadBuffer>>>,
}

impl ThreadRegistry {
    pub(crate) fn new(clock: TraceClock, capacity: usize) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            alive: Arc::new(()),
            clock,
            capacity,
            buffers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Run `f` with the calling thread's buffer.
    ///
    /// Returns `None` without running `f` when called from a thread-local
    /// destructor after this thread's buffer cache is gone; the event is
    /// dropped.
    pub(crate) fn with_current<R>(&self, f: impl FnOnce(&ThreadBuffer) -> R) -> Option<R> {
        CACHED_BUFFERS
            .try_with(|cache| {
                if let Some(entry) = cache.borrow().iter().find(|entry| entry.registry == self.id) {
                    return f(&entry.buffer);
                }
                let buffer = self.register_current_thread();
                let mut cache = cache.borrow_mut();
                cache.retain(|entry| entry.alive.strong_count() > 0);
                cache.push(CachedBuffer {
                    registry: self.id,
                    alive: Arc::downgrade(&self.alive),
                    buffer: buffer.clone(),
                });
                drop(cache);
                f(&buffer)
            })
            .ok()
    }

    fn register_current_thread(&self) -> Arc<ThreadBuffer> {
        let buf = Arc::new(ThreadBuffer::for_current_thread(self.clock, self.capacity));
        self.buffers.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(buf.clone());
            next
        });
        tracing::trace!(
            thread_id = buf.thread_id().as_u32(),
            thread_name = buf.thread_name(),
            "registered trace buffer"
        );
        buf
    }

    /// Snapshot of every buffer registered so far, in registration order.
    pub fn snapshot(&self) -> Arc<Vec<Arc<ThreadBuffer>>> {
        self.buffers.load_full()
    }

    pub fn len(&self) -> usize {
        self.buffers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ThreadRegistry {
    fn drop(&mut self) {
        // Drop this thread's cached handle; other threads prune theirs on
        // their next cache miss or on exit.
        let _ = CACHED_BUFFERS.try_with(|cache| {
            if let Ok(mut cache) = cache.try_borrow_mut() {
                cache.retain(|entry| entry.registry != self.id);
            }
        });
    }
}

impl std::fmt::Debug for ThreadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadRegistry")
            .field("id", &self.id)
            .field("threads", &self.len())
            .finish()
    }
}
