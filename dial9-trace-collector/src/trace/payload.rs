//! Out-of-line storage for event payloads wider than one machine word.

use serde::Serialize;

/// Reference to bytes held by a [`PayloadStore`].
///
/// Only meaningful against the store it was returned by; drains move a store
/// together with its events so references stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PayloadRef {
    offset: usize,
    len: usize,
}

impl PayloadRef {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Append-only byte area owned by one event list.
#[derive(Debug, Default)]
pub struct PayloadStore {
    bytes: Vec<u8>,
}

impl PayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `data` into the store.
    pub fn store(&mut self, data: &[u8]) -> PayloadRef {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(data);
        PayloadRef {
            offset,
            len: data.len(),
        }
    }

    /// Bytes previously stored under `r`.
    ///
    /// # Panics
    /// If `r` did not come from this store.
    pub fn get(&self, r: PayloadRef) -> &[u8] {
        &self.bytes[r.offset..r.offset + r.len]
    }

    /// Total bytes held.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}
