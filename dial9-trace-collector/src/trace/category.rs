//! Category identifiers attached to every recorded event.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Small integer tag carried by every event.
///
/// Recording never filters on it; consumers use it to select events at
/// traversal time (see [`CollectionVisitor::accepts_category`]).
///
/// [`CollectionVisitor::accepts_category`]: crate::trace::collection::CollectionVisitor::accepts_category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CategoryId(u32);

impl CategoryId {
    /// Category used when a call site does not name one.
    pub const DEFAULT: CategoryId = CategoryId(0);

    pub const fn from_u32(val: u32) -> Self {
        CategoryId(val)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Stable id derived from a category name (32-bit FNV-1a).
    ///
    /// Usable in `const` context so call sites can hoist the hash.
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash: u32 = 0x811c_9dc5;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(0x0100_0193);
            i += 1;
        }
        CategoryId(hash)
    }
}

/// Maps category ids to the names registered for them.
///
/// More than one name may share an id; lookups return all of them in
/// registration order.
#[derive(Debug, Default)]
pub struct CategoryRegistry {
    names: Mutex<HashMap<CategoryId, Vec<String>>>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        let registry = Self::default();
        registry.register(CategoryId::DEFAULT, "Default");
        registry
    }

    /// Associate `name` with `id`. Registering the same pair twice is a no-op.
    pub fn register(&self, id: CategoryId, name: &str) {
        let mut names = self.names.lock().unwrap();
        let entry = names.entry(id).or_default();
        if !entry.iter().any(|n| n == name) {
            entry.push(name.to_string());
        }
    }

    /// Register `name` under [`CategoryId::from_name`] and return the id.
    pub fn register_name(&self, name: &str) -> CategoryId {
        let id = CategoryId::from_name(name);
        self.register(id, name);
        id
    }

    pub fn names(&self, id: CategoryId) -> Vec<String> {
        self.names
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}
