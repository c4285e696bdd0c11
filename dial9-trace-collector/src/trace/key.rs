//! Event keys: compile-time interned [`StaticKey`]s and runtime [`DynamicKey`]s.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Key data known at compile time. Declare with [`static_key!`](crate::static_key).
#[derive(Debug)]
pub struct StaticKey {
    name: &'static str,
    file: &'static str,
    line: u32,
}

impl StaticKey {
    pub const fn new(name: &'static str, file: &'static str, line: u32) -> Self {
        Self { name, file, line }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn file(&self) -> &'static str {
        self.file
    }

    pub const fn line(&self) -> u32 {
        self.line
    }
}

/// Declare a `static` [`StaticKey`] at the call site and evaluate to a
/// `&'static` reference to it.
///
/// ```
/// use dial9_trace_collector::static_key;
///
/// let key = static_key!("Mesh::tessellate");
/// assert_eq!(key.name(), "Mesh::tessellate");
/// ```
#[macro_export]
macro_rules! static_key {
    ($name:expr) => {{
        static KEY: $crate::trace::key::StaticKey =
            $crate::trace::key::StaticKey::new($name, file!(), line!());
        &KEY
    }};
}

/// A key whose name is only known at runtime.
///
/// Recording a dynamic key interns its name into the recording thread's
/// event list, so repeated use on one thread shares a single allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DynamicKey {
    name: Box<str>,
}

impl DynamicKey {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&str> for DynamicKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for DynamicKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// The key stored in a recorded event.
///
/// Equality and hashing go by name, so a static and a dynamic key with the
/// same text compare equal.
#[derive(Clone)]
pub enum Key {
    Static(&'static StaticKey),
    Dynamic(Arc<str>),
}

impl Key {
    pub fn name(&self) -> &str {
        match self {
            Key::Static(key) => key.name(),
            Key::Dynamic(name) => name,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Key::Static(_))
    }
}

impl From<&'static StaticKey> for Key {
    fn from(key: &'static StaticKey) -> Self {
        Key::Static(key)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Static(key) => write!(f, "Static({:?})", key.name()),
            Key::Dynamic(name) => write!(f, "Dynamic({name:?})"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_key_macro_records_location() {
        let key = crate::static_key!("parse");
        assert_eq!(key.name(), "parse");
        assert!(key.file().ends_with("key.rs"));
        assert!(key.line() > 0);
    }

    #[test]
    fn test_static_key_macro_is_interned_per_site() {
        fn site() -> &'static StaticKey {
            crate::static_key!("site")
        }
        assert!(std::ptr::eq(site(), site()));
    }

    #[test]
    fn test_key_equality_by_name() {
        let a = Key::from(crate::static_key!("draw"));
        let b = Key::Dynamic(Arc::from("draw"));
        let c = Key::Dynamic(Arc::from("other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_static());
        assert!(!b.is_static());
        assert_eq!(b.to_string(), "draw");
    }

    #[test]
    fn test_dynamic_key_from() {
        let a = DynamicKey::from("x");
        let b = DynamicKey::from(String::from("x"));
        assert_eq!(a, b);
        assert_eq!(a.name(), "x");
    }
}
