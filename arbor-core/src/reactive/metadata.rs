//! Per-node metadata.
//!
//! Collaborators sometimes need to tag a node with private state, such as an
//! animation currently driving it. Each collaborator creates its own
//! [`MetaKey`] and stores a typed value under it. The table is owned by the
//! node and dropped with it.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

/// A typed key into a node's metadata table.
///
/// Two keys are distinct even if they share a name; identity comes from the
/// counter, the name is for debugging only.
pub struct MetaKey<V> {
    id: u64,
    name: &'static str,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Send + Sync + 'static> MetaKey<V> {
    /// Create a new unique key.
    pub fn new(name: &'static str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            name,
            _marker: PhantomData,
        }
    }

    /// Debug name given at creation.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<V> Clone for MetaKey<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for MetaKey<V> {}

impl<V> fmt::Debug for MetaKey<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Side table of typed values keyed by [`MetaKey`].
#[derive(Default)]
pub struct Metadata {
    entries: IndexMap<u64, Arc<dyn Any + Send + Sync>>,
}

impl Metadata {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning the previous value if any.
    pub fn insert<V: Send + Sync + 'static>(&mut self, key: MetaKey<V>, value: V) -> Option<Arc<V>> {
        self.entries
            .insert(key.id, Arc::new(value))
            .and_then(|old| old.downcast::<V>().ok())
    }

    /// Look up the value stored under `key`.
    pub fn get<V: Send + Sync + 'static>(&self, key: MetaKey<V>) -> Option<Arc<V>> {
        self.entries
            .get(&key.id)
            .and_then(|value| Arc::clone(value).downcast::<V>().ok())
    }

    /// Remove the value stored under `key`.
    pub fn remove<V: Send + Sync + 'static>(&mut self, key: MetaKey<V>) -> Option<Arc<V>> {
        self.entries
            .shift_remove(&key.id)
            .and_then(|old| old.downcast::<V>().ok())
    }

    /// Check whether anything is stored under `key`.
    pub fn contains<V>(&self, key: MetaKey<V>) -> bool {
        self.entries.contains_key(&key.id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_round_trip() {
        let key: MetaKey<String> = MetaKey::new("label");
        let mut meta = Metadata::new();

        assert!(meta.insert(key, "first".to_string()).is_none());
        assert_eq!(meta.get(key).as_deref(), Some(&"first".to_string()));

        let old = meta.insert(key, "second".to_string());
        assert_eq!(old.as_deref(), Some(&"first".to_string()));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn keys_with_same_name_are_distinct() {
        let a: MetaKey<u32> = MetaKey::new("tween");
        let b: MetaKey<u32> = MetaKey::new("tween");
        let mut meta = Metadata::new();

        meta.insert(a, 1);
        assert!(meta.contains(a));
        assert!(!meta.contains(b));
        assert!(meta.get(b).is_none());
    }

    #[test]
    fn remove_clears_entry() {
        let key: MetaKey<bool> = MetaKey::new("running");
        let mut meta = Metadata::new();
        meta.insert(key, true);

        assert_eq!(meta.remove(key).as_deref(), Some(&true));
        assert!(meta.is_empty());
        assert!(meta.remove(key).is_none());
    }
}
