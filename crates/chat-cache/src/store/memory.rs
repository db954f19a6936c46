//! Concurrent in-memory model store

use chat_core::{share, DomainError, Model, ModelStore, Shared};
use dashmap::DashMap;
use serde_json::Value;

/// `DashMap`-backed store for one model type
pub struct MemoryStore<T: Model> {
    entries: DashMap<T::Key, Shared<T>>,
}

impl<T: Model> MemoryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Keys of every cached model
    pub fn keys(&self) -> Vec<T::Key> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop every model matching the predicate, returning how many were removed
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, model| !predicate(&model.read()));
        before - self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<T: Model> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Model> ModelStore<T> for MemoryStore<T> {
    fn get(&self, key: &T::Key) -> Option<Shared<T>> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn set(&self, key: T::Key, model: Shared<T>) {
        self.entries.insert(key, model);
    }

    fn delete(&self, key: &T::Key) -> Option<Shared<T>> {
        self.entries.remove(key).map(|(_, model)| model)
    }

    fn factory(&self, raw: &Value) -> Result<Shared<T>, DomainError> {
        let key = T::key_from_raw(raw)?;

        // Clone the handle out first so the map shard is not locked while
        // the model itself is being patched.
        if let Some(existing) = self.get(&key) {
            existing.write().patch(raw);
            return Ok(existing);
        }

        let model = share(T::from_raw(raw)?);
        let entry = self.entries.entry(key).or_insert_with(|| model.clone());
        Ok(entry.value().clone())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn values(&self) -> Vec<Shared<T>> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }
}

impl<T: Model> std::fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("model", &T::NAME)
            .field("len", &self.entries.len())
            .finish()
    }
}
