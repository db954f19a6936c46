//! Model store trait - the model-factory/cache collaborator

use serde_json::Value;

use super::model::{Model, Shared};
use crate::error::DomainError;

/// Keyed storage for one model type.
///
/// `factory` is create-or-update-and-return: an existing entry is patched in
/// place so every holder of the `Shared` handle observes the change.
pub trait ModelStore<T: Model>: Send + Sync {
    /// Get a cached model
    fn get(&self, key: &T::Key) -> Option<Shared<T>>;

    /// Insert or replace a model
    fn set(&self, key: T::Key, model: Shared<T>);

    /// Remove a model, returning it if it was present
    fn delete(&self, key: &T::Key) -> Option<Shared<T>>;

    /// Create a model from `raw`, or patch the cached one with the same key
    fn factory(&self, raw: &Value) -> Result<Shared<T>, DomainError>;

    /// Number of cached models
    fn len(&self) -> usize;

    /// Snapshot of every cached handle
    fn values(&self) -> Vec<Shared<T>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has(&self, key: &T::Key) -> bool {
        self.get(key).is_some()
    }
}
