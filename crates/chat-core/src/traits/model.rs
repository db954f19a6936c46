//! Model contract shared by every cached entity

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::DomainError;

/// A cached model shared between the cache, decoders and subscribers.
///
/// Decoders mutate through the lock; subscribers observe the same object.
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap a model for shared ownership
pub fn share<T>(model: T) -> Shared<T> {
    Arc::new(RwLock::new(model))
}

/// Passive data holder built from, and patched by, raw API payloads.
pub trait Model: Clone + Debug + Send + Sync + 'static {
    /// Identity of the model inside its store
    type Key: Clone + Debug + Eq + Hash + Send + Sync + 'static;

    /// Model name used in error messages and logs
    const NAME: &'static str;

    /// The identifier of this instance
    fn key(&self) -> Self::Key;

    /// Read the identifier out of a raw payload without building the model
    fn key_from_raw(raw: &Value) -> Result<Self::Key, DomainError>;

    /// Build a fresh model from a full raw payload
    fn from_raw(raw: &Value) -> Result<Self, DomainError>;

    /// Apply the fields present in `raw`, leaving absent fields untouched
    fn patch(&mut self, raw: &Value);
}
