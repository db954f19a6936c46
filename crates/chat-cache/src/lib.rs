//! # chat-cache
//!
//! In-memory caching layer for the models the gateway keeps up to date.
//!
//! ## Features
//!
//! - **Model stores**: one concurrent [`MemoryStore`] per model type, implementing
//!   the `ModelStore` contract (get / set / delete / factory)
//! - **Client cache**: the [`ClientCache`] aggregate that keeps guild-owned
//!   models and the guild's id sets consistent
//!
//! ## Example
//!
//! ```ignore
//! use chat_cache::ClientCache;
//! use chat_core::ModelStore;
//!
//! let cache = ClientCache::new_shared();
//! let guild = cache.add_guild(&raw_guild, 0)?;
//! let member = cache.members.get(&(guild_id, user_id));
//! ```

mod client_cache;
mod store;

pub use client_cache::{ClientCache, SharedCache};
pub use store::MemoryStore;
