//! Collaborator traits
//!
//! The gateway layer never touches concrete storage. It talks to these traits:
//! - [`Model`]: the passive data contract (`key` + `patch`)
//! - [`ModelStore`]: get / set / delete / factory over one model type
//! - [`ModelFetcher`]: asynchronous look-ups for data a payload only references

mod fetcher;
mod model;
mod store;

pub use fetcher::ModelFetcher;
pub use model::{share, Model, Shared};
pub use store::ModelStore;
