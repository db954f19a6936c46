//! Integration test utilities for the gateway client
//!
//! Shards run against an in-memory gateway: every connection attempt hands
//! the test a [`MockSocket`] it can script from the server side.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
