//! Configuration structs

mod client_config;
mod snapshot;

pub use client_config::{
    ClientConfig, ConfigError, Environment, EventsConfig, GatewayConfig, RestConfig,
};
pub use snapshot::SnapshotPolicy;
