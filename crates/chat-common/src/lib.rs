//! # chat-common
//!
//! Shared utilities including configuration, the error taxonomy, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    ClientConfig, ConfigError, Environment, EventsConfig, GatewayConfig, RestConfig,
    SnapshotPolicy,
};
pub use error::{Classify, ErrorKind};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_from_env, try_init_tracing,
    try_init_tracing_with_config, TracingConfig, TracingError,
};
