//! Telemetry
//!
//! Subscriber setup for binaries. Library crates only emit `tracing` events.

mod tracing_setup;

pub use tracing_setup::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};

use crate::config::Environment;

/// Install the preset for `APP_ENV` (read after loading `.env`)
pub fn try_init_from_env() -> Result<(), TracingError> {
    let _ = dotenvy::dotenv();
    let env = std::env::var("APP_ENV")
        .ok()
        .as_deref()
        .and_then(Environment::parse)
        .unwrap_or_default();
    try_init_tracing_with_config(&TracingConfig::for_environment(env))
}
