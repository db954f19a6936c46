//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;

use super::SnapshotPolicy;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Bot token, sent as `Bot <token>` on REST and in IDENTIFY
    pub token: String,
    #[serde(default)]
    pub env: Environment,
    pub rest: RestConfig,
    pub gateway: GatewayConfig,
    pub events: EventsConfig,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// REST dispatcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Account-wide request budget per second
    #[serde(default = "default_global_per_second")]
    pub global_per_second: u32,
    /// Retries for 5xx responses and transport failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay; doubled on every further attempt
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Buckets idle and empty for this long are dropped
    #[serde(default = "default_bucket_idle_secs")]
    pub bucket_idle_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            global_per_second: default_global_per_second(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            timeout_secs: default_timeout_secs(),
            bucket_idle_secs: default_bucket_idle_secs(),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Protocol version sent as `v`
    #[serde(default = "default_gateway_version")]
    pub version: u8,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// `None` disables transport compression
    #[serde(default = "default_compression")]
    pub compression: Option<String>,
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            version: default_gateway_version(),
            encoding: default_encoding(),
            compression: default_compression(),
            shard_count: default_shard_count(),
            large_threshold: default_large_threshold(),
        }
    }
}

/// Event decoding configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsConfig {
    /// Fetch the full member list of every guild on GUILD_CREATE
    #[serde(default)]
    pub fetch_all_members: bool,
    #[serde(default)]
    pub snapshots: SnapshotPolicy,
}

// Default value functions
fn default_api_base_url() -> String {
    "https://discord.com/api/v6".to_string()
}

fn default_global_per_second() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_bucket_idle_secs() -> u64 {
    60
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg".to_string()
}

fn default_gateway_version() -> u8 {
    6
}

fn default_encoding() -> String {
    "json".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_compression() -> Option<String> {
    Some("zlib-stream".to_string())
}

fn default_shard_count() -> u32 {
    1
}

fn default_large_threshold() -> u32 {
    250
}

impl ClientConfig {
    /// Configuration with defaults for everything but the token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            env: Environment::default(),
            rest: RestConfig::default(),
            gateway: GatewayConfig::default(),
            events: EventsConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CLIENT_TOKEN` is missing or a value fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("CLIENT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("CLIENT_TOKEN"))?;

        let compression = match lookup("GATEWAY_COMPRESSION") {
            Some(value) if value.eq_ignore_ascii_case("none") || value.is_empty() => None,
            Some(value) => Some(value),
            None => default_compression(),
        };

        Ok(Self {
            token,
            env: lookup("APP_ENV")
                .as_deref()
                .and_then(Environment::parse)
                .unwrap_or_default(),
            rest: RestConfig {
                base_url: lookup("API_BASE_URL").unwrap_or_else(default_api_base_url),
                global_per_second: parse_var(&lookup, "REST_GLOBAL_PER_SECOND")?
                    .unwrap_or_else(default_global_per_second),
                max_retries: parse_var(&lookup, "REST_MAX_RETRIES")?
                    .unwrap_or_else(default_max_retries),
                retry_base_ms: parse_var(&lookup, "REST_RETRY_BASE_MS")?
                    .unwrap_or_else(default_retry_base_ms),
                timeout_secs: parse_var(&lookup, "REST_TIMEOUT_SECS")?
                    .unwrap_or_else(default_timeout_secs),
                bucket_idle_secs: parse_var(&lookup, "REST_BUCKET_IDLE_SECS")?
                    .unwrap_or_else(default_bucket_idle_secs),
            },
            gateway: GatewayConfig {
                url: lookup("GATEWAY_URL").unwrap_or_else(default_gateway_url),
                version: default_gateway_version(),
                encoding: lookup("GATEWAY_ENCODING").unwrap_or_else(default_encoding),
                compression,
                shard_count: match parse_var(&lookup, "SHARD_COUNT")? {
                    Some(0) => {
                        return Err(ConfigError::InvalidValue(
                            "SHARD_COUNT",
                            "must be at least 1".to_string(),
                        ))
                    }
                    Some(count) => count,
                    None => default_shard_count(),
                },
                large_threshold: parse_var(&lookup, "LARGE_THRESHOLD")?
                    .unwrap_or_else(default_large_threshold),
            },
            events: EventsConfig {
                fetch_all_members: parse_var(&lookup, "FETCH_ALL_MEMBERS")?.unwrap_or(false),
                snapshots: lookup("DISABLE_SNAPSHOTS")
                    .map(|v| SnapshotPolicy::parse(&v))
                    .unwrap_or_default(),
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
