//! Payload data structures for control op codes

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hello payload (op=10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Identify payload (op=2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: IdentifyProperties,
    /// Whether individual payloads may arrive compressed
    pub compress: bool,
    /// Member count above which offline members are omitted from GUILD_CREATE
    pub large_threshold: u32,
    /// `[shard_id, shard_count]`
    pub shard: [u32; 2],
    /// Initial presence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Value>,
}

impl IdentifyPayload {
    #[must_use]
    pub fn new(token: impl Into<String>, shard_id: u32, shard_count: u32) -> Self {
        Self {
            token: token.into(),
            properties: IdentifyProperties::new(),
            compress: false,
            large_threshold: 250,
            shard: [shard_id, shard_count],
            presence: None,
        }
    }

    #[must_use]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub fn with_large_threshold(mut self, large_threshold: u32) -> Self {
        self.large_threshold = large_threshold;
        self
    }

    #[must_use]
    pub fn with_presence(mut self, presence: Value) -> Self {
        self.presence = Some(presence);
        self
    }
}

/// Connection properties sent with identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

impl IdentifyProperties {
    /// Properties describing this library on the current platform
    #[must_use]
    pub fn new() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Resume payload (op=6)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence number received
    pub seq: Option<u64>,
}

/// Request Guild Members payload (op=8)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: String,
    /// Username prefix; empty requests every member
    pub query: String,
    /// Maximum members to return; 0 with an empty query means all
    pub limit: u32,
}

impl RequestGuildMembersPayload {
    /// Request every member of a guild
    #[must_use]
    pub fn all(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            query: String::new(),
            limit: 0,
        }
    }
}
