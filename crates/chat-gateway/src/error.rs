//! Gateway errors

use chat_common::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway layer errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Malformed frame, decode failure or corrupt compressed stream
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// A registered strategy cannot run in this build
    #[error("Unsupported capability: {0}")]
    Unsupported(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Gateway closed the connection with fatal code {code}: {reason}")]
    FatalClose { code: u16, reason: String },

    #[error("No token configured")]
    MissingToken,

    #[error("Invalid gateway URL: {0}")]
    UnknownGateway(String),

    #[error("Shard command channel closed")]
    ChannelClosed,

    #[error("Unknown shard: {0}")]
    UnknownShard(u32),

    #[error("Shard count must be at least 1, got {0}")]
    InvalidShardCount(u32),
}

impl GatewayError {
    /// Get a stable error code string for logging
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "PROTOCOL",
            Self::UnsupportedEncoding(_) => "UNSUPPORTED_ENCODING",
            Self::UnsupportedCompression(_) => "UNSUPPORTED_COMPRESSION",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Connect(_) => "CONNECT",
            Self::FatalClose { .. } => "FATAL_CLOSE",
            Self::MissingToken => "MISSING_TOKEN",
            Self::UnknownGateway(_) => "UNKNOWN_GATEWAY",
            Self::ChannelClosed => "CHANNEL_CLOSED",
            Self::UnknownShard(_) => "UNKNOWN_SHARD",
            Self::InvalidShardCount(_) => "INVALID_SHARD_COUNT",
        }
    }
}

impl Classify for GatewayError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Connect(_) => ErrorKind::Transient,
            Self::FatalClose { .. } => ErrorKind::Fatal,
            Self::UnsupportedEncoding(_)
            | Self::UnsupportedCompression(_)
            | Self::Unsupported(_)
            | Self::MissingToken
            | Self::UnknownGateway(_)
            | Self::UnknownShard(_)
            | Self::InvalidShardCount(_) => ErrorKind::Client,
            Self::ChannelClosed => ErrorKind::Shutdown,
        }
    }
}
