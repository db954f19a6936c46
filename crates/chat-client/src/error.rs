//! Client error types

use std::time::Duration;

use chat_common::{Classify, ConfigError, ErrorKind};
use chat_core::DomainError;
use chat_gateway::GatewayError;
use chat_rest::RestError;

pub type ClientResult<T> = Result<T, ClientError>;

/// Any failure surfaced by the client facade
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// `GET /gateway/bot` answered without a usable URL
    #[error("Gateway lookup returned no url")]
    GatewayLookup,

    #[error("No matching {event} event within {after:?}")]
    WaitTimeout { event: String, after: Duration },

    #[error("Event queue is closed")]
    EventQueueClosed,
}

impl ClientError {
    /// Whether retrying cannot help
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind().is_terminal()
    }
}

impl Classify for ClientError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::GatewayLookup => ErrorKind::Client,
            Self::Rest(e) => e.kind(),
            Self::Gateway(e) => e.kind(),
            Self::Domain(DomainError::FetchFailed(_)) => ErrorKind::Transient,
            Self::Domain(_) => ErrorKind::Protocol,
            Self::WaitTimeout { .. } => ErrorKind::Transient,
            Self::EventQueueClosed => ErrorKind::Shutdown,
        }
    }
}
