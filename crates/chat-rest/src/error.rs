//! REST error types

use chat_common::{Classify, ErrorKind};

pub type RestResult<T> = Result<T, RestError>;

/// Outcome of a request that could not be delivered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestError {
    /// Non-429 4xx response, never retried
    #[error("API error {status} (code {code}): {message}")]
    Client {
        status: u16,
        code: i64,
        message: String,
    },

    /// 5xx responses until the retry bound was exhausted
    #[error("Server error {status} after {attempts} attempts")]
    Server { status: u16, attempts: u32 },

    /// Connection failures until the retry bound was exhausted
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request dispatcher was shut down")]
    Shutdown,
}

impl RestError {
    /// HTTP status, if the server answered at all
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl Classify for RestError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Client { .. } => ErrorKind::Client,
            Self::Server { .. } | Self::Transport(_) => ErrorKind::Transient,
            Self::Decode(_) => ErrorKind::Protocol,
            Self::Shutdown => ErrorKind::Shutdown,
        }
    }
}
