//! Error kinds
//!
//! Every crate keeps its own `thiserror` enum. They all map onto one of these
//! kinds so callers can decide between retrying, reconnecting and giving up
//! without matching on crate-specific variants.

use std::fmt;

/// Classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed frame, decode failure, unsupported capability.
    /// Fatal to the current connection, which is then re-established.
    Protocol,
    /// Server-imposed rate limit. Handled by re-queueing, never surfaced.
    RateLimited,
    /// 5xx or dropped connection. Retried up to a bound.
    Transient,
    /// 4xx, bad credentials, non-resumable session. Never retried.
    Client,
    /// Terminal condition for a shard (fatal close code).
    Fatal,
    /// A subscriber callback failed during delivery.
    Subscriber,
    /// The component was shut down while work was pending.
    Shutdown,
}

impl ErrorKind {
    /// Whether the operation may succeed if attempted again
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Protocol | Self::RateLimited | Self::Transient)
    }

    /// Whether the failure ends the affected shard or request for good
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Client | Self::Fatal | Self::Shutdown)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Protocol => "protocol",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Client => "client",
            Self::Fatal => "fatal",
            Self::Subscriber => "subscriber",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Implemented by every error enum in the workspace
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}
