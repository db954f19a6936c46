//! Socket transport
//!
//! Shards talk to the gateway through a `Connector`, which yields a frame sink
//! and a frame stream. The production connector wraps `tokio-tungstenite`;
//! tests plug in an in-memory socket.

mod tungstenite;

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

use crate::error::{GatewayError, GatewayResult};

pub use self::tungstenite::TungsteniteConnector;

/// Close frame as seen by the shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A data or close frame; control frames are handled by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text(String),
    Binary(Vec<u8>),
    Close(Option<CloseFrame>),
}

impl WsFrame {
    /// Raw bytes of a data frame
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Binary(bytes) => Some(bytes),
            Self::Close(_) => None,
        }
    }
}

/// Outbound half of a connection
pub type FrameSink = Pin<Box<dyn Sink<WsFrame, Error = GatewayError> + Send>>;

/// Inbound half of a connection
pub type FrameStream = Pin<Box<dyn Stream<Item = GatewayResult<WsFrame>> + Send>>;

/// Opens gateway sockets
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `url`, returning the split socket
    async fn connect(&self, url: &str) -> GatewayResult<(FrameSink, FrameStream)>;
}
