//! `tokio-tungstenite` connector

use std::borrow::Cow;

use async_trait::async_trait;
use futures::future;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::{CloseFrame, Connector, FrameSink, FrameStream, WsFrame};
use crate::error::{GatewayError, GatewayResult};

/// Connector over TLS WebSockets
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> GatewayResult<(FrameSink, FrameStream)> {
        let (socket, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| GatewayError::Connect(e.to_string()))?;

        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = socket.split();

        let sink = sink
            .sink_map_err(|e| GatewayError::Connect(e.to_string()))
            .with(|frame: WsFrame| future::ready(Ok::<_, GatewayError>(into_message(frame))));

        let stream = stream.filter_map(|message| future::ready(from_message(message)));

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

fn into_message(frame: WsFrame) -> Message {
    match frame {
        WsFrame::Text(text) => Message::Text(text),
        WsFrame::Binary(bytes) => Message::Binary(bytes),
        WsFrame::Close(close) => Message::Close(close.map(|c| WsCloseFrame {
            code: WsCloseCode::from(c.code),
            reason: Cow::Owned(c.reason),
        })),
    }
}

fn from_message(
    message: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<GatewayResult<WsFrame>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(WsFrame::Text(text))),
        Ok(Message::Binary(bytes)) => Some(Ok(WsFrame::Binary(bytes))),
        Ok(Message::Close(close)) => Some(Ok(WsFrame::Close(close.map(|c| {
            CloseFrame::new(u16::from(c.code), c.reason.into_owned())
        })))),
        // Pings are answered by tungstenite itself
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(GatewayError::Connect(e.to_string()))),
    }
}
