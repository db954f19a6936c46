//! JSON encoding

use super::Encoding;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::GatewayPayload;
use crate::transport::WsFrame;

/// Text frames carrying JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoding;

impl Encoding for JsonEncoding {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, payload: &GatewayPayload) -> GatewayResult<WsFrame> {
        serde_json::to_string(payload)
            .map(WsFrame::Text)
            .map_err(|e| GatewayError::Protocol(format!("unable to encode payload: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> GatewayResult<GatewayPayload> {
        serde_json::from_slice(bytes)
            .map_err(|e| GatewayError::Protocol(format!("unable to decode payload: {e}")))
    }
}
