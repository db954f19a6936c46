//! Gateway payload format
//!
//! Every frame on the socket carries one `GatewayPayload`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    HelloPayload, IdentifyPayload, OpCode, RequestGuildMembersPayload, ResumePayload,
};

/// Gateway payload envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Operation code
    pub op: OpCode,

    /// Event data; `null` is meaningful for heartbeats so it is always written
    #[serde(default)]
    pub d: Value,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event type (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    /// Bare payload for an op code
    #[must_use]
    pub fn new(op: OpCode, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    // === Client Payloads ===

    /// Create a Heartbeat payload (op=1) carrying the last sequence seen
    #[must_use]
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self::new(OpCode::Heartbeat, sequence.map_or(Value::Null, Value::from))
    }

    /// Create an Identify payload (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::new(OpCode::Identify, serde_json::to_value(payload).unwrap_or_default())
    }

    /// Create a Resume payload (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::new(OpCode::Resume, serde_json::to_value(payload).unwrap_or_default())
    }

    /// Create a Status Update payload (op=3)
    #[must_use]
    pub fn status_update(presence: Value) -> Self {
        Self::new(OpCode::StatusUpdate, presence)
    }

    /// Create a Voice State Update payload (op=4)
    ///
    /// `channel_id` of `None` leaves the voice channel.
    #[must_use]
    pub fn voice_state_update(
        guild_id: &str,
        channel_id: Option<&str>,
        self_mute: bool,
        self_deaf: bool,
    ) -> Self {
        Self::new(
            OpCode::VoiceStateUpdate,
            json!({
                "guild_id": guild_id,
                "channel_id": channel_id,
                "self_mute": self_mute,
                "self_deaf": self_deaf,
            }),
        )
    }

    /// Create a Request Guild Members payload (op=8)
    #[must_use]
    pub fn request_guild_members(payload: &RequestGuildMembersPayload) -> Self {
        Self::new(
            OpCode::RequestGuildMembers,
            serde_json::to_value(payload).unwrap_or_default(),
        )
    }

    // === Server Payloads ===

    /// Create a Dispatch payload (op=0)
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: data,
            s: Some(sequence),
            t: Some(event_type.into()),
        }
    }

    /// Create a Hello payload (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::new(
            OpCode::Hello,
            serde_json::to_value(HelloPayload { heartbeat_interval }).unwrap_or_default(),
        )
    }

    /// Create a Heartbeat ACK payload (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::new(OpCode::HeartbeatAck, Value::Null)
    }

    /// Create a Reconnect payload (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::new(OpCode::Reconnect, Value::Null)
    }

    /// Create an Invalid Session payload (op=9)
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::new(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Accessors ===

    /// Event type of a dispatch
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.t.as_deref()
    }

    /// Parse the Hello data
    #[must_use]
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// Parse the Identify data
    #[must_use]
    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        if self.op != OpCode::Identify {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// Parse the Resume data
    #[must_use]
    pub fn as_resume(&self) -> Option<ResumePayload> {
        if self.op != OpCode::Resume {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// Whether an Invalid Session payload allows resuming
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.op == OpCode::InvalidSession && self.d.as_bool().unwrap_or(false)
    }
}
