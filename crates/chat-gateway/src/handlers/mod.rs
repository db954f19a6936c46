//! Op code handlers
//!
//! Control frames from the gateway are routed to one stateless handler per op
//! code. Handlers only touch session state and return the follow-up action;
//! the shard performs any network work afterwards. HELLO and DISPATCH are
//! handled by the shard itself.

mod error;
mod heartbeat;
mod invalid_session;
mod reconnect;

pub use error::{HandlerError, HandlerResult};
pub use heartbeat::{HeartbeatAckHandler, HeartbeatRequestHandler};
pub use invalid_session::{InvalidSessionHandler, MAX_REAUTH_DELAY, MIN_REAUTH_DELAY};
pub use reconnect::ReconnectHandler;

use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::{GatewayPayload, OpCode};
use crate::shard::SharedSession;

/// What the shard should do after a control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardAction {
    None,
    /// Identify or resume once `after` has passed
    Authenticate { after: Duration },
    /// Drop the socket and connect again
    Reconnect,
    /// Send a heartbeat immediately
    HeartbeatNow,
}

/// Routes control frames to their handlers
pub struct OpcodeRouter;

impl OpcodeRouter {
    /// Handle a control frame received from the gateway
    pub fn route(
        session: &SharedSession,
        payload: &GatewayPayload,
        now: Instant,
    ) -> HandlerResult<ShardAction> {
        if !payload.op.is_server_op() {
            tracing::warn!(
                shard_id = session.read().shard_id,
                op = %payload.op,
                "Received client-only op code from gateway"
            );
            return Err(HandlerError::UnexpectedOpcode(payload.op));
        }

        match payload.op {
            OpCode::HeartbeatAck => HeartbeatAckHandler::handle(session, now),
            OpCode::Heartbeat => HeartbeatRequestHandler::handle(session),
            OpCode::InvalidSession => {
                let resumable = match &payload.d {
                    serde_json::Value::Bool(resumable) => *resumable,
                    serde_json::Value::Null => false,
                    other => {
                        return Err(HandlerError::InvalidPayload(format!(
                            "invalid session data must be a boolean, got {other}"
                        )))
                    }
                };
                InvalidSessionHandler::handle(session, resumable)
            }
            OpCode::Reconnect => ReconnectHandler::handle(session),
            _ => Err(HandlerError::UnexpectedOpcode(payload.op)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::ShardSession;

    #[tokio::test]
    async fn test_route_control_frames() {
        let session = ShardSession::new_shared(0);
        let now = Instant::now();

        assert_eq!(
            OpcodeRouter::route(&session, &GatewayPayload::heartbeat_ack(), now).unwrap(),
            ShardAction::None
        );
        assert_eq!(
            OpcodeRouter::route(&session, &GatewayPayload::reconnect(), now).unwrap(),
            ShardAction::Reconnect
        );
        assert_eq!(
            OpcodeRouter::route(&session, &GatewayPayload::heartbeat(None), now).unwrap(),
            ShardAction::HeartbeatNow
        );
        assert!(matches!(
            OpcodeRouter::route(&session, &GatewayPayload::invalid_session(false), now).unwrap(),
            ShardAction::Authenticate { .. }
        ));
    }

    #[tokio::test]
    async fn test_client_ops_are_rejected() {
        let session = ShardSession::new_shared(0);
        let payload = GatewayPayload::new(OpCode::Identify, serde_json::Value::Null);
        let err = OpcodeRouter::route(&session, &payload, Instant::now()).unwrap_err();
        assert_eq!(err, HandlerError::UnexpectedOpcode(OpCode::Identify));
        assert_eq!(err.to_close_code().as_u16(), 4001);
    }

    #[tokio::test]
    async fn test_malformed_invalid_session() {
        let session = ShardSession::new_shared(0);
        let payload = GatewayPayload::new(OpCode::InvalidSession, serde_json::json!("yes"));
        let err = OpcodeRouter::route(&session, &payload, Instant::now()).unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
    }
}
