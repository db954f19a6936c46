//! Heartbeat handlers (op 1, op 11)

use tokio::time::Instant;

use super::{HandlerResult, ShardAction};
use crate::shard::SharedSession;

/// Handles heartbeat acknowledgements
pub struct HeartbeatAckHandler;

impl HeartbeatAckHandler {
    /// Record the ack and the round trip since the last beat
    pub fn handle(session: &SharedSession, now: Instant) -> HandlerResult<ShardAction> {
        let mut session = session.write();
        session.record_heartbeat_ack(now);

        tracing::trace!(
            shard_id = session.shard_id,
            latency_ms = session.latency.map(|l| l.as_millis() as u64),
            "Heartbeat acknowledged"
        );

        Ok(ShardAction::None)
    }
}

/// Handles heartbeats requested by the server
pub struct HeartbeatRequestHandler;

impl HeartbeatRequestHandler {
    pub fn handle(session: &SharedSession) -> HandlerResult<ShardAction> {
        tracing::debug!(shard_id = session.read().shard_id, "Server requested a heartbeat");
        Ok(ShardAction::HeartbeatNow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::ShardSession;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_ack_records_latency() {
        let session = ShardSession::new_shared(0);
        session.write().record_heartbeat_sent(Instant::now());

        tokio::time::advance(Duration::from_millis(80)).await;
        let action = HeartbeatAckHandler::handle(&session, Instant::now()).unwrap();

        assert_eq!(action, ShardAction::None);
        assert!(session.read().heartbeat_acked);
        assert_eq!(session.read().latency, Some(Duration::from_millis(80)));
    }

    #[test]
    fn test_server_request_beats_now() {
        let session = ShardSession::new_shared(0);
        assert_eq!(
            HeartbeatRequestHandler::handle(&session).unwrap(),
            ShardAction::HeartbeatNow
        );
    }
}
