//! Reconnect handler (op 7)

use super::{HandlerResult, ShardAction};
use crate::shard::SharedSession;

/// Handles server requests to reconnect
pub struct ReconnectHandler;

impl ReconnectHandler {
    /// The session is kept, so the new connection resumes
    pub fn handle(session: &SharedSession) -> HandlerResult<ShardAction> {
        tracing::info!(shard_id = session.read().shard_id, "Gateway requested a reconnect");
        Ok(ShardAction::Reconnect)
    }
}
