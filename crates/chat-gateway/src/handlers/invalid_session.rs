//! Invalid session handler (op 9)

use std::time::Duration;

use rand::Rng;

use super::{HandlerResult, ShardAction};
use crate::shard::SharedSession;

/// Shortest wait before re-authenticating
pub const MIN_REAUTH_DELAY: Duration = Duration::from_secs(1);

/// Longest wait before re-authenticating
pub const MAX_REAUTH_DELAY: Duration = Duration::from_secs(5);

/// Handles invalid session notices
pub struct InvalidSessionHandler;

impl InvalidSessionHandler {
    /// Drop the session unless it is resumable, then schedule a new
    /// authentication after a random 1-5s delay.
    pub fn handle(session: &SharedSession, resumable: bool) -> HandlerResult<ShardAction> {
        let mut session = session.write();
        if !resumable {
            session.invalidate();
        }

        let millis = rand::thread_rng()
            .gen_range(MIN_REAUTH_DELAY.as_millis() as u64..=MAX_REAUTH_DELAY.as_millis() as u64);
        let after = Duration::from_millis(millis);

        tracing::info!(
            shard_id = session.shard_id,
            resumable,
            delay_ms = millis,
            "Session invalidated by the gateway"
        );

        Ok(ShardAction::Authenticate { after })
    }
}
