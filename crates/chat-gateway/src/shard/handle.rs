//! Shard handle
//!
//! The cloneable face of a shard task. Reads go straight to the shared
//! session; everything that touches the socket is sent as a command.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{SharedSession, ShardStatus};
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{GatewayPayload, RequestGuildMembersPayload};

/// Commands accepted by a shard task
#[derive(Debug)]
pub enum ShardCommand {
    /// Send a payload once the shard is authenticated
    Send(GatewayPayload),
    /// Drop the socket and connect again, resuming if possible
    Reconnect,
    /// Close with 1000, discard the session and stop
    Shutdown,
}

/// Handle to a running shard
#[derive(Clone)]
pub struct ShardHandle {
    shard_id: u32,
    session: SharedSession,
    commands: mpsc::UnboundedSender<ShardCommand>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ShardHandle {
    pub(crate) fn new(
        shard_id: u32,
        session: SharedSession,
        commands: mpsc::UnboundedSender<ShardCommand>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            shard_id,
            session,
            commands,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.shard_id
    }

    pub fn status(&self) -> ShardStatus {
        self.session.read().status
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.read().session_id.clone()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.session.read().sequence
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.session.read().latency
    }

    pub fn is_ready(&self) -> bool {
        self.session.read().status == ShardStatus::Ready
    }

    /// Queue a payload for the socket
    ///
    /// # Errors
    /// Returns `ChannelClosed` once the shard task has stopped
    pub fn send(&self, payload: GatewayPayload) -> GatewayResult<()> {
        self.command(ShardCommand::Send(payload))
    }

    /// Update the client's presence on this shard (op 3)
    pub fn update_status(&self, presence: Value) -> GatewayResult<()> {
        self.send(GatewayPayload::status_update(presence))
    }

    /// Join, move or leave a voice channel (op 4)
    pub fn update_voice_state(
        &self,
        guild_id: &str,
        channel_id: Option<&str>,
        self_mute: bool,
        self_deaf: bool,
    ) -> GatewayResult<()> {
        self.send(GatewayPayload::voice_state_update(
            guild_id, channel_id, self_mute, self_deaf,
        ))
    }

    /// Ask for every member of a guild; they arrive as GUILD_MEMBERS_CHUNK
    pub fn request_guild_members(&self, guild_id: impl Into<String>) -> GatewayResult<()> {
        self.send(GatewayPayload::request_guild_members(
            &RequestGuildMembersPayload::all(guild_id),
        ))
    }

    pub fn reconnect(&self) -> GatewayResult<()> {
        self.command(ShardCommand::Reconnect)
    }

    /// Ask the shard to stop. Stopping an already stopped shard is not an error.
    pub fn shutdown(&self) {
        if self.commands.send(ShardCommand::Shutdown).is_err() {
            tracing::trace!(shard_id = self.shard_id, "Shard already stopped");
        }
    }

    /// Wait for the shard task to finish
    pub async fn join(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(shard_id = self.shard_id, error = %e, "Shard task failed");
            }
        }
    }

    fn command(&self, command: ShardCommand) -> GatewayResult<()> {
        self.commands
            .send(command)
            .map_err(|_| GatewayError::ChannelClosed)
    }
}

impl std::fmt::Debug for ShardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardHandle")
            .field("shard_id", &self.shard_id)
            .field("status", &self.status())
            .finish()
    }
}
