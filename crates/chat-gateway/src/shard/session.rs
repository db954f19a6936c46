//! Per-shard session state
//!
//! Everything a shard must remember across reconnects: the session id and
//! last sequence used to resume, plus heartbeat bookkeeping for the current
//! socket.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

/// Connection state of a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShardStatus {
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Resuming,
    /// Authenticated and heartbeating
    Ready,
    Reconnecting,
    /// Shut down; no reconnect will be scheduled
    Terminated,
}

impl ShardStatus {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Ready => "ready",
            Self::Reconnecting => "reconnecting",
            Self::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Session state shared between a shard task and its handle
#[derive(Debug, Clone)]
pub struct ShardSession {
    pub shard_id: u32,
    pub status: ShardStatus,
    /// Highest dispatch sequence seen
    pub sequence: Option<u64>,
    pub session_id: Option<String>,
    pub authenticated: bool,
    pub heartbeat_interval: Option<Duration>,
    pub heartbeat_acked: bool,
    pub last_heartbeat_at: Option<Instant>,
    /// Round trip between the last heartbeat and its ack
    pub latency: Option<Duration>,
    pub last_identify_at: Option<Instant>,
    /// Gateway URL to resume against, sent in READY
    pub resume_url: Option<String>,
}

/// Shared session handle
pub type SharedSession = Arc<RwLock<ShardSession>>;

impl ShardSession {
    #[must_use]
    pub fn new(shard_id: u32) -> Self {
        Self {
            shard_id,
            status: ShardStatus::Disconnected,
            sequence: None,
            session_id: None,
            authenticated: false,
            heartbeat_interval: None,
            heartbeat_acked: true,
            last_heartbeat_at: None,
            latency: None,
            last_identify_at: None,
            resume_url: None,
        }
    }

    #[must_use]
    pub fn new_shared(shard_id: u32) -> SharedSession {
        Arc::new(RwLock::new(Self::new(shard_id)))
    }

    /// Record a dispatch sequence; sequences never move backwards
    pub fn update_sequence(&mut self, sequence: u64) {
        if self.sequence.map_or(true, |current| sequence > current) {
            self.sequence = Some(sequence);
        }
    }

    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some()
    }

    /// Forget the session so the next connection identifies from scratch
    pub fn invalidate(&mut self) {
        self.session_id = None;
        self.sequence = None;
        self.authenticated = false;
        self.resume_url = None;
    }

    /// Reset per-socket state before a new connection
    pub fn reset_connection(&mut self) {
        self.authenticated = false;
        self.heartbeat_interval = None;
        self.heartbeat_acked = true;
        self.last_heartbeat_at = None;
    }

    pub fn record_heartbeat_sent(&mut self, at: Instant) {
        self.heartbeat_acked = false;
        self.last_heartbeat_at = Some(at);
    }

    pub fn record_heartbeat_ack(&mut self, at: Instant) {
        self.heartbeat_acked = true;
        if let Some(sent) = self.last_heartbeat_at {
            self.latency = Some(at.saturating_duration_since(sent));
        }
    }
}
