//! Client readiness
//!
//! A shard is ready once every guild listed in its READY has arrived through
//! GUILD_CREATE, or once a timeout proportional to the guild count expires.
//! The client is ready once every shard is.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chat_core::{ClientEvent, Snowflake};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::queue::SharedQueue;

/// Floor for the guild wait
pub const MIN_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for guilds to stream in after READY
#[must_use]
pub fn ready_timeout(guild_count: usize) -> Duration {
    let secs = (guild_count as f64 * 1.2).ceil() as u64;
    MIN_READY_TIMEOUT.max(Duration::from_secs(secs))
}

struct PendingShard {
    guilds: HashSet<Snowflake>,
    timeout: JoinHandle<()>,
}

/// Tracks shard and client readiness
pub struct ReadyTracker {
    shard_count: u32,
    pending: DashMap<u32, PendingShard>,
    ready: RwLock<HashSet<u32>>,
    client_ready: watch::Sender<bool>,
    queue: SharedQueue,
}

impl ReadyTracker {
    #[must_use]
    pub fn new(shard_count: u32, queue: SharedQueue) -> Arc<Self> {
        let (client_ready, _) = watch::channel(false);
        Arc::new(Self {
            shard_count,
            pending: DashMap::new(),
            ready: RwLock::new(HashSet::new()),
            client_ready,
            queue,
        })
    }

    /// Start waiting for the guilds a shard announced in READY
    pub fn begin(self: &Arc<Self>, shard_id: u32, guilds: HashSet<Snowflake>) {
        if let Some((_, previous)) = self.pending.remove(&shard_id) {
            previous.timeout.abort();
        }
        self.ready.write().remove(&shard_id);

        if guilds.is_empty() {
            self.mark_ready(shard_id);
            return;
        }

        let wait = ready_timeout(guilds.len());
        tracing::debug!(
            shard_id,
            guilds = guilds.len(),
            timeout_secs = wait.as_secs(),
            "Waiting for guilds before declaring the shard ready"
        );

        let tracker = Arc::downgrade(self);
        let timeout = tokio::spawn(expire_after(tracker, shard_id, wait));
        self.pending.insert(shard_id, PendingShard { guilds, timeout });
    }

    /// Count a guild toward its shard's readiness.
    ///
    /// Returns whether the shard was waiting for it.
    pub fn guild_arrived(&self, shard_id: u32, guild_id: Snowflake) -> bool {
        let complete = {
            let Some(mut pending) = self.pending.get_mut(&shard_id) else {
                return false;
            };
            if !pending.guilds.remove(&guild_id) {
                return false;
            }
            pending.guilds.is_empty()
        };

        if complete {
            if let Some((_, pending)) = self.pending.remove(&shard_id) {
                pending.timeout.abort();
            }
            self.mark_ready(shard_id);
        }
        true
    }

    #[must_use]
    pub fn is_shard_ready(&self, shard_id: u32) -> bool {
        self.ready.read().contains(&shard_id)
    }

    #[must_use]
    pub fn is_client_ready(&self) -> bool {
        *self.client_ready.borrow()
    }

    /// Signal a shard's readiness again after it re-identified
    pub fn reannounce(&self, shard_id: u32) {
        self.ready.write().insert(shard_id);
        self.queue.push(ClientEvent::ShardReady { shard_id });
    }

    /// Wait until every shard is ready
    pub async fn wait_ready(&self) {
        let mut receiver = self.client_ready.subscribe();
        // The sender lives as long as `self`
        let _ = receiver.wait_for(|ready| *ready).await;
    }

    /// Cancel every pending timeout
    pub fn destroy(&self) {
        for entry in self.pending.iter() {
            entry.timeout.abort();
        }
        self.pending.clear();
    }

    fn expire(&self, shard_id: u32) {
        if let Some((_, pending)) = self.pending.remove(&shard_id) {
            tracing::info!(
                shard_id,
                missing = pending.guilds.len(),
                "Guild wait timed out, declaring shard ready"
            );
            self.mark_ready(shard_id);
        }
    }

    fn mark_ready(&self, shard_id: u32) {
        let (newly_ready, all_ready) = {
            let mut ready = self.ready.write();
            let newly_ready = ready.insert(shard_id);
            (newly_ready, ready.len() >= self.shard_count as usize)
        };

        if !newly_ready {
            return;
        }

        tracing::info!(shard_id, "Shard ready");
        self.queue.push(ClientEvent::ShardReady { shard_id });

        if all_ready && !self.is_client_ready() {
            self.client_ready.send_replace(true);
            tracing::info!(shards = self.shard_count, "Client ready");
            self.queue.push(ClientEvent::Ready);
        }
    }
}

impl std::fmt::Debug for ReadyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyTracker")
            .field("shard_count", &self.shard_count)
            .field("pending", &self.pending.len())
            .field("ready", &self.ready.read().len())
            .field("client_ready", &self.is_client_ready())
            .finish()
    }
}

async fn expire_after(tracker: Weak<ReadyTracker>, shard_id: u32, wait: Duration) {
    tokio::time::sleep(wait).await;
    if let Some(tracker) = tracker.upgrade() {
        tracker.expire(shard_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{ChannelSubscriber, EventQueue};

    fn ids(raw: &[i64]) -> HashSet<Snowflake> {
        raw.iter().copied().map(Snowflake::new).collect()
    }

    #[test]
    fn test_ready_timeout() {
        assert_eq!(ready_timeout(0), Duration::from_secs(5));
        assert_eq!(ready_timeout(4), Duration::from_secs(5));
        assert_eq!(ready_timeout(5), Duration::from_secs(6));
        assert_eq!(ready_timeout(100), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shard_ready_after_all_guilds() {
        let queue = EventQueue::new();
        let (subscriber, mut rx) = ChannelSubscriber::new();
        queue.subscribe(subscriber);
        let tracker = ReadyTracker::new(1, queue.clone());

        tracker.begin(0, ids(&[1, 2]));
        assert!(tracker.guild_arrived(0, Snowflake::new(1)));
        assert!(!tracker.guild_arrived(0, Snowflake::new(1)));
        assert!(!tracker.is_shard_ready(0));

        assert!(tracker.guild_arrived(0, Snowflake::new(2)));
        assert!(tracker.is_shard_ready(0));
        assert!(tracker.is_client_ready());

        queue.close().await;
        assert!(matches!(rx.try_recv().unwrap(), ClientEvent::ShardReady { shard_id: 0 }));
        assert!(matches!(rx.try_recv().unwrap(), ClientEvent::Ready));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_declares_ready() {
        let queue = EventQueue::new();
        let tracker = ReadyTracker::new(1, queue);

        tracker.begin(0, ids(&[1, 2, 3]));
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(!tracker.is_shard_ready(0));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(tracker.is_shard_ready(0));
        assert!(tracker.is_client_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_waits_for_every_shard() {
        let queue = EventQueue::new();
        let tracker = ReadyTracker::new(2, queue);

        tracker.begin(0, HashSet::new());
        assert!(tracker.is_shard_ready(0));
        assert!(!tracker.is_client_ready());

        tracker.begin(1, ids(&[9]));
        tracker.guild_arrived(1, Snowflake::new(9));
        assert!(tracker.is_client_ready());

        tokio::time::timeout(Duration::from_secs(1), tracker.wait_ready())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_guild_is_not_counted() {
        let queue = EventQueue::new();
        let tracker = ReadyTracker::new(1, queue);
        tracker.begin(0, ids(&[1]));
        assert!(!tracker.guild_arrived(0, Snowflake::new(2)));
        assert!(!tracker.guild_arrived(1, Snowflake::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_cancels_timeouts() {
        let queue = EventQueue::new();
        let tracker = ReadyTracker::new(1, queue);
        tracker.begin(0, ids(&[1]));
        tracker.destroy();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!tracker.is_shard_ready(0));
    }
}
