//! Gateway manager
//!
//! Supervises every shard of a client. The manager validates the codec
//! choice once, owns the identify window and the readiness tracker, and hands
//! out shard handles by index.

mod context;
mod ready;

pub use context::GatewayContext;
pub use ready::{ready_timeout, ReadyTracker, MIN_READY_TIMEOUT};

use std::sync::Arc;

use chat_cache::{ClientCache, SharedCache};
use chat_common::ClientConfig;
use chat_core::{ModelFetcher, Snowflake};
use dashmap::DashMap;
use serde_json::Value;
use url::Url;

use crate::codec::CodecSelection;
use crate::decoders::DecoderRegistry;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{GatewayPayload, CLOSE_NORMAL};
use crate::queue::{EventQueue, SharedQueue};
use crate::shard::{ShardConnection, ShardHandle, ShardStatus};
use crate::transport::{Connector, TungsteniteConnector};

/// Builder for [`GatewayManager`]
pub struct GatewayManagerBuilder {
    config: ClientConfig,
    fetcher: Arc<dyn ModelFetcher>,
    cache: Option<SharedCache>,
    queue: Option<SharedQueue>,
    connector: Option<Arc<dyn Connector>>,
    decoders: Option<DecoderRegistry>,
    presence: Option<Value>,
}

impl GatewayManagerBuilder {
    #[must_use]
    pub fn cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn queue(mut self, queue: SharedQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Replace the WebSocket connector
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the default decoder set
    #[must_use]
    pub fn decoders(mut self, decoders: DecoderRegistry) -> Self {
        self.decoders = Some(decoders);
        self
    }

    /// Presence sent with every IDENTIFY
    #[must_use]
    pub fn presence(mut self, presence: Value) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Validate the configuration and build the manager.
    ///
    /// Must be called from within a Tokio runtime when no queue was given.
    pub fn build(self) -> GatewayResult<GatewayManager> {
        let config = self.config;
        if config.token.trim().is_empty() {
            return Err(GatewayError::MissingToken);
        }
        if config.gateway.shard_count == 0 {
            return Err(GatewayError::InvalidShardCount(0));
        }
        Url::parse(&config.gateway.url)
            .map_err(|e| GatewayError::UnknownGateway(format!("{}: {e}", config.gateway.url)))?;

        let codec = CodecSelection::resolve(
            &config.gateway.encoding,
            config.gateway.compression.as_deref(),
        )?;

        tracing::info!(
            encoding = codec.encoding_name(),
            compression = codec.compression_name().unwrap_or("none"),
            shards = config.gateway.shard_count,
            "Gateway manager created"
        );

        let ctx = GatewayContext::new(
            config.token,
            config.gateway,
            codec,
            self.queue.unwrap_or_else(EventQueue::new),
            self.cache.unwrap_or_else(ClientCache::new_shared),
            self.fetcher,
            config.events,
            self.decoders.unwrap_or_default(),
            self.connector
                .unwrap_or_else(|| Arc::new(TungsteniteConnector::new())),
            self.presence,
        );

        Ok(GatewayManager {
            ctx: Arc::new(ctx),
            shards: DashMap::new(),
        })
    }
}

/// Supervises the shards of one client
pub struct GatewayManager {
    ctx: Arc<GatewayContext>,
    shards: DashMap<u32, ShardHandle>,
}

impl GatewayManager {
    #[must_use]
    pub fn builder(config: ClientConfig, fetcher: Arc<dyn ModelFetcher>) -> GatewayManagerBuilder {
        GatewayManagerBuilder {
            config,
            fetcher,
            cache: None,
            queue: None,
            connector: None,
            decoders: None,
            presence: None,
        }
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.ctx.queue
    }

    pub fn cache(&self) -> &SharedCache {
        &self.ctx.cache
    }

    pub fn gateway_url(&self) -> String {
        self.ctx.gateway_url()
    }

    /// Point new sessions at another gateway, e.g. the one returned by
    /// `GET /gateway/bot`
    pub fn set_gateway_url(&self, url: &str) -> GatewayResult<()> {
        Url::parse(url).map_err(|e| GatewayError::UnknownGateway(format!("{url}: {e}")))?;
        self.ctx.set_gateway_url(url.to_string());
        Ok(())
    }

    #[must_use]
    pub fn shard_count(&self) -> u32 {
        self.ctx.shard_count
    }

    /// Shard that receives events for a guild
    #[must_use]
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> u32 {
        ((guild_id.into_inner() >> 22) % i64::from(self.ctx.shard_count)) as u32
    }

    /// Start every shard that is not running yet
    pub fn spawn_shards(&self) {
        for shard_id in 0..self.ctx.shard_count {
            let running = self
                .shards
                .get(&shard_id)
                .is_some_and(|shard| shard.status() != ShardStatus::Terminated);
            if running {
                continue;
            }

            tracing::debug!(shard_id, "Spawning shard");
            let handle = ShardConnection::spawn(self.ctx.clone(), shard_id);
            self.shards.insert(shard_id, handle);
        }
    }

    pub fn shard(&self, shard_id: u32) -> GatewayResult<ShardHandle> {
        self.shards
            .get(&shard_id)
            .map(|shard| shard.clone())
            .ok_or(GatewayError::UnknownShard(shard_id))
    }

    #[must_use]
    pub fn shard_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.shards.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Status of every spawned shard, by index
    #[must_use]
    pub fn statuses(&self) -> Vec<(u32, ShardStatus)> {
        self.shard_ids()
            .into_iter()
            .filter_map(|id| self.shards.get(&id).map(|shard| (id, shard.status())))
            .collect()
    }

    pub fn send(&self, shard_id: u32, payload: GatewayPayload) -> GatewayResult<()> {
        self.shard(shard_id)?.send(payload)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ctx.ready.is_client_ready()
    }

    /// Wait until every shard is ready
    pub async fn wait_ready(&self) {
        self.ctx.ready.wait_ready().await;
    }

    /// Close every shard with code 1000, discarding their sessions, and wait
    /// for the shard tasks to stop
    pub async fn destroy(&self) {
        tracing::info!(code = CLOSE_NORMAL, shards = self.shards.len(), "Destroying gateway manager");

        let shards: Vec<ShardHandle> = self.shards.iter().map(|entry| entry.value().clone()).collect();
        for shard in &shards {
            shard.shutdown();
        }
        for shard in &shards {
            shard.join().await;
        }

        self.shards.clear();
        self.ctx.ready.destroy();
    }
}

impl std::fmt::Debug for GatewayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayManager")
            .field("context", &self.ctx)
            .field("shards", &self.shard_ids())
            .finish()
    }
}
