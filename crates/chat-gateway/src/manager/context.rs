//! Gateway context
//!
//! Everything shards share, handed to each shard task explicitly.

use std::sync::Arc;

use chat_cache::SharedCache;
use chat_common::{EventsConfig, GatewayConfig};
use chat_core::ModelFetcher;
use parking_lot::RwLock;
use serde_json::Value;
use url::Url;

use super::ReadyTracker;
use crate::codec::CodecSelection;
use crate::decoders::{DecodeContext, DecoderRegistry};
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::IdentifyPayload;
use crate::queue::SharedQueue;
use crate::shard::IdentifyLimiter;
use crate::transport::Connector;

/// Shared state of every shard of a client
pub struct GatewayContext {
    pub(crate) token: String,
    pub(crate) config: GatewayConfig,
    pub(crate) shard_count: u32,
    pub(crate) codec: CodecSelection,
    pub(crate) identify: IdentifyLimiter,
    pub(crate) ready: Arc<ReadyTracker>,
    pub(crate) queue: SharedQueue,
    pub(crate) cache: SharedCache,
    pub(crate) fetcher: Arc<dyn ModelFetcher>,
    pub(crate) events: Arc<EventsConfig>,
    pub(crate) decoders: DecoderRegistry,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) presence: Option<Value>,
    gateway_url: RwLock<String>,
}

impl GatewayContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        token: String,
        config: GatewayConfig,
        codec: CodecSelection,
        queue: SharedQueue,
        cache: SharedCache,
        fetcher: Arc<dyn ModelFetcher>,
        events: EventsConfig,
        decoders: DecoderRegistry,
        connector: Arc<dyn Connector>,
        presence: Option<Value>,
    ) -> Self {
        let shard_count = config.shard_count;
        Self {
            token,
            gateway_url: RwLock::new(config.url.clone()),
            config,
            shard_count,
            codec,
            identify: IdentifyLimiter::new(),
            ready: ReadyTracker::new(shard_count, queue.clone()),
            queue,
            cache,
            fetcher,
            events: Arc::new(events),
            decoders,
            connector,
            presence,
        }
    }

    /// Base URL new sessions connect to
    pub fn gateway_url(&self) -> String {
        self.gateway_url.read().clone()
    }

    pub(crate) fn set_gateway_url(&self, url: String) {
        *self.gateway_url.write() = url;
    }

    /// Append `v`, `encoding` and, when compression is on, `compress` to `base`
    pub fn connect_url(&self, base: &str) -> GatewayResult<String> {
        let mut url =
            Url::parse(base).map_err(|e| GatewayError::UnknownGateway(format!("{base}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .clear()
                .append_pair("v", &self.config.version.to_string())
                .append_pair("encoding", self.codec.encoding_name());
            if let Some(compression) = self.codec.compression_name() {
                query.append_pair("compress", compression);
            }
        }
        Ok(url.into())
    }

    pub(crate) fn identify_payload(&self, shard_id: u32) -> IdentifyPayload {
        let payload = IdentifyPayload::new(self.token.clone(), shard_id, self.shard_count)
            .with_compress(self.codec.is_payload_compression())
            .with_large_threshold(self.config.large_threshold);
        match &self.presence {
            Some(presence) => payload.with_presence(presence.clone()),
            None => payload,
        }
    }

    pub(crate) fn decode_context(&self, shard_id: u32) -> DecodeContext {
        DecodeContext {
            shard_id,
            cache: self.cache.clone(),
            fetcher: self.fetcher.clone(),
            ready: self.ready.clone(),
            events: self.events.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl std::fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("gateway_url", &self.gateway_url())
            .field("shard_count", &self.shard_count)
            .field("codec", &self.codec)
            .field("decoders", &self.decoders.len())
            .finish()
    }
}
