//! Client facade
//!
//! Builds the collaborators in dependency order: cache, REST dispatcher,
//! fetcher, event queue, then the gateway manager that ties them together.

use std::sync::Arc;
use std::time::Duration;

use chat_cache::{ClientCache, SharedCache};
use chat_common::{Classify, ClientConfig};
use chat_core::{ClientEvent, Message, Shared, Snowflake, User};
use chat_gateway::{
    ChannelSubscriber, Connector, Diagnostic, EventQueue, EventSubscriber, GatewayManager,
    SharedQueue, SubscriberId,
};
use chat_rest::{endpoints, HttpTransport, RequestDispatcher, ReqwestTransport, SharedDispatcher};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::{ClientError, ClientResult};
use crate::fetcher::RestFetcher;

/// Builder for [`Client`]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    connector: Option<Arc<dyn Connector>>,
    presence: Option<Value>,
    lookup_gateway: bool,
}

impl ClientBuilder {
    /// Replace the HTTP transport
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the WebSocket connector
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    #[must_use]
    pub fn presence(mut self, presence: Value) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Ask `GET /gateway/bot` for the gateway URL before connecting (default on)
    #[must_use]
    pub fn lookup_gateway(mut self, enabled: bool) -> Self {
        self.lookup_gateway = enabled;
        self
    }

    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> ClientResult<Client> {
        let config = self.config;
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&config.rest)?),
        };

        let cache = ClientCache::new_shared();
        let api = RequestDispatcher::new(config.rest.clone(), config.token.clone(), transport);
        let fetcher = Arc::new(RestFetcher::new(api.clone(), cache.clone()));
        let queue = EventQueue::new();

        let mut gateway = GatewayManager::builder(config, fetcher)
            .cache(cache.clone())
            .queue(queue.clone());
        if let Some(connector) = self.connector {
            gateway = gateway.connector(connector);
        }
        if let Some(presence) = self.presence {
            gateway = gateway.presence(presence);
        }
        let gateway = gateway.build()?;

        let sweeper = api.start_sweeper();

        Ok(Client {
            cache,
            api,
            queue,
            gateway,
            lookup_gateway: self.lookup_gateway,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }
}

/// A connected (or connectable) bot client
pub struct Client {
    cache: SharedCache,
    api: SharedDispatcher,
    queue: SharedQueue,
    gateway: GatewayManager,
    lookup_gateway: bool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    #[must_use]
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            transport: None,
            connector: None,
            presence: None,
            lookup_gateway: true,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn rest(&self) -> &SharedDispatcher {
        &self.api
    }

    pub fn gateway(&self) -> &GatewayManager {
        &self.gateway
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    /// The bot's own user, known once a shard received READY
    pub fn user(&self) -> Option<Shared<User>> {
        self.cache.client_user()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberId {
        self.queue.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.queue.unsubscribe(id)
    }

    /// Wait for the next event named `name` that `filter` accepts.
    ///
    /// Only events delivered after the call count. With `within` set the wait
    /// fails with `WaitTimeout` once it elapses; without it the wait lasts
    /// until a match arrives.
    pub async fn wait_for_event<F>(
        &self,
        name: &str,
        filter: F,
        within: Option<Duration>,
    ) -> ClientResult<ClientEvent>
    where
        F: Fn(&ClientEvent) -> bool + Send,
    {
        if self.queue.is_closed() {
            return Err(ClientError::EventQueueClosed);
        }

        let (subscriber, mut events) = ChannelSubscriber::new();
        let _subscription = Subscription {
            queue: &self.queue,
            id: self.queue.subscribe(subscriber),
        };

        let matching = async move {
            while let Some(event) = events.recv().await {
                if event.name() == name && filter(&event) {
                    return Ok(event);
                }
            }
            Err(ClientError::EventQueueClosed)
        };

        match within {
            Some(limit) => tokio::time::timeout(limit, matching)
                .await
                .map_err(|_| ClientError::WaitTimeout {
                    event: name.to_string(),
                    after: limit,
                })?,
            None => matching.await,
        }
    }

    /// Subscriber failures observed during delivery
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.queue.diagnostics()
    }

    /// Resolve the gateway URL and start every shard.
    ///
    /// A failed look-up falls back to the configured URL unless the failure
    /// is terminal (bad token, dispatcher shut down).
    pub async fn connect(&self) -> ClientResult<()> {
        if self.lookup_gateway {
            match self.lookup_gateway_url().await {
                Ok(url) => self.gateway.set_gateway_url(&url)?,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!(
                    error = %e,
                    kind = %e.kind(),
                    url = %self.gateway.gateway_url(),
                    "Gateway lookup failed, using configured url"
                ),
            }
        }

        tracing::info!(
            shards = self.gateway.shard_count(),
            url = %self.gateway.gateway_url(),
            "Connecting to gateway"
        );
        self.gateway.spawn_shards();
        Ok(())
    }

    async fn lookup_gateway_url(&self) -> ClientResult<String> {
        let info = endpoints::get_gateway_bot(&self.api).await?;

        if let Some(recommended) = info.get("shards").and_then(Value::as_u64) {
            if recommended != u64::from(self.gateway.shard_count()) {
                tracing::info!(
                    recommended,
                    configured = self.gateway.shard_count(),
                    "Configured shard count differs from the recommendation"
                );
            }
        }

        info.get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ClientError::GatewayLookup)
    }

    /// Wait until every shard is ready
    pub async fn wait_ready(&self) {
        self.gateway.wait_ready().await;
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.gateway.is_ready()
    }

    /// Post a text message, caching the created message
    pub async fn send_message(
        &self,
        channel_id: Snowflake,
        content: &str,
    ) -> ClientResult<Shared<Message>> {
        let raw = endpoints::create_message(&self.api, channel_id, content).await?;
        Ok(self.cache.add_message(&raw)?)
    }

    /// Close every shard, fail pending REST calls, deliver what the queue
    /// still holds and empty the cache
    pub async fn destroy(&self) {
        self.gateway.destroy().await;
        self.api.destroy();

        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        self.queue.close().await;
        self.cache.clear();
        tracing::info!("Client destroyed");
    }
}

/// Temporary subscriber, removed when the waiting future ends or is dropped
struct Subscription<'a> {
    queue: &'a SharedQueue,
    id: SubscriberId,
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.queue.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("gateway", &self.gateway)
            .field("rest", &self.api)
            .field("queue", &self.queue)
            .finish()
    }
}
