//! Webhook client
//!
//! A REST-only handle on one webhook. The webhook token travels in the route,
//! so there is no bot token, no gateway, no cache and no event queue.

use std::sync::Arc;

use chat_common::RestConfig;
use chat_core::Snowflake;
use chat_rest::{endpoints, HttpTransport, RequestDispatcher, ReqwestTransport, SharedDispatcher};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::error::ClientResult;

/// Executes and manages a single webhook
pub struct WebhookClient {
    id: Snowflake,
    token: String,
    api: SharedDispatcher,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl WebhookClient {
    /// Must be called from within a Tokio runtime.
    pub fn new(id: Snowflake, token: impl Into<String>, config: RestConfig) -> ClientResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(id, token, config, transport))
    }

    pub fn with_transport(
        id: Snowflake,
        token: impl Into<String>,
        config: RestConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let api = RequestDispatcher::new(config, "", transport);
        let sweeper = api.start_sweeper();
        Self {
            id,
            token: token.into(),
            api,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub fn id(&self) -> Snowflake {
        self.id
    }

    pub fn rest(&self) -> &SharedDispatcher {
        &self.api
    }

    /// The webhook object (name, avatar, channel)
    pub async fn fetch(&self) -> ClientResult<Value> {
        Ok(endpoints::get_webhook_with_token(&self.api, self.id, &self.token).await?)
    }

    /// Post a plain text message; resolves with the created message
    pub async fn send(&self, content: &str) -> ClientResult<Value> {
        self.execute(json!({ "content": content })).await
    }

    /// Post a full message body (`content`, `username`, `avatar_url`, `embeds`)
    pub async fn execute(&self, body: Value) -> ClientResult<Value> {
        let message = endpoints::execute_webhook(&self.api, self.id, &self.token, body).await?;
        tracing::debug!(webhook_id = %self.id, "Webhook executed");
        Ok(message)
    }

    /// Change the default name or avatar
    pub async fn edit(&self, changes: Value) -> ClientResult<Value> {
        Ok(endpoints::modify_webhook_with_token(&self.api, self.id, &self.token, changes).await?)
    }

    /// Delete the webhook; the client is unusable afterwards
    pub async fn delete(&self) -> ClientResult<()> {
        endpoints::delete_webhook_with_token(&self.api, self.id, &self.token).await?;
        tracing::info!(webhook_id = %self.id, "Webhook deleted");
        self.destroy();
        Ok(())
    }

    /// Fail queued requests and stop the bucket sweeper
    pub fn destroy(&self) {
        self.api.destroy();
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
    }
}

impl std::fmt::Debug for WebhookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookClient")
            .field("id", &self.id)
            .field("rest", &self.api)
            .finish_non_exhaustive()
    }
}
