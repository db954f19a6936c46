//! Chat client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p chat-client
//! ```
//!
//! Configuration is loaded from environment variables. The binary logs every
//! event and answers `!ping` with `pong` until interrupted.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chat_client::Client;
use chat_common::{try_init_from_env, ClientConfig};
use chat_core::{ClientEvent, Snowflake};
use chat_gateway::{EventSubscriber, SubscriberError};
use chat_rest::{endpoints, SharedDispatcher};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing with the APP_ENV preset
    if let Err(e) = try_init_from_env() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Client stopped with an error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting chat client...");

    let config = ClientConfig::from_env().context("failed to load configuration")?;
    info!(
        env = ?config.env,
        shards = config.gateway.shard_count,
        encoding = %config.gateway.encoding,
        compression = config.gateway.compression.as_deref().unwrap_or("none"),
        "Configuration loaded"
    );

    let client = Client::builder(config).build()?;
    client.subscribe(Arc::new(PingResponder {
        api: client.rest().clone(),
    }));
    client.connect().await?;

    tokio::select! {
        () = client.wait_ready() => info!("All shards ready"),
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            client.destroy().await;
            return Ok(());
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutting down");
    client.destroy().await;
    Ok(())
}

/// Logs events and replies to `!ping`
struct PingResponder {
    api: SharedDispatcher,
}

#[async_trait]
impl EventSubscriber for PingResponder {
    async fn on_event(&self, event: &ClientEvent) -> Result<(), SubscriberError> {
        let reply_to: Option<Snowflake> = match event {
            ClientEvent::Message(message) => {
                let message = message.read();
                (message.content.trim() == "!ping").then_some(message.channel_id)
            }
            ClientEvent::Error { shard_id, message } => {
                error!(shard_id = ?shard_id, message = %message, "Gateway error");
                None
            }
            ClientEvent::DecodeError {
                shard_id,
                event_type,
                error,
            } => {
                error!(shard_id, event = %event_type, error = %error, "Undecodable dispatch");
                None
            }
            other => {
                info!(event = other.name(), "Event");
                None
            }
        };

        if let Some(channel_id) = reply_to {
            endpoints::create_message(&self.api, channel_id, "pong").await?;
        }
        Ok(())
    }
}
