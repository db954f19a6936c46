//! # chat-client
//!
//! The public face of the workspace. A [`Client`] owns one cache, one REST
//! dispatcher, one ordered event queue and one gateway manager, and hands
//! the decoders a [`RestFetcher`] that writes every look-up through the cache.
//! A [`WebhookClient`] is the REST-only variant for a single webhook.
//!
//! ## Example
//!
//! ```ignore
//! use chat_client::Client;
//! use chat_common::ClientConfig;
//! use chat_gateway::ChannelSubscriber;
//!
//! let client = Client::builder(ClientConfig::from_env()?).build()?;
//! let (subscriber, mut events) = ChannelSubscriber::new();
//! client.subscribe(subscriber);
//! client.connect().await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! ```

mod client;
mod error;
mod fetcher;
mod webhook;

#[cfg(test)]
mod testing;

pub use client::{Client, ClientBuilder};
pub use error::{ClientError, ClientResult};
pub use fetcher::RestFetcher;
pub use webhook::WebhookClient;
