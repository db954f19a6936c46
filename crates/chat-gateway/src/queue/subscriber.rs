//! Event subscribers

use async_trait::async_trait;
use chat_core::ClientEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Error returned by a subscriber callback
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every event delivered by the queue, one at a time, in order
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn on_event(&self, event: &ClientEvent) -> Result<(), SubscriberError>;
}

/// Identifier returned by `EventQueue::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug)]
pub struct ChannelSubscriber {
    sender: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelSubscriber {
    /// Create the subscriber and the receiving end of its channel
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ClientEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

#[async_trait]
impl EventSubscriber for ChannelSubscriber {
    async fn on_event(&self, event: &ClientEvent) -> Result<(), SubscriberError> {
        self.sender
            .send(event.clone())
            .map_err(|_| "event receiver dropped".into())
    }
}
