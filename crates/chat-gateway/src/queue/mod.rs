//! Ordered event queue
//!
//! Decoders may finish out of order (some wait on REST look-ups), but
//! subscribers must see events in the order their dispatches arrived. Each
//! dispatch reserves a slot up front; the drain task awaits slots strictly in
//! reservation order and hands each filled event to every subscriber.

mod subscriber;

pub use subscriber::{ChannelSubscriber, EventSubscriber, SubscriberError, SubscriberId};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chat_core::ClientEvent;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

const DIAGNOSTICS_BUFFER: usize = 64;

type SubscriberList = Arc<RwLock<Vec<(SubscriberId, Arc<dyn EventSubscriber>)>>>;

/// A subscriber failure observed during delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub subscriber: SubscriberId,
    /// Name of the event being delivered
    pub event: &'static str,
    pub message: String,
    pub panicked: bool,
}

/// A reserved position in the queue
///
/// Dropping an unfilled slot skips it.
#[derive(Debug)]
pub struct EventSlot {
    sender: Option<oneshot::Sender<ClientEvent>>,
}

impl EventSlot {
    /// Place the event in its reserved position
    pub fn fill(mut self, event: ClientEvent) {
        if let Some(sender) = self.sender.take() {
            // The queue may already be closed
            let _ = sender.send(event);
        }
    }
}

/// Serializes event delivery to subscribers
pub struct EventQueue {
    slots: Mutex<Option<mpsc::UnboundedSender<oneshot::Receiver<ClientEvent>>>>,
    subscribers: SubscriberList,
    next_id: AtomicU64,
    diagnostics: broadcast::Sender<Diagnostic>,
    drainer: Mutex<Option<JoinHandle<()>>>,
}

/// Shared queue handle
pub type SharedQueue = Arc<EventQueue>;

impl EventQueue {
    /// Create the queue and start its drain task.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new() -> SharedQueue {
        let (tx, rx) = mpsc::unbounded_channel();
        let (diagnostics, _) = broadcast::channel(DIAGNOSTICS_BUFFER);
        let subscribers: SubscriberList = Arc::new(RwLock::new(Vec::new()));

        let drainer = tokio::spawn(drain(rx, subscribers.clone(), diagnostics.clone()));

        Arc::new(Self {
            slots: Mutex::new(Some(tx)),
            subscribers,
            next_id: AtomicU64::new(1),
            diagnostics,
            drainer: Mutex::new(Some(drainer)),
        })
    }

    /// Reserve the next position in delivery order
    pub fn reserve(&self) -> EventSlot {
        let (sender, receiver) = oneshot::channel();
        let accepted = match self.slots.lock().as_ref() {
            Some(slots) => slots.send(receiver).is_ok(),
            None => false,
        };

        if !accepted {
            tracing::trace!("Event queue closed, slot discarded");
            return EventSlot { sender: None };
        }

        EventSlot {
            sender: Some(sender),
        }
    }

    /// Append an event that is already complete
    pub fn push(&self, event: ClientEvent) {
        self.reserve().fill(event);
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, subscriber));
        tracing::debug!(subscriber = %id, "Subscriber added");
        id
    }

    /// Remove a subscriber, returning whether it was registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        before != subscribers.len()
    }

    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.read().is_empty()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Receive subscriber failures
    #[must_use]
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slots.lock().is_none()
    }

    /// Stop accepting events and wait until everything reserved so far is delivered
    pub async fn close(&self) {
        self.slots.lock().take();

        let drainer = self.drainer.lock().take();
        if let Some(drainer) = drainer {
            if let Err(e) = drainer.await {
                tracing::error!(error = %e, "Event queue drain task failed");
            }
        }
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn drain(
    mut slots: mpsc::UnboundedReceiver<oneshot::Receiver<ClientEvent>>,
    subscribers: SubscriberList,
    diagnostics: broadcast::Sender<Diagnostic>,
) {
    while let Some(slot) = slots.recv().await {
        let Ok(event) = slot.await else {
            continue;
        };
        deliver(&subscribers, &diagnostics, &event).await;
    }

    tracing::debug!("Event queue drained");
}

async fn deliver(
    subscribers: &SubscriberList,
    diagnostics: &broadcast::Sender<Diagnostic>,
    event: &ClientEvent,
) {
    let targets: Vec<_> = subscribers.read().clone();

    tracing::trace!(event = event.name(), subscribers = targets.len(), "Delivering event");

    for (id, subscriber) in targets {
        let outcome = AssertUnwindSafe(subscriber.on_event(event))
            .catch_unwind()
            .await;

        let (message, panicked) = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => (e.to_string(), false),
            Err(panic) => (panic_message(panic.as_ref()), true),
        };

        tracing::warn!(
            subscriber = %id,
            event = event.name(),
            panicked,
            error = %message,
            "Subscriber failed to handle event"
        );

        // No diagnostics receivers is fine
        let _ = diagnostics.send(Diagnostic {
            subscriber: id,
            event: event.name(),
            message,
            panicked,
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "subscriber panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Failing;

    #[async_trait]
    impl EventSubscriber for Failing {
        async fn on_event(&self, _event: &ClientEvent) -> Result<(), SubscriberError> {
            Err("boom".into())
        }
    }

    struct Panicking;

    #[async_trait]
    impl EventSubscriber for Panicking {
        async fn on_event(&self, event: &ClientEvent) -> Result<(), SubscriberError> {
            if matches!(event, ClientEvent::Ready) {
                panic!("subscriber bug");
            }
            Ok(())
        }
    }

    fn shard_ready(shard_id: u32) -> ClientEvent {
        ClientEvent::ShardReady { shard_id }
    }

    fn shard_of(event: &ClientEvent) -> u32 {
        match event {
            ClientEvent::ShardReady { shard_id } => *shard_id,
            other => panic!("unexpected event {other}"),
        }
    }

    #[tokio::test]
    async fn test_delivery_in_reservation_order() {
        let queue = EventQueue::new();
        let (subscriber, mut rx) = ChannelSubscriber::new();
        queue.subscribe(subscriber);

        let first = queue.reserve();
        let second = queue.reserve();
        let third = queue.reserve();

        third.fill(shard_ready(3));
        second.fill(shard_ready(2));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());

        first.fill(shard_ready(1));
        queue.close().await;

        let order: Vec<u32> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| shard_of(&e))
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dropped_slot_is_skipped() {
        let queue = EventQueue::new();
        let (subscriber, mut rx) = ChannelSubscriber::new();
        queue.subscribe(subscriber);

        let skipped = queue.reserve();
        queue.push(shard_ready(7));
        drop(skipped);
        queue.close().await;

        assert_eq!(shard_of(&rx.try_recv().unwrap()), 7);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscriber_error_does_not_stop_delivery() {
        let queue = EventQueue::new();
        let mut diagnostics = queue.diagnostics();
        queue.subscribe(Arc::new(Failing));
        let (subscriber, mut rx) = ChannelSubscriber::new();
        queue.subscribe(subscriber);

        queue.push(shard_ready(0));
        queue.push(shard_ready(1));
        queue.close().await;

        assert_eq!(shard_of(&rx.try_recv().unwrap()), 0);
        assert_eq!(shard_of(&rx.try_recv().unwrap()), 1);

        let diagnostic = diagnostics.try_recv().unwrap();
        assert_eq!(diagnostic.message, "boom");
        assert_eq!(diagnostic.event, "shardReady");
        assert!(!diagnostic.panicked);
    }

    #[tokio::test]
    async fn test_subscriber_panic_is_contained() {
        let queue = EventQueue::new();
        let mut diagnostics = queue.diagnostics();
        queue.subscribe(Arc::new(Panicking));
        let (subscriber, mut rx) = ChannelSubscriber::new();
        queue.subscribe(subscriber);

        queue.push(ClientEvent::Ready);
        queue.push(shard_ready(4));
        queue.close().await;

        assert!(matches!(rx.try_recv().unwrap(), ClientEvent::Ready));
        assert_eq!(shard_of(&rx.try_recv().unwrap()), 4);

        let diagnostic = diagnostics.try_recv().unwrap();
        assert!(diagnostic.panicked);
        assert_eq!(diagnostic.message, "subscriber bug");
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let queue = EventQueue::new();
        let (subscriber, _rx) = ChannelSubscriber::new();
        let id = queue.subscribe(subscriber);
        assert!(queue.has_subscribers());

        assert!(queue.unsubscribe(id));
        assert!(!queue.unsubscribe(id));
        assert!(!queue.has_subscribers());
    }

    #[tokio::test]
    async fn test_closed_queue_discards_events() {
        let queue = EventQueue::new();
        queue.close().await;
        assert!(queue.is_closed());
        queue.push(ClientEvent::Ready);
    }
}
