//! Event decoders
//!
//! One decoder per dispatch type. A decoder updates the cache from the raw
//! payload and returns at most one `ClientEvent`. When the payload references
//! something that has to be fetched first, the decoder returns a deferred
//! future instead; the queue slot is reserved before decoding, so the event
//! still lands in arrival order however long the look-up takes.

mod channel;
mod guild;
mod lifecycle;
mod member;
mod message;
mod role;
mod user;

use std::collections::HashMap;
use std::sync::Arc;

use chat_cache::SharedCache;
use chat_common::EventsConfig;
use chat_core::entities::raw;
use chat_core::{
    ClientEvent, DomainError, Guild, GuildMember, Message, Model, ModelFetcher, ModelRef,
    ModelStore, Shared, Snowflake, User,
};
use futures::future::BoxFuture;
use serde_json::Value;

use crate::manager::ReadyTracker;
use crate::queue::SharedQueue;

pub use channel::{
    ChannelCreateDecoder, ChannelDeleteDecoder, ChannelPinsUpdateDecoder, ChannelUpdateDecoder,
    TypingStartDecoder,
};
pub use guild::{
    GuildBanAddDecoder, GuildBanRemoveDecoder, GuildCreateDecoder, GuildDeleteDecoder,
    GuildEmojisUpdateDecoder, GuildUpdateDecoder,
};
pub use lifecycle::{ReadyDecoder, ResumedDecoder};
pub use member::{
    GuildMemberAddDecoder, GuildMemberRemoveDecoder, GuildMemberUpdateDecoder,
    GuildMembersChunkDecoder,
};
pub use message::{
    MessageCreateDecoder, MessageDeleteBulkDecoder, MessageDeleteDecoder,
    MessageReactionRemoveAllDecoder, MessageUpdateDecoder,
};
pub use role::{RoleCreateDecoder, RoleDeleteDecoder, RoleUpdateDecoder};
pub use user::{PresenceUpdateDecoder, UserUpdateDecoder, VoiceServerUpdateDecoder};

/// What a decoder produced
pub enum Emission {
    /// Nothing to deliver
    None,
    /// Event ready for delivery
    Now(ClientEvent),
    /// Event available once look-ups settle; `None` skips the slot
    Deferred(BoxFuture<'static, Option<ClientEvent>>),
}

impl std::fmt::Debug for Emission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Now(event) => f.debug_tuple("Now").field(&event.name()).finish(),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

impl From<ClientEvent> for Emission {
    fn from(event: ClientEvent) -> Self {
        Self::Now(event)
    }
}

/// Decodes one dispatch type
pub trait EventDecoder: Send + Sync {
    /// The dispatch `t` this decoder handles
    fn event_type(&self) -> &'static str;

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError>;
}

/// Everything a decoder may touch, passed explicitly
#[derive(Clone)]
pub struct DecodeContext {
    pub shard_id: u32,
    pub cache: SharedCache,
    pub fetcher: Arc<dyn ModelFetcher>,
    pub ready: Arc<ReadyTracker>,
    pub events: Arc<EventsConfig>,
    pub queue: SharedQueue,
}

impl DecodeContext {
    /// Whether a "before" copy should be taken for `event`
    #[must_use]
    pub fn wants_snapshot(&self, event: &str) -> bool {
        self.events.snapshots.is_enabled(event) && self.queue.has_subscribers()
    }

    /// Clone the current state when a snapshot is wanted
    pub fn snapshot<T: Clone>(&self, event: &str, model: &Shared<T>) -> Option<T> {
        self.wants_snapshot(event).then(|| model.read().clone())
    }

    /// Look up the guild named by the payload's `guild_id`
    pub fn guild_of(&self, data: &Value, model: &'static str) -> Result<Option<Shared<Guild>>, DomainError> {
        let guild_id = raw::require_id(data, model, "guild_id")?;
        Ok(self.cache.guilds.get(&guild_id))
    }

    /// Client readiness, consulted by decoders that stay quiet during startup
    #[must_use]
    pub fn is_client_ready(&self) -> bool {
        self.ready.is_client_ready()
    }
}

impl std::fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeContext")
            .field("shard_id", &self.shard_id)
            .finish()
    }
}

/// Decoders by dispatch type
pub struct DecoderRegistry {
    decoders: HashMap<&'static str, Box<dyn EventDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry; every dispatch is forwarded raw
    #[must_use]
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registry with a decoder for every supported dispatch
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register(ReadyDecoder)
            .register(ResumedDecoder)
            .register(GuildCreateDecoder)
            .register(GuildUpdateDecoder)
            .register(GuildDeleteDecoder)
            .register(GuildBanAddDecoder)
            .register(GuildBanRemoveDecoder)
            .register(GuildEmojisUpdateDecoder)
            .register(GuildMemberAddDecoder)
            .register(GuildMemberRemoveDecoder)
            .register(GuildMemberUpdateDecoder)
            .register(GuildMembersChunkDecoder)
            .register(RoleCreateDecoder)
            .register(RoleUpdateDecoder)
            .register(RoleDeleteDecoder)
            .register(ChannelCreateDecoder)
            .register(ChannelUpdateDecoder)
            .register(ChannelDeleteDecoder)
            .register(ChannelPinsUpdateDecoder)
            .register(MessageCreateDecoder)
            .register(MessageUpdateDecoder)
            .register(MessageDeleteDecoder)
            .register(MessageDeleteBulkDecoder)
            .register(MessageReactionRemoveAllDecoder)
            .register(PresenceUpdateDecoder)
            .register(TypingStartDecoder)
            .register(UserUpdateDecoder)
            .register(VoiceServerUpdateDecoder);
        registry
    }

    /// Add or replace the decoder for its dispatch type
    pub fn register<D: EventDecoder + 'static>(&mut self, decoder: D) -> &mut Self {
        self.decoders.insert(decoder.event_type(), Box::new(decoder));
        self
    }

    #[must_use]
    pub fn get(&self, event_type: &str) -> Option<&dyn EventDecoder> {
        self.decoders.get(event_type).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode one dispatch and queue its event.
    ///
    /// The queue slot is taken before decoding so delivery follows arrival
    /// order. A payload that fails to decode fills its slot with
    /// `ClientEvent::DecodeError`. Deferred look-ups run on their own task and
    /// never block the caller.
    pub fn dispatch(&self, ctx: &DecodeContext, event_type: &str, data: Value) {
        let slot = ctx.queue.reserve();

        let Some(decoder) = self.get(event_type) else {
            tracing::trace!(shard_id = ctx.shard_id, event = event_type, "No decoder, forwarding raw");
            slot.fill(ClientEvent::Raw {
                event_type: event_type.to_string(),
                data,
            });
            return;
        };

        match decoder.decode(ctx, data) {
            Ok(Emission::Now(event)) => slot.fill(event),
            Ok(Emission::Deferred(pending)) => {
                tokio::spawn(async move {
                    if let Some(event) = pending.await {
                        slot.fill(event);
                    }
                });
            }
            Ok(Emission::None) => {}
            Err(e) => {
                tracing::warn!(
                    shard_id = ctx.shard_id,
                    event = event_type,
                    error = %e,
                    "Failed to decode dispatch"
                );
                slot.fill(ClientEvent::DecodeError {
                    shard_id: ctx.shard_id,
                    event_type: event_type.to_string(),
                    error: Arc::new(e),
                });
            }
        }
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.decoders.keys().collect();
        types.sort_unstable();
        f.debug_struct("DecoderRegistry").field("decoders", &types).finish()
    }
}

/// A model that is either cached already or still being fetched
pub(crate) enum Lookup<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T: Send + 'static> Lookup<T> {
    /// Build the event now, or once the fetch settles
    pub(crate) fn emit<F>(self, build: F) -> Emission
    where
        F: FnOnce(T) -> Option<ClientEvent> + Send + 'static,
    {
        match self {
            Self::Ready(value) => build(value).map_or(Emission::None, Emission::Now),
            Self::Pending(pending) => Emission::Deferred(Box::pin(async move { build(pending.await) })),
        }
    }
}

/// Resolve a user referenced by a payload.
///
/// A cached user is patched with `raw`; a full user object is cached; a bare
/// id is fetched, falling back to the id when the fetch fails.
pub(crate) fn lookup_user(
    ctx: &DecodeContext,
    user_id: Snowflake,
    raw_user: Option<&Value>,
) -> Result<Lookup<ModelRef<User>>, DomainError> {
    if let Some(user) = ctx.cache.users.get(&user_id) {
        if let Some(raw_user) = raw_user {
            user.write().patch(raw_user);
        }
        return Ok(Lookup::Ready(user.into()));
    }

    if let Some(raw_user) = raw_user.filter(|u| raw::has(u, "username")) {
        return Ok(Lookup::Ready(ctx.cache.users.factory(raw_user)?.into()));
    }

    let fetcher = ctx.fetcher.clone();
    Ok(Lookup::Pending(Box::pin(async move {
        match fetcher.fetch_user(user_id).await {
            Ok(user) => ModelRef::Resolved(user),
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "User look-up failed");
                ModelRef::Unresolved(user_id)
            }
        }
    })))
}

/// Resolve a guild member, fetching it when it is not cached
pub(crate) fn lookup_member(
    ctx: &DecodeContext,
    guild_id: Snowflake,
    user_id: Snowflake,
) -> Lookup<ModelRef<GuildMember>> {
    if let Some(member) = ctx.cache.members.get(&(guild_id, user_id)) {
        return Lookup::Ready(member.into());
    }

    let fetcher = ctx.fetcher.clone();
    Lookup::Pending(Box::pin(async move {
        match fetcher.fetch_member(guild_id, user_id).await {
            Ok(member) => ModelRef::Resolved(member),
            Err(e) => {
                tracing::debug!(
                    guild_id = %guild_id,
                    user_id = %user_id,
                    error = %e,
                    "Member look-up failed"
                );
                ModelRef::Unresolved((guild_id, user_id))
            }
        }
    }))
}

/// Resolve a message, fetching it when it is not cached
pub(crate) fn lookup_message(
    ctx: &DecodeContext,
    channel_id: Snowflake,
    message_id: Snowflake,
) -> Lookup<ModelRef<Message>> {
    if let Some(message) = ctx.cache.messages.get(&message_id) {
        return Lookup::Ready(message.into());
    }

    let fetcher = ctx.fetcher.clone();
    Lookup::Pending(Box::pin(async move {
        match fetcher.fetch_message(channel_id, message_id).await {
            Ok(message) => ModelRef::Resolved(message),
            Err(e) => {
                tracing::debug!(message_id = %message_id, error = %e, "Message look-up failed");
                ModelRef::Unresolved(message_id)
            }
        }
    }))
}

/// Read a required id out of a nested object such as `user.id`
pub(crate) fn nested_id(
    data: &Value,
    object: &'static str,
    model: &'static str,
) -> Result<Snowflake, DomainError> {
    let inner = data
        .get(object)
        .ok_or(DomainError::MissingField { model, field: object })?;
    raw::require_id(inner, model, "id")
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for decoder tests

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chat_cache::ClientCache;
    use chat_core::{share, GuildMember, Message, Model, User};
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::queue::{ChannelSubscriber, EventQueue};

    /// Fetcher that serves users and members after a delay, or fails
    #[derive(Default)]
    pub struct StubFetcher {
        pub fail: bool,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelFetcher for StubFetcher {
        async fn fetch_user(&self, user_id: Snowflake) -> Result<Shared<User>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(DomainError::UserNotFound(user_id));
            }
            Ok(share(User::new(user_id, "fetched".to_string(), "0001".to_string())))
        }

        async fn fetch_member(
            &self,
            guild_id: Snowflake,
            user_id: Snowflake,
        ) -> Result<Shared<GuildMember>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(DomainError::MemberNotFound { guild_id, user_id });
            }
            Ok(share(GuildMember::new(guild_id, user_id)))
        }

        async fn fetch_members(&self, _guild_id: Snowflake) -> Result<usize, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(0)
        }

        async fn fetch_message(
            &self,
            channel_id: Snowflake,
            message_id: Snowflake,
        ) -> Result<Shared<Message>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(DomainError::MessageNotFound(message_id));
            }
            let raw = json!({"id": message_id.to_string(), "channel_id": channel_id.to_string()});
            Message::from_raw(&raw).map(share)
        }
    }

    pub struct Harness {
        pub ctx: DecodeContext,
        pub registry: DecoderRegistry,
        pub fetcher: Arc<StubFetcher>,
        pub events: mpsc::UnboundedReceiver<ClientEvent>,
    }

    impl Harness {
        pub fn new(fetcher: StubFetcher) -> Self {
            Self::with_config(fetcher, EventsConfig::default())
        }

        pub fn with_config(fetcher: StubFetcher, config: EventsConfig) -> Self {
            let queue = EventQueue::new();
            let (subscriber, events) = ChannelSubscriber::new();
            queue.subscribe(subscriber);
            let fetcher = Arc::new(fetcher);

            let ctx = DecodeContext {
                shard_id: 0,
                cache: ClientCache::new_shared(),
                fetcher: fetcher.clone(),
                ready: ReadyTracker::new(1, queue.clone()),
                events: Arc::new(config),
                queue,
            };

            Self {
                ctx,
                registry: DecoderRegistry::with_defaults(),
                fetcher,
                events,
            }
        }

        /// Mark the client ready without emitting anything worth asserting on
        pub async fn make_ready(&mut self) {
            self.ctx.ready.begin(0, std::collections::HashSet::new());
            self.drain().await;
        }

        pub fn dispatch(&self, event_type: &str, data: Value) {
            self.registry.dispatch(&self.ctx, event_type, data);
        }

        /// Collect every event queued so far, letting deferred work settle
        pub async fn drain(&mut self) -> Vec<ClientEvent> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            std::iter::from_fn(|| self.events.try_recv().ok()).collect()
        }

        pub fn fetch_calls(&self) -> usize {
            self.fetcher.calls.load(Ordering::SeqCst)
        }

        pub fn seed_client_user(&self, id: i64) {
            self.ctx
                .cache
                .set_client_user(&json!({"id": id.to_string(), "username": "me", "discriminator": "0001", "bot": true}))
                .unwrap();
        }

        pub fn seed_guild(&self, id: i64) -> Shared<Guild> {
            self.ctx
                .cache
                .add_guild(&json!({"id": id.to_string(), "name": "guild", "member_count": 1}), 0)
                .unwrap()
        }
    }

    pub fn names(events: &[ClientEvent]) -> Vec<&'static str> {
        events.iter().map(ClientEvent::name).collect()
    }
}
