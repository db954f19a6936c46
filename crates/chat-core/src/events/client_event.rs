//! Client events
//!
//! Every handled gateway dispatch becomes exactly one `ClientEvent` on the
//! event queue. Update events carry an optional `before` snapshot (taken only
//! when snapshots are enabled for that event) and the shared `after` handle
//! that lives on in the cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::entities::{Channel, Guild, GuildMember, Message, Presence, Role, User};
use crate::error::DomainError;
use crate::traits::{Model, Shared};
use crate::value_objects::Snowflake;

/// A reference that could not always be resolved.
///
/// Look-up failures never block emission; the raw key is carried instead.
#[derive(Debug, Clone)]
pub enum ModelRef<T: Model> {
    Resolved(Shared<T>),
    Unresolved(T::Key),
}

impl<T: Model> ModelRef<T> {
    /// The model key, resolved or not
    pub fn key(&self) -> T::Key {
        match self {
            Self::Resolved(model) => model.read().key(),
            Self::Unresolved(key) => key.clone(),
        }
    }

    pub fn resolved(&self) -> Option<&Shared<T>> {
        match self {
            Self::Resolved(model) => Some(model),
            Self::Unresolved(_) => None,
        }
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl<T: Model> From<Shared<T>> for ModelRef<T> {
    fn from(model: Shared<T>) -> Self {
        Self::Resolved(model)
    }
}

/// All events delivered to subscribers
#[derive(Debug, Clone)]
pub enum ClientEvent {
    // =========================================================================
    // Lifecycle
    // =========================================================================
    /// Every shard is ready
    Ready,
    ShardReady {
        shard_id: u32,
    },
    Resumed {
        shard_id: u32,
    },
    Reconnect {
        shard_id: u32,
    },
    Disconnect {
        shard_id: u32,
        code: u16,
        reason: String,
    },
    /// Terminal condition on a shard (bad credentials, incompatible version)
    Error {
        shard_id: Option<u32>,
        message: String,
    },
    /// A dispatch whose payload could not be decoded; takes the slot its
    /// event would have used
    DecodeError {
        shard_id: u32,
        event_type: String,
        error: Arc<DomainError>,
    },

    // =========================================================================
    // Guild Events
    // =========================================================================
    GuildCreate(Shared<Guild>),
    GuildUpdate {
        before: Option<Guild>,
        after: Shared<Guild>,
    },
    GuildDelete(Shared<Guild>),
    GuildUnavailable(Shared<Guild>),
    GuildBanAdd {
        guild: Shared<Guild>,
        user: ModelRef<User>,
    },
    GuildBanRemove {
        guild: Shared<Guild>,
        user: ModelRef<User>,
    },
    GuildEmojisUpdate(Shared<Guild>),

    // =========================================================================
    // Member Events
    // =========================================================================
    GuildMemberAdd(Shared<GuildMember>),
    GuildMemberRemove {
        guild: Shared<Guild>,
        member: ModelRef<GuildMember>,
    },
    GuildMemberUpdate {
        before: Option<GuildMember>,
        after: ModelRef<GuildMember>,
    },
    GuildMembersChunk {
        guild: Shared<Guild>,
        members: Vec<Shared<GuildMember>>,
    },

    // =========================================================================
    // Role Events
    // =========================================================================
    RoleCreate(Shared<Role>),
    RoleUpdate {
        before: Option<Role>,
        after: Shared<Role>,
    },
    RoleDelete(Shared<Role>),

    // =========================================================================
    // Channel Events
    // =========================================================================
    ChannelCreate(Shared<Channel>),
    ChannelUpdate {
        before: Option<Channel>,
        after: Shared<Channel>,
    },
    ChannelDelete(Shared<Channel>),
    ChannelPinsUpdate {
        channel: Shared<Channel>,
        last_pin_at: Option<DateTime<Utc>>,
    },

    // =========================================================================
    // Message Events
    // =========================================================================
    Message(Shared<Message>),
    MessageUpdate {
        before: Option<Message>,
        after: Shared<Message>,
    },
    /// Update for a message that is not cached
    MessageUpdateRaw {
        channel_id: Snowflake,
        data: Value,
    },
    MessageDelete(Shared<Message>),
    MessageDeleteRaw {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    MessageDeleteBulk {
        channel_id: Snowflake,
        messages: Vec<Shared<Message>>,
        unresolved: Vec<Snowflake>,
    },
    /// Bulk delete where none of the messages were cached
    MessageDeleteBulkRaw {
        channel_id: Snowflake,
        message_ids: Vec<Snowflake>,
    },
    MessageReactionRemoveAll {
        channel_id: Snowflake,
        message: ModelRef<Message>,
    },

    // =========================================================================
    // Other
    // =========================================================================
    PresenceUpdate {
        before: Option<Presence>,
        after: Shared<Presence>,
    },
    TypingStart {
        channel: Shared<Channel>,
        user: ModelRef<User>,
    },
    UserUpdate {
        before: Option<User>,
        after: Shared<User>,
    },
    VoiceServerUpdate(Value),
    /// A dispatch with no dedicated decoder
    Raw {
        event_type: String,
        data: Value,
    },
}

impl ClientEvent {
    /// Event name as seen by subscribers
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::ShardReady { .. } => "shardReady",
            Self::Resumed { .. } => "resumed",
            Self::Reconnect { .. } => "reconnect",
            Self::Disconnect { .. } => "disconnect",
            Self::Error { .. } | Self::DecodeError { .. } => "error",
            Self::GuildCreate(_) => "guildCreate",
            Self::GuildUpdate { .. } => "guildUpdate",
            Self::GuildDelete(_) => "guildDelete",
            Self::GuildUnavailable(_) => "guildUnavailable",
            Self::GuildBanAdd { .. } => "guildBanAdd",
            Self::GuildBanRemove { .. } => "guildBanRemove",
            Self::GuildEmojisUpdate(_) => "guildEmojisUpdate",
            Self::GuildMemberAdd(_) => "guildMemberAdd",
            Self::GuildMemberRemove { .. } => "guildMemberRemove",
            Self::GuildMemberUpdate { .. } => "guildMemberUpdate",
            Self::GuildMembersChunk { .. } => "guildMembersChunk",
            Self::RoleCreate(_) => "roleCreate",
            Self::RoleUpdate { .. } => "roleUpdate",
            Self::RoleDelete(_) => "roleDelete",
            Self::ChannelCreate(_) => "channelCreate",
            Self::ChannelUpdate { .. } => "channelUpdate",
            Self::ChannelDelete(_) => "channelDelete",
            Self::ChannelPinsUpdate { .. } => "channelPinsUpdate",
            Self::Message(_) => "message",
            Self::MessageUpdate { .. } => "messageUpdate",
            Self::MessageUpdateRaw { .. } => "messageUpdateRaw",
            Self::MessageDelete(_) => "messageDelete",
            Self::MessageDeleteRaw { .. } => "messageDeleteRaw",
            Self::MessageDeleteBulk { .. } => "messageDeleteBulk",
            Self::MessageDeleteBulkRaw { .. } => "messageDeleteBulkRaw",
            Self::MessageReactionRemoveAll { .. } => "messageReactionRemoveAll",
            Self::PresenceUpdate { .. } => "presenceUpdate",
            Self::TypingStart { .. } => "typingStart",
            Self::UserUpdate { .. } => "userUpdate",
            Self::VoiceServerUpdate(_) => "voiceServerUpdate",
            Self::Raw { .. } => "raw",
        }
    }

    /// Check if this is a connection lifecycle event rather than a model event
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Ready
                | Self::ShardReady { .. }
                | Self::Resumed { .. }
                | Self::Reconnect { .. }
                | Self::Disconnect { .. }
                | Self::Error { .. }
        )
    }
}

impl std::fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::share;

    #[test]
    fn test_event_names() {
        let guild = share(Guild::unavailable(Snowflake::new(1)));
        assert_eq!(ClientEvent::GuildUnavailable(guild.clone()).name(), "guildUnavailable");
        assert_eq!(
            ClientEvent::GuildUpdate {
                before: None,
                after: guild
            }
            .name(),
            "guildUpdate"
        );
        assert_eq!(ClientEvent::Ready.to_string(), "ready");

        let failed = ClientEvent::DecodeError {
            shard_id: 0,
            event_type: "TYPING_START".to_string(),
            error: Arc::new(DomainError::FetchFailed("timeout".to_string())),
        };
        assert_eq!(failed.name(), "error");
        assert!(!failed.is_lifecycle());
    }

    #[test]
    fn test_lifecycle_classification() {
        assert!(ClientEvent::ShardReady { shard_id: 0 }.is_lifecycle());
        assert!(!ClientEvent::VoiceServerUpdate(Value::Null).is_lifecycle());
    }

    #[test]
    fn test_model_ref_key() {
        let user = share(User::new(Snowflake::new(5), "a".to_string(), "0001".to_string()));
        let resolved: ModelRef<User> = user.into();
        assert!(resolved.is_resolved());
        assert_eq!(resolved.key(), Snowflake::new(5));

        let unresolved: ModelRef<User> = ModelRef::Unresolved(Snowflake::new(6));
        assert!(unresolved.resolved().is_none());
        assert_eq!(unresolved.key(), Snowflake::new(6));
    }
}
