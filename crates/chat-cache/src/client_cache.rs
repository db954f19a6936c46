//! Client cache - every model store plus the guild bookkeeping around them
//!
//! Guild-owned models (channels, roles, emojis, members) live in their own
//! stores. The guild keeps the id sets, and the methods here keep both sides
//! consistent.

use std::sync::Arc;

use chat_core::{
    Channel, DomainError, Emoji, Guild, GuildMember, Message, ModelStore, Presence, Role, Shared,
    Snowflake, User,
};
use parking_lot::RwLock;
use serde_json::Value;

use crate::store::MemoryStore;

/// Shared cache handle
pub type SharedCache = Arc<ClientCache>;

/// Aggregate of all model stores
#[derive(Debug, Default)]
pub struct ClientCache {
    pub users: MemoryStore<User>,
    pub guilds: MemoryStore<Guild>,
    pub channels: MemoryStore<Channel>,
    pub members: MemoryStore<GuildMember>,
    pub roles: MemoryStore<Role>,
    pub emojis: MemoryStore<Emoji>,
    pub messages: MemoryStore<Message>,
    pub presences: MemoryStore<Presence>,
    client_user: RwLock<Option<Shared<User>>>,
}

impl ClientCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_shared() -> SharedCache {
        Arc::new(Self::new())
    }

    // =========================================================================
    // Client user
    // =========================================================================

    /// The authenticated user, once READY has been received
    pub fn client_user(&self) -> Option<Shared<User>> {
        self.client_user.read().clone()
    }

    pub fn client_user_id(&self) -> Option<Snowflake> {
        self.client_user.read().as_ref().map(|u| u.read().id)
    }

    /// Create or patch the client user and remember it
    pub fn set_client_user(&self, raw: &Value) -> Result<Shared<User>, DomainError> {
        let user = self.users.factory(raw)?;
        *self.client_user.write() = Some(user.clone());
        Ok(user)
    }

    // =========================================================================
    // Guilds
    // =========================================================================

    /// Create or patch a guild together with everything embedded in it
    pub fn add_guild(&self, raw: &Value, shard_id: u32) -> Result<Shared<Guild>, DomainError> {
        let guild = self.guilds.factory(raw)?;
        let guild_id = {
            let mut g = guild.write();
            g.shard_id = Some(shard_id);
            if g.unavailable {
                return Ok(guild.clone());
            }
            g.id
        };

        for channel in array(raw, "channels") {
            if let Err(e) = self.add_channel(&with_guild_id(channel, guild_id)) {
                tracing::debug!(guild_id = %guild_id, error = %e, "Skipping malformed channel");
            }
        }

        for role in array(raw, "roles") {
            if let Err(e) = self.add_role(guild_id, role) {
                tracing::debug!(guild_id = %guild_id, error = %e, "Skipping malformed role");
            }
        }

        if let Some(emojis) = raw.get("emojis").and_then(Value::as_array) {
            self.sync_emojis(guild_id, emojis);
        }

        for member in array(raw, "members") {
            if let Err(e) = self.add_member(guild_id, member) {
                tracing::debug!(guild_id = %guild_id, error = %e, "Skipping malformed member");
            }
        }

        for presence in array(raw, "presences") {
            if let Err(e) = self.presences.factory(&with_guild_id(presence, guild_id)) {
                tracing::debug!(guild_id = %guild_id, error = %e, "Skipping malformed presence");
            }
        }

        Ok(guild)
    }

    /// Remove a guild and the models it owns
    pub fn remove_guild(&self, guild_id: Snowflake) -> Option<Shared<Guild>> {
        let guild = self.guilds.delete(&guild_id)?;

        {
            let g = guild.read();
            for id in &g.channels {
                self.channels.delete(id);
            }
            for id in &g.emojis {
                self.emojis.delete(id);
            }
            for id in &g.roles {
                self.roles.delete(id);
            }
        }
        self.members.remove_where(|m| m.guild_id == guild_id);

        tracing::debug!(guild_id = %guild_id, "Guild removed from cache");
        Some(guild)
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Create or patch a channel, registering guild channels with their guild
    pub fn add_channel(&self, raw: &Value) -> Result<Shared<Channel>, DomainError> {
        let channel = self.channels.factory(raw)?;
        let (channel_id, guild_id) = {
            let c = channel.read();
            (c.id, c.guild_id())
        };
        if let Some(guild) = guild_id.and_then(|id| self.guilds.get(&id)) {
            guild.write().channels.insert(channel_id);
        }
        Ok(channel)
    }

    pub fn remove_channel(&self, channel_id: Snowflake) -> Option<Shared<Channel>> {
        let channel = self.channels.delete(&channel_id)?;
        let guild_id = channel.read().guild_id();
        if let Some(guild) = guild_id.and_then(|id| self.guilds.get(&id)) {
            guild.write().channels.remove(&channel_id);
        }
        self.messages.remove_where(|m| m.channel_id == channel_id);
        Some(channel)
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn add_role(&self, guild_id: Snowflake, raw: &Value) -> Result<Shared<Role>, DomainError> {
        let role = self.roles.factory(&with_guild_id(raw, guild_id))?;
        let role_id = role.read().id;
        if let Some(guild) = self.guilds.get(&guild_id) {
            guild.write().roles.insert(role_id);
        }
        Ok(role)
    }

    pub fn remove_role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<Shared<Role>> {
        let role = self.roles.delete(&role_id)?;
        if let Some(guild) = self.guilds.get(&guild_id) {
            guild.write().roles.remove(&role_id);
        }
        Some(role)
    }

    // =========================================================================
    // Emojis
    // =========================================================================

    /// Replace a guild's emoji set with `list`, patching known emojis and
    /// dropping the ones no longer present
    pub fn sync_emojis(&self, guild_id: Snowflake, list: &[Value]) -> Vec<Shared<Emoji>> {
        let mut kept = Vec::with_capacity(list.len());
        for raw in list {
            match self.emojis.factory(&with_guild_id(raw, guild_id)) {
                Ok(emoji) => kept.push(emoji),
                Err(e) => {
                    tracing::debug!(guild_id = %guild_id, error = %e, "Skipping malformed emoji");
                }
            }
        }

        let ids: std::collections::HashSet<Snowflake> =
            kept.iter().map(|e| e.read().id).collect();

        if let Some(guild) = self.guilds.get(&guild_id) {
            let mut g = guild.write();
            for stale in g.emojis.difference(&ids) {
                self.emojis.delete(stale);
            }
            g.emojis = ids;
        }

        kept
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Create or patch a member and the user embedded in it
    pub fn add_member(
        &self,
        guild_id: Snowflake,
        raw: &Value,
    ) -> Result<Shared<GuildMember>, DomainError> {
        if let Some(user) = raw.get("user") {
            self.users.factory(user)?;
        }
        let member = self.members.factory(&with_guild_id(raw, guild_id))?;
        let user_id = member.read().user_id;
        if let Some(guild) = self.guilds.get(&guild_id) {
            guild.write().members.insert(user_id);
        }
        Ok(member)
    }

    pub fn remove_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Option<Shared<GuildMember>> {
        if let Some(guild) = self.guilds.get(&guild_id) {
            guild.write().members.remove(&user_id);
        }
        self.members.delete(&(guild_id, user_id))
    }

    /// The client user's own membership in a guild
    pub fn self_member(&self, guild_id: Snowflake) -> Option<Shared<GuildMember>> {
        let user_id = self.client_user_id()?;
        self.members.get(&(guild_id, user_id))
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Cache a message and its author, advancing the channel's last message
    pub fn add_message(&self, raw: &Value) -> Result<Shared<Message>, DomainError> {
        if let Some(author) = raw.get("author") {
            self.users.factory(author)?;
        }
        let message = self.messages.factory(raw)?;
        let (message_id, channel_id) = {
            let m = message.read();
            (m.id, m.channel_id)
        };
        if let Some(channel) = self.channels.get(&channel_id) {
            if let Some(text) = channel.write().as_text_channel_mut() {
                text.last_message_id = Some(message_id);
            }
        }
        Ok(message)
    }

    /// Drop everything
    pub fn clear(&self) {
        self.users.clear();
        self.guilds.clear();
        self.channels.clear();
        self.members.clear();
        self.roles.clear();
        self.emojis.clear();
        self.messages.clear();
        self.presences.clear();
        *self.client_user.write() = None;
    }
}

fn array<'a>(raw: &'a Value, field: &str) -> impl Iterator<Item = &'a Value> {
    raw.get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Copy of `raw` with `guild_id` set, for payloads nested under a guild
fn with_guild_id(raw: &Value, guild_id: Snowflake) -> Value {
    let mut value = raw.clone();
    if let Value::Object(map) = &mut value {
        map.entry("guild_id")
            .or_insert_with(|| Value::String(guild_id.to_string()));
    }
    value
}
