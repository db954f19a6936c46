//! Guild dispatches

use chat_core::entities::raw;
use chat_core::{
    ClientEvent, DomainError, Guild, Model, ModelRef, ModelStore, Shared, Snowflake, User,
};
use serde_json::Value;

use super::{lookup_user, nested_id, DecodeContext, EventDecoder, Emission};

/// Guild became available, was joined, or streamed in during startup
pub struct GuildCreateDecoder;

impl EventDecoder for GuildCreateDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_CREATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let unavailable = raw::boolean(&data, "unavailable").unwrap_or(false);
        let guild = ctx.cache.add_guild(&data, ctx.shard_id)?;
        let guild_id = guild.read().id;
        let shard_id = ctx.shard_id;

        if unavailable {
            if !ctx.ready.is_shard_ready(shard_id) {
                ctx.ready.guild_arrived(shard_id, guild_id);
            }
            return Ok(ClientEvent::GuildUnavailable(guild).into());
        }

        let ctx = ctx.clone();
        Ok(Emission::Deferred(Box::pin(async move {
            prefetch_members(&ctx, &guild, guild_id).await;

            if ctx.ready.is_shard_ready(shard_id) || !ctx.ready.guild_arrived(shard_id, guild_id) {
                Some(ClientEvent::GuildCreate(guild))
            } else {
                None
            }
        })))
    }
}

/// Fetch the member list when configured to, or at least the client's own member
async fn prefetch_members(ctx: &DecodeContext, guild: &Shared<Guild>, guild_id: Snowflake) {
    let partially_cached = guild.read().is_partially_cached();

    if ctx.events.fetch_all_members && partially_cached {
        match ctx.fetcher.fetch_members(guild_id).await {
            Ok(count) => tracing::debug!(guild_id = %guild_id, count, "Fetched guild members"),
            Err(e) => {
                tracing::warn!(guild_id = %guild_id, error = %e, "Failed to fetch guild members");
            }
        }
        return;
    }

    if ctx.cache.self_member(guild_id).is_some() {
        return;
    }
    let Some(user_id) = ctx.cache.client_user_id() else {
        return;
    };
    if let Err(e) = ctx.fetcher.fetch_member(guild_id, user_id).await {
        tracing::warn!(guild_id = %guild_id, error = %e, "Failed to fetch own guild member");
    }
}

pub struct GuildUpdateDecoder;

impl EventDecoder for GuildUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_UPDATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let guild_id = Guild::key_from_raw(&data)?;
        let Some(guild) = ctx.cache.guilds.get(&guild_id) else {
            return Ok(Emission::None);
        };

        if raw::boolean(&data, "unavailable").unwrap_or(false) {
            guild.write().unavailable = true;
            return Ok(ClientEvent::GuildUnavailable(guild).into());
        }

        let before = ctx.snapshot("guildUpdate", &guild);
        guild.write().patch(&data);

        Ok(ClientEvent::GuildUpdate {
            before,
            after: guild,
        }
        .into())
    }
}

/// Guild left, or lost to an outage when `unavailable` is set
pub struct GuildDeleteDecoder;

impl EventDecoder for GuildDeleteDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_DELETE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let guild_id = Guild::key_from_raw(&data)?;
        let Some(guild) = ctx.cache.guilds.get(&guild_id) else {
            return Ok(Emission::None);
        };

        let channel_ids: Vec<Snowflake> = guild.read().channels.iter().copied().collect();
        for channel in channel_ids.iter().filter_map(|id| ctx.cache.channels.get(id)) {
            if let Some(text) = channel.write().as_text_channel_mut() {
                text.stop_typing();
            }
        }

        if raw::boolean(&data, "unavailable").unwrap_or(false) {
            guild.write().unavailable = true;
            return Ok(ClientEvent::GuildUnavailable(guild).into());
        }

        ctx.cache.remove_guild(guild_id);
        Ok(ClientEvent::GuildDelete(guild).into())
    }
}

fn decode_ban(
    ctx: &DecodeContext,
    data: &Value,
    build: fn(Shared<Guild>, ModelRef<User>) -> ClientEvent,
) -> Result<Emission, DomainError> {
    let user_id = nested_id(data, "user", "ban")?;
    let Some(guild) = ctx.guild_of(data, "ban")? else {
        return Ok(Emission::None);
    };
    let user = lookup_user(ctx, user_id, data.get("user"))?;
    Ok(user.emit(move |user| Some(build(guild, user))))
}

pub struct GuildBanAddDecoder;

impl EventDecoder for GuildBanAddDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_BAN_ADD"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        decode_ban(ctx, &data, |guild, user| ClientEvent::GuildBanAdd { guild, user })
    }
}

pub struct GuildBanRemoveDecoder;

impl EventDecoder for GuildBanRemoveDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_BAN_REMOVE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        decode_ban(ctx, &data, |guild, user| ClientEvent::GuildBanRemove { guild, user })
    }
}

/// Replaces the guild's emoji set
pub struct GuildEmojisUpdateDecoder;

impl EventDecoder for GuildEmojisUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_EMOJIS_UPDATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let Some(guild) = ctx.guild_of(&data, "emojis update")? else {
            return Ok(Emission::None);
        };
        let guild_id = guild.read().id;
        let emojis = data
            .get("emojis")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        ctx.cache.sync_emojis(guild_id, emojis);
        Ok(ClientEvent::GuildEmojisUpdate(guild).into())
    }
}
