//! Channel dispatches

use chat_core::entities::raw;
use chat_core::{Channel, ClientEvent, DomainError, Model, ModelStore, Shared, Snowflake};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::{lookup_user, DecodeContext, EventDecoder, Emission};

/// Emit once every member named by a member overwrite is cached or has
/// failed to load. Failed look-ups are ignored.
fn after_overwrite_members<F>(ctx: &DecodeContext, channel: Shared<Channel>, build: F) -> Emission
where
    F: FnOnce(Shared<Channel>) -> ClientEvent + Send + 'static,
{
    let pending = channel.read().as_guild_channel().map(|g| {
        let missing: Vec<Snowflake> = g
            .member_overwrite_targets()
            .filter(|user_id| !ctx.cache.members.has(&(g.guild_id, *user_id)))
            .collect();
        (g.guild_id, missing)
    });

    let Some((guild_id, missing)) = pending.filter(|(_, missing)| !missing.is_empty()) else {
        return build(channel).into();
    };

    let fetcher = ctx.fetcher.clone();
    Emission::Deferred(Box::pin(async move {
        let lookups = missing.iter().map(|user_id| fetcher.fetch_member(guild_id, *user_id));
        for (user_id, result) in missing.iter().zip(futures::future::join_all(lookups).await) {
            if let Err(e) = result {
                tracing::debug!(
                    guild_id = %guild_id,
                    user_id = %user_id,
                    error = %e,
                    "Overwrite member look-up failed"
                );
            }
        }
        Some(build(channel))
    }))
}

pub struct ChannelCreateDecoder;

impl EventDecoder for ChannelCreateDecoder {
    fn event_type(&self) -> &'static str {
        "CHANNEL_CREATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let channel = ctx.cache.add_channel(&data)?;
        Ok(after_overwrite_members(ctx, channel, ClientEvent::ChannelCreate))
    }
}

pub struct ChannelUpdateDecoder;

impl EventDecoder for ChannelUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "CHANNEL_UPDATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let channel_id = Channel::key_from_raw(&data)?;
        let Some(channel) = ctx.cache.channels.get(&channel_id) else {
            return Ok(Emission::None);
        };

        let before = ctx.snapshot("channelUpdate", &channel);
        channel.write().patch(&data);

        Ok(after_overwrite_members(ctx, channel, move |after| {
            ClientEvent::ChannelUpdate { before, after }
        }))
    }
}

pub struct ChannelDeleteDecoder;

impl EventDecoder for ChannelDeleteDecoder {
    fn event_type(&self) -> &'static str {
        "CHANNEL_DELETE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let channel_id = Channel::key_from_raw(&data)?;
        Ok(ctx
            .cache
            .remove_channel(channel_id)
            .map_or(Emission::None, |channel| ClientEvent::ChannelDelete(channel).into()))
    }
}

pub struct ChannelPinsUpdateDecoder;

impl EventDecoder for ChannelPinsUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "CHANNEL_PINS_UPDATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let channel_id = raw::require_id(&data, "pins update", "channel_id")?;
        let Some(channel) = ctx.cache.channels.get(&channel_id) else {
            return Ok(Emission::None);
        };

        let last_pin_at = data.get("last_pin_timestamp").and_then(parse_timestamp);
        if let Some(text) = channel.write().as_text_channel_mut() {
            text.last_pin_at = last_pin_at;
        }

        Ok(ClientEvent::ChannelPinsUpdate {
            channel,
            last_pin_at,
        }
        .into())
    }
}

/// Parse an RFC 3339 string or a unix timestamp in seconds
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

/// Emitted only for a fresh typing session, and only once the client is ready
pub struct TypingStartDecoder;

impl EventDecoder for TypingStartDecoder {
    fn event_type(&self) -> &'static str {
        "TYPING_START"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        if !ctx.is_client_ready() {
            return Ok(Emission::None);
        }

        let channel_id = raw::require_id(&data, "typing", "channel_id")?;
        let user_id = raw::require_id(&data, "typing", "user_id")?;
        let Some(channel) = ctx
            .cache
            .channels
            .get(&channel_id)
            .filter(|c| c.read().as_text_channel().is_some())
        else {
            return Ok(Emission::None);
        };

        let guild_id = channel.read().guild_id();
        if let (Some(guild_id), Some(member)) = (guild_id, data.get("member")) {
            if !ctx.cache.members.has(&(guild_id, user_id)) {
                let mut member = member.clone();
                if member.get("user").is_none() {
                    member["user"] = serde_json::json!({ "id": user_id.to_string() });
                }
                if let Err(e) = ctx.cache.add_member(guild_id, &member) {
                    tracing::debug!(guild_id = %guild_id, error = %e, "Skipping malformed typing member");
                }
            }
        }

        let at = data
            .get("timestamp")
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        Ok(lookup_user(ctx, user_id, None)?.emit(move |user| {
            let fresh = channel
                .write()
                .as_text_channel_mut()
                .is_some_and(|text| text.update_typing(user_id, at));
            fresh.then(|| ClientEvent::TypingStart { channel, user })
        }))
    }
}
