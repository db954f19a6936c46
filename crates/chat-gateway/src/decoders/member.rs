//! Guild member dispatches

use chat_core::{ClientEvent, DomainError, Model, ModelRef, ModelStore};
use serde_json::Value;

use super::{lookup_member, nested_id, DecodeContext, EventDecoder, Emission};

pub struct GuildMemberAddDecoder;

impl EventDecoder for GuildMemberAddDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_MEMBER_ADD"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let Some(guild) = ctx.guild_of(&data, "member")? else {
            return Ok(Emission::None);
        };
        let guild_id = guild.read().id;

        let member = ctx.cache.add_member(guild_id, &data)?;
        guild.write().member_count += 1;

        Ok(ClientEvent::GuildMemberAdd(member).into())
    }
}

pub struct GuildMemberRemoveDecoder;

impl EventDecoder for GuildMemberRemoveDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_MEMBER_REMOVE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let user_id = nested_id(&data, "user", "member")?;
        let Some(guild) = ctx.guild_of(&data, "member")? else {
            return Ok(Emission::None);
        };
        let guild_id = guild.read().id;

        {
            let mut g = guild.write();
            g.member_count = g.member_count.saturating_sub(1);
        }

        let member = match ctx.cache.remove_member(guild_id, user_id) {
            Some(member) => ModelRef::Resolved(member),
            None => ModelRef::Unresolved((guild_id, user_id)),
        };

        Ok(ClientEvent::GuildMemberRemove { guild, member }.into())
    }
}

/// Patches a cached member, or fetches the member it does not know yet
pub struct GuildMemberUpdateDecoder;

impl EventDecoder for GuildMemberUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_MEMBER_UPDATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let user_id = nested_id(&data, "user", "member")?;
        let Some(guild) = ctx.guild_of(&data, "member")? else {
            return Ok(Emission::None);
        };
        let guild_id = guild.read().id;

        if let Some(user) = data.get("user") {
            if let Some(cached) = ctx.cache.users.get(&user_id) {
                cached.write().patch(user);
            }
        }

        if let Some(member) = ctx.cache.members.get(&(guild_id, user_id)) {
            let before = ctx.snapshot("guildMemberUpdate", &member);
            member.write().patch(&data);
            return Ok(ClientEvent::GuildMemberUpdate {
                before,
                after: member.into(),
            }
            .into());
        }

        Ok(lookup_member(ctx, guild_id, user_id)
            .emit(|after| Some(ClientEvent::GuildMemberUpdate { before: None, after })))
    }
}

/// Members requested through op 8
pub struct GuildMembersChunkDecoder;

impl EventDecoder for GuildMembersChunkDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_MEMBERS_CHUNK"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let Some(guild) = ctx.guild_of(&data, "members chunk")? else {
            return Ok(Emission::None);
        };
        let guild_id = guild.read().id;

        let members = data
            .get("members")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|raw| match ctx.cache.add_member(guild_id, raw) {
                Ok(member) => Some(member),
                Err(e) => {
                    tracing::debug!(guild_id = %guild_id, error = %e, "Skipping malformed member");
                    None
                }
            })
            .collect();

        Ok(ClientEvent::GuildMembersChunk { guild, members }.into())
    }
}
