//! READY and RESUMED

use std::collections::HashSet;

use chat_core::entities::raw;
use chat_core::{ClientEvent, DomainError, ModelStore};
use serde_json::Value;

use super::{DecodeContext, EventDecoder, Emission};

/// Caches the client user and the guild stubs, then starts the guild wait
pub struct ReadyDecoder;

impl EventDecoder for ReadyDecoder {
    fn event_type(&self) -> &'static str {
        "READY"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let user = data.get("user").ok_or(DomainError::MissingField {
            model: "ready",
            field: "user",
        })?;

        // Re-identified after the client already went ready
        if ctx.is_client_ready() && ctx.cache.client_user().is_some() {
            ctx.cache.set_client_user(user)?;
            ctx.ready.reannounce(ctx.shard_id);
            return Ok(Emission::None);
        }

        ctx.cache.set_client_user(user)?;

        let mut expected = HashSet::new();
        for guild in data.get("guilds").and_then(Value::as_array).into_iter().flatten() {
            let guild_id = raw::require_id(guild, "guild", "id")?;
            if !ctx.cache.guilds.has(&guild_id) {
                let stub = ctx.cache.guilds.factory(guild)?;
                stub.write().shard_id = Some(ctx.shard_id);
            }
            expected.insert(guild_id);
        }

        tracing::debug!(
            shard_id = ctx.shard_id,
            guilds = expected.len(),
            "READY received"
        );

        ctx.ready.begin(ctx.shard_id, expected);
        Ok(Emission::None)
    }
}

pub struct ResumedDecoder;

impl EventDecoder for ResumedDecoder {
    fn event_type(&self) -> &'static str {
        "RESUMED"
    }

    fn decode(&self, ctx: &DecodeContext, _data: Value) -> Result<Emission, DomainError> {
        Ok(ClientEvent::Resumed {
            shard_id: ctx.shard_id,
        }
        .into())
    }
}
