//! Guild role dispatches

use chat_core::entities::raw;
use chat_core::{ClientEvent, DomainError, Model, ModelStore};
use serde_json::Value;

use super::{nested_id, DecodeContext, EventDecoder, Emission};

fn role_payload(data: &Value) -> Result<&Value, DomainError> {
    data.get("role").ok_or(DomainError::MissingField {
        model: "role",
        field: "role",
    })
}

pub struct RoleCreateDecoder;

impl EventDecoder for RoleCreateDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_ROLE_CREATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let Some(guild) = ctx.guild_of(&data, "role")? else {
            return Ok(Emission::None);
        };
        let guild_id = guild.read().id;

        let role = ctx.cache.add_role(guild_id, role_payload(&data)?)?;
        Ok(ClientEvent::RoleCreate(role).into())
    }
}

/// An update for an unknown role is treated as its creation
pub struct RoleUpdateDecoder;

impl EventDecoder for RoleUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_ROLE_UPDATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let role_id = nested_id(&data, "role", "role")?;
        let Some(guild) = ctx.guild_of(&data, "role")? else {
            return Ok(Emission::None);
        };
        let guild_id = guild.read().id;
        let payload = role_payload(&data)?;

        let Some(role) = ctx.cache.roles.get(&role_id) else {
            let role = ctx.cache.add_role(guild_id, payload)?;
            return Ok(ClientEvent::RoleCreate(role).into());
        };

        let before = ctx.snapshot("roleUpdate", &role);
        role.write().patch(payload);
        Ok(ClientEvent::RoleUpdate {
            before,
            after: role,
        }
        .into())
    }
}

pub struct RoleDeleteDecoder;

impl EventDecoder for RoleDeleteDecoder {
    fn event_type(&self) -> &'static str {
        "GUILD_ROLE_DELETE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let guild_id = raw::require_id(&data, "role", "guild_id")?;
        let role_id = raw::require_id(&data, "role", "role_id")?;

        Ok(ctx
            .cache
            .remove_role(guild_id, role_id)
            .map_or(Emission::None, |role| ClientEvent::RoleDelete(role).into()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use chat_core::{ClientEvent, ModelStore, Snowflake};
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_role_lifecycle() {
        let mut harness = Harness::new(StubFetcher::default());
        let guild = harness.seed_guild(1);

        harness.dispatch(
            "GUILD_ROLE_CREATE",
            json!({"guild_id": "1", "role": {"id": "20", "name": "mods", "color": 255}}),
        );
        harness.dispatch(
            "GUILD_ROLE_UPDATE",
            json!({"guild_id": "1", "role": {"id": "20", "name": "admins"}}),
        );
        harness.dispatch("GUILD_ROLE_DELETE", json!({"guild_id": "1", "role_id": "20"}));

        let events = harness.drain().await;
        assert_eq!(names(&events), vec!["roleCreate", "roleUpdate", "roleDelete"]);

        let ClientEvent::RoleUpdate { before, after } = &events[1] else {
            unreachable!();
        };
        assert_eq!(before.as_ref().unwrap().name, "mods");
        assert_eq!(after.read().name, "admins");
        assert!(!guild.read().roles.contains(&Snowflake::new(20)));
        assert!(!harness.ctx.cache.roles.has(&Snowflake::new(20)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_for_unknown_role_creates_it() {
        let mut harness = Harness::new(StubFetcher::default());
        harness.seed_guild(1);

        harness.dispatch(
            "GUILD_ROLE_UPDATE",
            json!({"guild_id": "1", "role": {"id": "21", "name": "late"}}),
        );
        assert_eq!(names(&harness.drain().await), vec!["roleCreate"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_unknown_role_is_silent() {
        let mut harness = Harness::new(StubFetcher::default());
        harness.dispatch("GUILD_ROLE_DELETE", json!({"guild_id": "1", "role_id": "99"}));
        assert!(harness.drain().await.is_empty());
    }
}
