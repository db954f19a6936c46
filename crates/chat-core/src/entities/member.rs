//! Guild member entity - a user's membership in one guild

use serde_json::Value;

use super::raw;
use crate::error::DomainError;
use crate::traits::Model;
use crate::value_objects::Snowflake;

/// Members are keyed by `(guild_id, user_id)`
pub type MemberKey = (Snowflake, Snowflake);

/// Guild member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMember {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub nick: Option<String>,
    pub roles: Vec<Snowflake>,
    pub joined_at: Option<String>,
    pub deaf: bool,
    pub mute: bool,
}

impl GuildMember {
    pub fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self {
            guild_id,
            user_id,
            nick: None,
            roles: Vec::new(),
            joined_at: None,
            deaf: false,
            mute: false,
        }
    }

    /// Nickname if set
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.nick.as_deref().unwrap_or(username)
    }

    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }
}

impl Model for GuildMember {
    type Key = MemberKey;

    const NAME: &'static str = "member";

    fn key(&self) -> MemberKey {
        (self.guild_id, self.user_id)
    }

    /// Members carry their user nested under `user`; `guild_id` is injected
    /// by the cache when the payload omits it.
    fn key_from_raw(raw: &Value) -> Result<MemberKey, DomainError> {
        let guild_id = raw::require_id(raw, Self::NAME, "guild_id")?;
        let user = raw.get("user").ok_or(DomainError::MissingField {
            model: Self::NAME,
            field: "user",
        })?;
        let user_id = raw::require_id(user, Self::NAME, "id")?;
        Ok((guild_id, user_id))
    }

    fn from_raw(raw: &Value) -> Result<Self, DomainError> {
        let (guild_id, user_id) = Self::key_from_raw(raw)?;
        let mut member = Self::new(guild_id, user_id);
        member.patch(raw);
        Ok(member)
    }

    fn patch(&mut self, raw: &Value) {
        if raw::has(raw, "nick") {
            self.nick = raw::string(raw, "nick");
        }
        if let Some(roles) = raw::id_list(raw, "roles") {
            self.roles = roles;
        }
        if let Some(joined_at) = raw::string(raw, "joined_at") {
            self.joined_at = Some(joined_at);
        }
        if let Some(deaf) = raw::boolean(raw, "deaf") {
            self.deaf = deaf;
        }
        if let Some(mute) = raw::boolean(raw, "mute") {
            self.mute = mute;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_key_from_nested_user() {
        let raw = json!({"guild_id": "1", "user": {"id": "2"}, "roles": ["3"], "nick": "n"});
        let member = GuildMember::from_raw(&raw).unwrap();
        assert_eq!(member.key(), (Snowflake::new(1), Snowflake::new(2)));
        assert!(member.has_role(Snowflake::new(3)));
        assert_eq!(member.display_name("user"), "n");
    }

    #[test]
    fn test_member_requires_guild_id() {
        assert!(GuildMember::from_raw(&json!({"user": {"id": "2"}})).is_err());
    }

    #[test]
    fn test_patch_clears_nick() {
        let mut member = GuildMember::new(Snowflake::new(1), Snowflake::new(2));
        member.nick = Some("old".to_string());
        member.patch(&json!({"nick": null, "roles": []}));
        assert!(member.nick.is_none());
        assert!(member.roles.is_empty());
    }
}
