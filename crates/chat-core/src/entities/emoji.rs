//! Custom emoji entity

use serde_json::Value;

use super::raw;
use crate::error::DomainError;
use crate::traits::Model;
use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emoji {
    pub id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub name: String,
    pub animated: bool,
    pub managed: bool,
    pub roles: Vec<Snowflake>,
}

impl Emoji {
    /// Mention form used inside message content
    pub fn identifier(&self) -> String {
        let prefix = if self.animated { "a" } else { "" };
        format!("<{prefix}:{}:{}>", self.name, self.id)
    }
}

impl Model for Emoji {
    type Key = Snowflake;

    const NAME: &'static str = "emoji";

    fn key(&self) -> Snowflake {
        self.id
    }

    fn key_from_raw(raw: &Value) -> Result<Snowflake, DomainError> {
        raw::require_id(raw, Self::NAME, "id")
    }

    fn from_raw(raw: &Value) -> Result<Self, DomainError> {
        let mut emoji = Self {
            id: Self::key_from_raw(raw)?,
            guild_id: raw::opt_id(raw, "guild_id"),
            name: String::new(),
            animated: false,
            managed: false,
            roles: Vec::new(),
        };
        emoji.patch(raw);
        Ok(emoji)
    }

    fn patch(&mut self, raw: &Value) {
        if let Some(name) = raw::string(raw, "name") {
            self.name = name;
        }
        if let Some(animated) = raw::boolean(raw, "animated") {
            self.animated = animated;
        }
        if let Some(managed) = raw::boolean(raw, "managed") {
            self.managed = managed;
        }
        if let Some(roles) = raw::id_list(raw, "roles") {
            self.roles = roles;
        }
    }
}
