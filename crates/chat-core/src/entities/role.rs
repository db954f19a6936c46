//! Role entity

use serde_json::Value;

use super::raw;
use crate::error::DomainError;
use crate::traits::Model;
use crate::value_objects::Snowflake;

/// Guild role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub position: i64,
    pub permissions: u64,
    pub managed: bool,
    pub mentionable: bool,
}

impl Role {
    /// The @everyone role shares its id with the guild
    #[inline]
    pub fn is_everyone(&self) -> bool {
        self.id == self.guild_id
    }

    /// Hex color string (e.g. "#5865F2")
    pub fn hex_color(&self) -> String {
        format!("#{:06X}", self.color)
    }
}

impl Model for Role {
    type Key = Snowflake;

    const NAME: &'static str = "role";

    fn key(&self) -> Snowflake {
        self.id
    }

    fn key_from_raw(raw: &Value) -> Result<Snowflake, DomainError> {
        raw::require_id(raw, Self::NAME, "id")
    }

    fn from_raw(raw: &Value) -> Result<Self, DomainError> {
        let mut role = Self {
            id: Self::key_from_raw(raw)?,
            guild_id: raw::require_id(raw, Self::NAME, "guild_id")?,
            name: String::new(),
            color: 0,
            hoist: false,
            position: 0,
            permissions: 0,
            managed: false,
            mentionable: false,
        };
        role.patch(raw);
        Ok(role)
    }

    fn patch(&mut self, raw: &Value) {
        if let Some(name) = raw::string(raw, "name") {
            self.name = name;
        }
        if let Some(color) = raw::int(raw, "color") {
            self.color = color.clamp(0, 0xFF_FFFF) as u32;
        }
        if let Some(hoist) = raw::boolean(raw, "hoist") {
            self.hoist = hoist;
        }
        if let Some(position) = raw::int(raw, "position") {
            self.position = position;
        }
        if let Some(permissions) = raw::bits(raw, "permissions") {
            self.permissions = permissions;
        }
        if let Some(managed) = raw::boolean(raw, "managed") {
            self.managed = managed;
        }
        if let Some(mentionable) = raw::boolean(raw, "mentionable") {
            self.mentionable = mentionable;
        }
    }
}
