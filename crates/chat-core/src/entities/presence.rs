//! Presence entity - a user's status as last announced by the gateway

use serde_json::Value;

use super::raw;
use crate::error::DomainError;
use crate::traits::Model;
use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    pub user_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    /// online, idle, dnd or offline
    pub status: String,
    pub activity: Option<Value>,
}

impl Presence {
    #[inline]
    pub fn is_online(&self) -> bool {
        self.status != "offline"
    }
}

impl Model for Presence {
    type Key = Snowflake;

    const NAME: &'static str = "presence";

    fn key(&self) -> Snowflake {
        self.user_id
    }

    fn key_from_raw(raw: &Value) -> Result<Snowflake, DomainError> {
        let user = raw.get("user").ok_or(DomainError::MissingField {
            model: Self::NAME,
            field: "user",
        })?;
        raw::require_id(user, Self::NAME, "id")
    }

    fn from_raw(raw: &Value) -> Result<Self, DomainError> {
        let mut presence = Self {
            user_id: Self::key_from_raw(raw)?,
            guild_id: raw::opt_id(raw, "guild_id"),
            status: "offline".to_string(),
            activity: None,
        };
        presence.patch(raw);
        Ok(presence)
    }

    fn patch(&mut self, raw: &Value) {
        if let Some(status) = raw::string(raw, "status") {
            self.status = status;
        }
        if raw::has(raw, "game") {
            self.activity = raw.get("game").filter(|g| !g.is_null()).cloned();
        }
    }
}
