//! Guild entity - a server and the ids of everything cached under it

use std::collections::HashSet;

use serde_json::Value;

use super::raw;
use crate::error::DomainError;
use crate::traits::Model;
use crate::value_objects::Snowflake;

/// Guild (server)
///
/// Channels, roles, emojis and members live in their own stores; the guild
/// only tracks which ids belong to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: Option<Snowflake>,
    pub region: Option<String>,
    pub unavailable: bool,
    pub large: bool,
    pub member_count: u64,
    /// Shard that delivered this guild
    pub shard_id: Option<u32>,
    pub channels: HashSet<Snowflake>,
    pub roles: HashSet<Snowflake>,
    pub emojis: HashSet<Snowflake>,
    pub members: HashSet<Snowflake>,
}

impl Guild {
    /// Create an unavailable placeholder, as announced by READY
    pub fn unavailable(id: Snowflake) -> Self {
        Self {
            id,
            unavailable: true,
            ..Self::default()
        }
    }

    /// Check if the given user is the owner
    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == Some(user_id)
    }

    /// Number of members currently cached for this guild
    #[inline]
    pub fn cached_member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether the member list in cache is smaller than the announced count
    pub fn is_partially_cached(&self) -> bool {
        (self.cached_member_count() as u64) < self.member_count
    }
}

impl Model for Guild {
    type Key = Snowflake;

    const NAME: &'static str = "guild";

    fn key(&self) -> Snowflake {
        self.id
    }

    fn key_from_raw(raw: &Value) -> Result<Snowflake, DomainError> {
        raw::require_id(raw, Self::NAME, "id")
    }

    fn from_raw(raw: &Value) -> Result<Self, DomainError> {
        let mut guild = Self {
            id: Self::key_from_raw(raw)?,
            ..Self::default()
        };
        guild.patch(raw);
        Ok(guild)
    }

    fn patch(&mut self, raw: &Value) {
        if let Some(name) = raw::string(raw, "name") {
            self.name = name;
        }
        if raw::has(raw, "icon") {
            self.icon = raw::string(raw, "icon");
        }
        if let Some(owner_id) = raw::opt_id(raw, "owner_id") {
            self.owner_id = Some(owner_id);
        }
        if let Some(region) = raw::string(raw, "region") {
            self.region = Some(region);
        }
        self.unavailable = raw::boolean(raw, "unavailable").unwrap_or(false);
        if let Some(large) = raw::boolean(raw, "large") {
            self.large = large;
        }
        if let Some(count) = raw::int(raw, "member_count") {
            self.member_count = count.max(0) as u64;
        }
    }
}
