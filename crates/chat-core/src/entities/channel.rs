//! Channel entity
//!
//! One struct covers every channel kind. The kind decides which capability
//! parts are present:
//!
//! | Kind               | guild | text | voice |
//! |--------------------|-------|------|-------|
//! | Text, News         | yes   | yes  |       |
//! | Dm, GroupDm        |       | yes  |       |
//! | Voice              | yes   |      | yes   |
//! | Category, Store    | yes   |      |       |
//!
//! Callers go through [`Channel::as_guild_channel`], [`Channel::as_text_channel`]
//! and [`Channel::as_voice_channel`] instead of matching on the kind.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::raw;
use crate::error::DomainError;
use crate::traits::Model;
use crate::value_objects::Snowflake;

/// Seconds a typing indicator stays active without a refresh
pub const TYPING_TIMEOUT_SECS: i64 = 10;

/// Channel type enum (wire values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelType {
    /// Guild text channel
    Text = 0,
    /// Direct message between two users
    Dm = 1,
    /// Guild voice channel
    Voice = 2,
    /// Direct message between several users
    GroupDm = 3,
    /// Guild category for organizing channels
    Category = 4,
    /// Guild announcement channel
    News = 5,
    /// Guild store channel
    Store = 6,
}

impl ChannelType {
    /// Create a `ChannelType` from its wire value
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Text),
            1 => Some(Self::Dm),
            2 => Some(Self::Voice),
            3 => Some(Self::GroupDm),
            4 => Some(Self::Category),
            5 => Some(Self::News),
            6 => Some(Self::Store),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Channel kinds that belong to a guild
    #[must_use]
    pub const fn is_guild(self) -> bool {
        !matches!(self, Self::Dm | Self::GroupDm)
    }

    /// Channel kinds that carry messages
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Text | Self::Dm | Self::GroupDm | Self::News)
    }

    #[must_use]
    pub const fn is_voice(self) -> bool {
        matches!(self, Self::Voice)
    }
}

/// Target kind of a permission overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverwriteKind {
    Role,
    Member,
}

/// A per-channel permission overwrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub id: Snowflake,
    pub kind: OverwriteKind,
    pub allow: u64,
    pub deny: u64,
}

impl PermissionOverwrite {
    fn from_raw(raw: &Value) -> Option<Self> {
        let kind = match raw.get("type")? {
            Value::String(s) if s == "member" => OverwriteKind::Member,
            Value::String(s) if s == "role" => OverwriteKind::Role,
            Value::Number(n) if n.as_u64() == Some(1) => OverwriteKind::Member,
            Value::Number(n) if n.as_u64() == Some(0) => OverwriteKind::Role,
            _ => return None,
        };
        Some(Self {
            id: raw::opt_id(raw, "id")?,
            kind,
            allow: raw::bits(raw, "allow").unwrap_or(0),
            deny: raw::bits(raw, "deny").unwrap_or(0),
        })
    }
}

/// Guild-channel capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildChannelData {
    pub guild_id: Snowflake,
    pub position: i64,
    pub parent_id: Option<Snowflake>,
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

impl GuildChannelData {
    fn patch(&mut self, raw: &Value) {
        if let Some(position) = raw::int(raw, "position") {
            self.position = position;
        }
        if raw::has(raw, "parent_id") {
            self.parent_id = raw::opt_id(raw, "parent_id");
        }
        if let Some(overwrites) = raw.get("permission_overwrites").and_then(Value::as_array) {
            self.permission_overwrites = overwrites
                .iter()
                .filter_map(PermissionOverwrite::from_raw)
                .collect();
        }
    }

    /// Ids of members targeted by an overwrite
    pub fn member_overwrite_targets(&self) -> impl Iterator<Item = Snowflake> + '_ {
        self.permission_overwrites
            .iter()
            .filter(|o| o.kind == OverwriteKind::Member)
            .map(|o| o.id)
    }
}

/// Text-channel capability
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextChannelData {
    pub topic: Option<String>,
    pub nsfw: bool,
    pub last_message_id: Option<Snowflake>,
    pub last_pin_at: Option<DateTime<Utc>>,
    /// Users currently typing, with the time they last started
    pub typing: HashMap<Snowflake, DateTime<Utc>>,
}

impl TextChannelData {
    fn patch(&mut self, raw: &Value) {
        if raw::has(raw, "topic") {
            self.topic = raw::string(raw, "topic");
        }
        if let Some(nsfw) = raw::boolean(raw, "nsfw") {
            self.nsfw = nsfw;
        }
        if raw::has(raw, "last_message_id") {
            self.last_message_id = raw::opt_id(raw, "last_message_id");
        }
        if let Some(pin) = raw::string(raw, "last_pin_timestamp") {
            self.last_pin_at = DateTime::parse_from_rfc3339(&pin)
                .ok()
                .map(|t| t.with_timezone(&Utc));
        }
    }

    /// Record that `user_id` started typing at `at`.
    ///
    /// Returns true when this starts a new typing session, false when it only
    /// refreshes one that has not expired yet.
    pub fn update_typing(&mut self, user_id: Snowflake, at: DateTime<Utc>) -> bool {
        let timeout = Duration::seconds(TYPING_TIMEOUT_SECS);
        let fresh = self
            .typing
            .get(&user_id)
            .map_or(true, |started| at - *started >= timeout);
        self.typing.insert(user_id, at);
        fresh
    }

    /// Whether a user is typing as of `now`
    pub fn is_typing(&self, user_id: Snowflake, now: DateTime<Utc>) -> bool {
        self.typing
            .get(&user_id)
            .is_some_and(|started| now - *started < Duration::seconds(TYPING_TIMEOUT_SECS))
    }

    pub fn stop_typing(&mut self) {
        self.typing.clear();
    }
}

/// Voice-channel capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceChannelData {
    pub bitrate: u32,
    pub user_limit: u32,
}

/// Channel entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Snowflake,
    pub kind: ChannelType,
    pub name: Option<String>,
    pub recipients: Vec<Snowflake>,
    guild: Option<GuildChannelData>,
    text: Option<TextChannelData>,
    voice: Option<VoiceChannelData>,
}

impl Channel {
    #[inline]
    pub fn as_guild_channel(&self) -> Option<&GuildChannelData> {
        self.guild.as_ref()
    }

    #[inline]
    pub fn as_guild_channel_mut(&mut self) -> Option<&mut GuildChannelData> {
        self.guild.as_mut()
    }

    #[inline]
    pub fn as_text_channel(&self) -> Option<&TextChannelData> {
        self.text.as_ref()
    }

    #[inline]
    pub fn as_text_channel_mut(&mut self) -> Option<&mut TextChannelData> {
        self.text.as_mut()
    }

    #[inline]
    pub fn as_voice_channel(&self) -> Option<&VoiceChannelData> {
        self.voice.as_ref()
    }

    /// Guild the channel belongs to, if any
    pub fn guild_id(&self) -> Option<Snowflake> {
        self.guild.as_ref().map(|g| g.guild_id)
    }
}

impl Model for Channel {
    type Key = Snowflake;

    const NAME: &'static str = "channel";

    fn key(&self) -> Snowflake {
        self.id
    }

    fn key_from_raw(raw: &Value) -> Result<Snowflake, DomainError> {
        raw::require_id(raw, Self::NAME, "id")
    }

    fn from_raw(raw: &Value) -> Result<Self, DomainError> {
        let id = Self::key_from_raw(raw)?;
        let kind = raw::int(raw, "type")
            .ok_or(DomainError::MissingField {
                model: Self::NAME,
                field: "type",
            })
            .and_then(|t| {
                u8::try_from(t)
                    .ok()
                    .and_then(ChannelType::from_u8)
                    .ok_or(DomainError::InvalidField {
                        model: Self::NAME,
                        field: "type",
                    })
            })?;

        let guild = if kind.is_guild() {
            Some(GuildChannelData {
                guild_id: raw::require_id(raw, Self::NAME, "guild_id")?,
                position: 0,
                parent_id: None,
                permission_overwrites: Vec::new(),
            })
        } else {
            None
        };

        let mut channel = Self {
            id,
            kind,
            name: None,
            recipients: Vec::new(),
            guild,
            text: kind.is_text().then(TextChannelData::default),
            voice: kind.is_voice().then(VoiceChannelData::default),
        };
        channel.patch(raw);
        Ok(channel)
    }

    fn patch(&mut self, raw: &Value) {
        if let Some(name) = raw::string(raw, "name") {
            self.name = Some(name);
        }
        if let Some(recipients) = raw.get("recipients").and_then(Value::as_array) {
            self.recipients = recipients
                .iter()
                .filter_map(|r| raw::opt_id(r, "id"))
                .collect();
        }
        if let Some(guild) = self.guild.as_mut() {
            guild.patch(raw);
        }
        if let Some(text) = self.text.as_mut() {
            text.patch(raw);
        }
        if let Some(voice) = self.voice.as_mut() {
            if let Some(bitrate) = raw::int(raw, "bitrate") {
                voice.bitrate = bitrate.max(0) as u32;
            }
            if let Some(limit) = raw::int(raw, "user_limit") {
                voice.user_limit = limit.max(0) as u32;
            }
        }
    }
}
