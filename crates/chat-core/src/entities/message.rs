//! Message entity

use serde_json::Value;

use super::raw;
use crate::error::DomainError;
use crate::traits::Model;
use crate::value_objects::Snowflake;

/// A message in a text channel
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author_id: Option<Snowflake>,
    pub content: String,
    pub timestamp: Option<String>,
    pub edited_timestamp: Option<String>,
    pub tts: bool,
    pub pinned: bool,
    pub mention_everyone: bool,
    pub embeds: Vec<Value>,
    pub reactions: Vec<Value>,
}

impl Message {
    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }
}

impl Model for Message {
    type Key = Snowflake;

    const NAME: &'static str = "message";

    fn key(&self) -> Snowflake {
        self.id
    }

    fn key_from_raw(raw: &Value) -> Result<Snowflake, DomainError> {
        raw::require_id(raw, Self::NAME, "id")
    }

    fn from_raw(raw: &Value) -> Result<Self, DomainError> {
        let mut message = Self {
            id: Self::key_from_raw(raw)?,
            channel_id: raw::require_id(raw, Self::NAME, "channel_id")?,
            guild_id: raw::opt_id(raw, "guild_id"),
            author_id: raw.get("author").and_then(|a| raw::opt_id(a, "id")),
            content: String::new(),
            timestamp: None,
            edited_timestamp: None,
            tts: false,
            pinned: false,
            mention_everyone: false,
            embeds: Vec::new(),
            reactions: Vec::new(),
        };
        message.patch(raw);
        Ok(message)
    }

    /// Message updates are partial; embeds-only updates omit `content`.
    fn patch(&mut self, raw: &Value) {
        if let Some(content) = raw::string(raw, "content") {
            self.content = content;
        }
        if let Some(timestamp) = raw::string(raw, "timestamp") {
            self.timestamp = Some(timestamp);
        }
        if raw::has(raw, "edited_timestamp") {
            self.edited_timestamp = raw::string(raw, "edited_timestamp");
        }
        if let Some(tts) = raw::boolean(raw, "tts") {
            self.tts = tts;
        }
        if let Some(pinned) = raw::boolean(raw, "pinned") {
            self.pinned = pinned;
        }
        if let Some(everyone) = raw::boolean(raw, "mention_everyone") {
            self.mention_everyone = everyone;
        }
        if let Some(embeds) = raw.get("embeds").and_then(Value::as_array) {
            self.embeds.clone_from(embeds);
        }
        if let Some(reactions) = raw.get("reactions").and_then(Value::as_array) {
            self.reactions.clone_from(reactions);
        }
    }
}
