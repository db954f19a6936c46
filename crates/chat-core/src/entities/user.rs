//! User entity - an account seen by the client

use serde_json::Value;

use super::raw;
use crate::error::DomainError;
use crate::traits::Model;
use crate::value_objects::Snowflake;

/// A user account (bot or human)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub bot: bool,
    pub system: bool,
}

impl User {
    /// Create a new User with required fields
    pub fn new(id: Snowflake, username: String, discriminator: String) -> Self {
        Self {
            id,
            username,
            discriminator,
            avatar: None,
            bot: false,
            system: false,
        }
    }

    /// Get the full tag: username#discriminator
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }

    /// Get avatar path or default avatar path on the CDN
    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) => format!("/avatars/{}/{}.png", self.id, hash),
            None => format!("/embed/avatars/{}.png", self.default_avatar_index()),
        }
    }

    /// Get default avatar index (0-4) based on discriminator
    fn default_avatar_index(&self) -> u8 {
        (self.discriminator.parse::<u16>().unwrap_or(0) % 5) as u8
    }

    /// Check if user is a bot account
    #[inline]
    pub fn is_bot(&self) -> bool {
        self.bot
    }
}

impl Model for User {
    type Key = Snowflake;

    const NAME: &'static str = "user";

    fn key(&self) -> Snowflake {
        self.id
    }

    fn key_from_raw(raw: &Value) -> Result<Snowflake, DomainError> {
        raw::require_id(raw, Self::NAME, "id")
    }

    fn from_raw(raw: &Value) -> Result<Self, DomainError> {
        let mut user = Self::new(
            Self::key_from_raw(raw)?,
            String::new(),
            "0000".to_string(),
        );
        user.patch(raw);
        Ok(user)
    }

    fn patch(&mut self, raw: &Value) {
        if let Some(username) = raw::string(raw, "username") {
            self.username = username;
        }
        if let Some(discriminator) = raw::string(raw, "discriminator") {
            self.discriminator = discriminator;
        }
        if raw::has(raw, "avatar") {
            self.avatar = raw::string(raw, "avatar");
        }
        if let Some(bot) = raw::boolean(raw, "bot") {
            self.bot = bot;
        }
        if let Some(system) = raw::boolean(raw, "system") {
            self.system = system;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_tag() {
        let user = User::new(Snowflake::new(1), "testuser".to_string(), "1234".to_string());
        assert_eq!(user.tag(), "testuser#1234");
    }

    #[test]
    fn test_avatar_url() {
        let mut user = User::new(Snowflake::new(123), "testuser".to_string(), "0001".to_string());
        assert_eq!(user.avatar_url(), "/embed/avatars/1.png");

        user.avatar = Some("abc123".to_string());
        assert_eq!(user.avatar_url(), "/avatars/123/abc123.png");
    }

    #[test]
    fn test_from_raw_and_patch() {
        let mut user = User::from_raw(&json!({
            "id": "80351110224678912",
            "username": "Nelly",
            "discriminator": "1337",
            "avatar": "8342729096ea3675442027381ff50dfe",
            "bot": true
        }))
        .unwrap();
        assert!(user.is_bot());
        assert_eq!(user.tag(), "Nelly#1337");

        // Absent fields stay, explicit null clears
        user.patch(&json!({"username": "Nelly2", "avatar": null}));
        assert_eq!(user.username, "Nelly2");
        assert_eq!(user.discriminator, "1337");
        assert!(user.avatar.is_none());
        assert!(user.bot);
    }

    #[test]
    fn test_from_raw_requires_id() {
        assert!(User::from_raw(&json!({"username": "x"})).is_err());
    }
}
