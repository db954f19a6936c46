//! Model fetcher trait
//!
//! Gateway payloads sometimes reference objects without embedding them
//! (a member named by an overwrite, the author of a typing event). Decoders
//! resolve those through this trait; implementations write results through
//! the cache before returning them.

use async_trait::async_trait;

use super::model::Shared;
use crate::entities::{GuildMember, Message, User};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Asynchronous look-ups against the remote API
#[async_trait]
pub trait ModelFetcher: Send + Sync {
    /// Fetch a user by id
    async fn fetch_user(&self, user_id: Snowflake) -> Result<Shared<User>, DomainError>;

    /// Fetch a single guild member
    async fn fetch_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Shared<GuildMember>, DomainError>;

    /// Fetch every member of a guild, returning how many were cached
    async fn fetch_members(&self, guild_id: Snowflake) -> Result<usize, DomainError>;

    /// Fetch a message from a channel
    async fn fetch_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<Shared<Message>, DomainError>;
}
