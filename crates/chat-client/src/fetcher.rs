//! REST-backed model fetcher
//!
//! Resolves the objects gateway payloads only reference by id. Every result
//! goes through the cache before it is returned, so a second look-up for the
//! same id never leaves the process.

use async_trait::async_trait;
use chat_cache::SharedCache;
use chat_core::{DomainError, GuildMember, Message, ModelFetcher, ModelStore, Shared, Snowflake, User};
use chat_rest::{endpoints, RestError, SharedDispatcher};

/// [`ModelFetcher`] over the REST dispatcher
#[derive(Debug, Clone)]
pub struct RestFetcher {
    api: SharedDispatcher,
    cache: SharedCache,
}

impl RestFetcher {
    pub fn new(api: SharedDispatcher, cache: SharedCache) -> Self {
        Self { api, cache }
    }
}

fn fetch_error(error: RestError, not_found: DomainError) -> DomainError {
    if error.is_not_found() {
        not_found
    } else {
        DomainError::FetchFailed(error.to_string())
    }
}

#[async_trait]
impl ModelFetcher for RestFetcher {
    async fn fetch_user(&self, user_id: Snowflake) -> Result<Shared<User>, DomainError> {
        let raw = endpoints::get_user(&self.api, user_id)
            .await
            .map_err(|e| fetch_error(e, DomainError::UserNotFound(user_id)))?;
        self.cache.users.factory(&raw)
    }

    async fn fetch_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Shared<GuildMember>, DomainError> {
        let raw = endpoints::get_member(&self.api, guild_id, user_id)
            .await
            .map_err(|e| fetch_error(e, DomainError::MemberNotFound { guild_id, user_id }))?;
        self.cache.add_member(guild_id, &raw)
    }

    async fn fetch_members(&self, guild_id: Snowflake) -> Result<usize, DomainError> {
        let members = endpoints::list_members(&self.api, guild_id)
            .await
            .map_err(|e| fetch_error(e, DomainError::GuildNotFound(guild_id)))?;

        let mut cached = 0;
        for raw in &members {
            match self.cache.add_member(guild_id, raw) {
                Ok(_) => cached += 1,
                Err(e) => {
                    tracing::debug!(guild_id = %guild_id, error = %e, "Skipping malformed member");
                }
            }
        }
        Ok(cached)
    }

    async fn fetch_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<Shared<Message>, DomainError> {
        let raw = endpoints::get_message(&self.api, channel_id, message_id)
            .await
            .map_err(|e| fetch_error(e, DomainError::MessageNotFound(message_id)))?;
        self.cache.add_message(&raw)
    }
}
