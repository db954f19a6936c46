//! Message dispatches
//!
//! Messages are only decoded for cached channels. Updates and deletes for
//! messages that were never cached are reported with their raw ids.

use chat_core::entities::raw;
use chat_core::{Channel, ClientEvent, DomainError, Message, Model, ModelRef, ModelStore, Shared};
use serde_json::Value;

use super::{lookup_message, DecodeContext, EventDecoder, Emission};

fn cached_channel(ctx: &DecodeContext, data: &Value) -> Result<Option<Shared<Channel>>, DomainError> {
    let channel_id = raw::require_id(data, Message::NAME, "channel_id")?;
    Ok(ctx.cache.channels.get(&channel_id))
}

pub struct MessageCreateDecoder;

impl EventDecoder for MessageCreateDecoder {
    fn event_type(&self) -> &'static str {
        "MESSAGE_CREATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let Some(channel) = cached_channel(ctx, &data)? else {
            return Ok(Emission::None);
        };

        let message = ctx.cache.add_message(&data)?;
        let author_id = message.read().author_id;
        if let (Some(author_id), Some(text)) = (author_id, channel.write().as_text_channel_mut()) {
            text.typing.remove(&author_id);
        }

        Ok(ClientEvent::Message(message).into())
    }
}

pub struct MessageUpdateDecoder;

impl EventDecoder for MessageUpdateDecoder {
    fn event_type(&self) -> &'static str {
        "MESSAGE_UPDATE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let Some(channel) = cached_channel(ctx, &data)? else {
            return Ok(Emission::None);
        };
        let message_id = Message::key_from_raw(&data)?;

        let Some(message) = ctx.cache.messages.get(&message_id) else {
            let channel_id = channel.read().id;
            return Ok(ClientEvent::MessageUpdateRaw { channel_id, data }.into());
        };

        let before = ctx.snapshot("messageUpdate", &message);
        message.write().patch(&data);
        Ok(ClientEvent::MessageUpdate {
            before,
            after: message,
        }
        .into())
    }
}

pub struct MessageDeleteDecoder;

impl EventDecoder for MessageDeleteDecoder {
    fn event_type(&self) -> &'static str {
        "MESSAGE_DELETE"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let Some(channel) = cached_channel(ctx, &data)? else {
            return Ok(Emission::None);
        };
        let message_id = Message::key_from_raw(&data)?;

        Ok(match ctx.cache.messages.delete(&message_id) {
            Some(message) => ClientEvent::MessageDelete(message),
            None => ClientEvent::MessageDeleteRaw {
                channel_id: channel.read().id,
                message_id,
            },
        }
        .into())
    }
}

/// Emits a single event: resolved messages when any were cached, raw ids
/// otherwise
pub struct MessageDeleteBulkDecoder;

impl EventDecoder for MessageDeleteBulkDecoder {
    fn event_type(&self) -> &'static str {
        "MESSAGE_DELETE_BULK"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let Some(channel) = cached_channel(ctx, &data)? else {
            return Ok(Emission::None);
        };
        let channel_id = channel.read().id;
        let ids = raw::id_list(&data, "ids").unwrap_or_default();

        let mut messages = Vec::new();
        let mut unresolved = Vec::new();
        for id in &ids {
            match ctx.cache.messages.delete(id) {
                Some(message) => messages.push(message),
                None => unresolved.push(*id),
            }
        }

        Ok(if messages.is_empty() {
            ClientEvent::MessageDeleteBulkRaw {
                channel_id,
                message_ids: ids,
            }
        } else {
            ClientEvent::MessageDeleteBulk {
                channel_id,
                messages,
                unresolved,
            }
        }
        .into())
    }
}

pub struct MessageReactionRemoveAllDecoder;

impl EventDecoder for MessageReactionRemoveAllDecoder {
    fn event_type(&self) -> &'static str {
        "MESSAGE_REACTION_REMOVE_ALL"
    }

    fn decode(&self, ctx: &DecodeContext, data: Value) -> Result<Emission, DomainError> {
        let Some(channel) = cached_channel(ctx, &data)? else {
            return Ok(Emission::None);
        };
        let channel_id = channel.read().id;
        let message_id = raw::require_id(&data, Message::NAME, "message_id")?;

        Ok(lookup_message(ctx, channel_id, message_id).emit(move |message: ModelRef<Message>| {
            if let Some(message) = message.resolved() {
                message.write().reactions.clear();
            }
            Some(ClientEvent::MessageReactionRemoveAll {
                channel_id,
                message,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chat_core::Snowflake;
    use serde_json::json;

    fn setup() -> Harness {
        let harness = Harness::new(StubFetcher::default());
        harness.seed_guild(1);
        harness
            .ctx
            .cache
            .add_channel(&json!({"id": "10", "type": 0, "guild_id": "1"}))
            .unwrap();
        harness
    }

    fn message(id: &str) -> Value {
        json!({
            "id": id,
            "channel_id": "10",
            "guild_id": "1",
            "content": "hello",
            "author": {"id": "5", "username": "author", "discriminator": "0005"},
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_create_requires_cached_channel() {
        let mut harness = setup();
        harness.dispatch("MESSAGE_CREATE", json!({"id": "1", "channel_id": "99", "content": "x"}));
        assert!(harness.drain().await.is_empty());
        assert!(!harness.ctx.cache.messages.has(&Snowflake::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_create_stops_author_typing() {
        let mut harness = setup();
        let channel = harness.ctx.cache.channels.get(&Snowflake::new(10)).unwrap();
        channel
            .write()
            .as_text_channel_mut()
            .unwrap()
            .update_typing(Snowflake::new(5), chrono::Utc::now());

        harness.dispatch("MESSAGE_CREATE", message("20"));
        assert_eq!(names(&harness.drain().await), vec!["message"]);

        let c = channel.read();
        let text = c.as_text_channel().unwrap();
        assert!(text.typing.is_empty());
        assert_eq!(text.last_message_id, Some(Snowflake::new(20)));
        assert!(harness.ctx.cache.users.has(&Snowflake::new(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_update_cached_and_uncached() {
        let mut harness = setup();
        harness.dispatch("MESSAGE_CREATE", message("20"));
        harness.dispatch(
            "MESSAGE_UPDATE",
            json!({"id": "20", "channel_id": "10", "content": "edited"}),
        );
        harness.dispatch(
            "MESSAGE_UPDATE",
            json!({"id": "21", "channel_id": "10", "embeds": []}),
        );

        let events = harness.drain().await;
        assert_eq!(names(&events), vec!["message", "messageUpdate", "messageUpdateRaw"]);
        let ClientEvent::MessageUpdate { before, after } = &events[1] else {
            panic!("expected messageUpdate");
        };
        // disabled by default for messages
        assert!(before.is_none());
        assert_eq!(after.read().content, "edited");
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_delete() {
        let mut harness = setup();
        harness.dispatch("MESSAGE_CREATE", message("20"));
        harness.dispatch("MESSAGE_DELETE", json!({"id": "20", "channel_id": "10"}));
        harness.dispatch("MESSAGE_DELETE", json!({"id": "20", "channel_id": "10"}));

        let events = harness.drain().await;
        assert_eq!(names(&events), vec!["message", "messageDelete", "messageDeleteRaw"]);
        assert!(!harness.ctx.cache.messages.has(&Snowflake::new(20)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_delete_emits_once() {
        let mut harness = setup();
        harness.dispatch("MESSAGE_CREATE", message("20"));
        harness.dispatch(
            "MESSAGE_DELETE_BULK",
            json!({"ids": ["20", "21"], "channel_id": "10"}),
        );
        harness.dispatch(
            "MESSAGE_DELETE_BULK",
            json!({"ids": ["30", "31"], "channel_id": "10"}),
        );

        let events = harness.drain().await;
        assert_eq!(
            names(&events),
            vec!["message", "messageDeleteBulk", "messageDeleteBulkRaw"]
        );
        let ClientEvent::MessageDeleteBulk { messages, unresolved, .. } = &events[1] else {
            panic!("expected messageDeleteBulk");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(unresolved, &vec![Snowflake::new(21)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaction_remove_all_fetches_uncached() {
        let mut harness = setup();
        harness.dispatch(
            "MESSAGE_REACTION_REMOVE_ALL",
            json!({"channel_id": "10", "message_id": "40"}),
        );

        let events = harness.drain().await;
        let [ClientEvent::MessageReactionRemoveAll { message, .. }] = events.as_slice() else {
            panic!("expected messageReactionRemoveAll");
        };
        assert!(message.is_resolved());
        assert_eq!(harness.fetch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaction_remove_all_clears_cached() {
        let mut harness = setup();
        let mut raw = message("20");
        raw["reactions"] = json!([{"count": 2}]);
        harness.dispatch("MESSAGE_CREATE", raw);
        harness.dispatch(
            "MESSAGE_REACTION_REMOVE_ALL",
            json!({"channel_id": "10", "message_id": "20"}),
        );

        let events = harness.drain().await;
        assert_eq!(names(&events), vec!["message", "messageReactionRemoveAll"]);
        let cached = harness.ctx.cache.messages.get(&Snowflake::new(20)).unwrap();
        assert!(cached.read().reactions.is_empty());
    }
}
