//! Endpoint helpers
//!
//! Route templates plus positional parameters, forwarded to the dispatcher.

use chat_core::Snowflake;
use serde_json::{json, Value};

use crate::dispatcher::SharedDispatcher;
use crate::error::RestResult;
use crate::request::ApiRequest;

/// Page size for member listing (server maximum)
pub const MEMBERS_PAGE_SIZE: usize = 1000;

const NO_PARAMS: [&str; 0] = [];

pub async fn get_current_user(api: &SharedDispatcher) -> RestResult<Value> {
    api.execute(ApiRequest::get("/users/@me", &NO_PARAMS)).await
}

pub async fn get_user(api: &SharedDispatcher, user_id: Snowflake) -> RestResult<Value> {
    api.execute(ApiRequest::get("/users/{}", &[user_id])).await
}

pub async fn get_member(
    api: &SharedDispatcher,
    guild_id: Snowflake,
    user_id: Snowflake,
) -> RestResult<Value> {
    api.execute(ApiRequest::get("/guilds/{}/members/{}", &[guild_id, user_id]))
        .await
}

/// Every member of a guild, following the `after` cursor page by page
pub async fn list_members(api: &SharedDispatcher, guild_id: Snowflake) -> RestResult<Vec<Value>> {
    let mut members = Vec::new();
    let mut after = Snowflake::new(0);

    loop {
        let page = api
            .execute(
                ApiRequest::get("/guilds/{}/members", &[guild_id])
                    .query("limit", MEMBERS_PAGE_SIZE)
                    .query("after", after),
            )
            .await?;

        let page = match page {
            Value::Array(page) => page,
            _ => break,
        };
        let count = page.len();

        if let Some(last) = page
            .last()
            .and_then(|m| m.get("user"))
            .and_then(|u| u.get("id"))
            .and_then(Snowflake::from_value)
        {
            after = last;
        }
        members.extend(page);

        if count < MEMBERS_PAGE_SIZE {
            break;
        }
    }

    tracing::debug!(guild_id = %guild_id, count = members.len(), "Fetched guild members");
    Ok(members)
}

pub async fn get_message(
    api: &SharedDispatcher,
    channel_id: Snowflake,
    message_id: Snowflake,
) -> RestResult<Value> {
    api.execute(ApiRequest::get(
        "/channels/{}/messages/{}",
        &[channel_id, message_id],
    ))
    .await
}

pub async fn create_message(
    api: &SharedDispatcher,
    channel_id: Snowflake,
    content: &str,
) -> RestResult<Value> {
    api.execute(
        ApiRequest::post("/channels/{}/messages", &[channel_id])
            .json(json!({ "content": content })),
    )
    .await
}

/// Gateway URL and recommended shard count
pub async fn get_gateway_bot(api: &SharedDispatcher) -> RestResult<Value> {
    api.execute(ApiRequest::get("/gateway/bot", &NO_PARAMS)).await
}

/// Webhook object, authenticated by its token
pub async fn get_webhook_with_token(
    api: &SharedDispatcher,
    webhook_id: Snowflake,
    token: &str,
) -> RestResult<Value> {
    api.execute(ApiRequest::get(
        "/webhooks/{}/{}",
        &[webhook_id.to_string(), token.to_string()],
    ))
    .await
}

/// Post a message through a webhook and wait for the created message
pub async fn execute_webhook(
    api: &SharedDispatcher,
    webhook_id: Snowflake,
    token: &str,
    body: Value,
) -> RestResult<Value> {
    api.execute(
        ApiRequest::post(
            "/webhooks/{}/{}",
            &[webhook_id.to_string(), token.to_string()],
        )
        .query("wait", true)
        .json(body),
    )
    .await
}

/// Change the webhook's default name or avatar
pub async fn modify_webhook_with_token(
    api: &SharedDispatcher,
    webhook_id: Snowflake,
    token: &str,
    body: Value,
) -> RestResult<Value> {
    api.execute(
        ApiRequest::patch(
            "/webhooks/{}/{}",
            &[webhook_id.to_string(), token.to_string()],
        )
        .json(body),
    )
    .await
}

pub async fn delete_webhook_with_token(
    api: &SharedDispatcher,
    webhook_id: Snowflake,
    token: &str,
) -> RestResult<Value> {
    api.execute(ApiRequest::delete(
        "/webhooks/{}/{}",
        &[webhook_id.to_string(), token.to_string()],
    ))
    .await
}
