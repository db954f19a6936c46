//! Gateway payload fixtures

use serde_json::{json, Value};

/// Id of the bot user in every fixture
pub const BOT_ID: &str = "100";

/// Where READY tells shards to resume
pub const RESUME_URL: &str = "wss://resume.gateway.test";

pub fn bot_user() -> Value {
    json!({"id": BOT_ID, "username": "bot", "discriminator": "0001", "bot": true})
}

/// READY for a bot account, listing `guild_ids` as unavailable stubs
pub fn ready(session_id: &str, guild_ids: &[&str]) -> Value {
    json!({
        "v": 6,
        "session_id": session_id,
        "resume_gateway_url": RESUME_URL,
        "user": bot_user(),
        "guilds": guild_ids
            .iter()
            .map(|id| json!({"id": id, "unavailable": true}))
            .collect::<Vec<_>>(),
    })
}

/// READY for a user account, which the client refuses
pub fn user_account_ready(session_id: &str) -> Value {
    let mut data = ready(session_id, &[]);
    data["user"]["bot"] = json!(false);
    data
}

pub fn text_channel(id: &str, name: &str) -> Value {
    json!({"id": id, "type": 0, "name": name, "position": 0})
}

/// A full guild. `with_bot_member` embeds the bot's own membership so no
/// member fetch is needed.
pub fn guild(id: &str, name: &str, channels: &[Value], with_bot_member: bool) -> Value {
    let members = if with_bot_member {
        vec![json!({"user": bot_user(), "roles": []})]
    } else {
        Vec::new()
    };
    json!({
        "id": id,
        "name": name,
        "member_count": 1,
        "channels": channels,
        "roles": [],
        "emojis": [],
        "members": members,
        "presences": [],
    })
}

pub fn message(id: &str, channel_id: &str, author_id: &str, content: &str) -> Value {
    json!({
        "id": id,
        "channel_id": channel_id,
        "content": content,
        "author": {"id": author_id, "username": format!("user{author_id}"), "discriminator": "0002"},
    })
}

pub fn presence(user_id: &str, status: &str) -> Value {
    json!({"user": {"id": user_id}, "status": status, "game": null})
}

pub fn member(user_id: &str) -> Value {
    json!({
        "user": {"id": user_id, "username": format!("user{user_id}"), "discriminator": "0003"},
        "roles": [],
        "joined_at": "2018-01-01T00:00:00+00:00",
    })
}
