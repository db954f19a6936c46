//! Client facade end to end: gateway events resolving models over REST
//!
//! Run with: cargo test -p integration-tests --test client_tests

use std::sync::Arc;

use chat_client::Client;
use chat_core::{ClientEvent, ModelStore, Snowflake};
use chat_gateway::{ChannelSubscriber, OpCode};
use integration_tests::fixtures::{self, BOT_ID};
use integration_tests::{test_config, EventLog, MockConnector, StaticTransport};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn test_guild_create_fetches_own_member_through_rest() {
    let transport = Arc::new(StaticTransport::default());
    transport.respond("/guilds/1/members/100", 200, fixtures::member(BOT_ID));

    let (connector, mut gateway) = MockConnector::new();
    let client = Client::builder(test_config(1))
        .transport(transport.clone())
        .connector(connector)
        .lookup_gateway(false)
        .build()
        .unwrap();
    let (subscriber, events) = ChannelSubscriber::new();
    client.subscribe(subscriber);
    let mut events = EventLog::new(events);

    client.connect().await.unwrap();
    let mut socket = gateway.accept().await;
    socket.hello(41_250);
    socket.expect_op(OpCode::Identify).await;

    socket.dispatch("READY", 1, fixtures::ready("session-1", &["1"]));
    let general = fixtures::text_channel("10", "general");
    socket.dispatch("GUILD_CREATE", 2, fixtures::guild("1", "one", &[general], false));

    events.expect("shardReady").await;
    events.expect("ready").await;
    client.wait_ready().await;

    let guild_id = Snowflake::new(1);
    let bot_id = Snowflake::new(100);
    assert_eq!(client.user().unwrap().read().id, bot_id);
    assert!(!client.cache().guilds.get(&guild_id).unwrap().read().unavailable);
    assert!(client.cache().members.get(&(guild_id, bot_id)).is_some());
    assert!(client.cache().channels.get(&Snowflake::new(10)).is_some());
    assert!(transport
        .calls()
        .contains(&"GET /guilds/1/members/100".to_string()));

    // A guild joined after ready is announced even when the member look-up fails
    socket.dispatch("GUILD_CREATE", 3, fixtures::guild("2", "two", &[], false));
    let ClientEvent::GuildCreate(guild) = events.expect("guildCreate").await else {
        unreachable!();
    };
    assert_eq!(guild.read().id, Snowflake::new(2));

    client.destroy().await;
    assert_eq!(socket.expect_close().await.unwrap().code, 1000);
    assert!(client.rest().is_shutdown());
}

#[tokio::test(start_paused = true)]
async fn test_connect_follows_gateway_lookup() {
    let transport = Arc::new(StaticTransport::default());
    transport.respond(
        "/gateway/bot",
        200,
        json!({"url": "wss://shard-gateway.test", "shards": 1}),
    );

    let (connector, mut gateway) = MockConnector::new();
    let client = Client::builder(test_config(1))
        .transport(transport.clone())
        .connector(connector)
        .build()
        .unwrap();

    client.connect().await.unwrap();
    let socket = gateway.accept().await;
    assert_eq!(socket.url, "wss://shard-gateway.test/?v=6&encoding=json");
    assert_eq!(transport.calls(), ["GET /gateway/bot"]);

    client.destroy().await;
}
