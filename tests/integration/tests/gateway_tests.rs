//! Shard lifecycle against the in-memory gateway
//!
//! Every test runs on paused time, so identify windows, re-authentication
//! delays and heartbeat intervals elapse instantly.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;
use std::time::Duration;

use chat_core::ClientEvent;
use chat_gateway::shard::{FULL_RECONNECT_SPACING, IDENTIFY_INTERVAL};
use chat_gateway::{ChannelSubscriber, GatewayManager, GatewayPayload, OpCode, ShardStatus};
use integration_tests::fixtures::{self, RESUME_URL};
use integration_tests::{test_config, EventLog, MockConnector, MockGateway, MockSocket, SlowFetcher};
use serde_json::json;
use tokio::time::Instant;

struct Setup {
    manager: GatewayManager,
    gateway: MockGateway,
    events: EventLog,
    fetcher: Arc<SlowFetcher>,
}

fn start(shard_count: u32, fetcher: SlowFetcher) -> Setup {
    let (connector, gateway) = MockConnector::new();
    let fetcher = Arc::new(fetcher);
    let manager = GatewayManager::builder(test_config(shard_count), fetcher.clone())
        .connector(connector)
        .build()
        .unwrap();

    let (subscriber, events) = ChannelSubscriber::new();
    manager.queue().subscribe(subscriber);
    manager.spawn_shards();

    Setup {
        manager,
        gateway,
        events: EventLog::new(events),
        fetcher,
    }
}

/// HELLO, wait for IDENTIFY, answer with READY (sequence 1)
async fn identify(socket: &mut MockSocket, session_id: &str) {
    socket.hello(41_250);
    socket.expect_op(OpCode::Identify).await;
    socket.dispatch("READY", 1, fixtures::ready(session_id, &[]));
}

// ============================================================================
// Connection Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_identify_then_ready() {
    let mut setup = start(1, SlowFetcher::default());
    let mut socket = setup.gateway.accept().await;
    assert_eq!(socket.url, "wss://gateway.test/?v=6&encoding=json");

    socket.hello(41_250);
    let identify = socket
        .expect_op(OpCode::Identify)
        .await
        .payload
        .as_identify()
        .unwrap();
    assert_eq!(identify.token, "test-token");
    assert_eq!(identify.shard, [0, 1]);

    socket.dispatch("READY", 1, fixtures::ready("session-1", &[]));
    setup.events.expect("shardReady").await;
    setup.events.expect("ready").await;

    assert!(setup.manager.is_ready());
    let shard = setup.manager.shard(0).unwrap();
    assert_eq!(shard.session_id().as_deref(), Some("session-1"));
    assert_eq!(shard.sequence(), Some(1));
    assert_eq!(shard.status(), ShardStatus::Ready);

    setup.manager.destroy().await;
    let close = socket.expect_close().await.unwrap();
    assert_eq!(close.code, 1000);
    assert!(setup.manager.shard_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_payloads_wait_for_authentication() {
    let mut setup = start(1, SlowFetcher::default());
    setup
        .manager
        .shard(0)
        .unwrap()
        .update_status(json!({"status": "idle", "afk": false, "since": null, "game": null}))
        .unwrap();

    let mut socket = setup.gateway.accept().await;
    identify(&mut socket, "session-1").await;

    let update = socket.expect_op(OpCode::StatusUpdate).await.payload;
    assert_eq!(update.d["status"], "idle");

    setup.manager.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn test_zombie_connection_resumes() {
    let mut setup = start(1, SlowFetcher::default());
    let mut socket = setup.gateway.accept().await;
    socket.stop_acking();

    socket.hello(1_000);
    socket.expect_op(OpCode::Identify).await;
    socket.dispatch("READY", 1, fixtures::ready("session-1", &[]));
    socket.dispatch("PRESENCES_REPLACE", 2, json!([]));

    // First beat goes out, the next one finds it unacknowledged
    let beat = socket.expect_op(OpCode::Heartbeat).await.payload;
    assert_eq!(beat.d, json!(2));
    let close = socket.expect_close().await.unwrap();
    assert_eq!(close.code, 4000);

    let mut resumed = setup.gateway.accept().await;
    assert!(resumed.url.starts_with(RESUME_URL));
    resumed.hello(41_250);
    let resume = resumed
        .expect_op(OpCode::Resume)
        .await
        .payload
        .as_resume()
        .unwrap();
    assert_eq!(resume.session_id, "session-1");
    assert_eq!(resume.seq, Some(2));
    resumed.dispatch("RESUMED", 3, json!({}));

    let ClientEvent::Disconnect { code, .. } = setup.events.expect("disconnect").await else {
        unreachable!();
    };
    assert_eq!(code, 4000);
    setup.events.expect("reconnect").await;
    setup.events.expect("resumed").await;

    setup.manager.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn test_gateway_reconnect_request_resumes() {
    let mut setup = start(1, SlowFetcher::default());
    let mut socket = setup.gateway.accept().await;
    identify(&mut socket, "session-1").await;
    setup.events.expect("ready").await;

    socket.send(&GatewayPayload::reconnect());
    assert_eq!(socket.expect_close().await.unwrap().code, 4000);

    let mut resumed = setup.gateway.accept().await;
    resumed.hello(41_250);
    let resume = resumed.expect_op(OpCode::Resume).await.payload;
    assert_eq!(resume.as_resume().unwrap().seq, Some(1));

    setup.manager.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_session_reidentifies_after_delay() {
    let mut setup = start(1, SlowFetcher::default());
    let mut socket = setup.gateway.accept().await;

    socket.hello(41_250);
    let first = socket.expect_op(OpCode::Identify).await;
    socket.dispatch("READY", 1, fixtures::ready("session-1", &[]));
    setup.events.expect("ready").await;

    let invalidated_at = Instant::now();
    socket.send(&GatewayPayload::invalid_session(false));

    let second = socket.expect_op(OpCode::Identify).await;
    assert!(second.at - invalidated_at >= Duration::from_secs(1));
    assert!(second.at - first.at >= IDENTIFY_INTERVAL);
    assert!(setup.manager.shard(0).unwrap().session_id().is_none());

    setup.manager.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn test_zombie_detected_after_one_gateway_interval() {
    let mut setup = start(1, SlowFetcher::default());
    let mut socket = setup.gateway.accept().await;
    identify(&mut socket, "session-1").await;
    setup.events.expect("ready").await;
    socket.stop_acking();

    let beat = socket.expect_op(OpCode::Heartbeat).await;
    let (closed_at, close) = socket.expect_close_at().await;
    assert_eq!(close.unwrap().code, 4000);
    assert!(closed_at - beat.at >= Duration::from_millis(41_250));
    assert!(closed_at - beat.at < Duration::from_millis(41_250) + Duration::from_secs(1));

    let mut resumed = setup.gateway.accept().await;
    resumed.hello(41_250);
    let resume = resumed.expect_op(OpCode::Resume).await.payload;
    assert_eq!(resume.as_resume().unwrap().session_id, "session-1");

    setup.manager.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_resumes_without_delay() {
    let mut setup = start(1, SlowFetcher::default());
    let mut socket = setup.gateway.accept().await;
    identify(&mut socket, "session-1").await;
    setup.events.expect("ready").await;

    let dropped_at = Instant::now();
    socket.drop_connection();

    let ClientEvent::Disconnect { code, .. } = setup.events.expect("disconnect").await else {
        unreachable!();
    };
    assert_eq!(code, 1006);

    let mut resumed = setup.gateway.accept().await;
    assert!(Instant::now() - dropped_at < Duration::from_secs(1));
    assert!(resumed.url.starts_with(RESUME_URL));
    resumed.hello(41_250);
    let resume = resumed
        .expect_op(OpCode::Resume)
        .await
        .payload
        .as_resume()
        .unwrap();
    assert_eq!(resume.session_id, "session-1");
    assert_eq!(resume.seq, Some(1));

    setup.manager.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn test_full_reconnect_spaced_from_last_client_identify() {
    let mut setup = start(2, SlowFetcher::default());
    let mut a = setup.gateway.accept().await;
    let mut b = setup.gateway.accept().await;

    a.hello(41_250);
    let first = a.expect_op(OpCode::Identify).await;
    b.hello(41_250);
    let second = b.expect_op(OpCode::Identify).await;
    assert!(second.at - first.at >= IDENTIFY_INTERVAL);

    let a_shard = first.payload.as_identify().unwrap().shard[0];
    let b_shard = second.payload.as_identify().unwrap().shard[0];
    a.dispatch("READY", 1, fixtures::ready("session-a", &[]));
    b.dispatch("READY", 1, fixtures::ready("session-b", &[]));
    setup.events.expect("ready").await;

    // The earlier shard loses its session right after the later one identified
    a.close(4009, "Session timed out");

    let mut reconnected = setup.gateway.accept().await;
    let reconnected_at = Instant::now();
    assert!(reconnected_at - second.at >= FULL_RECONNECT_SPACING);
    assert!(reconnected_at - second.at < FULL_RECONNECT_SPACING + Duration::from_secs(1));
    assert!(!reconnected.url.starts_with(RESUME_URL));

    reconnected.hello(41_250);
    let identify = reconnected.expect_op(OpCode::Identify).await.payload;
    assert_eq!(identify.as_identify().unwrap().shard[0], a_shard);
    assert_eq!(
        setup.manager.shard(b_shard).unwrap().session_id().as_deref(),
        Some("session-b")
    );

    setup.manager.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_session_delay_respects_identify_window() {
    let mut setup = start(2, SlowFetcher::default());
    let mut a = setup.gateway.accept().await;
    let mut b = setup.gateway.accept().await;

    a.hello(41_250);
    a.expect_op(OpCode::Identify).await;
    a.dispatch("READY", 1, fixtures::ready("session-a", &[]));
    b.hello(41_250);
    let other = b.expect_op(OpCode::Identify).await;

    let invalidated_at = Instant::now();
    a.send(&GatewayPayload::invalid_session(false));

    // Same socket, no reconnect: the window opened by the other shard's
    // identify bounds the re-identify, whatever the random delay was
    let again = a.expect_op(OpCode::Identify).await;
    assert!(again.at - invalidated_at >= Duration::from_secs(1));
    assert!(again.at - other.at >= IDENTIFY_INTERVAL);
    assert!(again.at - invalidated_at <= Duration::from_secs(5));

    setup.manager.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn test_identify_spacing_across_shards() {
    let mut setup = start(2, SlowFetcher::default());
    let mut a = setup.gateway.accept().await;
    let mut b = setup.gateway.accept().await;
    a.hello(41_250);
    b.hello(41_250);

    let first = a.expect_op(OpCode::Identify).await;
    let second = b.expect_op(OpCode::Identify).await;

    let gap = if first.at > second.at {
        first.at - second.at
    } else {
        second.at - first.at
    };
    assert!(gap >= IDENTIFY_INTERVAL);

    let mut shards: Vec<u32> = [first, second]
        .iter()
        .map(|received| received.payload.as_identify().unwrap().shard[0])
        .collect();
    shards.sort_unstable();
    assert_eq!(shards, [0, 1]);

    setup.manager.destroy().await;
}

// ============================================================================
// Terminal Conditions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fatal_close_stops_shard() {
    let mut setup = start(1, SlowFetcher::default());
    let mut socket = setup.gateway.accept().await;
    socket.hello(41_250);
    socket.expect_op(OpCode::Identify).await;

    socket.close(4004, "Authentication failed");

    let ClientEvent::Disconnect { code, .. } = setup.events.expect("disconnect").await else {
        unreachable!();
    };
    assert_eq!(code, 4004);
    let ClientEvent::Error { shard_id, message } = setup.events.expect("error").await else {
        unreachable!();
    };
    assert_eq!(shard_id, Some(0));
    assert!(message.contains("4004"));

    assert!(setup.gateway.try_accept(Duration::from_secs(90)).await.is_none());
    assert_eq!(setup.manager.shard(0).unwrap().status(), ShardStatus::Terminated);
}

#[tokio::test(start_paused = true)]
async fn test_user_account_is_rejected() {
    let mut setup = start(1, SlowFetcher::default());
    let mut socket = setup.gateway.accept().await;
    socket.hello(41_250);
    socket.expect_op(OpCode::Identify).await;

    socket.dispatch("READY", 1, fixtures::user_account_ready("session-1"));

    let ClientEvent::Error { message, .. } = setup.events.expect("error").await else {
        unreachable!();
    };
    assert!(message.contains("User accounts"));
    assert_eq!(socket.expect_close().await.unwrap().code, 1000);
    assert!(setup.gateway.try_accept(Duration::from_secs(90)).await.is_none());
    assert!(!setup.manager.is_ready());
}

// ============================================================================
// Event Ordering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_events_keep_dispatch_order_across_slow_lookups() {
    let mut setup = start(1, SlowFetcher::new(Duration::from_secs(3)));
    let mut socket = setup.gateway.accept().await;
    identify(&mut socket, "session-1").await;
    setup.events.expect("ready").await;

    let general = fixtures::text_channel("10", "general");
    socket.dispatch("GUILD_CREATE", 2, fixtures::guild("1", "one", &[general], true));
    // Unknown user, resolved through the slow fetcher
    socket.dispatch("PRESENCE_UPDATE", 3, fixtures::presence("5", "online"));
    socket.dispatch("MESSAGE_CREATE", 4, fixtures::message("20", "10", "6", "hi"));

    let names = setup.events.names_within(Duration::from_secs(10)).await;
    assert_eq!(names, ["guildCreate", "presenceUpdate", "message"]);
    assert_eq!(setup.fetcher.calls(), 1);

    setup.manager.destroy().await;
}
