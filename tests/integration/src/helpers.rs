//! Test helpers for integration tests
//!
//! An in-memory gateway, a scripted REST transport, a slow model fetcher and
//! an event log that waits for named events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_common::ClientConfig;
use chat_core::{share, ClientEvent, DomainError, GuildMember, Message, Model, Shared, Snowflake, User};
use chat_gateway::{
    CloseFrame, Connector, FrameSink, FrameStream, GatewayError, GatewayPayload, GatewayResult,
    OpCode, WsFrame,
};
use chat_rest::{ApiRequest, HttpTransport, RawResponse, RestResult};
use futures::channel::mpsc as wire;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

/// How long (virtual time) a helper waits before failing the test
pub const WAIT: Duration = Duration::from_secs(120);

/// Configuration pointing at the mock gateway, without compression
pub fn test_config(shard_count: u32) -> ClientConfig {
    let mut config = ClientConfig::new("test-token");
    config.gateway.url = "wss://gateway.test".to_string();
    config.gateway.compression = None;
    config.gateway.shard_count = shard_count;
    config
}

// ============================================================================
// Mock gateway
// ============================================================================

/// Connector handing every accepted socket to the paired [`MockGateway`]
pub struct MockConnector {
    sockets: mpsc::UnboundedSender<MockSocket>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, MockGateway) {
        let (sockets, accepted) = mpsc::unbounded_channel();
        (Arc::new(Self { sockets }), MockGateway { accepted })
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> GatewayResult<(FrameSink, FrameStream)> {
        let (client_tx, client_frames) = wire::unbounded::<WsFrame>();
        let (server_tx, server_frames) = wire::unbounded::<GatewayResult<WsFrame>>();
        let auto_ack = Arc::new(AtomicBool::new(true));
        let (received_tx, received) = mpsc::unbounded_channel();

        tokio::spawn(pump(client_frames, server_tx.clone(), received_tx, auto_ack.clone()));

        let socket = MockSocket {
            url: url.to_string(),
            to_client: server_tx,
            received,
            auto_ack,
        };
        self.sockets
            .send(socket)
            .map_err(|_| GatewayError::Connect("mock gateway dropped".to_string()))?;

        let sink: FrameSink =
            Box::pin(client_tx.sink_map_err(|e| GatewayError::Connect(e.to_string())));
        let stream: FrameStream = Box::pin(server_frames);
        Ok((sink, stream))
    }
}

/// Timestamps client frames and answers heartbeats while auto-ack is on
async fn pump(
    mut frames: wire::UnboundedReceiver<WsFrame>,
    to_client: wire::UnboundedSender<GatewayResult<WsFrame>>,
    received: mpsc::UnboundedSender<ReceivedFrame>,
    auto_ack: Arc<AtomicBool>,
) {
    while let Some(frame) = frames.next().await {
        let at = Instant::now();
        if auto_ack.load(Ordering::SeqCst) && decode(&frame).is_some_and(|p| p.op == OpCode::Heartbeat) {
            let _ = to_client.unbounded_send(Ok(encode(&GatewayPayload::heartbeat_ack())));
        }
        if received.send(ReceivedFrame { at, frame }).is_err() {
            break;
        }
    }
}

fn encode(payload: &GatewayPayload) -> WsFrame {
    WsFrame::Text(serde_json::to_string(payload).unwrap_or_default())
}

fn decode(frame: &WsFrame) -> Option<GatewayPayload> {
    match frame {
        WsFrame::Text(text) => serde_json::from_str(text).ok(),
        _ => None,
    }
}

/// Server side of the in-memory gateway
pub struct MockGateway {
    accepted: mpsc::UnboundedReceiver<MockSocket>,
}

impl MockGateway {
    /// Next connection attempt; panics if none arrives in time
    pub async fn accept(&mut self) -> MockSocket {
        self.try_accept(WAIT)
            .await
            .expect("no shard connected in time")
    }

    pub async fn try_accept(&mut self, within: Duration) -> Option<MockSocket> {
        timeout(within, self.accepted.recv()).await.ok().flatten()
    }
}

/// A frame the client sent, with the (virtual) time it was sent
#[derive(Debug)]
pub struct ReceivedFrame {
    pub at: Instant,
    pub frame: WsFrame,
}

/// A decoded client payload and when it was sent
#[derive(Debug)]
pub struct ReceivedPayload {
    pub at: Instant,
    pub payload: GatewayPayload,
}

/// One accepted connection, scripted from the server side
pub struct MockSocket {
    pub url: String,
    to_client: wire::UnboundedSender<GatewayResult<WsFrame>>,
    received: mpsc::UnboundedReceiver<ReceivedFrame>,
    auto_ack: Arc<AtomicBool>,
}

impl MockSocket {
    /// Stop answering heartbeats, turning the connection into a zombie
    pub fn stop_acking(&self) {
        self.auto_ack.store(false, Ordering::SeqCst);
    }

    pub fn send(&self, payload: &GatewayPayload) {
        let _ = self.to_client.unbounded_send(Ok(encode(payload)));
    }

    pub fn hello(&self, heartbeat_interval_ms: u64) {
        self.send(&GatewayPayload::hello(heartbeat_interval_ms));
    }

    pub fn dispatch(&self, event_type: &str, sequence: u64, data: Value) {
        self.send(&GatewayPayload::dispatch(event_type, sequence, data));
    }

    /// Close the socket from the server side
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self
            .to_client
            .unbounded_send(Ok(WsFrame::Close(Some(CloseFrame::new(code, reason)))));
    }

    /// End the connection without a close frame, as a network failure would
    pub fn drop_connection(&self) {
        let _ = self
            .to_client
            .unbounded_send(Err(GatewayError::Connect("connection reset".to_string())));
    }

    /// Next frame from the client
    pub async fn next_frame(&mut self) -> Option<ReceivedFrame> {
        timeout(WAIT, self.received.recv()).await.ok().flatten()
    }

    /// Next payload with op `op`. Heartbeats are skipped unless asked for;
    /// panics on a close frame or when nothing arrives.
    pub async fn expect_op(&mut self, op: OpCode) -> ReceivedPayload {
        loop {
            let Some(ReceivedFrame { at, frame }) = self.next_frame().await else {
                panic!("expected {op}, socket went quiet");
            };
            if let WsFrame::Close(close) = &frame {
                panic!("expected {op}, client closed with {close:?}");
            }
            let Some(payload) = decode(&frame) else {
                panic!("undecodable frame {frame:?}");
            };
            if payload.op == op {
                return ReceivedPayload { at, payload };
            }
            assert_eq!(payload.op, OpCode::Heartbeat, "unexpected payload {payload:?}");
        }
    }

    /// Skip payloads until the client closes, returning its close frame
    pub async fn expect_close(&mut self) -> Option<CloseFrame> {
        self.expect_close_at().await.1
    }

    /// Like [`Self::expect_close`], with the time the client closed
    pub async fn expect_close_at(&mut self) -> (Instant, Option<CloseFrame>) {
        loop {
            let Some(ReceivedFrame { at, frame }) = self.next_frame().await else {
                panic!("expected a close frame, socket went quiet");
            };
            if let WsFrame::Close(close) = frame {
                return (at, close);
            }
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events delivered to a subscriber, in order
pub struct EventLog {
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

impl EventLog {
    pub fn new(events: mpsc::UnboundedReceiver<ClientEvent>) -> Self {
        Self { events }
    }

    pub async fn next(&mut self) -> Option<ClientEvent> {
        timeout(WAIT, self.events.recv()).await.ok().flatten()
    }

    /// Skip events until one named `name` arrives
    pub async fn expect(&mut self, name: &str) -> ClientEvent {
        loop {
            match self.next().await {
                Some(event) if event.name() == name => return event,
                Some(_) => {}
                None => panic!("event {name} never arrived"),
            }
        }
    }

    /// Names of everything delivered during the next `window`
    pub async fn names_within(&mut self, window: Duration) -> Vec<&'static str> {
        let deadline = Instant::now() + window;
        let mut names = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            names.push(event.name());
        }
        names
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Fetcher answering after a fixed delay
#[derive(Default)]
pub struct SlowFetcher {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl SlowFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl chat_core::ModelFetcher for SlowFetcher {
    async fn fetch_user(&self, user_id: Snowflake) -> Result<Shared<User>, DomainError> {
        self.wait().await;
        Ok(share(User::new(user_id, "fetched".to_string(), "0000".to_string())))
    }

    async fn fetch_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Shared<GuildMember>, DomainError> {
        self.wait().await;
        Ok(share(GuildMember::new(guild_id, user_id)))
    }

    async fn fetch_members(&self, _guild_id: Snowflake) -> Result<usize, DomainError> {
        self.wait().await;
        Ok(0)
    }

    async fn fetch_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<Shared<Message>, DomainError> {
        self.wait().await;
        let raw = json!({"id": message_id.to_string(), "channel_id": channel_id.to_string()});
        Message::from_raw(&raw).map(share)
    }
}

/// REST transport answering by path; anything unscripted is a 404
#[derive(Default)]
pub struct StaticTransport {
    responses: Mutex<HashMap<String, (u16, Value)>>,
    calls: Mutex<Vec<String>>,
}

impl StaticTransport {
    pub fn respond(&self, path: &str, status: u16, body: Value) {
        self.responses.lock().insert(path.to_string(), (status, body));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for StaticTransport {
    async fn send(&self, request: &ApiRequest, _token: &str) -> RestResult<RawResponse> {
        self.calls
            .lock()
            .push(format!("{} {}", request.method.as_str(), request.path));
        let scripted = self.responses.lock().get(&request.path).cloned();
        let (status, body) =
            scripted.unwrap_or_else(|| (404, json!({"code": 10000, "message": "Unknown"})));
        Ok(RawResponse::new(status, body.to_string()))
    }
}
