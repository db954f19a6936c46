//! Shard connection task
//!
//! One task per shard owns the socket and walks the connection state machine:
//! connect, wait for HELLO, identify or resume, heartbeat, and reconnect when
//! the socket dies. Frames are processed one at a time; anything slow
//! (identify windows, re-authentication delays, model look-ups) is scheduled
//! as a deadline or handed to the decoders, so the frame loop never blocks.
//!
//! Timers belong to a single socket and are dropped with it, so a new
//! connection never inherits a stale heartbeat or identify deadline.

use std::sync::Arc;
use std::time::Duration;

use chat_core::ClientEvent;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use super::{ShardCommand, ShardHandle, ShardSession, ShardStatus, SharedSession};
use crate::codec::Compression;
use crate::decoders::DecodeContext;
use crate::error::{GatewayError, GatewayResult};
use crate::handlers::{OpcodeRouter, ShardAction};
use crate::manager::GatewayContext;
use crate::protocol::{
    is_fatal_close, CloseCode, GatewayPayload, OpCode, ResumePayload, CLOSE_ABNORMAL,
    CLOSE_NORMAL, CLOSE_RESUMABLE,
};
use crate::transport::{CloseFrame, FrameSink, FrameStream, WsFrame};

/// Minimum spacing between the client's last identify and a reconnect that
/// must identify from scratch
pub const FULL_RECONNECT_SPACING: Duration = Duration::from_secs(30);

/// Cap for the delay between failed connection attempts
pub const MAX_CONNECT_BACKOFF: Duration = Duration::from_secs(60);

/// Delay before connection attempt `failures + 1`: `2^failures` seconds,
/// capped, plus up to a second of jitter
pub fn connect_backoff(failures: u32) -> Duration {
    let base = Duration::from_secs(2u64.saturating_pow(failures)).min(MAX_CONNECT_BACKOFF);
    base + Duration::from_millis(rand::thread_rng().gen_range(0..1000))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthStep {
    /// Resume if a session exists, otherwise reserve an identify slot
    Decide,
    /// The reserved identify slot has opened
    Identify,
}

/// Why a socket was given up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Reconnect,
    Shutdown,
    /// Terminal condition, already reported on the event queue
    Fatal,
}

/// State of one socket
struct Link {
    sink: FrameSink,
    stream: FrameStream,
    compression: Option<Box<dyn Compression>>,
    next_heartbeat: Option<Instant>,
    auth: Option<(Instant, AuthStep)>,
}

pub(crate) struct ShardConnection {
    ctx: Arc<GatewayContext>,
    session: SharedSession,
    decode: DecodeContext,
    commands: mpsc::UnboundedReceiver<ShardCommand>,
    /// Payloads sent before the shard authenticated
    outbox: Vec<GatewayPayload>,
    failures: u32,
}

impl ShardConnection {
    /// Start a shard task
    pub(crate) fn spawn(ctx: Arc<GatewayContext>, shard_id: u32) -> ShardHandle {
        let session = ShardSession::new_shared(shard_id);
        let (commands_tx, commands) = mpsc::unbounded_channel();

        let connection = Self {
            decode: ctx.decode_context(shard_id),
            ctx,
            session: session.clone(),
            commands,
            outbox: Vec::new(),
            failures: 0,
        };
        let task = tokio::spawn(connection.run());

        ShardHandle::new(shard_id, session, commands_tx, task)
    }

    fn shard_id(&self) -> u32 {
        self.decode.shard_id
    }

    fn set_status(&self, status: ShardStatus) {
        self.session.write().status = status;
    }

    async fn run(mut self) {
        let shard_id = self.shard_id();

        loop {
            if self.wait_for_full_reconnect().await {
                break;
            }

            self.set_status(ShardStatus::Connecting);
            let url = match self.connect_url() {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(shard_id, error = %e, "Cannot build gateway URL");
                    self.ctx.queue.push(ClientEvent::Error {
                        shard_id: Some(shard_id),
                        message: e.to_string(),
                    });
                    break;
                }
            };

            tracing::info!(shard_id, url = %url, "Connecting shard");
            let exit = match self.ctx.connector.connect(&url).await {
                Ok((sink, stream)) => {
                    self.failures = 0;
                    self.run_link(sink, stream).await
                }
                Err(e) => {
                    self.failures += 1;
                    let delay = connect_backoff(self.failures);
                    tracing::warn!(
                        shard_id,
                        error = %e,
                        attempt = self.failures,
                        delay_ms = delay.as_millis() as u64,
                        "Failed to connect shard"
                    );
                    self.set_status(ShardStatus::Disconnected);
                    if self.sleep_or_shutdown(Instant::now() + delay).await {
                        break;
                    }
                    continue;
                }
            };

            match exit {
                Exit::Reconnect => {
                    self.set_status(ShardStatus::Reconnecting);
                    tracing::info!(shard_id, "Reconnecting shard");
                    self.ctx.queue.push(ClientEvent::Reconnect { shard_id });
                }
                Exit::Shutdown | Exit::Fatal => break,
            }
        }

        self.set_status(ShardStatus::Terminated);
        tracing::info!(shard_id, "Shard stopped");
    }

    /// Hold back a reconnect that must identify until the spacing since the
    /// client's last identify, on any shard, has passed. A shard's first
    /// connection is paced by the identify window alone. Returns true if
    /// shutdown was requested.
    async fn wait_for_full_reconnect(&mut self) -> bool {
        let deadline = {
            let session = self.session.read();
            if session.can_resume() || session.last_identify_at.is_none() {
                None
            } else {
                self.ctx
                    .identify
                    .last_sent()
                    .map(|at| at + FULL_RECONNECT_SPACING)
            }
        };

        match deadline {
            Some(deadline) if deadline > Instant::now() => {
                tracing::debug!(
                    shard_id = self.shard_id(),
                    delay_ms = (deadline - Instant::now()).as_millis() as u64,
                    "Spacing full reconnect"
                );
                self.sleep_or_shutdown(deadline).await
            }
            _ => false,
        }
    }

    /// Sleep while no socket is open. Returns true if shutdown was requested.
    async fn sleep_or_shutdown(&mut self, deadline: Instant) -> bool {
        loop {
            tokio::select! {
                () = sleep_until(deadline) => return false,
                command = self.commands.recv() => match command {
                    None | Some(ShardCommand::Shutdown) => {
                        self.session.write().invalidate();
                        return true;
                    }
                    Some(ShardCommand::Reconnect) => {}
                    Some(ShardCommand::Send(payload)) => self.outbox.push(payload),
                },
            }
        }
    }

    /// Gateway URL with the negotiated query string. A resumable session
    /// reconnects to the URL the gateway handed out in READY.
    fn connect_url(&self) -> GatewayResult<String> {
        let resume_url = {
            let session = self.session.read();
            session.resume_url.clone().filter(|_| session.can_resume())
        };
        let base = resume_url.unwrap_or_else(|| self.ctx.gateway_url());
        self.ctx.connect_url(&base)
    }

    async fn run_link(&mut self, sink: FrameSink, stream: FrameStream) -> Exit {
        {
            let mut session = self.session.write();
            session.reset_connection();
            session.status = ShardStatus::AwaitingHello;
        }

        let mut compression = self.ctx.codec.new_compression();
        if let Some(compression) = compression.as_mut() {
            if let Err(e) = compression.init() {
                tracing::error!(shard_id = self.shard_id(), error = %e, "Cannot start decompression");
                self.ctx.queue.push(ClientEvent::Error {
                    shard_id: Some(self.shard_id()),
                    message: e.to_string(),
                });
                return Exit::Fatal;
            }
        }

        let mut link = Link {
            sink,
            stream,
            compression,
            next_heartbeat: None,
            auth: None,
        };
        let exit = self.drive(&mut link).await;

        if let Some(compression) = link.compression.as_mut() {
            compression.destroy();
        }
        exit
    }

    async fn drive(&mut self, link: &mut Link) -> Exit {
        loop {
            let now = Instant::now();
            let heartbeat_at = link.next_heartbeat.unwrap_or(now);
            let auth_at = link.auth.map_or(now, |(at, _)| at);

            let exit = tokio::select! {
                biased;

                command = self.commands.recv() => self.on_command(link, command).await,
                frame = link.stream.next() => match frame {
                    Some(Ok(WsFrame::Close(close))) => Some(self.on_close(close)),
                    Some(Ok(frame)) => self.on_frame(link, &frame).await,
                    Some(Err(e)) => {
                        tracing::warn!(shard_id = self.shard_id(), error = %e, "Socket error");
                        Some(self.on_close(None))
                    }
                    None => Some(self.on_close(None)),
                },
                () = sleep_until(heartbeat_at), if link.next_heartbeat.is_some() => {
                    self.on_heartbeat_due(link).await
                }
                () = sleep_until(auth_at), if link.auth.is_some() => {
                    self.on_auth_due(link).await
                }
            };

            if let Some(exit) = exit {
                return exit;
            }
        }
    }

    async fn on_command(&mut self, link: &mut Link, command: Option<ShardCommand>) -> Option<Exit> {
        match command {
            None | Some(ShardCommand::Shutdown) => {
                tracing::info!(shard_id = self.shard_id(), "Shutting down shard");
                self.session.write().invalidate();
                self.close_socket(link, CLOSE_NORMAL, "shutdown").await;
                Some(Exit::Shutdown)
            }
            Some(ShardCommand::Reconnect) => {
                tracing::info!(shard_id = self.shard_id(), "Reconnect requested");
                Some(self.end_link(link, CLOSE_RESUMABLE, "reconnect requested").await)
            }
            Some(ShardCommand::Send(payload)) => {
                let authenticated = self.session.read().authenticated;
                if authenticated {
                    self.send_or_drop(link, &payload).await
                } else {
                    tracing::debug!(
                        shard_id = self.shard_id(),
                        op = %payload.op,
                        "Holding payload until authenticated"
                    );
                    self.outbox.push(payload);
                    None
                }
            }
        }
    }

    async fn on_frame(&mut self, link: &mut Link, frame: &WsFrame) -> Option<Exit> {
        let payload = match self.decode_frame(link, frame) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => return Some(self.protocol_error(link, &e.to_string()).await),
        };

        tracing::trace!(
            shard_id = self.shard_id(),
            op = %payload.op,
            seq = ?payload.s,
            event = ?payload.t,
            "Received payload"
        );

        match payload.op {
            OpCode::Hello => self.on_hello(link, &payload).await,
            OpCode::Dispatch => self.on_dispatch(link, payload).await,
            _ => match OpcodeRouter::route(&self.session, &payload, Instant::now()) {
                Ok(action) => self.apply(link, action).await,
                Err(e) => Some(self.protocol_error(link, &e.to_string()).await),
            },
        }
    }

    fn decode_frame(&self, link: &mut Link, frame: &WsFrame) -> GatewayResult<Option<GatewayPayload>> {
        let encoding = self.ctx.codec.encoding();
        match (frame, link.compression.as_mut()) {
            (WsFrame::Binary(bytes), Some(compression)) => match compression.decompress(bytes)? {
                Some(inflated) => encoding.decode(&inflated).map(Some),
                None => Ok(None),
            },
            _ => {
                let bytes = frame
                    .as_bytes()
                    .ok_or_else(|| GatewayError::Protocol("close frame passed to decoder".to_string()))?;
                encoding.decode(bytes).map(Some)
            }
        }
    }

    async fn on_hello(&mut self, link: &mut Link, payload: &GatewayPayload) -> Option<Exit> {
        let interval = match payload.as_hello() {
            Some(hello) if hello.heartbeat_interval > 0 => {
                Duration::from_millis(hello.heartbeat_interval)
            }
            _ => return Some(self.protocol_error(link, "invalid HELLO payload").await),
        };

        // First beat lands somewhere inside the first interval
        let jitter: f64 = rand::thread_rng().gen();
        let now = Instant::now();
        link.next_heartbeat = Some(now + interval.mul_f64(jitter));
        link.auth = Some((now, AuthStep::Decide));
        self.session.write().heartbeat_interval = Some(interval);

        tracing::debug!(
            shard_id = self.shard_id(),
            interval_ms = interval.as_millis() as u64,
            "Received HELLO"
        );
        None
    }

    async fn on_dispatch(&mut self, link: &mut Link, payload: GatewayPayload) -> Option<Exit> {
        if let Some(sequence) = payload.s {
            self.session.write().update_sequence(sequence);
        }
        let Some(event_type) = payload.t else {
            return Some(self.protocol_error(link, "dispatch without event type").await);
        };

        match event_type.as_str() {
            "READY" => {
                if let Some(exit) = self.on_ready(link, &payload.d).await {
                    return Some(exit);
                }
            }
            "RESUMED" => {
                {
                    let mut session = self.session.write();
                    session.authenticated = true;
                    session.status = ShardStatus::Ready;
                }
                tracing::info!(shard_id = self.shard_id(), "Session resumed");
                if let Some(exit) = self.flush_outbox(link).await {
                    return Some(exit);
                }
            }
            _ => {}
        }

        self.ctx.decoders.dispatch(&self.decode, &event_type, payload.d);
        None
    }

    async fn on_ready(&mut self, link: &mut Link, data: &Value) -> Option<Exit> {
        let is_bot = data
            .get("user")
            .and_then(|user| user.get("bot"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !is_bot {
            let message = "User accounts are not supported";
            tracing::error!(shard_id = self.shard_id(), "{message}");
            self.ctx.queue.push(ClientEvent::Error {
                shard_id: Some(self.shard_id()),
                message: message.to_string(),
            });
            self.session.write().invalidate();
            self.close_socket(link, CLOSE_NORMAL, message).await;
            return Some(Exit::Fatal);
        }

        {
            let mut session = self.session.write();
            session.session_id = data.get("session_id").and_then(Value::as_str).map(str::to_owned);
            session.resume_url = data
                .get("resume_gateway_url")
                .and_then(Value::as_str)
                .map(str::to_owned);
            session.authenticated = true;
            session.status = ShardStatus::Ready;
        }
        tracing::info!(shard_id = self.shard_id(), "Shard identified");

        self.flush_outbox(link).await
    }

    async fn apply(&mut self, link: &mut Link, action: ShardAction) -> Option<Exit> {
        match action {
            ShardAction::None => None,
            ShardAction::Authenticate { after } => {
                link.auth = Some((Instant::now() + after, AuthStep::Decide));
                None
            }
            ShardAction::Reconnect => {
                tracing::info!(shard_id = self.shard_id(), "Gateway requested a reconnect");
                Some(self.end_link(link, CLOSE_RESUMABLE, "reconnect requested by gateway").await)
            }
            ShardAction::HeartbeatNow => self.heartbeat(link).await,
        }
    }

    async fn on_heartbeat_due(&mut self, link: &mut Link) -> Option<Exit> {
        let (acked, interval) = {
            let session = self.session.read();
            (session.heartbeat_acked, session.heartbeat_interval)
        };

        if !acked {
            tracing::warn!(
                shard_id = self.shard_id(),
                "Heartbeat not acknowledged, dropping zombie connection"
            );
            return Some(self.end_link(link, CLOSE_RESUMABLE, "heartbeat ack timeout").await);
        }

        link.next_heartbeat = interval.map(|interval| Instant::now() + interval);
        self.heartbeat(link).await
    }

    async fn heartbeat(&mut self, link: &mut Link) -> Option<Exit> {
        let sequence = self.session.read().sequence;
        let exit = self.send_or_drop(link, &GatewayPayload::heartbeat(sequence)).await;
        if exit.is_none() {
            self.session.write().record_heartbeat_sent(Instant::now());
        }
        exit
    }

    async fn on_auth_due(&mut self, link: &mut Link) -> Option<Exit> {
        let Some((_, step)) = link.auth.take() else {
            return None;
        };

        if step == AuthStep::Identify {
            return self.identify(link).await;
        }

        let resume = {
            let session = self.session.read();
            session.session_id.clone().map(|session_id| ResumePayload {
                token: self.ctx.token.clone(),
                session_id,
                seq: session.sequence,
            })
        };

        if let Some(resume) = resume {
            self.set_status(ShardStatus::Resuming);
            tracing::info!(shard_id = self.shard_id(), seq = ?resume.seq, "Resuming session");
            return self.send_or_drop(link, &GatewayPayload::resume(&resume)).await;
        }

        let now = Instant::now();
        let slot = self.ctx.identify.reserve(now);
        if slot > now {
            tracing::debug!(
                shard_id = self.shard_id(),
                delay_ms = (slot - now).as_millis() as u64,
                "Identify delayed by the client-wide window"
            );
            self.set_status(ShardStatus::Identifying);
            link.auth = Some((slot, AuthStep::Identify));
            return None;
        }
        self.identify(link).await
    }

    async fn identify(&mut self, link: &mut Link) -> Option<Exit> {
        let payload = GatewayPayload::identify(&self.ctx.identify_payload(self.shard_id()));
        let now = Instant::now();
        {
            let mut session = self.session.write();
            session.status = ShardStatus::Identifying;
            session.last_identify_at = Some(now);
        }
        self.ctx.identify.record_sent(now);
        tracing::info!(shard_id = self.shard_id(), "Identifying");
        self.send_or_drop(link, &payload).await
    }

    async fn flush_outbox(&mut self, link: &mut Link) -> Option<Exit> {
        for payload in std::mem::take(&mut self.outbox) {
            if let Some(exit) = self.send_or_drop(link, &payload).await {
                return Some(exit);
            }
        }
        None
    }

    /// Send a payload; a dead socket ends the link
    async fn send_or_drop(&mut self, link: &mut Link, payload: &GatewayPayload) -> Option<Exit> {
        let frame = match self.ctx.codec.encoding().encode(payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(shard_id = self.shard_id(), op = %payload.op, error = %e, "Cannot encode payload");
                return None;
            }
        };

        if let Err(e) = link.sink.send(frame).await {
            tracing::warn!(shard_id = self.shard_id(), error = %e, "Failed to send payload");
            return Some(self.on_close(None));
        }
        None
    }

    /// A frame could not be understood; drop the socket and resume
    async fn protocol_error(&mut self, link: &mut Link, reason: &str) -> Exit {
        tracing::warn!(shard_id = self.shard_id(), error = %reason, "Protocol error");
        self.end_link(link, CLOSE_RESUMABLE, reason).await
    }

    /// Close the socket from our side and report the disconnect
    async fn end_link(&mut self, link: &mut Link, code: u16, reason: &str) -> Exit {
        self.close_socket(link, code, reason).await;
        self.ctx.queue.push(ClientEvent::Disconnect {
            shard_id: self.shard_id(),
            code,
            reason: reason.to_string(),
        });
        Exit::Reconnect
    }

    async fn close_socket(&self, link: &mut Link, code: u16, reason: &str) {
        let frame = WsFrame::Close(Some(CloseFrame::new(code, reason)));
        if let Err(e) = link.sink.send(frame).await {
            tracing::trace!(shard_id = self.shard_id(), error = %e, "Close frame not sent");
        }
        if let Err(e) = link.sink.close().await {
            tracing::trace!(shard_id = self.shard_id(), error = %e, "Socket close failed");
        }
    }

    /// The socket closed under us
    fn on_close(&mut self, frame: Option<CloseFrame>) -> Exit {
        let shard_id = self.shard_id();
        let CloseFrame { code, reason } =
            frame.unwrap_or_else(|| CloseFrame::new(CLOSE_ABNORMAL, "connection lost"));

        self.ctx.queue.push(ClientEvent::Disconnect {
            shard_id,
            code,
            reason: reason.clone(),
        });

        let known = CloseCode::from_u16(code);
        if is_fatal_close(code) {
            let reason = known.map_or(reason, |c| c.description().to_string());
            let error = GatewayError::FatalClose { code, reason };
            tracing::error!(shard_id, code, error = %error, "Shard closed with a fatal code");
            self.session.write().invalidate();
            self.ctx.queue.push(ClientEvent::Error {
                shard_id: Some(shard_id),
                message: error.to_string(),
            });
            return Exit::Fatal;
        }

        if known.is_some_and(CloseCode::invalidates_session) {
            tracing::debug!(shard_id, code, "Close code invalidates the session");
            self.session.write().invalidate();
        }

        tracing::warn!(shard_id, code, reason = %reason, "Shard disconnected");
        Exit::Reconnect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_backoff_grows_and_caps() {
        let first = connect_backoff(1);
        assert!(first >= Duration::from_secs(2) && first < Duration::from_secs(3));

        let third = connect_backoff(3);
        assert!(third >= Duration::from_secs(8) && third < Duration::from_secs(9));

        for failures in [6, 10, 64, u32::MAX] {
            let delay = connect_backoff(failures);
            assert!(delay >= MAX_CONNECT_BACKOFF);
            assert!(delay < MAX_CONNECT_BACKOFF + Duration::from_secs(1));
        }
    }
}
