//! Request dispatcher
//!
//! Owns the buckets and the global throttle. Submitting a request pushes it
//! into its route's bucket; if nobody is draining that bucket a drain task is
//! spawned. The drain task is the only place a bucket's requests are sent, so
//! a bucket never has more than one call in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chat_common::RestConfig;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::bucket::RateLimitBucket;
use crate::error::{RestError, RestResult};
use crate::request::ApiRequest;
use crate::throttle::GlobalThrottle;
use crate::transport::{HttpTransport, RawResponse};

type BucketHandle = Arc<Mutex<RateLimitBucket>>;

/// Shared dispatcher handle
pub type SharedDispatcher = Arc<RequestDispatcher>;

/// What to do with a request after its response was interpreted
enum Step {
    Done(RestResult<Value>),
    /// Put it back at the head, optionally after a delay
    Requeue(Option<Duration>),
}

/// Rate-limit aware REST dispatcher
pub struct RequestDispatcher {
    config: RestConfig,
    token: String,
    transport: Arc<dyn HttpTransport>,
    buckets: DashMap<String, BucketHandle>,
    global: GlobalThrottle,
    shutdown: AtomicBool,
}

impl RequestDispatcher {
    pub fn new(
        config: RestConfig,
        token: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> SharedDispatcher {
        Arc::new(Self {
            global: GlobalThrottle::new(config.global_per_second),
            config,
            token: token.into(),
            transport,
            buckets: DashMap::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Submit a request and wait for its result
    pub async fn execute(self: &Arc<Self>, mut request: ApiRequest) -> RestResult<Value> {
        let (tx, rx) = oneshot::channel();
        request.set_responder(tx);
        self.submit(request);
        rx.await.unwrap_or(Err(RestError::Shutdown))
    }

    /// Enqueue a request; its result goes to the responder it carries
    pub fn submit(self: &Arc<Self>, request: ApiRequest) {
        if self.is_shutdown() {
            request.cancel();
            return;
        }

        let route = request.route_key();
        let bucket = self.push(&route, request);
        self.schedule(route, bucket);
    }

    /// Enqueue into the route's bucket, creating it lazily.
    ///
    /// The push happens under the map entry so the sweeper cannot drop the
    /// bucket between lookup and push.
    fn push(&self, route: &str, request: ApiRequest) -> BucketHandle {
        let entry = self.buckets.entry(route.to_string()).or_insert_with(|| {
            tracing::trace!(route = %route, "Creating rate-limit bucket");
            Arc::new(Mutex::new(RateLimitBucket::new(route)))
        });
        entry.lock().push(request);
        Arc::clone(&entry)
    }

    /// Start draining a bucket unless someone already is
    fn schedule(self: &Arc<Self>, route: String, bucket: BucketHandle) {
        {
            let mut b = bucket.lock();
            if b.is_busy() || b.size() == 0 {
                return;
            }
            b.set_busy(true);
        }

        let this = Arc::clone(self);
        tokio::spawn(async move { this.drain(route, bucket).await });
    }

    async fn drain(self: Arc<Self>, route: String, bucket: BucketHandle) {
        while !self.is_shutdown() {
            let meta = bucket.lock().meta(Instant::now());
            if meta.limited {
                if let Some(reset_at) = meta.reset_at {
                    tracing::debug!(
                        route = %route,
                        wait_ms = reset_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "Bucket limited, holding requests"
                    );
                    tokio::time::sleep_until(reset_at).await;
                    continue;
                }
            }

            let Some(mut request) = bucket.lock().shift() else {
                break;
            };

            self.global.acquire().await;
            let outcome = self.transport.send(&request, &self.token).await;

            match self.interpret(&route, &bucket, &mut request, outcome) {
                Step::Done(result) => request.respond(result),
                Step::Requeue(delay) => {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    bucket.lock().unshift(request);
                }
            }
        }

        let pending = {
            let mut b = bucket.lock();
            b.set_busy(false);
            b.size() > 0
        };
        // A push may have landed between the last shift and releasing the flag
        if pending && !self.is_shutdown() {
            self.schedule(route, bucket);
        }
    }

    fn interpret(
        &self,
        route: &str,
        bucket: &BucketHandle,
        request: &mut ApiRequest,
        outcome: RestResult<RawResponse>,
    ) -> Step {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                request.attempts += 1;
                if request.attempts > self.config.max_retries {
                    tracing::error!(route = %route, attempts = request.attempts, error = %e, "Request failed, retries exhausted");
                    return Step::Done(Err(e));
                }
                let delay = self.backoff(request.attempts);
                tracing::warn!(route = %route, attempt = request.attempts, delay_ms = delay.as_millis() as u64, error = %e, "Transport error, retrying");
                return Step::Requeue(Some(delay));
            }
        };

        bucket.lock().handle_ratelimit(
            response.header_parsed("x-ratelimit-limit"),
            response.header_parsed("x-ratelimit-remaining"),
            response
                .header_parsed::<f64>("x-ratelimit-reset-after")
                .and_then(seconds),
        );

        match response.status {
            200..=299 => {
                tracing::trace!(route = %route, status = response.status, "Request succeeded");
                Step::Done(response.json())
            }
            429 => {
                let body = response.json().unwrap_or(Value::Null);
                let retry_after = body
                    .get("retry_after")
                    .and_then(Value::as_f64)
                    .or_else(|| response.header_parsed("retry-after"))
                    .and_then(seconds)
                    .unwrap_or(Duration::from_secs(1));
                let global = body
                    .get("global")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                    || response.header("x-ratelimit-global").is_some();

                if global {
                    self.global.stall(retry_after);
                } else {
                    bucket
                        .lock()
                        .handle_ratelimit(None, Some(0), Some(retry_after));
                }

                tracing::debug!(
                    route = %route,
                    global,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limited, requeueing"
                );
                Step::Requeue(None)
            }
            500..=599 => {
                request.attempts += 1;
                if request.attempts > self.config.max_retries {
                    tracing::error!(route = %route, status = response.status, attempts = request.attempts, "Server error, retries exhausted");
                    return Step::Done(Err(RestError::Server {
                        status: response.status,
                        attempts: request.attempts,
                    }));
                }
                let delay = self.backoff(request.attempts);
                tracing::warn!(route = %route, status = response.status, attempt = request.attempts, delay_ms = delay.as_millis() as u64, "Server error, retrying");
                Step::Requeue(Some(delay))
            }
            status => {
                let body = response.json().unwrap_or(Value::Null);
                let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| response.body.clone(), str::to_string);
                tracing::debug!(route = %route, status, code, "Request rejected");
                Step::Done(Err(RestError::Client {
                    status,
                    code,
                    message,
                }))
            }
        }
    }

    /// `retry_base_ms * 2^(attempt - 1)`
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.config.retry_base_ms.saturating_mul(factor))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Number of live buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets that are empty, not draining and idle for `idle`
    pub fn prune_idle_buckets(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.lock().is_idle(idle, now));
        let removed = before - self.buckets.len();
        if removed > 0 {
            tracing::trace!(removed, "Pruned idle buckets");
        }
        removed
    }

    /// Periodically prune idle buckets until the dispatcher is dropped or
    /// destroyed
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let idle = Duration::from_secs(self.config.bucket_idle_secs.max(1));
        let weak: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(idle);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(this) = weak.upgrade() else { break };
                if this.is_shutdown() {
                    break;
                }
                this.prune_idle_buckets(idle);
            }
        })
    }

    /// Whether a global 429 is currently stalling every bucket
    pub fn is_globally_limited(&self) -> bool {
        self.global.is_stalled()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Fail every queued request with `Shutdown` and refuse new ones.
    /// Calls already sent are not cancelled.
    pub fn destroy(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        for entry in &self.buckets {
            entry.value().lock().clear();
        }
        self.buckets.clear();
        tracing::info!("Request dispatcher shut down");
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("buckets", &self.buckets.len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

fn seconds(value: f64) -> Option<Duration> {
    (value.is_finite() && value >= 0.0).then(|| Duration::from_secs_f64(value))
}
