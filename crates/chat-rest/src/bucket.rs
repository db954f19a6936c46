//! Rate-limit bucket
//!
//! Per-route FIFO queue with the budget the server last reported for that
//! route. The dispatcher owns buckets behind a mutex and is the only caller.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::request::ApiRequest;

/// Snapshot of a bucket's rate-limit state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketMeta {
    /// `remaining == 0` and the reset has not passed yet
    pub limited: bool,
    /// When the budget resets, if known
    pub reset_at: Option<Instant>,
}

/// Queue and budget for one route key
#[derive(Debug)]
pub struct RateLimitBucket {
    route: String,
    queue: VecDeque<ApiRequest>,
    busy: bool,
    limit: Option<u32>,
    /// `None` until the server has reported a budget
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    last_used: Instant,
}

impl RateLimitBucket {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            queue: VecDeque::new(),
            busy: false,
            limit: None,
            remaining: None,
            reset_at: None,
            last_used: Instant::now(),
        }
    }

    #[inline]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Enqueue at the tail
    pub fn push(&mut self, request: ApiRequest) {
        self.last_used = Instant::now();
        self.queue.push_back(request);
    }

    /// Return a request to the head, ahead of everything queued after it
    pub fn unshift(&mut self, request: ApiRequest) {
        self.last_used = Instant::now();
        self.queue.push_front(request);
    }

    /// Dequeue the head, spending one call of the budget
    pub fn shift(&mut self) -> Option<ApiRequest> {
        let request = self.queue.pop_front()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        self.last_used = Instant::now();
        Some(request)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.queue.len()
    }

    /// Drop every queued request; their callers receive `Shutdown`
    pub fn clear(&mut self) {
        for request in self.queue.drain(..) {
            request.cancel();
        }
    }

    /// Update from response headers.
    ///
    /// A `None` reset leaves the timing untouched.
    pub fn handle_ratelimit(
        &mut self,
        limit: Option<u32>,
        remaining: Option<u32>,
        reset_after: Option<Duration>,
    ) {
        if let Some(limit) = limit {
            self.limit = Some(limit);
        }
        if let Some(remaining) = remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_after) = reset_after {
            self.reset_at = Some(Instant::now() + reset_after);
        }
    }

    pub fn meta(&self, now: Instant) -> BucketMeta {
        let limited =
            self.remaining == Some(0) && self.reset_at.is_some_and(|reset_at| now < reset_at);
        BucketMeta {
            limited,
            reset_at: self.reset_at,
        }
    }

    #[inline]
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    #[inline]
    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    #[inline]
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Empty, not draining and untouched for at least `idle`
    pub fn is_idle(&self, idle: Duration, now: Instant) -> bool {
        !self.busy && self.queue.is_empty() && now.duration_since(self.last_used) >= idle
    }
}

impl Drop for RateLimitBucket {
    fn drop(&mut self) {
        self.clear();
    }
}
