//! Global throttle
//!
//! Account-wide request budget shared by every bucket: a fixed window of
//! `per_second` calls, plus an explicit stall set by a global 429.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct ThrottleState {
    window_start: Instant,
    count: u32,
    blocked_until: Option<Instant>,
}

/// Cross-bucket gate for outbound calls
#[derive(Debug)]
pub struct GlobalThrottle {
    per_second: u32,
    state: Mutex<ThrottleState>,
}

impl GlobalThrottle {
    /// `per_second == 0` disables the window (stalls still apply)
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second,
            state: Mutex::new(ThrottleState {
                window_start: Instant::now(),
                count: 0,
                blocked_until: None,
            }),
        }
    }

    /// Take a slot now, or report how long to wait before asking again
    fn reserve(&self, now: Instant) -> Option<Duration> {
        let mut state = self.state.lock();

        if let Some(until) = state.blocked_until {
            if now < until {
                return Some(until - now);
            }
            state.blocked_until = None;
        }

        if self.per_second == 0 {
            return None;
        }

        if now.duration_since(state.window_start) >= WINDOW {
            state.window_start = now;
            state.count = 0;
        }

        if state.count < self.per_second {
            state.count += 1;
            None
        } else {
            Some(state.window_start + WINDOW - now)
        }
    }

    /// Wait until a call may be sent and account for it
    pub async fn acquire(&self) {
        while let Some(wait) = self.reserve(Instant::now()) {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Global throttle exhausted");
            tokio::time::sleep(wait).await;
        }
    }

    /// Block every bucket for `duration` (global rate limit hit)
    pub fn stall(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut state = self.state.lock();
        state.blocked_until = Some(state.blocked_until.map_or(until, |current| current.max(until)));
        tracing::debug!(stall_ms = duration.as_millis() as u64, "Global rate limit stall");
    }

    pub fn is_stalled(&self) -> bool {
        self.state
            .lock()
            .blocked_until
            .is_some_and(|until| Instant::now() < until)
    }
}
