//! Identify rate limiting
//!
//! The gateway accepts one IDENTIFY per five seconds for the whole client.
//! Shards reserve a send slot; reservations are handed out in call order and
//! spaced by the interval. The limiter also remembers when any shard last
//! sent an IDENTIFY, which paces full reconnects.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Spacing between identifies across all shards
pub const IDENTIFY_INTERVAL: Duration = Duration::from_secs(5);

/// Client-wide identify window
#[derive(Debug)]
pub struct IdentifyLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
    last_sent: Mutex<Option<Instant>>,
}

impl IdentifyLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_interval(IDENTIFY_INTERVAL)
    }

    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
            last_sent: Mutex::new(None),
        }
    }

    /// Reserve the next identify slot at or after `now`
    pub fn reserve(&self, now: Instant) -> Instant {
        let mut last = self.last.lock();
        let slot = match *last {
            Some(previous) => now.max(previous + self.interval),
            None => now,
        };
        *last = Some(slot);
        slot
    }

    /// Note an IDENTIFY that went out on any shard
    pub fn record_sent(&self, at: Instant) {
        let mut last_sent = self.last_sent.lock();
        if last_sent.map_or(true, |previous| at > previous) {
            *last_sent = Some(at);
        }
    }

    /// When the client last sent an IDENTIFY
    pub fn last_sent(&self) -> Option<Instant> {
        *self.last_sent.lock()
    }
}

impl Default for IdentifyLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_identify_is_immediate() {
        let limiter = IdentifyLimiter::new();
        let now = Instant::now();
        assert_eq!(limiter.reserve(now), now);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reservations_are_spaced() {
        let limiter = IdentifyLimiter::new();
        let now = Instant::now();
        let first = limiter.reserve(now);
        let second = limiter.reserve(now);
        let third = limiter.reserve(now + Duration::from_secs(1));

        assert_eq!(second - first, IDENTIFY_INTERVAL);
        assert_eq!(third - second, IDENTIFY_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_window_is_not_delayed() {
        let limiter = IdentifyLimiter::new();
        let now = Instant::now();
        limiter.reserve(now);
        let later = now + Duration::from_secs(30);
        assert_eq!(limiter.reserve(later), later);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_sent_is_client_wide_maximum() {
        let limiter = IdentifyLimiter::new();
        assert_eq!(limiter.last_sent(), None);

        let now = Instant::now();
        limiter.record_sent(now + Duration::from_secs(5));
        limiter.record_sent(now);
        assert_eq!(limiter.last_sent(), Some(now + Duration::from_secs(5)));

        // Reserving a slot is not a send
        limiter.reserve(now + Duration::from_secs(20));
        assert_eq!(limiter.last_sent(), Some(now + Duration::from_secs(5)));
    }
}
