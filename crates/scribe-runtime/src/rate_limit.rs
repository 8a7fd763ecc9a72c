//! Post spacing for one integration.
//!
//! Every grant reserves a slot, so concurrent callers end up spaced at
//! least `min_interval` apart. Only a bounded number of reservations may
//! lie in the future; past that the caller is told to defer the post to a
//! later poll cycle instead of queueing behind an ever-growing wait.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Default minimum spacing between posts.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default number of reservations allowed in the future.
pub const DEFAULT_MAX_PENDING: usize = 3;

/// Outcome of a slot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotGrant {
    /// Post now.
    Immediate,
    /// A slot is reserved at this instant; post once it is reached.
    WaitUntil(Instant),
    /// Too many posts are already waiting; keep the action for later.
    Deferred,
}

#[derive(Debug, Default)]
struct Window {
    /// Most recent reserved slot.
    last_slot: Option<Instant>,
    /// Reserved slots not yet reached, oldest first.
    pending: VecDeque<Instant>,
    /// No slot is granted before this instant.
    not_before: Option<Instant>,
}

/// Minimum-interval limiter for posting.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    max_pending: usize,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Creates a limiter with the given spacing and pending bound.
    pub fn new(min_interval: Duration, max_pending: usize) -> Self {
        Self {
            min_interval,
            max_pending,
            window: Mutex::new(Window::default()),
        }
    }

    /// Minimum spacing between posts.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Requests a post slot at the current time.
    pub fn acquire_post_slot(&self) -> SlotGrant {
        self.acquire_at(Instant::now())
    }

    /// Requests a post slot as of `now`.
    pub fn acquire_at(&self, now: Instant) -> SlotGrant {
        let mut window = self.lock();
        window.pending.retain(|slot| *slot > now);

        let mut slot = now;
        if let Some(last) = window.last_slot {
            slot = slot.max(last + self.min_interval);
        }
        if let Some(not_before) = window.not_before {
            slot = slot.max(not_before);
        }

        if slot <= now {
            window.last_slot = Some(now);
            return SlotGrant::Immediate;
        }

        if window.pending.len() >= self.max_pending {
            debug!(pending = window.pending.len(), "Post slot deferred");
            return SlotGrant::Deferred;
        }

        window.pending.push_back(slot);
        window.last_slot = Some(slot);
        SlotGrant::WaitUntil(slot)
    }

    /// Blocks new grants until `until`, typically a reset time reported by
    /// the platform after a rejected post.
    pub fn pause_until(&self, until: Instant) {
        let mut window = self.lock();
        let current = window.not_before.unwrap_or(until);
        window.not_before = Some(current.max(until));
    }

    /// Reservations that have not been reached yet.
    pub fn pending(&self) -> usize {
        let now = Instant::now();
        self.lock().pending.iter().filter(|slot| **slot > now).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Window> {
        self.window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL, DEFAULT_MAX_PENDING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const MIN: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_first_post_is_immediate() {
        let limiter = RateLimiter::new(MIN, 3);
        assert_eq!(limiter.acquire_post_slot(), SlotGrant::Immediate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_and_deferral() {
        let limiter = RateLimiter::new(MIN, 2);
        let now = Instant::now();

        assert_eq!(limiter.acquire_at(now), SlotGrant::Immediate);
        assert_eq!(limiter.acquire_at(now), SlotGrant::WaitUntil(now + MIN));
        assert_eq!(limiter.acquire_at(now), SlotGrant::WaitUntil(now + MIN * 2));
        assert_eq!(limiter.acquire_at(now), SlotGrant::Deferred);
        assert_eq!(limiter.pending(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_frees_after_interval() {
        let limiter = RateLimiter::new(MIN, 3);
        let now = Instant::now();

        assert_eq!(limiter.acquire_at(now), SlotGrant::Immediate);
        assert_eq!(limiter.acquire_at(now + MIN), SlotGrant::Immediate);
        assert_eq!(
            limiter.acquire_at(now + MIN + Duration::from_secs(1)),
            SlotGrant::WaitUntil(now + MIN * 2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_until_pushes_slots() {
        let limiter = RateLimiter::new(MIN, 3);
        let now = Instant::now();
        let reset = now + Duration::from_secs(600);

        limiter.pause_until(reset);
        limiter.pause_until(now + Duration::from_secs(5));

        assert_eq!(limiter.acquire_at(now), SlotGrant::WaitUntil(reset));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_grants_are_spaced() {
        let limiter = Arc::new(RateLimiter::new(MIN, 16));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire_at(now) })
            })
            .collect();

        let mut slots = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                SlotGrant::Immediate => slots.push(now),
                SlotGrant::WaitUntil(at) => slots.push(at),
                SlotGrant::Deferred => panic!("unexpected deferral"),
            }
        }
        slots.sort();

        assert_eq!(slots[0], now);
        for pair in slots.windows(2) {
            assert!(pair[1] - pair[0] >= MIN);
        }
    }
}
