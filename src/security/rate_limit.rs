//! Failed-authentication rate limiting.
//!
//! Counts failed authentication attempts per client IP in fixed time
//! windows. Once an IP reaches the limit, further requests from it are
//! rejected until the window rolls over.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock source, so tests can move time forward.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now_secs(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct WindowState {
    window_id: u64,
    counts: HashMap<IpAddr, u32>,
}

/// Fixed-window counter of failed authentication attempts.
pub struct RateLimiter {
    state: Mutex<WindowState>,
    max_fails: u32,
    window_secs: u64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_fails", &self.max_fails)
            .field("window_secs", &self.window_secs)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(max_fails: u32, window_minutes: u64) -> Self {
        Self::with_clock(max_fails, window_minutes, Arc::new(SystemClock))
    }

    pub fn with_clock(max_fails: u32, window_minutes: u64, clock: Arc<dyn Clock>) -> Self {
        let window_secs = window_minutes.max(1) * 60;
        Self {
            state: Mutex::new(WindowState {
                window_id: clock.now_secs() / window_secs,
                counts: HashMap::new(),
            }),
            max_fails,
            window_secs,
            clock,
        }
    }

    fn current_window(&self) -> u64 {
        self.clock.now_secs() / self.window_secs
    }

    /// Runs `f` on the counts of the current window. Entering a new window
    /// drops all counts of the previous one first.
    fn with_counts<T>(&self, f: impl FnOnce(&mut HashMap<IpAddr, u32>) -> T) -> T {
        let window_id = self.current_window();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.window_id != window_id {
            state.window_id = window_id;
            state.counts.clear();
        }
        f(&mut state.counts)
    }

    pub fn is_limited(&self, ip: IpAddr) -> bool {
        let max_fails = self.max_fails;
        self.with_counts(|counts| counts.get(&ip).copied().unwrap_or(0) >= max_fails)
    }

    /// Records one failed attempt, returning the count in this window.
    pub fn register_failure(&self, ip: IpAddr) -> u32 {
        self.with_counts(|counts| {
            let count = counts.entry(ip).or_insert(0);
            *count += 1;
            *count
        })
    }

    pub fn failures(&self, ip: IpAddr) -> u32 {
        self.with_counts(|counts| counts.get(&ip).copied().unwrap_or(0))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Manually advanced clock.
    #[derive(Debug, Default)]
    pub(crate) struct ManualClock(pub(crate) AtomicU64);

    impl ManualClock {
        pub(crate) fn advance(&self, secs: u64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_secs(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_limited_after_max_failures() {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::with_clock(10, 15, clock);
        let client = ip("192.168.1.34");

        for _ in 0..9 {
            limiter.register_failure(client);
        }
        assert!(!limiter.is_limited(client));
        limiter.register_failure(client);
        assert!(limiter.is_limited(client));
        assert!(!limiter.is_limited(ip("192.168.1.35")));
    }

    #[test]
    fn test_new_window_resets_counts() {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::with_clock(10, 15, clock.clone());
        let client = ip("10.0.0.1");

        for _ in 0..10 {
            limiter.register_failure(client);
        }
        assert!(limiter.is_limited(client));

        clock.advance(14 * 60);
        assert!(limiter.is_limited(client));

        clock.advance(60);
        assert_eq!(limiter.failures(client), 0);
        assert!(!limiter.is_limited(client));
    }

    #[test]
    fn test_windows_are_aligned_to_the_clock() {
        let clock = Arc::new(ManualClock(AtomicU64::new(15 * 60 - 1)));
        let limiter = RateLimiter::with_clock(1, 15, clock.clone());
        let client = ip("10.0.0.1");

        limiter.register_failure(client);
        assert!(limiter.is_limited(client));

        clock.advance(1);
        assert!(!limiter.is_limited(client));
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let limiter = Arc::new(RateLimiter::with_clock(
            1000,
            15,
            Arc::new(ManualClock::default()),
        ));
        let client = ip("10.0.0.9");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        limiter.register_failure(client);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(limiter.failures(client), 400);
    }
}
