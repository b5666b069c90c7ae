//! Sliding-window call-rate tracking with adaptive backoff
//!
//! Tracks every governed call in a 60-second trailing window, plus a
//! per-method history for the debounce limit table. Backoff doubles when the
//! per-second threshold is breached, grows 1.5x on the per-minute threshold,
//! and decays 0.9x while traffic sits comfortably under both. Clamped to
//! [min_backoff_ms, max_backoff_ms].

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::constants::RATE_WINDOW_SECS;

#[derive(Debug, Clone)]
pub struct RateLimits {
    pub per_second: u32,
    pub per_minute: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

pub struct CallRateTracker {
    limits: RateLimits,
    history: Mutex<Vec<Instant>>,
    per_method: Mutex<HashMap<String, Vec<Instant>>>,
    backoff_ms: AtomicU64,
}

impl CallRateTracker {
    pub fn new(limits: RateLimits) -> Self {
        let initial_backoff = limits.min_backoff_ms;
        Self {
            limits,
            history: Mutex::new(Vec::new()),
            per_method: Mutex::new(HashMap::new()),
            backoff_ms: AtomicU64::new(initial_backoff),
        }
    }

    /// Record a call, returning true when traffic is over a soft limit
    pub fn record(&self, method: &str) -> bool {
        let now = Instant::now();
        let window = Duration::from_secs(RATE_WINDOW_SECS);

        let (last_second, last_minute) = {
            let mut history = self.history.lock();
            history.retain(|t| now.duration_since(*t) < window);
            history.push(now);

            let last_second = history
                .iter()
                .filter(|t| now.duration_since(**t) < Duration::from_secs(1))
                .count() as u32;
            let last_minute = history.len() as u32;
            (last_second, last_minute)
        };

        {
            let mut per_method = self.per_method.lock();
            let entries = per_method.entry(method.to_string()).or_default();
            entries.retain(|t| now.duration_since(*t) < window);
            entries.push(now);
        }

        let over_second = last_second > self.limits.per_second;
        let over_minute = last_minute > self.limits.per_minute;

        if over_second {
            self.scale_backoff(2.0);
        } else if over_minute {
            self.scale_backoff(1.5);
        } else if last_second * 2 < self.limits.per_second
            && last_minute * 2 < self.limits.per_minute
        {
            self.scale_backoff(0.9);
        }

        over_second || over_minute
    }

    fn scale_backoff(&self, factor: f64) {
        let current = self.backoff_ms.load(Ordering::SeqCst);
        let scaled = ((current as f64) * factor) as u64;
        let clamped = scaled.clamp(self.limits.min_backoff_ms, self.limits.max_backoff_ms);
        self.backoff_ms.store(clamped, Ordering::SeqCst);
    }

    /// Current adaptive backoff delay
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms.load(Ordering::SeqCst))
    }

    /// Calls recorded within the last second
    pub fn calls_last_second(&self) -> u32 {
        self.calls_in_window(Duration::from_secs(1))
    }

    /// Calls recorded within the full trailing window
    pub fn calls_last_minute(&self) -> u32 {
        self.calls_in_window(Duration::from_secs(RATE_WINDOW_SECS))
    }

    /// Calls recorded within an arbitrary trailing window
    pub fn calls_in_window(&self, window: Duration) -> u32 {
        let now = Instant::now();
        self.history
            .lock()
            .iter()
            .filter(|t| now.duration_since(**t) < window)
            .count() as u32
    }

    /// Calls for one method within the last second (debounce limit table)
    pub fn method_calls_last_second(&self, method: &str) -> u32 {
        let now = Instant::now();
        self.per_method
            .lock()
            .get(method)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|t| now.duration_since(**t) < Duration::from_secs(1))
                    .count() as u32
            })
            .unwrap_or(0)
    }

    /// Reset history and backoff (circuit-breaker close path)
    pub fn clear(&self) {
        self.history.lock().clear();
        self.per_method.lock().clear();
        self.backoff_ms
            .store(self.limits.min_backoff_ms, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(per_second: u32, per_minute: u32) -> CallRateTracker {
        CallRateTracker::new(RateLimits {
            per_second,
            per_minute,
            min_backoff_ms: 500,
            max_backoff_ms: 30_000,
        })
    }

    #[test]
    fn under_limit_reports_false() {
        let t = tracker(10, 100);
        for _ in 0..5 {
            assert!(!t.record("eth_call"));
        }
        assert_eq!(t.calls_last_second(), 5);
    }

    #[test]
    fn over_limit_grows_backoff_monotonically_to_cap() {
        let t = tracker(3, 10_000);
        let mut previous = t.backoff();
        let mut saw_over = false;

        for _ in 0..12 {
            if t.record("eth_call") {
                saw_over = true;
                let current = t.backoff();
                assert!(current >= previous, "backoff must not shrink while over limit");
                previous = current;
            }
        }

        assert!(saw_over);
        // 500 * 2^n caps quickly
        for _ in 0..10 {
            t.record("eth_call");
        }
        assert_eq!(t.backoff(), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn backoff_decays_when_traffic_subsides() {
        let t = tracker(3, 10_000);
        for _ in 0..8 {
            t.record("eth_call");
        }
        let inflated = t.backoff();
        assert!(inflated > Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        t.record("eth_call");
        assert!(t.backoff() < inflated);
    }

    #[test]
    fn per_method_counts_are_separate() {
        let t = tracker(100, 1_000);
        for _ in 0..4 {
            t.record("eth_accounts");
        }
        t.record("eth_call");

        assert_eq!(t.method_calls_last_second("eth_accounts"), 4);
        assert_eq!(t.method_calls_last_second("eth_call"), 1);
        assert_eq!(t.method_calls_last_second("eth_chainId"), 0);
    }

    #[test]
    fn clear_resets_history_and_backoff() {
        let t = tracker(1, 2);
        for _ in 0..6 {
            t.record("eth_call");
        }
        assert!(t.backoff() > Duration::from_millis(500));

        t.clear();
        assert_eq!(t.calls_last_minute(), 0);
        assert_eq!(t.backoff(), Duration::from_millis(500));
    }
}
