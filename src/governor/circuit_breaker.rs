//! Circuit breaker state machine
//!
//! Two states: Closed (normal) and Open (overload). The governor trips the
//! breaker when hard call-volume thresholds are exceeded; recovery is purely
//! time-based (cooldown) or manual. The breaker itself only tracks state —
//! the open-state call policy (cached reads, throttle delays) lives in the
//! governor, and cache/counter clearing on close is wired there too.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::logger::{self, LogTag};

/// Result of the lazy state check at the top of each governed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerCheck {
    /// Normal operation
    Closed,
    /// Open; contains the remaining cooldown
    Open(Duration),
    /// The cooldown just elapsed during this check; the caller must clear
    /// the cache and reset counters exactly once
    JustClosed,
}

#[derive(Debug)]
struct BreakerState {
    open: bool,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    cooldown: Duration,
    total_trips: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                open: false,
                opened_at: None,
            }),
            cooldown,
            total_trips: AtomicU64::new(0),
        }
    }

    /// Lazily evaluate state, auto-closing once the cooldown has elapsed
    pub fn check(&self) -> BreakerCheck {
        let mut state = self.state.lock();
        if !state.open {
            return BreakerCheck::Closed;
        }

        match state.opened_at {
            Some(opened_at) => {
                let elapsed = opened_at.elapsed();
                if elapsed >= self.cooldown {
                    state.open = false;
                    state.opened_at = None;
                    logger::info(LogTag::Breaker, "Cooling period elapsed, circuit closed");
                    BreakerCheck::JustClosed
                } else {
                    BreakerCheck::Open(self.cooldown - elapsed)
                }
            }
            // Defensive: open without a timestamp, treat as freshly opened
            None => {
                state.opened_at = Some(Instant::now());
                BreakerCheck::Open(self.cooldown)
            }
        }
    }

    /// Trip the breaker (Closed -> Open)
    pub fn trip(&self, reason: &str) {
        let mut state = self.state.lock();
        if !state.open {
            self.total_trips.fetch_add(1, Ordering::SeqCst);
            logger::warning(
                LogTag::Breaker,
                &format!("Circuit OPEN for {}s: {}", self.cooldown.as_secs(), reason),
            );
        }
        state.open = true;
        state.opened_at = Some(Instant::now());
    }

    /// Manual reset (Open -> Closed), bypassing the cooldown
    pub fn force_close(&self) {
        let mut state = self.state.lock();
        if state.open {
            logger::info(LogTag::Breaker, "Circuit manually closed");
        }
        state.open = false;
        state.opened_at = None;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn total_trips(&self) -> u64 {
        self.total_trips.load(Ordering::SeqCst)
    }
}
