// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Token-bucket admission filter shared by every incoming OSC message.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    capacity: f64,
    rate: f64,
    last_refill: Instant,
}

impl BucketState {
    fn reset(&mut self, rate_hz: f64, now: Instant) {
        self.rate = rate_hz;
        self.capacity = rate_hz.max(1.0);
        self.tokens = self.capacity;
        self.last_refill = now;
    }
}

/// Token bucket with capacity `max(1, rate)` and lazy refill.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    dropped: AtomicU64,
}

impl RateLimiter {
    pub fn new(rate_hz: f64) -> Self {
        Self::new_at(rate_hz, Instant::now())
    }

    /// Create a limiter whose refill clock starts at `now`
    pub fn new_at(rate_hz: f64, now: Instant) -> Self {
        let rate_hz = sanitize_rate(rate_hz).unwrap_or(DEFAULT_RATE_HZ);
        let mut state = BucketState {
            tokens: 0.0,
            capacity: 0.0,
            rate: 0.0,
            last_refill: now,
        };
        state.reset(rate_hz, now);

        Self {
            state: Mutex::new(state),
            dropped: AtomicU64::new(0),
        }
    }

    /// Admit one message
    pub fn allow(&self) -> bool {
        self.allow_at(1.0, Instant::now())
    }

    /// Refill for the time elapsed up to `now`, then try to take `cost` tokens.
    ///
    /// If the bucket arithmetic ever goes non-finite the limiter resets itself
    /// and admits the message rather than dropping it.
    pub fn allow_at(&self, cost: f64, now: Instant) -> bool {
        let mut state = self.state.lock();

        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * state.rate).min(state.capacity);
            state.last_refill = now;
        }

        if !state.tokens.is_finite() || !cost.is_finite() {
            warn!(
                "[RATE-LIMIT] Bucket state invalid (tokens={}, cost={}), admitting message",
                state.tokens, cost
            );
            let rate = state.rate;
            state.reset(rate, now);
            return true;
        }

        if state.tokens >= cost {
            state.tokens -= cost;
            return true;
        }
        drop(state);

        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("[RATE-LIMIT] Message dropped (total dropped: {})", total);
        false
    }

    /// Change the admission rate; capacity becomes `max(1, hz)` and the bucket
    /// is refilled immediately.
    pub fn set_rate(&self, rate_hz: f64) {
        self.set_rate_at(rate_hz, Instant::now());
    }

    pub fn set_rate_at(&self, rate_hz: f64, now: Instant) {
        match sanitize_rate(rate_hz) {
            Some(rate_hz) => self.state.lock().reset(rate_hz, now),
            None => warn!("[RATE-LIMIT] Ignoring invalid rate limit {}", rate_hz),
        }
    }

    pub fn rate(&self) -> f64 {
        self.state.lock().rate
    }

    pub fn capacity(&self) -> f64 {
        self.state.lock().capacity
    }

    /// Messages rejected since construction
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Default admission rate (messages/second)
pub const DEFAULT_RATE_HZ: f64 = 60.0;

fn sanitize_rate(rate_hz: f64) -> Option<f64> {
    if rate_hz.is_finite() && rate_hz >= 0.0 {
        Some(rate_hz)
    } else {
        None
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_HZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_burst_then_refill() {
        let t0 = Instant::now();
        let limiter = RateLimiter::new_at(10.0, t0);

        for i in 0..10 {
            assert!(limiter.allow_at(1.0, t0), "call {} should pass", i);
        }
        assert!(!limiter.allow_at(1.0, t0));
        assert_eq!(limiter.dropped(), 1);

        assert!(limiter.allow_at(1.0, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_refill_is_capped_at_capacity() {
        let t0 = Instant::now();
        let limiter = RateLimiter::new_at(5.0, t0);
        let later = t0 + Duration::from_secs(60);

        let admitted = (0..20).filter(|_| limiter.allow_at(1.0, later)).count();
        assert_eq!(admitted, 5);
        assert_eq!(limiter.dropped(), 15);
    }

    #[test]
    fn test_set_rate_tops_up_bucket() {
        let t0 = Instant::now();
        let limiter = RateLimiter::new_at(2.0, t0);
        assert!(limiter.allow_at(1.0, t0));
        assert!(limiter.allow_at(1.0, t0));
        assert!(!limiter.allow_at(1.0, t0));

        limiter.set_rate_at(4.0, t0);
        assert_eq!(limiter.capacity(), 4.0);
        let admitted = (0..6).filter(|_| limiter.allow_at(1.0, t0)).count();
        assert_eq!(admitted, 4);
    }

    #[test]
    fn test_fractional_rate_keeps_unit_capacity() {
        let t0 = Instant::now();
        let limiter = RateLimiter::new_at(0.5, t0);
        assert_eq!(limiter.capacity(), 1.0);
        assert!(limiter.allow_at(1.0, t0));
        assert!(!limiter.allow_at(1.0, t0 + Duration::from_secs(1)));
        assert!(limiter.allow_at(1.0, t0 + Duration::from_secs(2)));
    }

    #[test]
    fn test_invalid_state_fails_open() {
        let t0 = Instant::now();
        let limiter = RateLimiter::new_at(1.0, t0);
        assert!(limiter.allow_at(1.0, t0));
        assert!(limiter.allow_at(f64::NAN, t0));
        assert_eq!(limiter.dropped(), 0);
    }

    #[test]
    fn test_invalid_rate_is_ignored() {
        let limiter = RateLimiter::new(30.0);
        limiter.set_rate(f64::INFINITY);
        limiter.set_rate(-5.0);
        assert_eq!(limiter.rate(), 30.0);
    }
}
