//! Token bucket state and refill arithmetic.

use rand::Rng;
use serde::Serialize;
use std::time::Duration;

use super::preset::Preset;
use crate::clock::Timestamp;

/// Multiplier applied to each refill batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    ratio: f64,
}

impl Jitter {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    /// A factor drawn uniformly from `[1 - ratio, 1 + ratio]`.
    pub fn factor<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.ratio <= 0.0 {
            return 1.0;
        }
        1.0 + rng.gen_range(-self.ratio..=self.ratio)
    }
}

/// Outcome of an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decision {
    /// Whether the caller may proceed
    pub allowed: bool,
    /// Tokens left in the bucket after this attempt
    pub remaining: f64,
    /// Advisory wait before retrying; zero when allowed
    #[serde(serialize_with = "serialize_secs")]
    pub retry_after: Duration,
}

impl Decision {
    /// Remaining tokens rounded down.
    pub fn remaining_whole(&self) -> u64 {
        self.remaining.floor() as u64
    }

    /// `retry_after` rounded up to whole seconds, as sent in a `Retry-After` header.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Read-only view of a bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketState {
    pub tokens: f64,
    pub last_refill_at: Timestamp,
    pub capacity: u32,
    pub refill_tokens: u32,
    pub refill_interval_secs: u64,
    pub jitter_ratio: f64,
}

/// Per-key token bucket.
///
/// The limits are copied from the preset when the bucket is created and are
/// never changed afterwards.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    last_refill_at: Timestamp,
    limits: Preset,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(limits: Preset, now: Timestamp) -> Self {
        Self {
            tokens: f64::from(limits.capacity),
            last_refill_at: now,
            limits,
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn last_refill_at(&self) -> Timestamp {
        self.last_refill_at
    }

    pub fn limits(&self) -> &Preset {
        &self.limits
    }

    /// Credit every whole refill interval elapsed since the last refill.
    ///
    /// `last_refill_at` advances by whole intervals only, so the leftover
    /// partial interval carries into the next call. A `now` at or before
    /// `last_refill_at` is treated as no elapsed time.
    pub fn refill<R: Rng>(&mut self, now: Timestamp, rng: &mut R) {
        let elapsed = now.saturating_duration_since(self.last_refill_at);
        if elapsed.is_zero() {
            return;
        }

        let interval = self.limits.refill_interval().as_nanos();
        let intervals = elapsed.as_nanos() / interval;
        if intervals == 0 {
            return;
        }

        let capacity = f64::from(self.limits.capacity);
        let nominal = f64::from(self.limits.refill_tokens) * intervals as f64;
        let added = nominal * Jitter::new(self.limits.jitter_ratio).factor(rng);
        self.tokens = (self.tokens + added).clamp(0.0, capacity);

        let advance = u64::try_from(interval.saturating_mul(intervals)).unwrap_or(u64::MAX);
        self.last_refill_at = self.last_refill_at + Duration::from_nanos(advance);
    }

    /// Refill, then take `cost` tokens if they are available.
    pub fn try_consume<R: Rng>(&mut self, cost: u32, now: Timestamp, rng: &mut R) -> Decision {
        self.refill(now, rng);

        let cost = f64::from(cost);
        if self.tokens >= cost {
            self.tokens -= cost;
            Decision {
                allowed: true,
                remaining: self.tokens,
                retry_after: Duration::ZERO,
            }
        } else {
            Decision {
                allowed: false,
                remaining: self.tokens,
                retry_after: self.time_until_available(cost),
            }
        }
    }

    /// Nominal-rate estimate of how long until `cost` tokens are present.
    fn time_until_available(&self, cost: f64) -> Duration {
        let deficit = (cost - self.tokens).max(0.0);
        let batches = (deficit / f64::from(self.limits.refill_tokens)).ceil() as u64;
        Duration::from_secs(batches.saturating_mul(self.limits.refill_interval_secs))
    }

    /// Whether the bucket is certain to be back at capacity at `now`, even if
    /// every pending refill draws the lowest jitter factor.
    pub fn is_idle(&self, now: Timestamp) -> bool {
        let capacity = f64::from(self.limits.capacity);
        if self.tokens >= capacity {
            return true;
        }
        let elapsed = now.saturating_duration_since(self.last_refill_at);
        let intervals = elapsed.as_nanos() / self.limits.refill_interval().as_nanos();
        let worst_case = f64::from(self.limits.refill_tokens)
            * intervals as f64
            * (1.0 - self.limits.jitter_ratio);
        self.tokens + worst_case >= capacity
    }

    pub fn state(&self) -> BucketState {
        BucketState {
            tokens: self.tokens,
            last_refill_at: self.last_refill_at,
            capacity: self.limits.capacity,
            refill_tokens: self.limits.refill_tokens,
            refill_interval_secs: self.limits.refill_interval_secs,
            jitter_ratio: self.limits.jitter_ratio,
        }
    }
}
