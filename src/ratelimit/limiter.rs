//! Core rate limiter implementation.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::bucket::{BucketState, Decision, TokenBucket};
use super::preset::{Preset, PresetId, PresetRegistry};
use crate::clock::{Clock, SystemClock, Timestamp};
use crate::config::RateLimitSettings;
use crate::error::{Result, TurnstileError};

/// Shortest sweep period accepted by [`RateLimiter::spawn_eviction_task`].
pub const MIN_EVICTION_INTERVAL: Duration = Duration::from_millis(1);

/// A bucket slot in the store. `retired` is set under the bucket lock when the
/// slot is removed, so a caller that raced the removal retries on a fresh slot.
#[derive(Debug)]
struct Slot {
    bucket: TokenBucket,
    retired: bool,
}

type SlotHandle = Arc<Mutex<Slot>>;

/// The core rate limiter that manages token buckets.
///
/// This struct is thread-safe and can be shared across multiple tasks. The
/// store is sharded and every bucket has its own lock, so callers on
/// different keys never wait on each other's refill arithmetic.
pub struct RateLimiter {
    /// Token buckets indexed by key
    buckets: DashMap<String, SlotHandle>,
    /// Presets applied to buckets created from now on
    registry: RwLock<Arc<PresetRegistry>>,
    /// Time source for the clock-reading helpers
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter that reads the system clock.
    pub fn new(registry: PresetRegistry) -> Self {
        Self::with_clock(registry, Arc::new(SystemClock))
    }

    /// Create a rate limiter with an explicit time source.
    pub fn with_clock(registry: PresetRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            registry: RwLock::new(Arc::new(registry)),
            clock,
        }
    }

    /// Build the registry from settings and create a limiter on the system clock.
    pub fn from_settings(settings: &RateLimitSettings) -> Result<Self> {
        Ok(Self::new(PresetRegistry::from_settings(settings)?))
    }

    /// The current reading of the injected clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Try to take `cost` tokens from the bucket for `key` at instant `now`.
    ///
    /// The bucket is created full from `preset` on first use. A denial is
    /// reported through the returned [`Decision`]; errors are reserved for
    /// bad arguments and unknown presets, and neither creates a bucket.
    pub fn try_acquire(
        &self,
        key: &str,
        preset: &PresetId,
        cost: u32,
        now: Timestamp,
    ) -> Result<Decision> {
        if key.is_empty() {
            return Err(TurnstileError::InvalidArgument("key must not be empty".to_string()));
        }
        if cost == 0 {
            return Err(TurnstileError::InvalidArgument(
                "cost must be greater than 0".to_string(),
            ));
        }

        let registry = self.registry();
        let limits = registry.get(preset).map_err(|e| {
            warn!(key = %key, preset = %preset, "Rate limit requested with unknown preset");
            e
        })?;

        trace!(key = %key, preset = %preset, cost = cost, now = %now, "Acquiring tokens");

        let decision = loop {
            let handle = self.slot(key, limits, now);
            let mut slot = handle.lock();
            if slot.retired {
                continue;
            }
            break slot.bucket.try_consume(cost, now, &mut rand::thread_rng());
        };

        if !decision.allowed {
            debug!(
                key = %key,
                preset = %preset,
                remaining = decision.remaining,
                retry_after_secs = decision.retry_after_secs(),
                "Rate limit exceeded"
            );
        }

        Ok(decision)
    }

    /// [`try_acquire`](Self::try_acquire) with the preset given by name.
    pub fn try_acquire_named(
        &self,
        key: &str,
        preset: &str,
        cost: u32,
        now: Timestamp,
    ) -> Result<Decision> {
        self.try_acquire(key, &PresetId::from(preset), cost, now)
    }

    /// Take one token at the injected clock's current time.
    pub fn check(&self, key: &str, preset: &PresetId) -> Result<Decision> {
        self.check_with_cost(key, preset, 1)
    }

    /// Take `cost` tokens at the injected clock's current time.
    pub fn check_with_cost(&self, key: &str, preset: &PresetId, cost: u32) -> Result<Decision> {
        self.try_acquire(key, preset, cost, self.clock.now())
    }

    /// Get or lazily create the slot for `key`.
    fn slot(&self, key: &str, limits: &Preset, now: Timestamp) -> SlotHandle {
        if let Some(existing) = self.buckets.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self.buckets.entry(key.to_string()).or_insert_with(|| {
            debug!(
                key = %key,
                capacity = limits.capacity,
                refill_tokens = limits.refill_tokens,
                refill_interval_secs = limits.refill_interval_secs,
                "Creating token bucket"
            );
            Arc::new(Mutex::new(Slot {
                bucket: TokenBucket::new(limits.clone(), now),
                retired: false,
            }))
        });
        Arc::clone(entry.value())
    }

    /// Drop the bucket for `key`. Returns whether one existed.
    pub fn reset(&self, key: &str) -> bool {
        let removed = self
            .buckets
            .remove_if(key, |_, slot| {
                slot.lock().retired = true;
                true
            })
            .is_some();

        if removed {
            debug!(key = %key, "Token bucket reset");
        }
        removed
    }

    /// Read the bucket for `key` without refilling or consuming.
    pub fn snapshot(&self, key: &str) -> Option<BucketState> {
        let handle = self.buckets.get(key).map(|s| Arc::clone(s.value()))?;
        let slot = handle.lock();
        Some(slot.bucket.state())
    }

    /// Clear all buckets.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.buckets.retain(|_, slot| {
            slot.lock().retired = true;
            false
        });
    }

    /// Get the number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The registry new buckets are created from.
    pub fn registry(&self) -> Arc<PresetRegistry> {
        Arc::clone(&self.registry.read())
    }

    /// Replace the preset registry. Existing buckets keep their limits.
    pub fn reload(&self, registry: PresetRegistry) {
        let presets = registry.len();
        *self.registry.write() = Arc::new(registry);
        info!(presets = presets, live_buckets = self.bucket_count(), "Preset registry reloaded");
    }

    /// Resolve every preset name up front so a typo fails at startup.
    pub fn validate_presets<'a, I>(&self, names: I) -> Result<Vec<PresetId>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let registry = self.registry();
        names.into_iter().map(|name| registry.resolve(name)).collect()
    }

    /// Remove buckets that are certain to be back at capacity by `now`.
    ///
    /// A bucket recreated after eviction starts full, so removing one that has
    /// already refilled, even at the lowest jitter draw, is not observable.
    /// Returns the number removed.
    pub fn evict_idle(&self, now: Timestamp) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, slot| {
            let mut slot = slot.lock();
            if slot.bucket.is_idle(now) {
                slot.retired = true;
                false
            } else {
                true
            }
        });
        before.saturating_sub(self.buckets.len())
    }

    /// Run [`evict_idle`](Self::evict_idle) every `every` on the tokio runtime.
    ///
    /// Intervals shorter than [`MIN_EVICTION_INTERVAL`] are raised to it.
    pub fn spawn_eviction_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        let every = every.max(MIN_EVICTION_INTERVAL);
        info!(interval_ms = every.as_millis() as u64, "Starting idle bucket eviction");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle(self.clock.now());
                if evicted > 0 {
                    debug!(evicted = evicted, remaining = self.bucket_count(), "Evicted idle buckets");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn test_registry() -> PresetRegistry {
        PresetRegistry::new()
            .with_preset(PresetId::Strict, Preset::new(10, 10, 10, 0.0).unwrap())
            .with_preset("steady", Preset::new(5, 1, 2, 0.0).unwrap())
            .with_preset("jittery", Preset::new(1000, 10, 1, 0.2).unwrap())
    }

    fn steady() -> PresetId {
        PresetId::from("steady")
    }

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(test_registry());
        assert_eq!(limiter.bucket_count(), 0);
        assert_eq!(limiter.registry().len(), 3);
    }

    #[test]
    fn test_strict_scenario() {
        let limiter = RateLimiter::new(test_registry());
        let key = "rate:login:alice";

        for i in 1..=10 {
            let decision = limiter.try_acquire(key, &PresetId::Strict, 1, at(0)).unwrap();
            assert!(decision.allowed, "request {} should be allowed", i);
            assert_eq!(decision.remaining, f64::from(10 - i));
        }

        let denied = limiter.try_acquire(key, &PresetId::Strict, 1, at(0)).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::from_secs(10));

        let decision = limiter.try_acquire(key, &PresetId::Strict, 1, at(10)).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9.0);
    }

    #[test]
    fn test_capacity_plus_one_denied() {
        let limiter = RateLimiter::new(test_registry());

        for _ in 0..5 {
            assert!(limiter.try_acquire("k", &steady(), 1, at(0)).unwrap().allowed);
        }
        let denied = limiter.try_acquire("k", &steady(), 1, at(0)).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0.0);
        assert_eq!(denied.retry_after, Duration::from_secs(2));
    }

    #[test]
    fn test_unknown_preset_creates_no_bucket() {
        let limiter = RateLimiter::new(test_registry());

        let err = limiter
            .try_acquire_named("k", "nonexistent", 1, at(0))
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert!(matches!(err, TurnstileError::UnknownPreset { ref name } if name == "nonexistent"));
        assert_eq!(limiter.bucket_count(), 0);
        assert!(limiter.snapshot("k").is_none());
    }

    #[test]
    fn test_invalid_arguments() {
        let limiter = RateLimiter::new(test_registry());

        let err = limiter.try_acquire("", &steady(), 1, at(0)).unwrap_err();
        assert!(matches!(err, TurnstileError::InvalidArgument(_)));

        let err = limiter.try_acquire("k", &steady(), 0, at(0)).unwrap_err();
        assert!(matches!(err, TurnstileError::InvalidArgument(_)));

        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn test_partial_interval_does_not_refill() {
        let limiter = RateLimiter::new(test_registry());
        limiter.try_acquire("k", &PresetId::Strict, 10, at(0)).unwrap();

        let denied = limiter
            .try_acquire("k", &PresetId::Strict, 1, Timestamp::from_millis(9_999))
            .unwrap();
        assert!(!denied.allowed);
        assert_eq!(limiter.snapshot("k").unwrap().tokens, 0.0);
        assert_eq!(limiter.snapshot("k").unwrap().last_refill_at, at(0));
    }

    #[test]
    fn test_whole_intervals_refill_exactly() {
        let limiter = RateLimiter::new(test_registry());
        limiter.try_acquire("k", &steady(), 5, at(0)).unwrap();

        // 3 intervals of 2s at 1 token each, then one consumed
        let decision = limiter.try_acquire("k", &steady(), 1, at(6)).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2.0);

        // 100 intervals would add 100 tokens, clamped at capacity 5
        let decision = limiter.try_acquire("k", &steady(), 1, at(206)).unwrap();
        assert_eq!(decision.remaining, 4.0);
    }

    #[test]
    fn test_cost_larger_than_available() {
        let limiter = RateLimiter::new(test_registry());
        limiter.try_acquire("k", &steady(), 3, at(0)).unwrap();

        // 2 left, need 5: deficit 3 at 1 token per 2s
        let denied = limiter.try_acquire("k", &steady(), 5, at(0)).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 2.0);
        assert_eq!(denied.retry_after, Duration::from_secs(6));
        assert_eq!(limiter.snapshot("k").unwrap().tokens, 2.0);
    }

    #[test]
    fn test_different_keys_have_separate_buckets() {
        let limiter = RateLimiter::new(test_registry());

        limiter.try_acquire("a", &steady(), 5, at(0)).unwrap();
        let decision = limiter.try_acquire("b", &steady(), 1, at(0)).unwrap();

        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4.0);
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn test_snapshot_does_not_refill() {
        let limiter = RateLimiter::new(test_registry());
        limiter.try_acquire("k", &steady(), 5, at(0)).unwrap();

        let first = limiter.snapshot("k").unwrap();
        let second = limiter.snapshot("k").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.tokens, 0.0);
        assert_eq!(first.capacity, 5);
        assert_eq!(first.refill_interval_secs, 2);

        // Time passing is only observed by the next acquisition
        let decision = limiter.try_acquire("k", &steady(), 1, at(10)).unwrap();
        assert_eq!(decision.remaining, 4.0);
    }

    #[test]
    fn test_reset() {
        let limiter = RateLimiter::new(test_registry());
        limiter.try_acquire("k", &steady(), 5, at(0)).unwrap();

        assert!(limiter.reset("k"));
        assert!(!limiter.reset("k"));
        assert!(!limiter.reset("never-seen"));

        let decision = limiter.try_acquire("k", &steady(), 1, at(0)).unwrap();
        assert_eq!(decision.remaining, 4.0);
    }

    #[test]
    fn test_clear_buckets() {
        let limiter = RateLimiter::new(test_registry());
        limiter.try_acquire("a", &steady(), 1, at(0)).unwrap();
        limiter.try_acquire("b", &steady(), 1, at(0)).unwrap();
        assert_eq!(limiter.bucket_count(), 2);

        limiter.clear();
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn test_reload_keeps_live_bucket_limits() {
        let limiter = RateLimiter::new(test_registry());
        limiter.try_acquire("old", &steady(), 1, at(0)).unwrap();

        limiter.reload(
            PresetRegistry::new().with_preset("steady", Preset::new(50, 5, 1, 0.0).unwrap()),
        );

        assert_eq!(limiter.snapshot("old").unwrap().capacity, 5);
        limiter.try_acquire("new", &steady(), 1, at(0)).unwrap();
        assert_eq!(limiter.snapshot("new").unwrap().capacity, 50);

        // Presets dropped by the reload are gone for new requests
        assert!(limiter.try_acquire("x", &PresetId::Strict, 1, at(0)).is_err());
    }

    #[test]
    fn test_validate_presets() {
        let limiter = RateLimiter::new(test_registry());

        let ids = limiter.validate_presets(["strict", "steady"]).unwrap();
        assert_eq!(ids, vec![PresetId::Strict, steady()]);

        let err = limiter.validate_presets(["strict", "bursty"]).unwrap_err();
        assert!(matches!(err, TurnstileError::UnknownPreset { ref name } if name == "bursty"));
    }

    #[test]
    fn test_check_reads_injected_clock() {
        let clock = Arc::new(ManualClock::new(at(100)));
        let limiter = RateLimiter::with_clock(test_registry(), clock.clone());

        assert!(limiter.check_with_cost("k", &steady(), 5).unwrap().allowed);
        assert!(!limiter.check("k", &steady()).unwrap().allowed);
        assert_eq!(limiter.snapshot("k").unwrap().last_refill_at, at(100));

        clock.advance(Duration::from_secs(2));
        assert!(limiter.check("k", &steady()).unwrap().allowed);
        assert_eq!(limiter.snapshot("k").unwrap().last_refill_at, at(102));
    }

    #[test]
    fn test_evict_idle() {
        let limiter = RateLimiter::new(test_registry());
        limiter.try_acquire("drained", &steady(), 5, at(0)).unwrap();
        limiter.try_acquire("light", &steady(), 1, at(0)).unwrap();

        // "light" is one interval from full, "drained" needs five
        assert_eq!(limiter.evict_idle(at(1)), 0);
        assert_eq!(limiter.evict_idle(at(2)), 1);
        assert!(limiter.snapshot("light").is_none());
        assert!(limiter.snapshot("drained").is_some());

        assert_eq!(limiter.evict_idle(at(10)), 1);
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[tokio::test]
    async fn test_eviction_task_sweeps_idle_buckets() {
        let clock = Arc::new(ManualClock::new(at(0)));
        let limiter = Arc::new(RateLimiter::with_clock(test_registry(), clock.clone()));

        limiter.check("k", &steady()).unwrap();
        assert_eq!(limiter.bucket_count(), 1);

        clock.advance(Duration::from_secs(2));
        let handle = Arc::clone(&limiter).spawn_eviction_task(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(limiter.bucket_count(), 0);
    }

    #[tokio::test]
    async fn test_eviction_task_accepts_zero_interval() {
        let clock = Arc::new(ManualClock::new(at(0)));
        let limiter = Arc::new(RateLimiter::with_clock(test_registry(), clock.clone()));

        limiter.check("k", &steady()).unwrap();
        clock.advance(Duration::from_secs(2));

        let handle = Arc::clone(&limiter).spawn_eviction_task(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished(), "eviction task should keep running");
        handle.abort();

        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn test_evict_idle_waits_out_jitter() {
        let registry = PresetRegistry::new()
            .with_preset("wobbly", Preset::new(10, 10, 1, 0.5).unwrap());
        let limiter = RateLimiter::new(registry);
        let wobbly = PresetId::from("wobbly");

        limiter.try_acquire("k", &wobbly, 10, at(0)).unwrap();
        assert_eq!(limiter.evict_idle(at(1)), 0);
        assert_eq!(limiter.evict_idle(at(2)), 1);
    }

    #[test]
    fn test_builtin_preset_spelled_as_named() {
        let limiter = RateLimiter::new(test_registry());

        let spelled = PresetId::Named("strict".to_string());
        let decision = limiter.try_acquire("k", &spelled, 1, at(0)).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9.0);

        let decision = limiter.try_acquire("k", &PresetId::Strict, 1, at(0)).unwrap();
        assert_eq!(decision.remaining, 8.0);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let limiter = RateLimiter::new(test_registry());
        let jittery = PresetId::from("jittery");
        let mut added = Vec::new();

        for i in 0..500 {
            let key = format!("k{}", i);
            limiter.try_acquire(&key, &jittery, 1000, at(0)).unwrap();
            let decision = limiter.try_acquire(&key, &jittery, 1, at(1)).unwrap();
            assert!(decision.allowed);
            added.push(decision.remaining + 1.0);
        }

        for amount in &added {
            assert!((8.0..=12.0).contains(amount), "refill {} outside ±20%", amount);
        }

        let mean = added.iter().sum::<f64>() / added.len() as f64;
        let min = added.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = added.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((9.5..=10.5).contains(&mean), "mean refill {}", mean);
        assert!(min < 9.5 && max > 10.5, "jitter should spread refills: {}..{}", min, max);
    }

    #[test]
    fn test_jitter_scales_with_interval_count() {
        let limiter = RateLimiter::new(test_registry());
        let jittery = PresetId::from("jittery");

        for i in 0..200 {
            let key = format!("k{}", i);
            limiter.try_acquire(&key, &jittery, 1000, at(0)).unwrap();
            let decision = limiter.try_acquire(&key, &jittery, 1, at(3)).unwrap();
            let refilled = decision.remaining + 1.0;
            assert!((24.0..=36.0).contains(&refilled), "refill {} outside ±20% of 30", refilled);
        }
    }

    #[test]
    fn test_random_sequences_respect_invariants() {
        let limiter = RateLimiter::new(test_registry());
        let mut rng = StdRng::seed_from_u64(0x7a11);
        let presets = [PresetId::Strict, steady(), PresetId::from("jittery")];
        let mut last_seen: HashMap<String, Timestamp> = HashMap::new();
        let mut now_ms: u64 = 0;

        for _ in 0..5000 {
            // Mostly forward, occasionally backwards to exercise clock skew
            if rng.gen_bool(0.1) {
                now_ms = now_ms.saturating_sub(rng.gen_range(0..20_000));
            } else {
                now_ms += rng.gen_range(0..5_000);
            }

            let idx = rng.gen_range(0..presets.len());
            let key = format!("key-{}", idx);
            let cost = rng.gen_range(1..=20);
            limiter
                .try_acquire(&key, &presets[idx], cost, Timestamp::from_millis(now_ms))
                .unwrap();

            let state = limiter.snapshot(&key).unwrap();
            assert!(state.tokens >= 0.0, "tokens went negative: {}", state.tokens);
            assert!(
                state.tokens <= f64::from(state.capacity),
                "tokens {} exceed capacity {}",
                state.tokens,
                state.capacity
            );

            if let Some(previous) = last_seen.insert(key.clone(), state.last_refill_at) {
                assert!(state.last_refill_at >= previous, "last_refill_at moved backwards");
            }
        }
    }

    #[test]
    fn test_concurrent_acquires_never_double_spend() {
        const THREADS: usize = 64;
        const CAPACITY: u32 = 16;

        let registry = PresetRegistry::new()
            .with_preset("pool", Preset::new(CAPACITY, 1, 3600, 0.0).unwrap());
        let limiter = RateLimiter::new(registry);
        let pool = PresetId::from("pool");
        let allowed = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    barrier.wait();
                    let decision = limiter.try_acquire("shared", &pool, 1, at(0)).unwrap();
                    if decision.allowed {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(allowed.load(Ordering::SeqCst), CAPACITY as usize);
        assert_eq!(limiter.snapshot("shared").unwrap().tokens, 0.0);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_concurrent_acquires_exactly_capacity() {
        const THREADS: u32 = 32;

        let registry = PresetRegistry::new()
            .with_preset("pool", Preset::new(THREADS, 1, 3600, 0.0).unwrap());
        let limiter = RateLimiter::new(registry);
        let pool = PresetId::from("pool");
        let allowed = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS as usize);

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    barrier.wait();
                    if limiter.try_acquire("shared", &pool, 1, at(0)).unwrap().allowed {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(allowed.load(Ordering::SeqCst), THREADS as usize);
        assert!(!limiter.try_acquire("shared", &pool, 1, at(0)).unwrap().allowed);
    }
}
