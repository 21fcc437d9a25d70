//! Token-bucket rate limiting: presets, buckets, keys and the limiter.

mod bucket;
mod key;
mod limiter;
mod preset;

pub use bucket::{BucketState, Decision, Jitter, TokenBucket};
pub use key::{KeyBuilder, LimitKey};
pub use limiter::{RateLimiter, MIN_EVICTION_INTERVAL};
pub use preset::{Preset, PresetId, PresetRegistry};
