//! Turnstile - Token-Bucket Rate Limiting
//!
//! This crate implements an in-process rate limiter built on token buckets
//! with jittered refill. Buckets are keyed by namespaced strings and created
//! lazily from named presets; one limiter is meant to be shared by every
//! request handler in the process.

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use error::{Result, TurnstileError};
pub use ratelimit::{Decision, PresetId, PresetRegistry, RateLimiter};
