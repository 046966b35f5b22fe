//! Dependency injection traits.
//!
//! Everything the ledger would otherwise read from ambient global state
//! (wall-clock time, random numbers, identifier tokens) is abstracted behind a
//! trait here and injected through the ledger's environment. Production
//! implementations live in this module; deterministic ones live in
//! `marquee-testing`.

use chrono::{DateTime, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use marquee_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// assert!(clock.today() <= clock.now().date_naive());
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date (UTC)
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of pseudo-random draws.
pub trait Entropy: Send + Sync {
    /// Draw a value uniformly from `[0, bound)`.
    ///
    /// A `bound` of zero always yields zero.
    fn next_below(&self, bound: u32) -> u32;
}

/// Entropy from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngEntropy;

impl Entropy for ThreadRngEntropy {
    fn next_below(&self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..bound)
    }
}

/// Entropy reseeded from the injected clock on every draw.
///
/// Each draw seeds a fresh generator with the clock's current nanosecond
/// timestamp, so two draws under a frozen clock return the same value.
#[derive(Clone)]
pub struct TimeSeededEntropy {
    clock: Arc<dyn Clock>,
}

impl TimeSeededEntropy {
    /// Create an entropy source seeded from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Entropy for TimeSeededEntropy {
    fn next_below(&self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        let now = self.clock.now();
        let seed = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros())
            .unsigned_abs();
        StdRng::seed_from_u64(seed).gen_range(0..bound)
    }
}

impl std::fmt::Debug for TimeSeededEntropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSeededEntropy").finish_non_exhaustive()
    }
}

/// Generator of identifier tokens.
///
/// Callers compose the token into a full identifier (for example a prefix,
/// owner id and parent id followed by the token). `space` is the size of the
/// numeric token space a random generator should draw from; generators that
/// guarantee uniqueness on their own may ignore it.
pub trait IdGenerator: Send + Sync {
    /// Produce the next identifier token.
    fn next_token(&self, space: u32) -> String;
}

/// Random numeric tokens drawn from `[0, space)`.
///
/// Uniqueness is probabilistic; callers must detect collisions.
#[derive(Clone)]
pub struct RandomIdGenerator {
    entropy: Arc<dyn Entropy>,
}

impl RandomIdGenerator {
    /// Create a generator drawing from `entropy`.
    #[must_use]
    pub fn new(entropy: Arc<dyn Entropy>) -> Self {
        Self { entropy }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRngEntropy))
    }
}

impl IdGenerator for RandomIdGenerator {
    fn next_token(&self, space: u32) -> String {
        self.entropy.next_below(space).to_string()
    }
}

impl std::fmt::Debug for RandomIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomIdGenerator").finish_non_exhaustive()
    }
}

/// UUID v4 tokens (simple hex form). Ignores `space`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_token(&self, _space: u32) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}
