//! # Marquee Testing
//!
//! Testing utilities for the Marquee ledger.
//!
//! This crate provides:
//! - Deterministic implementations of the environment traits (clock, entropy,
//!   identifier tokens)
//! - [`InMemoryRecordStore`], a complete in-memory record store with fault
//!   injection
//!
//! ## Example
//!
//! ```ignore
//! use marquee_testing::{InMemoryRecordStore, SequentialIdGenerator, test_clock};
//!
//! #[tokio::test]
//! async fn books_two_seats() {
//!     let store = Arc::new(InMemoryRecordStore::new());
//!     let env = LedgerEnvironment::new(store, Arc::new(test_clock()), LedgerConfig::default())
//!         .with_ids(Arc::new(SequentialIdGenerator::new()));
//!     let ledger = Ledger::new(env).as_caller("V1");
//!     // ... register venue, title and screening "S1" ...
//!     let reservation = ledger.book_tickets(&"S1".into(), 2).await.unwrap();
//!     assert_eq!(reservation.amenities.len(), 2);
//! }
//! ```

use chrono::{DateTime, Utc};
use marquee_core::environment::{Clock, Entropy, IdGenerator};

/// In-memory record store
pub mod record_store;

pub use record_store::InMemoryRecordStore;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Entropy, IdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, PoisonError, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until a test moves it with [`FixedClock::set`] or
    /// [`FixedClock::advance`]. Clones share the same time, so a test can keep
    /// a handle while the ledger holds another.
    ///
    /// # Example
    ///
    /// ```
    /// use marquee_testing::mocks::FixedClock;
    /// use marquee_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now()); // Always the same!
    ///
    /// clock.advance(Duration::days(1));
    /// assert_eq!(clock.now() - time1, Duration::days(1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move the clock forward by `by`.
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }

    /// Identifier tokens `"0"`, `"1"`, `"2"`, ... in call order.
    ///
    /// Ignores the requested space, so ids never collide.
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Start counting from zero.
        #[must_use]
        pub const fn new() -> Self {
            Self::starting_at(0)
        }

        /// Start counting from `first`.
        #[must_use]
        pub const fn starting_at(first: u64) -> Self {
            Self {
                next: AtomicU64::new(first),
            }
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_token(&self, _space: u32) -> String {
            self.next.fetch_add(1, Ordering::SeqCst).to_string()
        }
    }

    /// Identifier tokens replayed from a script, cycling when exhausted.
    ///
    /// Useful for forcing identifier collisions.
    #[derive(Debug)]
    pub struct ScriptedIdGenerator {
        tokens: Vec<String>,
        cursor: AtomicUsize,
    }

    impl ScriptedIdGenerator {
        /// Replay `tokens` in order.
        #[must_use]
        pub fn new<I, S>(tokens: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                tokens: tokens.into_iter().map(Into::into).collect(),
                cursor: AtomicUsize::new(0),
            }
        }
    }

    impl IdGenerator for ScriptedIdGenerator {
        fn next_token(&self, _space: u32) -> String {
            if self.tokens.is_empty() {
                return String::new();
            }
            let i = self.cursor.fetch_add(1, Ordering::SeqCst) % self.tokens.len();
            self.tokens[i].clone()
        }
    }

    /// Entropy replaying a fixed script of draws, cycling when exhausted.
    ///
    /// Each draw is reduced modulo the requested bound.
    ///
    /// # Example
    ///
    /// ```
    /// use marquee_testing::mocks::ScriptedEntropy;
    /// use marquee_core::environment::Entropy;
    ///
    /// let entropy = ScriptedEntropy::new([4, 7]);
    /// assert_eq!(entropy.next_below(200), 4);
    /// assert_eq!(entropy.next_below(200), 7);
    /// assert_eq!(entropy.next_below(200), 4);
    /// ```
    #[derive(Debug)]
    pub struct ScriptedEntropy {
        draws: Vec<u32>,
        cursor: AtomicUsize,
    }

    impl ScriptedEntropy {
        /// Replay `draws` in order.
        #[must_use]
        pub fn new(draws: impl IntoIterator<Item = u32>) -> Self {
            Self {
                draws: draws.into_iter().collect(),
                cursor: AtomicUsize::new(0),
            }
        }
    }

    impl Entropy for ScriptedEntropy {
        fn next_below(&self, bound: u32) -> u32 {
            if bound == 0 || self.draws.is_empty() {
                return 0;
            }
            let i = self.cursor.fetch_add(1, Ordering::SeqCst) % self.draws.len();
            self.draws[i] % bound
        }
    }
}

// Re-export commonly used items
pub use mocks::{
    FixedClock, ScriptedEntropy, ScriptedIdGenerator, SequentialIdGenerator, test_clock,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    #[test]
    fn test_clock_is_new_year_2025() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default());
        assert_eq!(clock.now().year(), 2025);
    }

    #[test]
    fn fixed_clock_clones_share_time() {
        let clock = test_clock();
        let handle = clock.clone();
        handle.advance(chrono::Duration::days(3));
        assert_eq!(clock.today().day(), 4);
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIdGenerator::starting_at(7);
        assert_eq!(ids.next_token(10), "7");
        assert_eq!(ids.next_token(10), "8");
    }

    #[test]
    fn scripted_ids_cycle() {
        let ids = ScriptedIdGenerator::new(["1", "1", "2"]);
        let drawn: Vec<_> = (0..4).map(|_| ids.next_token(0)).collect();
        assert_eq!(drawn, ["1", "1", "2", "1"]);
    }

    #[test]
    fn scripted_entropy_respects_bound() {
        let entropy = ScriptedEntropy::new([250]);
        assert_eq!(entropy.next_below(200), 50);
        assert_eq!(entropy.next_below(0), 0);
    }
}
