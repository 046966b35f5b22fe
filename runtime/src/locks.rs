//! Striped per-key locks with deadlock prevention.
//!
//! Keys are hashed onto a fixed table of async mutexes ("stripes"). An
//! operation that needs several keys acquires their stripes in ascending index
//! order, so two operations can never wait on each other in opposite orders.
//! Unrelated keys usually land on different stripes and proceed in parallel;
//! when they collide they are merely serialized.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Default number of stripes.
pub const DEFAULT_STRIPES: usize = 256;

/// Default time to wait for a stripe before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from lock acquisition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// A stripe could not be acquired within the timeout.
    #[error("Timed out after {timeout:?} waiting for lock on '{key}'")]
    Timeout {
        /// One of the keys guarded by the contended stripe.
        key: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

/// Table of striped async locks.
#[derive(Debug, Clone)]
pub struct KeyLocks {
    stripes: Arc<Vec<Arc<Mutex<()>>>>,
    timeout: Duration,
}

/// Guard holding every stripe acquired by [`KeyLocks::acquire`].
///
/// Stripes are released when the guard is dropped.
#[derive(Debug)]
pub struct LockGuard {
    held: Vec<OwnedMutexGuard<()>>,
}

impl LockGuard {
    /// Number of distinct stripes held.
    #[must_use]
    pub fn stripes_held(&self) -> usize {
        self.held.len()
    }
}

impl KeyLocks {
    /// Create a lock table with `stripes` stripes (at least one).
    #[must_use]
    pub fn new(stripes: usize, timeout: Duration) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Arc::new(Mutex::new(()))).collect();
        Self {
            stripes: Arc::new(stripes),
            timeout,
        }
    }

    /// Number of stripes in the table.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Stripe index a key maps to.
    #[must_use]
    pub fn stripe_of(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let slot = hasher.finish() % self.stripes.len() as u64;
        usize::try_from(slot).unwrap_or(0)
    }

    /// Acquire the stripes of every key, in ascending stripe order.
    ///
    /// Duplicate keys and keys sharing a stripe are locked once.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if any stripe is not acquired within the
    /// table's timeout. Stripes acquired before the failure are released.
    pub async fn acquire<K: AsRef<str>>(&self, keys: &[K]) -> Result<LockGuard, LockError> {
        let mut wanted: BTreeMap<usize, &str> = BTreeMap::new();
        for key in keys {
            let key = key.as_ref();
            wanted.entry(self.stripe_of(key)).or_insert(key);
        }

        let mut held = Vec::with_capacity(wanted.len());
        for (stripe, key) in wanted {
            let mutex = Arc::clone(&self.stripes[stripe]);
            match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
                Ok(guard) => held.push(guard),
                Err(_) => {
                    tracing::warn!(key, stripe, timeout_ms = self.timeout.as_millis(), "Lock acquisition timed out");
                    return Err(LockError::Timeout {
                        key: key.to_string(),
                        timeout: self.timeout,
                    });
                }
            }
        }

        Ok(LockGuard { held })
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES, DEFAULT_LOCK_TIMEOUT)
    }
}
