//! # Marquee Runtime
//!
//! Execution helpers shared by every ledger operation.
//!
//! The record store only guarantees per-key linearizability. Read-modify-write
//! sequences on hot keys (a screening's seat counters, a day's concession
//! stock, a venue's screen set) therefore need two extra guarantees, both
//! provided here:
//!
//! - **Key locks**: in-process serialization of operations touching the same
//!   keys ([`locks::KeyLocks`])
//! - **Conflict retry**: re-running a read-modify-write when the store reports
//!   that the key moved on since it was read ([`retry::retry_conflicts`])
//!
//! ## Example
//!
//! ```ignore
//! use marquee_runtime::{locks::KeyLocks, retry::{ConflictRetry, retry_conflicts}};
//!
//! let locks = KeyLocks::new(256, Duration::from_secs(5));
//! let _guard = locks.acquire(&["screening-1"]).await?;
//! let screening = retry_conflicts(&ConflictRetry::default(), || decrement_seats(), is_conflict).await?;
//! ```

/// Striped per-key async locks
pub mod locks;

/// Retry loop for optimistic-concurrency conflicts
pub mod retry;

pub use locks::{KeyLocks, LockError, LockGuard};
pub use retry::{ConflictRetry, retry_conflicts};
