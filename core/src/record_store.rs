//! Record store trait and related types.
//!
//! The record store is the external key-value database the ledger runs on.
//! It stores opaque byte values under string keys, guarantees linearizable
//! per-key reads and writes, and offers a secondary index that can be queried
//! with a [`Selector`](crate::selector::Selector) expression, optionally one
//! page at a time.
//!
//! # Design
//!
//! The trait is deliberately minimal:
//!
//! - Get and put by key, with optimistic concurrency on put
//! - Query the secondary index, draining a cursor
//! - Paginated query with an opaque bookmark
//! - Per-key write history
//!
//! It does NOT provide transactions spanning several keys. Callers that update
//! more than one record order their writes and accept that a failure between
//! them leaves the earlier write in place.
//!
//! # Implementations
//!
//! - `InMemoryRecordStore` (in `marquee-testing`): fast, deterministic testing

use crate::version::Version;
use crate::{DateTime, Utc};
use futures::stream::BoxStream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the key is not at the expected version.
    ///
    /// Another writer changed the record between our read and our write.
    #[error("Concurrency conflict on '{key}': expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Key whose write was rejected.
        key: String,
        /// Version the writer read.
        expected: Version,
        /// Version currently stored.
        actual: Version,
    },

    /// The query expression could not be understood.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Reading from an open cursor failed.
    #[error("Cursor error: {0}")]
    Cursor(String),

    /// The store could not be reached or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True for errors that a fresh read-modify-write attempt may resolve.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// A value read by key together with its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Raw value bytes, exactly as written.
    pub value: Vec<u8>,
    /// Current version of the key.
    pub version: Version,
}

/// One record yielded by a query cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    /// Key of the matching record.
    pub key: String,
    /// Raw value bytes, exactly as written.
    pub value: Vec<u8>,
}

/// Pagination metadata reported by the store for one page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryMetadata {
    /// Number of records fetched in this page.
    pub fetched_count: u32,
    /// Opaque bookmark to resume after this page.
    pub bookmark: String,
}

/// One entry of a key's write history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Identifier of the write.
    pub tx_id: String,
    /// Value written, `None` for deletions.
    pub value: Option<Vec<u8>>,
    /// When the write happened.
    pub timestamp: DateTime<Utc>,
    /// True if the write removed the key.
    pub is_delete: bool,
}

/// Cursor over query results, in index order.
pub type RecordCursor = BoxStream<'static, Result<QueryRecord, StoreError>>;

/// Cursor over a key's history, oldest first.
pub type HistoryCursor = BoxStream<'static, Result<HistoryEntry, StoreError>>;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Key-value store with a queryable secondary index.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one store can be shared behind an
/// `Arc<dyn RecordStore>` by every component of the ledger.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures instead of using `async fn` so the trait can
/// be used as a trait object.
pub trait RecordStore: Send + Sync {
    /// Read a record by key.
    ///
    /// Returns `None` when the key has never been written (or was deleted).
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the store could not be read
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<StoredRecord>>;

    /// Write a record.
    ///
    /// - `expected = Some(v)`: write only if the key is currently at `v`
    ///   (`Version::ABSENT` means "only if it does not exist")
    /// - `expected = None`: write unconditionally
    ///
    /// Returns the new version of the key.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict`: the key is not at the expected version
    /// - `Unavailable`: the write failed
    fn put<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        expected: Option<Version>,
    ) -> StoreFuture<'a, Version>;

    /// Open a cursor over every record matching `query`.
    ///
    /// # Errors
    ///
    /// - `InvalidQuery`: the expression was rejected
    /// - `Unavailable`: the cursor could not be opened
    ///
    /// Items of the cursor may themselves fail with `Cursor`.
    fn query<'a>(&'a self, query: &'a str) -> StoreFuture<'a, RecordCursor>;

    /// Open a cursor over at most `page_size` records matching `query`,
    /// starting after `bookmark` (empty string = from the beginning).
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::query`].
    fn query_paginated<'a>(
        &'a self,
        query: &'a str,
        page_size: u32,
        bookmark: &'a str,
    ) -> StoreFuture<'a, (RecordCursor, QueryMetadata)>;

    /// Open a cursor over the write history of `key`.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the history could not be read
    fn history<'a>(&'a self, key: &'a str) -> StoreFuture<'a, HistoryCursor>;
}
