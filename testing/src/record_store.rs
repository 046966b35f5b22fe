//! In-memory record store for fast, deterministic tests.
//!
//! [`InMemoryRecordStore`] implements the full [`RecordStore`] contract:
//! per-key versions with optimistic concurrency, selector queries evaluated
//! against JSON values, key-ordered pagination with bookmarks, and per-key
//! write history. It also lets a test inject the failures a real store can
//! produce (cursor errors mid-iteration, unavailable queries, failed writes,
//! concurrent-writer conflicts).

use futures::StreamExt;
use futures::future::ready;
use marquee_core::environment::{Clock, SystemClock};
use marquee_core::record_store::{
    HistoryCursor, HistoryEntry, QueryMetadata, QueryRecord, RecordCursor, RecordStore,
    StoreError, StoreFuture, StoredRecord,
};
use marquee_core::selector::Selector;
use marquee_core::version::Version;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory record store.
///
/// Records are kept in key order, which is also the index order queries
/// return. Bookmarks are the key of the last record of a page.
///
/// # Example
///
/// ```
/// use marquee_testing::InMemoryRecordStore;
/// use marquee_core::record_store::RecordStore;
/// use marquee_core::version::Version;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryRecordStore::new();
///
/// let v1 = store.put("V1", br#"{"docType":"Venue"}"#.to_vec(), Some(Version::ABSENT)).await?;
/// assert_eq!(v1, Version::new(1));
///
/// let record = store.get("V1").await?;
/// assert!(record.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<RwLock<Inner>>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<String, Entry>,
    history: HashMap<String, Vec<HistoryEntry>>,
    next_tx: u64,
    faults: Faults,
}

struct Entry {
    value: Vec<u8>,
    version: Version,
}

#[derive(Default)]
struct Faults {
    cursor_failure_after: Option<usize>,
    query_unavailable: bool,
    forced_conflicts: HashMap<String, usize>,
    failing_puts: HashSet<String>,
}

impl InMemoryRecordStore {
    /// Create an empty store stamping history with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping history with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    /// Check if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().records.contains_key(key)
    }

    /// All keys in index order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.read().records.keys().cloned().collect()
    }

    /// Raw bytes stored under `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.read().records.get(key).map(|e| e.value.clone())
    }

    /// Current version of `key` (`Version::ABSENT` if missing).
    #[must_use]
    pub fn version(&self, key: &str) -> Version {
        self.read().records.get(key).map_or(Version::ABSENT, |e| e.version)
    }

    /// Write `value` unconditionally, bypassing injected faults.
    ///
    /// Useful for seeding fixtures, including deliberately malformed ones.
    pub fn seed(&self, key: &str, value: impl Into<Vec<u8>>) -> Version {
        let now = self.clock.now();
        let mut inner = self.write();
        inner.apply(key, Some(value.into()), now)
    }

    /// Serialize `value` as JSON and seed it under `key`.
    pub fn seed_json(&self, key: &str, value: &Value) -> Version {
        self.seed(key, value.to_string())
    }

    /// Delete `key`, recording the deletion in its history.
    pub fn remove(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut inner = self.write();
        if !inner.records.contains_key(key) {
            return false;
        }
        inner.apply(key, None, now);
        true
    }

    /// Make the next query cursor fail after yielding `n` records.
    pub fn fail_next_cursor_after(&self, n: usize) {
        self.write().faults.cursor_failure_after = Some(n);
    }

    /// Make query calls fail to open until [`Self::clear_faults`].
    pub fn fail_queries(&self) {
        self.write().faults.query_unavailable = true;
    }

    /// Reject the next `times` writes to `key` as if a concurrent writer won.
    pub fn force_conflicts(&self, key: &str, times: usize) {
        self.write().faults.forced_conflicts.insert(key.to_string(), times);
    }

    /// Make every write to `key` fail until [`Self::clear_faults`].
    pub fn fail_puts_to(&self, key: &str) {
        self.write().faults.failing_puts.insert(key.to_string());
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.write().faults = Faults::default();
    }

    /// Clear all records, history and faults (for test isolation).
    pub fn clear(&self) {
        *self.write() = Inner::default();
    }

    fn do_put(&self, key: &str, value: Vec<u8>, expected: Option<Version>) -> Result<Version, StoreError> {
        let now = self.clock.now();
        let mut inner = self.write();
        let actual = inner.records.get(key).map_or(Version::ABSENT, |e| e.version);

        if inner.faults.failing_puts.contains(key) {
            return Err(StoreError::Unavailable(format!("write to '{key}' failed")));
        }

        if let Some(remaining) = inner.faults.forced_conflicts.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::ConcurrencyConflict {
                    key: key.to_string(),
                    expected: expected.unwrap_or(actual),
                    actual: actual.next(),
                });
            }
        }

        if let Some(expected) = expected {
            if expected != actual {
                return Err(StoreError::ConcurrencyConflict {
                    key: key.to_string(),
                    expected,
                    actual,
                });
            }
        }

        Ok(inner.apply(key, Some(value), now))
    }

    fn matching(&self, query: &str, after: Option<&str>, limit: Option<usize>) -> Result<Vec<QueryRecord>, StoreError> {
        let selector = Selector::parse(query)?;
        let inner = self.read();

        if inner.faults.query_unavailable {
            return Err(StoreError::Unavailable("query index offline".to_string()));
        }

        let records = inner
            .records
            .iter()
            .filter(|(key, _)| after.is_none_or(|bookmark| key.as_str() > bookmark))
            .filter(|(_, entry)| {
                serde_json::from_slice::<Value>(&entry.value)
                    .is_ok_and(|doc| selector.matches(&doc))
            })
            .take(limit.unwrap_or(usize::MAX))
            .map(|(key, entry)| QueryRecord {
                key: key.clone(),
                value: entry.value.clone(),
            })
            .collect();

        Ok(records)
    }

    fn into_cursor(&self, records: Vec<QueryRecord>) -> RecordCursor {
        let failure_after = self.write().faults.cursor_failure_after.take();

        let items: Vec<Result<QueryRecord, StoreError>> = match failure_after {
            Some(n) => records
                .into_iter()
                .take(n)
                .map(Ok)
                .chain(std::iter::once(Err(StoreError::Cursor(format!(
                    "cursor read failed after {n} records"
                )))))
                .collect(),
            None => records.into_iter().map(Ok).collect(),
        };

        futures::stream::iter(items).boxed()
    }
}

impl Inner {
    fn apply(&mut self, key: &str, value: Option<Vec<u8>>, now: chrono::DateTime<chrono::Utc>) -> Version {
        self.next_tx += 1;
        let tx_id = format!("tx-{:08}", self.next_tx);
        let current = self.records.get(key).map_or(Version::ABSENT, |e| e.version);
        let version = current.next();

        self.history.entry(key.to_string()).or_default().push(HistoryEntry {
            tx_id,
            value: value.clone(),
            timestamp: now,
            is_delete: value.is_none(),
        });

        match value {
            Some(value) => {
                self.records.insert(key.to_string(), Entry { value, version });
            }
            None => {
                self.records.remove(key);
            }
        }

        version
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<StoredRecord>> {
        let record = self.read().records.get(key).map(|e| StoredRecord {
            value: e.value.clone(),
            version: e.version,
        });
        Box::pin(ready(Ok(record)))
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        expected: Option<Version>,
    ) -> StoreFuture<'a, Version> {
        let result = self.do_put(key, value, expected);
        if let Err(error) = &result {
            tracing::debug!(key, %error, "In-memory put rejected");
        }
        Box::pin(ready(result))
    }

    fn query<'a>(&'a self, query: &'a str) -> StoreFuture<'a, RecordCursor> {
        let result = self
            .matching(query, None, None)
            .map(|records| self.into_cursor(records));
        Box::pin(ready(result))
    }

    fn query_paginated<'a>(
        &'a self,
        query: &'a str,
        page_size: u32,
        bookmark: &'a str,
    ) -> StoreFuture<'a, (RecordCursor, QueryMetadata)> {
        let after = (!bookmark.is_empty()).then_some(bookmark);
        let limit = usize::try_from(page_size).unwrap_or(usize::MAX);

        let result = self.matching(query, after, Some(limit)).map(|records| {
            let metadata = QueryMetadata {
                fetched_count: u32::try_from(records.len()).unwrap_or(u32::MAX),
                bookmark: records
                    .last()
                    .map_or_else(|| bookmark.to_string(), |r| r.key.clone()),
            };
            (self.into_cursor(records), metadata)
        });
        Box::pin(ready(result))
    }

    fn history<'a>(&'a self, key: &'a str) -> StoreFuture<'a, HistoryCursor> {
        let entries: Vec<Result<HistoryEntry, StoreError>> = self
            .read()
            .history
            .get(key)
            .map(|h| h.iter().cloned().map(Ok).collect())
            .unwrap_or_default();
        Box::pin(ready(Ok(futures::stream::iter(entries).boxed())))
    }
}
