//! Typed, versioned access to individual records.
//!
//! Wraps the raw [`RecordStore`] with JSON encoding, `docType` checking and
//! the optimistic-concurrency read-modify-write loop used by every mutation.

use crate::error::LedgerError;
use crate::metrics;
use crate::types::Record;
use marquee_core::record_store::RecordStore;
use marquee_core::selector::DOC_TYPE_FIELD;
use marquee_core::version::Version;
use marquee_runtime::retry::{ConflictRetry, retry_conflicts};
use serde_json::Value;
use std::sync::Arc;

/// A record together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Decoded record
    pub record: T,
    /// Version the record was read at
    pub version: Version,
}

/// Decode a stored value as a `T`.
///
/// A value of another record kind is reported as missing rather than
/// corrupt: keys share one namespace, and a screening stored under `"X"`
/// means there is no title `"X"`.
pub(crate) fn decode<T: Record>(key: &str, bytes: &[u8]) -> Result<Option<T>, LedgerError> {
    let corrupt = |e: serde_json::Error| LedgerError::CorruptRecord {
        key: key.to_string(),
        reason: e.to_string(),
    };

    let value: Value = serde_json::from_slice(bytes).map_err(corrupt)?;
    if value.get(DOC_TYPE_FIELD).and_then(Value::as_str) != Some(T::DOC_TYPE.as_str()) {
        tracing::debug!(key, expected = %T::DOC_TYPE, "Stored record has a different docType");
        return Ok(None);
    }
    serde_json::from_value(value).map(Some).map_err(corrupt)
}

/// Typed record access with conflict retries.
#[derive(Clone)]
pub struct Records {
    store: Arc<dyn RecordStore>,
    retry: ConflictRetry,
}

impl Records {
    /// Access `store`, retrying conflicting writes per `retry`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, retry: ConflictRetry) -> Self {
        Self { store, retry }
    }

    /// Load the record under `key`, if one of kind `T` exists.
    ///
    /// # Errors
    ///
    /// [`LedgerError::StoreRead`] when the read fails,
    /// [`LedgerError::CorruptRecord`] when the value does not decode.
    pub async fn load<T: Record>(&self, key: &str) -> Result<Option<Versioned<T>>, LedgerError> {
        let stored = self
            .store
            .get(key)
            .await
            .map_err(|source| LedgerError::StoreRead {
                key: key.to_string(),
                source,
            })?;

        let Some(stored) = stored else {
            return Ok(None);
        };

        Ok(decode::<T>(key, &stored.value)?.map(|record| Versioned {
            record,
            version: stored.version,
        }))
    }

    /// Load the record under `key`, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// As [`Records::load`], plus [`LedgerError::NotFound`].
    pub async fn require<T: Record>(&self, key: &str) -> Result<Versioned<T>, LedgerError> {
        self.load(key)
            .await?
            .ok_or_else(|| LedgerError::not_found(T::DOC_TYPE, key))
    }

    /// True if any value is stored under `key`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::StoreRead`] when the read fails.
    pub async fn exists(&self, key: &str) -> Result<bool, LedgerError> {
        self.store
            .get(key)
            .await
            .map(|stored| stored.is_some())
            .map_err(|source| LedgerError::StoreRead {
                key: key.to_string(),
                source,
            })
    }

    /// Store a new record; the key must be unused.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Conflict`] when the key is taken,
    /// [`LedgerError::StoreWrite`] for any other write failure.
    pub async fn insert<T: Record>(&self, record: &T) -> Result<Version, LedgerError> {
        let key = record.key();
        match self.put(key, record, Some(Version::ABSENT)).await {
            Err(e) if e.is_conflict() => Err(LedgerError::Conflict(format!(
                "{} '{key}' already exists",
                T::DOC_TYPE
            ))),
            other => other,
        }
    }

    /// Store `versioned.record` if the key is still at `versioned.version`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::StoreWrite`] (a conflict when the key moved on).
    pub async fn save<T: Record>(&self, versioned: &Versioned<T>) -> Result<Version, LedgerError> {
        self.put(versioned.record.key(), &versioned.record, Some(versioned.version))
            .await
    }

    /// Read-modify-write `key` with conflict retries.
    ///
    /// `mutate` runs against a freshly read record on every attempt, so any
    /// check it performs is re-evaluated against the current state. An error
    /// from `mutate` aborts without writing.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if the record is missing, whatever `mutate`
    /// returns, or [`LedgerError::StoreWrite`] once retries are exhausted.
    pub async fn update<T, R, F>(&self, key: &str, mutate: F) -> Result<(T, R), LedgerError>
    where
        T: Record,
        R: Send,
        F: Fn(&mut T) -> Result<R, LedgerError> + Sync,
    {
        let mutate = &mutate;
        retry_conflicts(
            &self.retry,
            move || async move {
                let mut current = self.require::<T>(key).await?;
                let outcome = mutate(&mut current.record)?;
                self.save(&current).await?;
                Ok((current.record, outcome))
            },
            |e: &LedgerError| {
                let conflict = e.is_conflict();
                if conflict {
                    metrics::record_store_conflict();
                }
                conflict
            },
        )
        .await
    }

    async fn put<T: Record>(
        &self,
        key: &str,
        record: &T,
        expected: Option<Version>,
    ) -> Result<Version, LedgerError> {
        let bytes = serde_json::to_vec(record).map_err(|e| LedgerError::CorruptRecord {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        self.store
            .put(key, bytes, expected)
            .await
            .map_err(|source| LedgerError::StoreWrite {
                key: key.to_string(),
                source,
            })
    }
}

impl std::fmt::Debug for Records {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Records")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
