//! Secondary-index query layer.
//!
//! Runs selector queries against the record store, drains the cursor
//! completely (a mid-iteration failure discards everything read so far) and
//! renders results in the two wire envelopes callers expect:
//!
//! ```text
//! plain:      [r1,r2,...]
//! paginated:  {"Data":[r1,...],"BookMarkData":[{"ResponseMetadata":{"RecordsCount":"<n>","Bookmark":"<b>"}}]}
//! ```
//!
//! Records are passed through byte for byte in store order; the layer does
//! not filter or validate their content.

use crate::error::LedgerError;
use crate::repository::decode;
use crate::types::Record;
use futures::TryStreamExt;
use marquee_core::record_store::{QueryRecord, RecordCursor, RecordStore};
use marquee_core::selector::Selector;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A validated page size: positive and no larger than `i32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageSize(u32);

impl PageSize {
    /// Largest accepted page size.
    pub const MAX: u32 = i32::MAX.unsigned_abs();

    /// Validate a page size.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidArgument`] for zero or values above [`PageSize::MAX`].
    pub fn new(size: u32) -> Result<Self, LedgerError> {
        if size == 0 || size > Self::MAX {
            return Err(LedgerError::InvalidArgument(format!(
                "page size must be between 1 and {}, got {size}",
                Self::MAX
            )));
        }
        Ok(Self(size))
    }

    /// The page size.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl FromStr for PageSize {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let size: i64 = raw.parse().map_err(|_| {
            LedgerError::InvalidArgument(format!("page size '{raw}' is not an integer"))
        })?;
        let size = u32::try_from(size).map_err(|_| {
            LedgerError::InvalidArgument(format!("page size must be positive, got {size}"))
        })?;
        Self::new(size)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Records matched by a query, in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResults {
    records: Vec<QueryRecord>,
}

impl QueryResults {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The raw records.
    #[must_use]
    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    /// Keys of the matched records.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }

    /// Render as a JSON array of the stored values, verbatim.
    #[must_use]
    pub fn to_json_array(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.records.iter().map(|r| r.value.len() + 1).sum::<usize>());
        out.push(b'[');
        self.write_values(&mut out);
        out.push(b']');
        out
    }

    /// Decode every record as a `T`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::CorruptRecord`] if any record fails to decode or is of
    /// another kind.
    pub fn decode<T: Record>(&self) -> Result<Vec<T>, LedgerError> {
        self.records
            .iter()
            .map(|r| {
                decode::<T>(&r.key, &r.value)?.ok_or_else(|| LedgerError::CorruptRecord {
                    key: r.key.clone(),
                    reason: format!("expected a {} record", T::DOC_TYPE),
                })
            })
            .collect()
    }

    fn write_values(&self, out: &mut Vec<u8>) {
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                out.push(b',');
            }
            out.extend_from_slice(&record.value);
        }
    }
}

/// One page of a paginated query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagedResults {
    /// Records on this page
    pub results: QueryResults,
    /// Bookmark to resume after this page
    pub bookmark: String,
    /// Record count reported by the store
    pub fetched_count: u32,
}

impl PagedResults {
    /// Render the paginated envelope.
    #[must_use]
    pub fn to_json(&self) -> Vec<u8> {
        let mut out = b"{\"Data\":[".to_vec();
        self.results.write_values(&mut out);
        out.extend_from_slice(b"],\"BookMarkData\":[{\"ResponseMetadata\":{\"RecordsCount\":\"");
        out.extend_from_slice(self.fetched_count.to_string().as_bytes());
        out.extend_from_slice(b"\",\"Bookmark\":");
        out.extend_from_slice(serde_json::Value::from(self.bookmark.as_str()).to_string().as_bytes());
        out.extend_from_slice(b"}}]}");
        out
    }
}

/// Runs selector queries against the store.
#[derive(Clone)]
pub struct QueryLayer {
    store: Arc<dyn RecordStore>,
}

impl QueryLayer {
    /// Query `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Run a selector query to completion.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Query`] when the cursor cannot be opened or fails
    /// mid-iteration; no partial results are returned.
    pub async fn query(&self, selector: &Selector) -> Result<QueryResults, LedgerError> {
        self.query_raw(&selector.to_query()).await
    }

    /// Run a query given as a filter expression string.
    ///
    /// # Errors
    ///
    /// As [`QueryLayer::query`].
    pub async fn query_raw(&self, expression: &str) -> Result<QueryResults, LedgerError> {
        tracing::debug!(query = expression, "Running query");
        let cursor = self.store.query(expression).await.map_err(LedgerError::Query)?;
        let records = drain(cursor).await?;
        tracing::debug!(count = records.len(), "Query complete");
        Ok(QueryResults { records })
    }

    /// Fetch one page of a query.
    ///
    /// `bookmark` is `""` for the first page, otherwise the bookmark of the
    /// previous page. Double quotes in it are stripped before use.
    ///
    /// # Errors
    ///
    /// As [`QueryLayer::query`].
    pub async fn query_paginated(
        &self,
        expression: &str,
        page_size: PageSize,
        bookmark: &str,
    ) -> Result<PagedResults, LedgerError> {
        let bookmark = bookmark.replace('"', "");
        tracing::debug!(query = expression, page_size = page_size.get(), bookmark = %bookmark, "Running paginated query");

        let (cursor, metadata) = self
            .store
            .query_paginated(expression, page_size.get(), &bookmark)
            .await
            .map_err(LedgerError::Query)?;
        let records = drain(cursor).await?;

        Ok(PagedResults {
            results: QueryResults { records },
            bookmark: metadata.bookmark,
            fetched_count: metadata.fetched_count,
        })
    }

    /// Fetch one page with the page size given as text.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidArgument`] if `page_size` is not a positive
    /// integer up to `i32::MAX`; otherwise as [`QueryLayer::query_paginated`].
    pub async fn query_paginated_args(
        &self,
        expression: &str,
        page_size: &str,
        bookmark: &str,
    ) -> Result<PagedResults, LedgerError> {
        let page_size: PageSize = page_size.parse()?;
        self.query_paginated(expression, page_size, bookmark).await
    }
}

impl fmt::Debug for QueryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryLayer").finish_non_exhaustive()
    }
}

async fn drain(cursor: RecordCursor) -> Result<Vec<QueryRecord>, LedgerError> {
    cursor.try_collect().await.map_err(|e| {
        tracing::warn!(error = %e, "Query cursor failed, discarding partial results");
        LedgerError::Query(e)
    })
}
