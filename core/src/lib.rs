//! # Marquee Core
//!
//! Core traits and types for the Marquee screening ledger.
//!
//! This crate provides the abstractions the ledger is written against. It owns
//! no business rules; those live in the `marquee` crate.
//!
//! ## Core Concepts
//!
//! - **Record Store**: External key-value store with secondary-index queries,
//!   bookmarks and per-key versions ([`record_store::RecordStore`])
//! - **Selector**: Equality-conjunction filter expression understood by the
//!   store's secondary index ([`selector::Selector`])
//! - **Version**: Per-key write counter used for optimistic concurrency
//!   ([`version::Version`])
//! - **Environment**: Injected capabilities for time, entropy and identifiers
//!   ([`environment`])
//!
//! ## Architecture Principles
//!
//! - The store is the sole source of truth
//! - Explicit capabilities (no ambient clocks or global RNGs)
//! - Dependency injection via trait objects
//!
//! ## Example
//!
//! ```ignore
//! use marquee_core::record_store::RecordStore;
//! use marquee_core::selector::Selector;
//!
//! async fn screenings_at(store: &dyn RecordStore, slot: &str) -> Result<(), StoreError> {
//!     let selector = Selector::new("Screening").with("slot", slot);
//!     let mut cursor = store.query(&selector.to_query()).await?;
//!     while let Some(record) = cursor.next().await {
//!         println!("{}", String::from_utf8_lossy(&record?.value));
//!     }
//!     Ok(())
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};

/// Injected capabilities: clocks, entropy and identifier generation.
pub mod environment;

/// Record store abstraction consumed by the ledger.
pub mod record_store;

/// Filter expressions for secondary-index queries.
pub mod selector;

/// Per-key record versions.
pub mod version;

pub use record_store::{
    HistoryCursor, HistoryEntry, QueryMetadata, QueryRecord, RecordCursor, RecordStore,
    StoreError, StoreFuture, StoredRecord,
};
pub use selector::Selector;
pub use version::Version;
