//! Error taxonomy for ledger operations.
//!
//! Every failure is terminal for the call that produced it: there is no
//! background reconciliation and no compensating write.

use crate::types::{DocType, ReservationId, ScreeningId, Slot, TitleId};
use marquee_core::record_store::StoreError;
use marquee_runtime::locks::LockError;
use thiserror::Error;

/// Errors returned by ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced record does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record looked up
        kind: DocType,
        /// Key looked up
        id: String,
    },

    /// The record already exists, or belongs to someone else
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The title already has a screening at this slot
    #[error("Title {title_id} is already showing at {slot} on another screen")]
    DuplicateSlot {
        /// Title being scheduled
        title_id: TitleId,
        /// Requested slot
        slot: Slot,
    },

    /// The title already has the maximum number of screenings that day
    #[error("Only {cap} screenings per day are allowed for title {title_id} ({date})")]
    DailyLimitExceeded {
        /// Title being scheduled
        title_id: TitleId,
        /// Date key
        date: String,
        /// Configured daily cap
        cap: u32,
    },

    /// Every screen is taken at this slot
    #[error("All {screen_count} screens are taken at {slot}, please choose another slot")]
    NoScreenAvailable {
        /// Requested slot
        slot: Slot,
        /// Screens at the venue
        screen_count: u32,
    },

    /// No seats left
    #[error("Screening {screening_id} is sold out")]
    SoldOut {
        /// Screening being booked
        screening_id: ScreeningId,
    },

    /// Fewer seats left than requested
    #[error("Only {available} seats are available ({requested} requested)")]
    InsufficientSeats {
        /// Tickets requested
        requested: u32,
        /// Seats left
        available: u32,
    },

    /// The day's concession stock cannot cover the exchange
    #[error("{item} is out of stock for {date} ({requested} requested, {available} left)")]
    OutOfStock {
        /// Concession item
        item: String,
        /// Date key
        date: String,
        /// Units requested
        requested: u32,
        /// Units left
        available: u32,
    },

    /// The reservation's amenities were already exchanged
    #[error("Amenities of reservation {reservation_id} have already been exchanged")]
    AlreadyExchanged {
        /// Reservation
        reservation_id: ReservationId,
    },

    /// The exchange policy refused the exchange for now
    #[error("Exchanging amenities is currently not possible")]
    TemporarilyUnavailable,

    /// A secondary-index query could not be opened or drained
    #[error("Query failed: {0}")]
    Query(#[source] StoreError),

    /// A keyed read failed
    #[error("Failed to read '{key}': {source}")]
    StoreRead {
        /// Key read
        key: String,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// A keyed write failed (including exhausted conflict retries)
    #[error("Failed to write '{key}': {source}")]
    StoreWrite {
        /// Key written
        key: String,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// A stored value could not be decoded
    #[error("Record '{key}' is corrupt: {reason}")]
    CorruptRecord {
        /// Key of the bad record
        key: String,
        /// Decoder message
        reason: String,
    },

    /// A per-key lock was not acquired in time
    #[error(transparent)]
    LockTimeout(#[from] LockError),
}

impl LedgerError {
    /// True for a write rejected because the record moved on since it was read.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::StoreWrite { source, .. } if source.is_conflict())
    }

    /// Short stable label, used as a metrics dimension.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::DuplicateSlot { .. } => "duplicate_slot",
            Self::DailyLimitExceeded { .. } => "daily_limit_exceeded",
            Self::NoScreenAvailable { .. } => "no_screen_available",
            Self::SoldOut { .. } => "sold_out",
            Self::InsufficientSeats { .. } => "insufficient_seats",
            Self::OutOfStock { .. } => "out_of_stock",
            Self::AlreadyExchanged { .. } => "already_exchanged",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::Query(_) => "query",
            Self::StoreRead { .. } => "store_read",
            Self::StoreWrite { .. } => "store_write",
            Self::CorruptRecord { .. } => "corrupt_record",
            Self::LockTimeout(_) => "lock_timeout",
        }
    }

    pub(crate) fn not_found(kind: DocType, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::version::Version;

    #[test]
    fn test_messages_are_human_readable() {
        let err = LedgerError::not_found(DocType::Screening, "S9");
        assert_eq!(err.to_string(), "Screening not found: S9");

        let err = LedgerError::InsufficientSeats { requested: 5, available: 2 };
        assert_eq!(err.to_string(), "Only 2 seats are available (5 requested)");
    }

    #[test]
    fn test_only_write_conflicts_are_conflicts() {
        let conflict = StoreError::ConcurrencyConflict {
            key: "S1".into(),
            expected: Version::new(1),
            actual: Version::new(2),
        };
        let write = LedgerError::StoreWrite { key: "S1".into(), source: conflict.clone() };
        assert!(write.is_conflict());
        assert_eq!(write.reason(), "store_write");

        let read = LedgerError::StoreRead { key: "S1".into(), source: conflict };
        assert!(!read.is_conflict());
        assert!(!LedgerError::Conflict("exists".into()).is_conflict());
    }
}
