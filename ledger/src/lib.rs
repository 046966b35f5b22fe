//! Marquee - screen allocation and booking over a versioned record store
//!
//! Venues register titles and schedule screenings; the ledger assigns each
//! screening a physical screen, sells its seats and lets ticket holders
//! exchange their seat amenity against the day's concession stock.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Scheduling  │   │   Booking    │   │   Exchange   │
//! │ venue/title/ │   │  seats and   │   │  amenities   │
//! │  screening   │   │ reservations │   │  vs. stock   │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │ Screen           │                  │
//!        │ Allocator        │                  │
//!        ▼                  ▼                  ▼
//! ┌────────────────────────────────────────────────────┐
//! │ Query Layer (selectors)  │  Records (get/put + CAS) │
//! └────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//!                 RecordStore (external)
//! ```
//!
//! # Key Features
//!
//! ## 1. Screen allocation
//!
//! A title may be screened at most `daily_screening_cap` times per day and at
//! most once per slot; within a slot, screenings take the lowest free screen.
//!
//! ## 2. Seat conservation
//!
//! ```text
//! available + booked == total   (always)
//! ```
//!
//! Booking decrements `available` with a version-checked write, so two
//! concurrent bookings can never sell the same seat twice.
//!
//! ## 3. Exactly-once exchange
//!
//! Each reservation's amenities are exchanged at most once, and only while
//! the day's stock lasts.
//!
//! # Usage
//!
//! ```ignore
//! let ledger = Ledger::new(LedgerEnvironment::new(store, clock, LedgerConfig::from_env()))
//!     .as_caller("V1");
//! ledger.add_venue("Odeon", "Leeds", 3).await?;
//! ledger.add_title(&"T1".into(), "Heat", 170, release_date).await?;
//! ledger.add_screening(&"S1".into(), &"T1".into(), "2025-03-01 10:00am").await?;
//! let reservation = ledger.book_tickets(&"S1".into(), 2).await?;
//! ```

#![forbid(unsafe_code)]

pub mod allocator;
pub mod booking;
pub mod config;
pub mod environment;
pub mod error;
pub mod metrics;
pub mod query;
pub mod repository;
pub mod scheduling;
pub mod types;

pub use allocator::{ScreenAllocator, lowest_free_screen};
pub use config::LedgerConfig;
pub use environment::{
    AlwaysOpen, CallerIdentity, CoinFlipGate, ExchangePolicy, LedgerEnvironment, StaticIdentity,
};
pub use error::LedgerError;
pub use query::{PageSize, PagedResults, QueryLayer, QueryResults};
pub use repository::{Records, Versioned};
pub use types::{
    Amenity, ConcessionStock, DocType, Record, Reservation, ReservationId, Screening,
    ScreeningId, ScreeningStatus, Slot, Title, TitleId, TitleStatus, Venue, VenueId,
};

use std::sync::Arc;

/// The screening ledger.
///
/// Cheap to clone; clones share the environment (store, locks, ...).
#[derive(Clone, Debug)]
pub struct Ledger {
    env: Arc<LedgerEnvironment>,
    records: Records,
    queries: QueryLayer,
    allocator: ScreenAllocator,
}

impl Ledger {
    /// Creates a new `Ledger`
    #[must_use]
    pub fn new(env: LedgerEnvironment) -> Self {
        let records = Records::new(Arc::clone(&env.store), env.config.retry_policy());
        let queries = QueryLayer::new(Arc::clone(&env.store));
        let allocator = ScreenAllocator::new(queries.clone(), env.config.daily_screening_cap);
        Self {
            env: Arc::new(env),
            records,
            queries,
            allocator,
        }
    }

    /// The same ledger acting on behalf of `venue`.
    ///
    /// The returned ledger shares the store and the lock table.
    #[must_use]
    pub fn as_caller(&self, venue: impl Into<VenueId>) -> Self {
        let env = (*self.env)
            .clone()
            .with_identity(Arc::new(StaticIdentity::new(venue)));
        Self {
            env: Arc::new(env),
            ..self.clone()
        }
    }

    /// The injected environment.
    #[must_use]
    pub fn environment(&self) -> &LedgerEnvironment {
        &self.env
    }

    /// The query layer, for ad-hoc selector queries.
    #[must_use]
    pub const fn queries(&self) -> &QueryLayer {
        &self.queries
    }

    /// Load a venue.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if missing; store and decoding failures.
    pub async fn venue(&self, venue_id: &VenueId) -> Result<Venue, LedgerError> {
        Ok(self.records.require(venue_id.as_str()).await?.record)
    }

    /// Load a title.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if missing; store and decoding failures.
    pub async fn title(&self, title_id: &TitleId) -> Result<Title, LedgerError> {
        Ok(self.records.require(title_id.as_str()).await?.record)
    }

    /// Load a screening.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if missing; store and decoding failures.
    pub async fn screening(&self, screening_id: &ScreeningId) -> Result<Screening, LedgerError> {
        Ok(self.records.require(screening_id.as_str()).await?.record)
    }

    /// Load a reservation.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if missing; store and decoding failures.
    pub async fn reservation(
        &self,
        reservation_id: &ReservationId,
    ) -> Result<Reservation, LedgerError> {
        Ok(self.records.require(reservation_id.as_str()).await?.record)
    }

    /// Load the concession stock for a date (`YYYY-MM-DD`).
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if missing; store and decoding failures.
    pub async fn concession_stock(&self, date: &str) -> Result<ConcessionStock, LedgerError> {
        Ok(self.records.require(date).await?.record)
    }
}
