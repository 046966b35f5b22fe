//! Domain types for the screening ledger.
//!
//! Every entity is persisted as an independent JSON record keyed by its
//! identifier. Records carry a `docType` discriminator so selectors can
//! address one kind at a time; there are no foreign keys, so references
//! between records (a screening's title, a reservation's screening) are plain
//! identifiers the ledger keeps consistent itself.

use crate::error::LedgerError;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Wrap a raw `", stringify!($name), "`.")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The identifier as a string slice (also its record key).
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Venue registration key, equal to the registering caller's identity
    VenueId
);
string_id!(
    /// Unique identifier for a title
    TitleId
);
string_id!(
    /// Unique identifier for a screening
    ScreeningId
);
string_id!(
    /// Unique identifier for a reservation
    ReservationId
);

// ============================================================================
// Slot
// ============================================================================

/// A screening time slot such as `"2025-03-01 10:30am"`.
///
/// The first ten characters double as the calendar date key used for the
/// per-day screening cap and the day's concession stock.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(String);

impl Slot {
    /// Length of the leading `YYYY-MM-DD` date.
    pub const DATE_LEN: usize = 10;

    /// Parse and validate a slot.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidArgument`] when the slot is shorter than
    /// ten characters or its first ten do not form a `YYYY-MM-DD` date.
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let date = raw.get(..Self::DATE_LEN).ok_or_else(|| {
            LedgerError::InvalidArgument(format!(
                "slot '{raw}' must start with a YYYY-MM-DD date"
            ))
        })?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            LedgerError::InvalidArgument(format!("slot '{raw}' has an invalid date: {e}"))
        })?;
        Ok(Self(raw.to_string()))
    }

    /// Wrap a slot without validating it (snapshots read back from the store).
    #[must_use]
    pub fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The date key: the first ten characters, or the whole slot if shorter.
    #[must_use]
    pub fn date(&self) -> &str {
        self.0.get(..Self::DATE_LEN).unwrap_or(&self.0)
    }

    /// True when the slot ends with the morning suffix (e.g. `"am"`).
    #[must_use]
    pub fn is_morning(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }

    /// The slot as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Record kind discriminator stored in every record's `docType` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocType {
    /// A registered venue
    Venue,
    /// A title shown by a venue
    Title,
    /// One scheduled showing
    Screening,
    /// A booked set of seats
    Reservation,
    /// A day's concession inventory
    ConcessionStock,
}

impl DocType {
    /// The value stored in `docType`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Venue => "Venue",
            Self::Title => "Title",
            Self::Screening => "Screening",
            Self::Reservation => "Reservation",
            Self::ConcessionStock => "ConcessionStock",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record persisted under its own key.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Discriminator written to (and expected in) `docType`.
    const DOC_TYPE: DocType;

    /// The key this record is stored under.
    fn key(&self) -> &str;
}

/// A venue: the owner of screens, titles and screenings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    /// Always [`DocType::Venue`]
    pub doc_type: DocType,
    /// Registration key
    pub venue_id: VenueId,
    /// Display name
    pub name: String,
    /// Location
    pub location: String,
    /// Number of screens, numbered `1..=screen_count`
    pub screen_count: u32,
    /// Screenings of titles that are running
    pub active_screenings: Vec<ScreeningId>,
    /// Screenings of titles that are not released yet
    pub upcoming_screenings: Vec<ScreeningId>,
}

impl Venue {
    /// Create a venue with no screenings.
    #[must_use]
    pub fn new(venue_id: VenueId, name: String, location: String, screen_count: u32) -> Self {
        Self {
            doc_type: DocType::Venue,
            venue_id,
            name,
            location,
            screen_count,
            active_screenings: Vec::new(),
            upcoming_screenings: Vec::new(),
        }
    }

    /// List a new screening as active or upcoming depending on its title.
    pub fn list_screening(&mut self, screening_id: ScreeningId, status: TitleStatus) {
        let list = match status {
            TitleStatus::Running => &mut self.active_screenings,
            TitleStatus::ComingSoon => &mut self.upcoming_screenings,
        };
        if !list.contains(&screening_id) {
            list.push(screening_id);
        }
    }

    /// Move the given screenings from the upcoming list to the active list.
    ///
    /// Returns how many were moved.
    pub fn promote(&mut self, screening_ids: &[ScreeningId]) -> usize {
        let before = self.upcoming_screenings.len();
        let (moved, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.upcoming_screenings)
            .into_iter()
            .partition(|id| screening_ids.contains(id));
        self.upcoming_screenings = kept;
        for id in moved {
            if !self.active_screenings.contains(&id) {
                self.active_screenings.push(id);
            }
        }
        before - self.upcoming_screenings.len()
    }
}

impl Record for Venue {
    const DOC_TYPE: DocType = DocType::Venue;

    fn key(&self) -> &str {
        self.venue_id.as_str()
    }
}

/// Lifecycle status of a title.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TitleStatus {
    /// Release date is in the future
    #[serde(rename = "Coming Soon")]
    ComingSoon,
    /// Released
    Running,
}

impl TitleStatus {
    /// Status of a title released on `release_date`, as of `today`.
    #[must_use]
    pub fn on(release_date: NaiveDate, today: NaiveDate) -> Self {
        if release_date <= today {
            Self::Running
        } else {
            Self::ComingSoon
        }
    }
}

/// A title owned by one venue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Title {
    /// Always [`DocType::Title`]
    pub doc_type: DocType,
    /// Identifier
    pub title_id: TitleId,
    /// Display name
    pub name: String,
    /// Running time
    pub runtime_minutes: u32,
    /// Release date (`YYYY-MM-DD`)
    pub release_date: NaiveDate,
    /// Owning venue
    pub venue_id: VenueId,
    /// Lifecycle status
    pub status: TitleStatus,
}

impl Record for Title {
    const DOC_TYPE: DocType = DocType::Title;

    fn key(&self) -> &str {
        self.title_id.as_str()
    }
}

/// Seat availability of a screening.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreeningStatus {
    /// Seats remain
    Running,
    /// Every seat is booked
    HouseFull,
}

/// One scheduled showing of a title on a screen.
///
/// Invariant: `available_seats + booked_seats == total_seats`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screening {
    /// Always [`DocType::Screening`]
    pub doc_type: DocType,
    /// Identifier
    pub screening_id: ScreeningId,
    /// Title shown
    pub title_id: TitleId,
    /// Hosting venue
    pub venue_id: VenueId,
    /// Time slot
    pub slot: Slot,
    /// Date key (first ten characters of the slot)
    pub date: String,
    /// Screen number in `1..=venue.screen_count`
    pub screen_number: u32,
    /// Capacity
    pub total_seats: u32,
    /// Seats still for sale
    pub available_seats: u32,
    /// Seats sold
    pub booked_seats: u32,
    /// Price of one ticket
    pub unit_price: u32,
    /// Seat availability
    pub status: ScreeningStatus,
}

impl Screening {
    /// Check that `count` seats can be sold.
    ///
    /// # Errors
    ///
    /// [`LedgerError::SoldOut`] when no seat is left,
    /// [`LedgerError::InsufficientSeats`] when fewer than `count` are.
    pub fn check_seats(&self, count: u32) -> Result<(), LedgerError> {
        if self.available_seats == 0 {
            return Err(LedgerError::SoldOut {
                screening_id: self.screening_id.clone(),
            });
        }
        if count > self.available_seats {
            return Err(LedgerError::InsufficientSeats {
                requested: count,
                available: self.available_seats,
            });
        }
        Ok(())
    }

    /// Move `count` seats from available to booked.
    ///
    /// # Errors
    ///
    /// Same as [`Screening::check_seats`]; the screening is unchanged on error.
    pub fn take_seats(&mut self, count: u32) -> Result<(), LedgerError> {
        self.check_seats(count)?;
        self.available_seats -= count;
        self.booked_seats += count;
        if self.available_seats == 0 {
            self.status = ScreeningStatus::HouseFull;
        }
        Ok(())
    }
}

impl Record for Screening {
    const DOC_TYPE: DocType = DocType::Screening;

    fn key(&self) -> &str {
        self.screening_id.as_str()
    }
}

/// A per-seat perk: water (kind A) until exchanged for soda (kind B).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amenity {
    /// Seat identifier
    pub seat_id: String,
    /// Holds water
    pub water: bool,
    /// Holds soda
    pub soda: bool,
}

impl Amenity {
    /// A fresh amenity holding water.
    #[must_use]
    pub fn water(seat_id: String) -> Self {
        Self {
            seat_id,
            water: true,
            soda: false,
        }
    }

    /// Swap water for soda.
    pub fn exchange(&mut self) {
        self.water = false;
        self.soda = true;
    }
}

/// A booked set of seats with snapshots of the screening at booking time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Always [`DocType::Reservation`]
    pub doc_type: DocType,
    /// Identifier
    pub reservation_id: ReservationId,
    /// Screening booked
    pub screening_id: ScreeningId,
    /// Hosting venue
    pub venue_id: VenueId,
    /// Title name at booking time
    pub title_name: String,
    /// Slot at booking time
    pub slot: Slot,
    /// Screen number at booking time
    pub screen_number: u32,
    /// Number of tickets
    pub ticket_count: u32,
    /// Ticket price at booking time
    pub unit_price: u32,
    /// `ticket_count * unit_price`
    pub total_price: u64,
    /// One amenity per ticket
    pub amenities: Vec<Amenity>,
}

impl Reservation {
    /// True if any amenity has already been exchanged.
    #[must_use]
    pub fn is_exchanged(&self) -> bool {
        self.amenities.iter().any(|a| a.soda)
    }

    /// Exchange every amenity for soda.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AlreadyExchanged`] if any amenity already holds soda.
    pub fn exchange_amenities(&mut self) -> Result<(), LedgerError> {
        if self.is_exchanged() {
            return Err(LedgerError::AlreadyExchanged {
                reservation_id: self.reservation_id.clone(),
            });
        }
        self.amenities.iter_mut().for_each(Amenity::exchange);
        Ok(())
    }
}

impl Record for Reservation {
    const DOC_TYPE: DocType = DocType::Reservation;

    fn key(&self) -> &str {
        self.reservation_id.as_str()
    }
}

/// Shared concession inventory for one date.
///
/// Invariant: `available_quantity <= total_quantity`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcessionStock {
    /// Always [`DocType::ConcessionStock`]
    pub doc_type: DocType,
    /// Date key (`YYYY-MM-DD`)
    pub date: String,
    /// Item handed out on exchange
    pub item: String,
    /// Initial quantity
    pub total_quantity: u32,
    /// Quantity left
    pub available_quantity: u32,
}

impl ConcessionStock {
    /// A full stock of `quantity` units of `item` for `date`.
    #[must_use]
    pub fn new(date: String, item: String, quantity: u32) -> Self {
        Self {
            doc_type: DocType::ConcessionStock,
            date,
            item,
            total_quantity: quantity,
            available_quantity: quantity,
        }
    }

    /// Check that `count` units are available.
    ///
    /// # Errors
    ///
    /// [`LedgerError::OutOfStock`] when fewer than `count` units remain.
    pub fn check(&self, count: u32) -> Result<(), LedgerError> {
        if count > self.available_quantity {
            return Err(LedgerError::OutOfStock {
                item: self.item.clone(),
                date: self.date.clone(),
                requested: count,
                available: self.available_quantity,
            });
        }
        Ok(())
    }

    /// Take `count` units.
    ///
    /// # Errors
    ///
    /// Same as [`ConcessionStock::check`]; the stock is unchanged on error.
    pub fn consume(&mut self, count: u32) -> Result<(), LedgerError> {
        self.check(count)?;
        self.available_quantity -= count;
        Ok(())
    }
}

impl Record for ConcessionStock {
    const DOC_TYPE: DocType = DocType::ConcessionStock;

    fn key(&self) -> &str {
        &self.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn screening(available: u32, booked: u32) -> Screening {
        Screening {
            doc_type: DocType::Screening,
            screening_id: "S1".into(),
            title_id: "T1".into(),
            venue_id: "V1".into(),
            slot: Slot::new_unchecked("2025-01-01 10:00am"),
            date: "2025-01-01".to_string(),
            screen_number: 1,
            total_seats: available + booked,
            available_seats: available,
            booked_seats: booked,
            unit_price: 100,
            status: ScreeningStatus::Running,
        }
    }

    #[test]
    fn test_slot_parsing() {
        let slot = Slot::parse("2025-03-01 10:30am").unwrap_or_else(|_| Slot::new_unchecked(""));
        assert_eq!(slot.date(), "2025-03-01");
        assert!(slot.is_morning("am"));
        assert!(!Slot::new_unchecked("2025-03-01 6:00pm").is_morning("am"));

        assert!(Slot::parse("2025-03-01").is_ok());
        assert!(Slot::parse("2025-3-1 9am").is_err());
        assert!(Slot::parse("short").is_err());
        assert!(Slot::parse("2025-02-30 10:00am").is_err());
    }

    #[test]
    fn test_take_seats_keeps_counts_consistent() {
        let mut s = screening(3, 97);
        assert!(s.take_seats(2).is_ok());
        assert_eq!((s.available_seats, s.booked_seats), (1, 99));
        assert_eq!(s.status, ScreeningStatus::Running);

        assert!(s.take_seats(1).is_ok());
        assert_eq!(s.status, ScreeningStatus::HouseFull);
        assert!(matches!(s.take_seats(1), Err(LedgerError::SoldOut { .. })));
    }

    #[test]
    fn test_insufficient_seats_leaves_screening_unchanged() {
        let mut s = screening(2, 0);
        assert!(matches!(
            s.take_seats(3),
            Err(LedgerError::InsufficientSeats { requested: 3, available: 2 })
        ));
        assert_eq!(s.available_seats, 2);
    }

    #[test]
    fn test_venue_promote_moves_only_listed_screenings() {
        let mut venue = Venue::new("V1".into(), "Odeon".into(), "Leeds".into(), 3);
        venue.list_screening("S1".into(), TitleStatus::ComingSoon);
        venue.list_screening("S2".into(), TitleStatus::ComingSoon);
        venue.list_screening("S3".into(), TitleStatus::Running);

        assert_eq!(venue.promote(&["S1".into(), "S9".into()]), 1);
        assert_eq!(venue.active_screenings, vec![ScreeningId::from("S3"), "S1".into()]);
        assert_eq!(venue.upcoming_screenings, vec![ScreeningId::from("S2")]);
        assert_eq!(venue.promote(&["S1".into()]), 0);
    }

    #[test]
    fn test_title_status_serializes_with_space() {
        assert_eq!(json!(TitleStatus::ComingSoon), json!("Coming Soon"));
        let status: TitleStatus = serde_json::from_value(json!("Running")).unwrap_or(TitleStatus::ComingSoon);
        assert_eq!(status, TitleStatus::Running);
    }

    #[test]
    fn test_screening_json_shape() {
        let value = serde_json::to_value(screening(100, 0)).unwrap_or_default();
        assert_eq!(value["docType"], "Screening");
        assert_eq!(value["screeningId"], "S1");
        assert_eq!(value["availableSeats"], 100);
        assert_eq!(value["slot"], "2025-01-01 10:00am");
    }

    #[test]
    fn test_exchange_is_once_only() {
        let mut r = Reservation {
            doc_type: DocType::Reservation,
            reservation_id: "TV1S10".into(),
            screening_id: "S1".into(),
            venue_id: "V1".into(),
            title_name: "Heat".into(),
            slot: Slot::new_unchecked("2025-01-01 10:00am"),
            screen_number: 1,
            ticket_count: 2,
            unit_price: 100,
            total_price: 200,
            amenities: vec![Amenity::water("a".into()), Amenity::water("b".into())],
        };
        assert!(r.exchange_amenities().is_ok());
        assert!(r.amenities.iter().all(|a| a.soda && !a.water));
        assert!(matches!(r.exchange_amenities(), Err(LedgerError::AlreadyExchanged { .. })));
    }

    #[test]
    fn test_stock_consume() {
        let mut stock = ConcessionStock::new("2025-01-01".into(), "Soda".into(), 3);
        assert!(stock.consume(2).is_ok());
        assert!(matches!(stock.consume(2), Err(LedgerError::OutOfStock { available: 1, .. })));
        assert_eq!(stock.available_quantity, 1);
    }
}
