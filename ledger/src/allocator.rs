//! Screen allocation.
//!
//! Decides which screen may host a new screening. Two rules apply: a title
//! may not be screened more than a capped number of times per day, and a
//! slot may not hold more screenings than the venue has screens (nor the same
//! title twice). The lowest free screen number wins.

use crate::error::LedgerError;
use crate::metrics;
use crate::query::QueryLayer;
use crate::types::{DocType, Screening, Slot, TitleId};
use marquee_core::selector::Selector;

/// Lowest screen in `1..=screen_count` not present in `in_use`.
///
/// # Examples
///
/// ```
/// use marquee::allocator::lowest_free_screen;
///
/// assert_eq!(lowest_free_screen(3, &[1, 3]), Some(2));
/// assert_eq!(lowest_free_screen(2, &[2, 1]), None);
/// ```
#[must_use]
pub fn lowest_free_screen(screen_count: u32, in_use: &[u32]) -> Option<u32> {
    (1..=screen_count).find(|screen| !in_use.contains(screen))
}

/// Assigns screens to new screenings.
#[derive(Debug, Clone)]
pub struct ScreenAllocator {
    queries: QueryLayer,
    daily_cap: u32,
}

impl ScreenAllocator {
    /// Allocator reading screenings through `queries`, allowing `daily_cap`
    /// screenings of one title per day.
    #[must_use]
    pub const fn new(queries: QueryLayer, daily_cap: u32) -> Self {
        Self { queries, daily_cap }
    }

    /// Pick the screen for a new screening of `title_id` at `slot` on `date`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidArgument`] if `screen_count` is zero
    /// - [`LedgerError::DailyLimitExceeded`] if the title already has the
    ///   maximum number of screenings on `date`
    /// - [`LedgerError::DuplicateSlot`] if the title already has a screening
    ///   at `slot`
    /// - [`LedgerError::NoScreenAvailable`] if every screen is taken at `slot`
    /// - [`LedgerError::Query`] / [`LedgerError::CorruptRecord`] when the
    ///   existing screenings cannot be read
    pub async fn assign_screen(
        &self,
        screen_count: u32,
        slot: &Slot,
        date: &str,
        title_id: &TitleId,
    ) -> Result<u32, LedgerError> {
        if screen_count == 0 {
            return Err(LedgerError::InvalidArgument(
                "venue must have at least one screen".to_string(),
            ));
        }

        let result = self.select(screen_count, slot, date, title_id).await;
        match &result {
            Ok(screen) => {
                tracing::debug!(%slot, %title_id, screen, "Screen assigned");
            }
            Err(
                e @ (LedgerError::DailyLimitExceeded { .. }
                | LedgerError::DuplicateSlot { .. }
                | LedgerError::NoScreenAvailable { .. }),
            ) => {
                tracing::info!(%slot, %title_id, reason = e.reason(), "Screen allocation refused");
                metrics::record_allocation_rejected(e.reason());
            }
            Err(_) => {}
        }
        result
    }

    async fn select(
        &self,
        screen_count: u32,
        slot: &Slot,
        date: &str,
        title_id: &TitleId,
    ) -> Result<u32, LedgerError> {
        let same_day = self
            .queries
            .query(
                &Selector::new(DocType::Screening.as_str())
                    .with("date", date)
                    .with("titleId", title_id.as_str()),
            )
            .await?;
        let scheduled = u32::try_from(same_day.len()).unwrap_or(u32::MAX);
        if scheduled.saturating_add(1) > self.daily_cap {
            return Err(LedgerError::DailyLimitExceeded {
                title_id: title_id.clone(),
                date: date.to_string(),
                cap: self.daily_cap,
            });
        }

        let at_slot: Vec<Screening> = self
            .queries
            .query(&Selector::new(DocType::Screening.as_str()).with("slot", slot.as_str()))
            .await?
            .decode()?;

        if at_slot.is_empty() {
            return Ok(1);
        }

        if at_slot
            .iter()
            .any(|s| s.title_id == *title_id && s.slot == *slot)
        {
            return Err(LedgerError::DuplicateSlot {
                title_id: title_id.clone(),
                slot: slot.clone(),
            });
        }

        let no_screen = || LedgerError::NoScreenAvailable {
            slot: slot.clone(),
            screen_count,
        };
        if at_slot.len() >= usize::try_from(screen_count).unwrap_or(usize::MAX) {
            return Err(no_screen());
        }

        let in_use: Vec<u32> = at_slot.iter().map(|s| s.screen_number).collect();
        lowest_free_screen(screen_count, &in_use).ok_or_else(no_screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_testing::InMemoryRecordStore;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_zero_screens_is_invalid() {
        let queries = QueryLayer::new(Arc::new(InMemoryRecordStore::new()));
        let allocator = ScreenAllocator::new(queries, 4);
        let slot = Slot::new_unchecked("2025-01-01 10:00am");

        let refused = allocator
            .assign_screen(0, &slot, "2025-01-01", &TitleId::from("T1"))
            .await;
        assert!(matches!(refused, Err(LedgerError::InvalidArgument(_))));
    }

    #[test]
    fn test_first_gap_wins() {
        assert_eq!(lowest_free_screen(4, &[]), Some(1));
        assert_eq!(lowest_free_screen(4, &[1, 2, 4]), Some(3));
        assert_eq!(lowest_free_screen(4, &[7, 9]), Some(1));
        assert_eq!(lowest_free_screen(0, &[]), None);
    }

    proptest! {
        #[test]
        fn prop_lowest_free_is_free_and_minimal(
            screen_count in 1u32..20,
            in_use in proptest::collection::vec(1u32..25, 0..30),
        ) {
            match lowest_free_screen(screen_count, &in_use) {
                Some(screen) => {
                    prop_assert!((1..=screen_count).contains(&screen));
                    prop_assert!(!in_use.contains(&screen));
                    prop_assert!((1..screen).all(|s| in_use.contains(&s)));
                }
                None => prop_assert!((1..=screen_count).all(|s| in_use.contains(&s))),
            }
        }
    }
}
