//! Venue, title and screening registration.
//!
//! All operations here act on behalf of the caller's venue, resolved through
//! the environment's [`CallerIdentity`](crate::environment::CallerIdentity).

use crate::Ledger;
use crate::error::LedgerError;
use crate::metrics;
use crate::types::{
    ConcessionStock, DocType, Screening, ScreeningId, ScreeningStatus, Slot, Title, TitleId,
    TitleStatus, Venue, VenueId,
};
use chrono::NaiveDate;
use marquee_core::selector::Selector;

/// Longest accepted identifier.
pub const MAX_ID_LEN: usize = 32;

fn validate_id(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.is_empty() {
        return Err(LedgerError::InvalidArgument(format!("{field} must be a non-empty string")));
    }
    if value.chars().count() > MAX_ID_LEN {
        return Err(LedgerError::InvalidArgument(format!(
            "{field} must be at most {MAX_ID_LEN} characters"
        )));
    }
    Ok(())
}

impl Ledger {
    /// Register the caller's venue.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidArgument`] for an empty name, zero screens or
    ///   no caller identity
    /// - [`LedgerError::Conflict`] if the venue is already registered
    pub async fn add_venue(
        &self,
        name: &str,
        location: &str,
        screen_count: u32,
    ) -> Result<Venue, LedgerError> {
        let venue_id = self.caller()?;
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidArgument("venue name must not be empty".to_string()));
        }
        if screen_count == 0 {
            return Err(LedgerError::InvalidArgument(
                "venue must have at least one screen".to_string(),
            ));
        }

        let venue = Venue::new(venue_id, name.to_string(), location.to_string(), screen_count);
        self.records.insert(&venue).await?;

        tracing::info!(venue_id = %venue.venue_id, screen_count, "Venue registered");
        Ok(venue)
    }

    /// Register a title owned by the caller's venue.
    ///
    /// The title is `Running` if `release_date` is today or earlier, otherwise
    /// `Coming Soon`. A venue holds at most one title per screen.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidArgument`] for a malformed id or empty name
    /// - [`LedgerError::NotFound`] if the caller's venue is not registered
    /// - [`LedgerError::Conflict`] if the title id is taken or the venue
    ///   already has as many titles as screens
    pub async fn add_title(
        &self,
        title_id: &TitleId,
        name: &str,
        runtime_minutes: u32,
        release_date: NaiveDate,
    ) -> Result<Title, LedgerError> {
        validate_id("title id", title_id.as_str())?;
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidArgument("title name must not be empty".to_string()));
        }
        let venue_id = self.caller()?;

        let _guard = self.env.locks.acquire(&[venue_id.as_str()]).await?;
        let venue = self.records.require::<Venue>(venue_id.as_str()).await?.record;

        let titles = self
            .queries
            .query(&Selector::new(DocType::Title.as_str()).with("venueId", venue_id.as_str()))
            .await?
            .len();
        if u32::try_from(titles).unwrap_or(u32::MAX) >= venue.screen_count {
            tracing::info!(%venue_id, %title_id, titles, "Title refused, every screen has a title");
            return Err(LedgerError::Conflict(format!(
                "only {} titles can run at venue '{venue_id}'",
                venue.screen_count
            )));
        }

        let title = Title {
            doc_type: DocType::Title,
            title_id: title_id.clone(),
            name: name.to_string(),
            runtime_minutes,
            release_date,
            venue_id,
            status: TitleStatus::on(release_date, self.env.clock.today()),
        };
        self.records.insert(&title).await?;

        tracing::info!(%title_id, status = ?title.status, %release_date, "Title registered");
        Ok(title)
    }

    /// Move a released title from `Coming Soon` to `Running`.
    ///
    /// Once the title is running, its screenings are moved from the venue's
    /// upcoming list to its active list. Calling this again is harmless: a
    /// record that would not change is not rewritten.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the title or its venue is missing
    /// - store, query, lock and decoding failures
    pub async fn refresh_title_status(&self, title_id: &TitleId) -> Result<Title, LedgerError> {
        let current = self.records.require::<Title>(title_id.as_str()).await?.record;
        if current.status == TitleStatus::ComingSoon
            && current.release_date > self.env.clock.today()
        {
            tracing::debug!(%title_id, release_date = %current.release_date, "Title not released yet");
            return Ok(current);
        }

        let _guard = self
            .env
            .locks
            .acquire(&[title_id.as_str(), current.venue_id.as_str()])
            .await?;

        let current = self.records.require::<Title>(title_id.as_str()).await?.record;
        let promoted = current.status == TitleStatus::ComingSoon;
        let title = if promoted {
            self.records
                .update::<Title, _, _>(title_id.as_str(), |t| {
                    t.status = TitleStatus::Running;
                    Ok(())
                })
                .await?
                .0
        } else {
            current
        };

        let screening_ids: Vec<ScreeningId> = self
            .queries
            .query(&Selector::new(DocType::Screening.as_str()).with("titleId", title_id.as_str()))
            .await?
            .decode::<Screening>()?
            .into_iter()
            .map(|s| s.screening_id)
            .collect();

        let venue = self.records.require::<Venue>(title.venue_id.as_str()).await?.record;
        let pending = venue
            .upcoming_screenings
            .iter()
            .any(|id| screening_ids.contains(id));
        let moved = if pending {
            self.records
                .update::<Venue, _, _>(title.venue_id.as_str(), |v| Ok(v.promote(&screening_ids)))
                .await?
                .1
        } else {
            0
        };

        if promoted || moved > 0 {
            tracing::info!(%title_id, moved, "Title is now running");
        }
        Ok(title)
    }

    /// Schedule a screening of one of the caller's titles.
    ///
    /// The screening gets the configured seat count, a price from its slot's
    /// tier and the screen chosen by the allocator. It is listed on the venue
    /// as active or upcoming depending on the title, and the date's concession
    /// stock is created if this is the first screening that day.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidArgument`] for malformed ids or slot
    /// - [`LedgerError::NotFound`] if the caller's venue or the title is missing
    /// - [`LedgerError::Conflict`] if the screening id is taken or the title
    ///   belongs to another venue
    /// - the allocator's failures ([`LedgerError::DailyLimitExceeded`],
    ///   [`LedgerError::DuplicateSlot`], [`LedgerError::NoScreenAvailable`])
    /// - store, query, lock and decoding failures
    pub async fn add_screening(
        &self,
        screening_id: &ScreeningId,
        title_id: &TitleId,
        slot: &str,
    ) -> Result<Screening, LedgerError> {
        validate_id("screening id", screening_id.as_str())?;
        validate_id("title id", title_id.as_str())?;
        let slot = Slot::parse(slot)?;
        let date = slot.date().to_string();

        let venue_id = self.caller()?;
        let venue = self.records.require::<Venue>(venue_id.as_str()).await?.record;

        let slot_key = format!("slot/{slot}");
        let day_key = format!("day/{title_id}/{date}");
        let _guard = self
            .env
            .locks
            .acquire(&[venue_id.as_str(), slot_key.as_str(), day_key.as_str()])
            .await?;

        if self.records.exists(screening_id.as_str()).await? {
            return Err(LedgerError::Conflict(format!(
                "screening '{screening_id}' already exists"
            )));
        }

        let title = self.records.require::<Title>(title_id.as_str()).await?.record;
        if title.venue_id != venue_id {
            return Err(LedgerError::Conflict(format!(
                "title '{title_id}' is not shown at venue '{venue_id}'"
            )));
        }

        let screen_number = self
            .allocator
            .assign_screen(venue.screen_count, &slot, &date, title_id)
            .await?;

        let config = &self.env.config;
        let screening = Screening {
            doc_type: DocType::Screening,
            screening_id: screening_id.clone(),
            title_id: title_id.clone(),
            venue_id: venue_id.clone(),
            unit_price: config.price_for(&slot),
            slot,
            date: date.clone(),
            screen_number,
            total_seats: config.seats_per_screening,
            available_seats: config.seats_per_screening,
            booked_seats: 0,
            status: ScreeningStatus::Running,
        };
        self.records.insert(&screening).await?;

        self.records
            .update::<Venue, _, _>(venue_id.as_str(), |v| {
                v.list_screening(screening_id.clone(), title.status);
                Ok(())
            })
            .await?;

        self.ensure_concession_stock(&date).await?;

        metrics::record_screening_created(screen_number);
        tracing::info!(
            %screening_id,
            %title_id,
            slot = %screening.slot,
            screen_number,
            "Screening scheduled"
        );
        Ok(screening)
    }

    /// Create the date's concession stock unless it already exists.
    async fn ensure_concession_stock(&self, date: &str) -> Result<(), LedgerError> {
        if self.records.exists(date).await? {
            return Ok(());
        }

        let config = &self.env.config;
        let stock = ConcessionStock::new(
            date.to_string(),
            config.concession_item.clone(),
            config.concession_stock_per_day,
        );
        match self.records.insert(&stock).await {
            Ok(_) => {
                tracing::debug!(date, item = %stock.item, quantity = stock.total_quantity, "Concession stock created");
                Ok(())
            }
            Err(LedgerError::Conflict(_)) => {
                tracing::debug!(date, "Concession stock created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn caller(&self) -> Result<VenueId, LedgerError> {
        self.env.identity.current().ok_or_else(|| {
            LedgerError::InvalidArgument("no caller identity is established".to_string())
        })
    }
}
