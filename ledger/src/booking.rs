//! Booking and inventory engine.
//!
//! Sells seats on screenings and exchanges amenities against the day's
//! concession stock.
//!
//! **Concurrency Strategy**: operations first take the in-process locks of
//! the records they mutate, then write with the version they read, retrying
//! on conflict. The contended record (the screening, the stock) is written
//! first; there is no rollback if a later write fails.

use crate::Ledger;
use crate::error::LedgerError;
use crate::metrics;
use crate::types::{
    Amenity, ConcessionStock, DocType, Reservation, ReservationId, Screening, ScreeningId, Title,
};

impl Ledger {
    /// Book `ticket_count` seats on a screening.
    ///
    /// Returns the stored reservation: one water amenity per ticket, with
    /// title name, slot, screen and price snapshotted from the screening.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the screening or its title is missing
    /// - [`LedgerError::InvalidArgument`] if `ticket_count` is zero
    /// - [`LedgerError::SoldOut`] / [`LedgerError::InsufficientSeats`]
    /// - [`LedgerError::Conflict`] if no unused reservation id was drawn
    /// - store, lock and decoding failures
    pub async fn book_tickets(
        &self,
        screening_id: &ScreeningId,
        ticket_count: u32,
    ) -> Result<Reservation, LedgerError> {
        let result = self.try_book(screening_id, ticket_count).await;
        match &result {
            Ok(reservation) => {
                metrics::record_tickets_booked(ticket_count);
                tracing::info!(
                    %screening_id,
                    reservation_id = %reservation.reservation_id,
                    ticket_count,
                    total_price = reservation.total_price,
                    "Tickets booked"
                );
            }
            Err(e) => {
                metrics::record_booking_rejected(e.reason());
                tracing::info!(%screening_id, ticket_count, error = %e, "Booking refused");
            }
        }
        result
    }

    async fn try_book(
        &self,
        screening_id: &ScreeningId,
        ticket_count: u32,
    ) -> Result<Reservation, LedgerError> {
        let _guard = self.env.locks.acquire(&[screening_id.as_str()]).await?;

        let screening = self.records.require::<Screening>(screening_id.as_str()).await?;
        if ticket_count == 0 {
            return Err(LedgerError::InvalidArgument(
                "at least one ticket must be booked".to_string(),
            ));
        }
        screening.record.check_seats(ticket_count)?;

        let title = self
            .records
            .require::<Title>(screening.record.title_id.as_str())
            .await?;
        let reservation_id = self.unused_reservation_id(&screening.record).await?;

        let (screening, ()) = self
            .records
            .update::<Screening, _, _>(screening_id.as_str(), |s| s.take_seats(ticket_count))
            .await?;

        let amenities = (0..ticket_count)
            .map(|_| Amenity::water(self.seat_id(&screening)))
            .collect();

        let reservation = Reservation {
            doc_type: DocType::Reservation,
            reservation_id,
            screening_id: screening.screening_id.clone(),
            venue_id: screening.venue_id.clone(),
            title_name: title.record.name,
            slot: screening.slot.clone(),
            screen_number: screening.screen_number,
            ticket_count,
            unit_price: screening.unit_price,
            total_price: u64::from(ticket_count) * u64::from(screening.unit_price),
            amenities,
        };
        self.records.insert(&reservation).await?;

        Ok(reservation)
    }

    /// Draw reservation ids until one is unused, up to the configured attempts.
    async fn unused_reservation_id(&self, screening: &Screening) -> Result<ReservationId, LedgerError> {
        let config = &self.env.config;
        for attempt in 1..=config.reservation_id_attempts {
            let id = ReservationId::new(format!(
                "T{}{}{}",
                screening.venue_id,
                screening.screening_id,
                self.env.ids.next_token(config.reservation_id_space)
            ));
            if !self.records.exists(id.as_str()).await? {
                return Ok(id);
            }
            tracing::debug!(reservation_id = %id, attempt, "Reservation id already taken, redrawing");
        }
        Err(LedgerError::Conflict(format!(
            "no unused reservation id after {} attempts",
            config.reservation_id_attempts
        )))
    }

    fn seat_id(&self, screening: &Screening) -> String {
        format!(
            "S{}{}{}",
            screening.venue_id,
            screening.screening_id,
            self.env.ids.next_token(self.env.config.seat_id_space)
        )
    }

    /// Exchange every amenity of a reservation (water for soda).
    ///
    /// Consumes one unit of the day's concession stock per ticket. Returns the
    /// updated reservation.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TemporarilyUnavailable`] if the exchange policy refuses
    /// - [`LedgerError::NotFound`] if the reservation or the day's stock is missing
    /// - [`LedgerError::OutOfStock`] if the stock cannot cover every ticket
    /// - [`LedgerError::AlreadyExchanged`] if the reservation was exchanged before
    /// - store, lock and decoding failures
    pub async fn exchange_amenity(
        &self,
        reservation_id: &ReservationId,
    ) -> Result<Reservation, LedgerError> {
        let result = self.try_exchange(reservation_id).await;
        let outcome = match &result {
            Ok(_) => "exchanged",
            Err(LedgerError::TemporarilyUnavailable) => "gated",
            Err(e) => e.reason(),
        };
        metrics::record_exchange(outcome);
        match &result {
            Ok(reservation) => tracing::info!(
                %reservation_id,
                tickets = reservation.ticket_count,
                "Amenities exchanged"
            ),
            Err(e) => tracing::info!(%reservation_id, error = %e, "Amenity exchange refused"),
        }
        result
    }

    async fn try_exchange(&self, reservation_id: &ReservationId) -> Result<Reservation, LedgerError> {
        let policy = &self.env.exchange_policy;
        if !policy.permits_exchange() {
            tracing::debug!(policy = policy.name(), "Exchange policy refused");
            return Err(LedgerError::TemporarilyUnavailable);
        }

        let date = self
            .records
            .require::<Reservation>(reservation_id.as_str())
            .await?
            .record
            .slot
            .date()
            .to_string();

        let _guard = self
            .env
            .locks
            .acquire(&[reservation_id.as_str(), date.as_str()])
            .await?;

        let reservation = self.records.require::<Reservation>(reservation_id.as_str()).await?;
        let stock = self.records.require::<ConcessionStock>(&date).await?;

        let tickets = reservation.record.ticket_count;
        stock.record.check(tickets)?;
        if reservation.record.is_exchanged() {
            return Err(LedgerError::AlreadyExchanged {
                reservation_id: reservation_id.clone(),
            });
        }

        self.records
            .update::<ConcessionStock, _, _>(&date, |s| s.consume(tickets))
            .await?;
        let (reservation, ()) = self
            .records
            .update::<Reservation, _, _>(reservation_id.as_str(), Reservation::exchange_amenities)
            .await?;

        Ok(reservation)
    }
}
