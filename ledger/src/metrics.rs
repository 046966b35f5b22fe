//! Business metrics for the screening ledger.
//!
//! Recorded through the `metrics` facade; the embedding application decides
//! which recorder (if any) to install.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `marquee_screenings_created_total` - Screenings scheduled
//! - `marquee_screen_allocation_rejected_total{reason}` - Allocation refusals
//! - `marquee_tickets_booked_total` - Tickets sold
//! - `marquee_bookings_rejected_total{reason}` - Booking refusals
//! - `marquee_amenity_exchanges_total{outcome}` - Exchange attempts by outcome
//! - `marquee_store_conflicts_total` - Writes rejected by a version check

use metrics::describe_counter;

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "marquee_screenings_created_total",
        "Total number of screenings scheduled"
    );
    describe_counter!(
        "marquee_screen_allocation_rejected_total",
        "Screen allocations refused, by reason (duplicate_slot, daily_limit_exceeded, no_screen_available)"
    );
    describe_counter!(
        "marquee_tickets_booked_total",
        "Total number of tickets sold"
    );
    describe_counter!(
        "marquee_bookings_rejected_total",
        "Bookings refused, by reason (sold_out, insufficient_seats, ...)"
    );
    describe_counter!(
        "marquee_amenity_exchanges_total",
        "Amenity exchange attempts, by outcome (exchanged, gated, out_of_stock, already_exchanged, ...)"
    );
    describe_counter!(
        "marquee_store_conflicts_total",
        "Writes rejected because the record changed since it was read"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a scheduled screening.
pub fn record_screening_created(screen_number: u32) {
    metrics::counter!("marquee_screenings_created_total").increment(1);
    tracing::debug!(screen_number, "Recorded screening_created metric");
}

/// Record a refused screen allocation.
pub fn record_allocation_rejected(reason: &'static str) {
    metrics::counter!("marquee_screen_allocation_rejected_total", "reason" => reason).increment(1);
}

/// Record a successful booking.
pub fn record_tickets_booked(count: u32) {
    metrics::counter!("marquee_tickets_booked_total").increment(u64::from(count));
    tracing::debug!(count, "Recorded tickets_booked metric");
}

/// Record a refused booking.
pub fn record_booking_rejected(reason: &'static str) {
    metrics::counter!("marquee_bookings_rejected_total", "reason" => reason).increment(1);
}

/// Record an exchange attempt.
pub fn record_exchange(outcome: &'static str) {
    metrics::counter!("marquee_amenity_exchanges_total", "outcome" => outcome).increment(1);
}

/// Record a write rejected by a version check.
pub fn record_store_conflict() {
    metrics::counter!("marquee_store_conflicts_total").increment(1);
}
