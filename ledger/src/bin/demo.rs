//! Marquee Demo
//!
//! Walks a venue through a day at the box office against the in-memory
//! record store:
//! - Venue and title registration
//! - Screen allocation (including a refused slot)
//! - Ticket booking and a sold-out screening
//! - Amenity exchange
//! - A paginated query over the day's screenings
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info,marquee=debug cargo run --bin demo
//! ```

use anyhow::Context;
use chrono::Duration;
use marquee::{
    AlwaysOpen, Ledger, LedgerConfig, LedgerEnvironment, LedgerError, ScreeningId, TitleId,
    metrics::register_business_metrics,
};
use marquee_core::environment::{Clock, SystemClock};
use marquee_core::selector::Selector;
use marquee_testing::InMemoryRecordStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading configuration; a missing file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,marquee=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    register_business_metrics();

    println!("\n🎬 ============================================");
    println!("   Marquee - Box Office Demo");
    println!("============================================\n");

    let config = LedgerConfig::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryRecordStore::with_clock(Arc::clone(&clock)));

    // The coin-flip gate would make the walkthrough nondeterministic
    let env = LedgerEnvironment::new(store, Arc::clone(&clock), config)
        .with_exchange_policy(Arc::new(AlwaysOpen));
    let ledger = Ledger::new(env).as_caller("V1");

    // Step 1: venue and titles
    println!("1️⃣  Registering venue and titles...");
    let venue = ledger.add_venue("Odeon", "Leeds", 2).await?;
    println!("   ✓ Venue {} with {} screens", venue.venue_id, venue.screen_count);

    let today = clock.today();
    let heat = TitleId::from("HEAT");
    let dune = TitleId::from("DUNE");
    ledger.add_title(&heat, "Heat", 170, today - Duration::days(30)).await?;
    ledger.add_title(&dune, "Dune", 155, today + Duration::days(7)).await?;
    println!("   ✓ Heat is running, Dune is coming soon\n");

    // Step 2: screenings
    println!("2️⃣  Scheduling screenings...");
    let morning = format!("{today} 10:00am");
    let evening = format!("{today} 7:00pm");
    for (id, title, slot) in [
        ("SHOW1", &heat, &morning),
        ("SHOW2", &dune, &morning),
        ("SHOW3", &heat, &evening),
    ] {
        let screening = ledger.add_screening(&id.into(), title, slot).await?;
        println!(
            "   ✓ {} → screen {} at {} ({} per ticket)",
            screening.screening_id, screening.screen_number, screening.slot, screening.unit_price
        );
    }
    match ledger.add_screening(&"SHOW4".into(), &heat, &morning).await {
        Err(e @ LedgerError::DuplicateSlot { .. }) => println!("   ✗ SHOW4 refused: {e}\n"),
        other => anyhow::bail!("expected a duplicate slot, got {other:?}"),
    }

    // Step 3: booking
    println!("3️⃣  Booking tickets...");
    let show = ScreeningId::from("SHOW1");
    let reservation = ledger.book_tickets(&show, 3).await?;
    println!(
        "   ✓ Reservation {}: {} tickets for {} on screen {}, total {}",
        reservation.reservation_id,
        reservation.ticket_count,
        reservation.title_name,
        reservation.screen_number,
        reservation.total_price
    );
    let remaining = ledger.screening(&show).await?.available_seats;
    if let Err(e) = ledger.book_tickets(&show, remaining + 1).await {
        println!("   ✗ Booking {} more refused: {e}", remaining + 1);
    }
    ledger.book_tickets(&show, remaining).await?;
    let full = ledger.screening(&show).await?;
    println!("   ✓ {} is now {:?}\n", full.screening_id, full.status);

    // Step 4: exchange
    println!("4️⃣  Exchanging water for soda...");
    let exchanged = ledger.exchange_amenity(&reservation.reservation_id).await?;
    let stock = ledger.concession_stock(&today.to_string()).await?;
    println!(
        "   ✓ {} seats now hold soda, {} {} left today",
        exchanged.amenities.len(),
        stock.available_quantity,
        stock.item
    );
    if let Err(e) = ledger.exchange_amenity(&reservation.reservation_id).await {
        println!("   ✗ Second exchange refused: {e}\n");
    }

    // Step 5: paginated query
    println!("5️⃣  Listing today's screenings, two per page...");
    let query = Selector::new("Screening").with("date", today.to_string()).to_query();
    let mut bookmark = String::new();
    loop {
        let page = ledger
            .queries()
            .query_paginated_args(&query, "2", &bookmark)
            .await?;
        if page.results.is_empty() {
            break;
        }
        let body = String::from_utf8(page.to_json()).context("envelope is UTF-8")?;
        println!("   {body}");
        bookmark = page.bookmark;
    }

    println!("\n✨ Demo completed successfully!");
    Ok(())
}
