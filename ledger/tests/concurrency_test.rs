//! Concurrent bookings, exchanges and allocations.
//!
//! Run with: `cargo test --test concurrency_test -- --nocapture`

#![allow(clippy::unwrap_used)] // Test code can use unwrap

mod common;

use common::{Harness, fast_config};
use futures::future::join_all;
use marquee::{LedgerConfig, LedgerError, ScreeningId, TitleId};
use marquee_core::version::Version;

const MORNING: &str = "2025-01-01 10:00am";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_never_oversell() {
    let h = Harness::with_config(LedgerConfig {
        seats_per_screening: 50,
        ..fast_config()
    })
    .venue(1)
    .await;
    let title = h.running_title("T1").await;
    let show = ScreeningId::from("S1");
    h.ledger.add_screening(&show, &title, MORNING).await.unwrap();

    let tasks = (0..20).map(|_| {
        let ledger = h.ledger.clone();
        let show = show.clone();
        tokio::spawn(async move { ledger.book_tickets(&show, 3).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(Result::unwrap).collect();

    let booked = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(booked, 16);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        LedgerError::InsufficientSeats {
            requested: 3,
            available: 2
        }
    )));

    let screening = h.ledger.screening(&show).await.unwrap();
    assert_eq!(screening.booked_seats, 48);
    assert_eq!(screening.available_seats, 2);
    assert_eq!(screening.available_seats + screening.booked_seats, screening.total_seats);

    let mut ids: Vec<_> = results
        .into_iter()
        .filter_map(Result::ok)
        .map(|r| r.reservation_id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exchanges_succeed_exactly_once() {
    let h = Harness::new().venue(1).await;
    let title = h.running_title("T1").await;
    let show = ScreeningId::from("S1");
    h.ledger.add_screening(&show, &title, MORNING).await.unwrap();
    let reservation = h.ledger.book_tickets(&show, 4).await.unwrap();

    let tasks = (0..8).map(|_| {
        let ledger = h.ledger.clone();
        let id = reservation.reservation_id.clone();
        tokio::spawn(async move { ledger.exchange_amenity(&id).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LedgerError::AlreadyExchanged { .. })));
    assert_eq!(
        h.ledger.concession_stock("2025-01-01").await.unwrap().available_quantity,
        196
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_take_distinct_screens() {
    // Two venues of three screens contend for one slot
    let h = Harness::new().venue(3).await;
    let other = h.ledger.as_caller("V2");
    other.add_venue("Vue", "York", 3).await.unwrap();
    for i in 0..3 {
        h.running_title(&format!("T{i}")).await;
        other
            .add_title(&TitleId::new(format!("X{i}")), "Other", 90, common::date("2024-06-01"))
            .await
            .unwrap();
    }

    let tasks = (0..3).flat_map(|i| {
        [
            (h.ledger.clone(), format!("S{i}"), format!("T{i}")),
            (other.clone(), format!("SX{i}"), format!("X{i}")),
        ]
    });
    let tasks = tasks.map(|(ledger, screening, title)| {
        tokio::spawn(async move {
            ledger
                .add_screening(&ScreeningId::new(screening), &TitleId::new(title), MORNING)
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(Result::unwrap).collect();

    let mut screens: Vec<u32> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|s| s.screen_number)
        .collect();
    screens.sort_unstable();
    assert_eq!(screens, [1, 2, 3]);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::NoScreenAvailable { .. })))
            .count(),
        3
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_titles_respect_the_screen_count() {
    let h = Harness::new().venue(2).await;

    let tasks = (0..6).map(|i| {
        let ledger = h.ledger.clone();
        tokio::spawn(async move {
            ledger
                .add_title(&TitleId::new(format!("T{i}")), "Title", 90, common::date("2024-06-01"))
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LedgerError::Conflict(_))));
}

#[tokio::test]
async fn test_store_conflicts_are_retried() {
    let h = Harness::new().venue(1).await;
    let title = h.running_title("T1").await;
    let show = ScreeningId::from("S1");
    h.ledger.add_screening(&show, &title, MORNING).await.unwrap();
    h.store.force_conflicts("S1", 2);

    let reservation = h.ledger.book_tickets(&show, 2).await.unwrap();
    assert_eq!(reservation.ticket_count, 2);
    assert_eq!(h.store.version("S1"), Version::new(2));
    assert_eq!(h.ledger.screening(&show).await.unwrap().booked_seats, 2);
}

#[tokio::test]
async fn test_exhausted_conflict_retries_surface_as_store_write() {
    let h = Harness::new().venue(1).await;
    let title = h.running_title("T1").await;
    let show = ScreeningId::from("S1");
    h.ledger.add_screening(&show, &title, MORNING).await.unwrap();
    h.store.force_conflicts("S1", 10);

    let refused = h.ledger.book_tickets(&show, 2).await;
    assert!(matches!(refused, Err(ref e @ LedgerError::StoreWrite { .. }) if e.is_conflict()));

    h.store.clear_faults();
    let screening = h.ledger.screening(&show).await.unwrap();
    assert_eq!(screening.booked_seats, 0);
    assert_eq!(h.store.keys().iter().filter(|k| k.starts_with("TV1")).count(), 0);
}

#[tokio::test]
async fn test_failed_reservation_write_leaves_seats_taken() {
    let h = Harness::new().venue(1).await;
    let title = h.running_title("T1").await;
    let show = ScreeningId::from("S1");
    h.ledger.add_screening(&show, &title, MORNING).await.unwrap();
    h.store.fail_puts_to("TV1S10");

    let refused = h.ledger.book_tickets(&show, 2).await;
    assert!(matches!(refused, Err(LedgerError::StoreWrite { ref key, .. }) if key == "TV1S10"));

    // No compensation: the screening write already happened
    assert_eq!(h.ledger.screening(&show).await.unwrap().booked_seats, 2);
    assert!(!h.store.contains_key("TV1S10"));
}
