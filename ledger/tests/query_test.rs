//! Query layer: envelopes, cursor failures and pagination.

#![allow(clippy::unwrap_used)] // Test code can use unwrap

mod common;

use common::Harness;
use marquee::{LedgerError, PageSize, QueryLayer, Screening};
use marquee_core::record_store::RecordStore;
use marquee_core::selector::Selector;
use marquee_testing::InMemoryRecordStore;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

const TODAY: &str = "2025-01-01";

fn screenings_today() -> String {
    Selector::new("Screening").with("date", TODAY).to_query()
}

fn seeded(count: usize) -> (Arc<InMemoryRecordStore>, QueryLayer) {
    let store = Arc::new(InMemoryRecordStore::new());
    for i in 0..count {
        store.seed_json(
            &format!("S{i:02}"),
            &json!({"docType": "Screening", "date": TODAY, "n": i}),
        );
    }
    store.seed_json("V1", &json!({"docType": "Venue", "date": TODAY}));
    let dyn_store: Arc<dyn RecordStore> = store.clone();
    (store, QueryLayer::new(dyn_store))
}

#[tokio::test]
async fn test_plain_envelope_passes_records_through() {
    let (store, queries) = seeded(2);

    let results = queries.query_raw(&screenings_today()).await.unwrap();
    assert_eq!(results.keys().collect::<Vec<_>>(), ["S00", "S01"]);

    let mut expected = b"[".to_vec();
    expected.extend(store.raw("S00").unwrap());
    expected.push(b',');
    expected.extend(store.raw("S01").unwrap());
    expected.push(b']');
    assert_eq!(results.to_json_array(), expected);
}

#[tokio::test]
async fn test_empty_results_render_empty_envelopes() {
    let (_, queries) = seeded(0);

    let results = queries.query_raw(&screenings_today()).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(results.to_json_array(), b"[]");

    let page = queries
        .query_paginated(&screenings_today(), PageSize::new(5).unwrap(), "")
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(page.to_json()).unwrap(),
        r#"{"Data":[],"BookMarkData":[{"ResponseMetadata":{"RecordsCount":"0","Bookmark":""}}]}"#
    );
}

#[tokio::test]
async fn test_paginated_envelope_reports_count_and_bookmark() {
    let (store, queries) = seeded(3);

    let page = queries
        .query_paginated_args(&screenings_today(), "2", "")
        .await
        .unwrap();
    assert_eq!(page.fetched_count, 2);
    assert_eq!(page.bookmark, "S01");

    let body: serde_json::Value = serde_json::from_slice(&page.to_json()).unwrap();
    let s00: serde_json::Value = serde_json::from_slice(&store.raw("S00").unwrap()).unwrap();
    assert_eq!(body["Data"][0], s00);
    assert_eq!(body["BookMarkData"][0]["ResponseMetadata"]["RecordsCount"], "2");
    assert_eq!(body["BookMarkData"][0]["ResponseMetadata"]["Bookmark"], "S01");

    // Quoted bookmarks, as echoed back by clients, resume the same way
    let next = queries
        .query_paginated_args(&screenings_today(), "2", "\"S01\"")
        .await
        .unwrap();
    assert_eq!(next.results.keys().collect::<Vec<_>>(), ["S02"]);
    assert_eq!(next.bookmark, "S02");
}

#[tokio::test]
async fn test_bad_page_sizes_are_invalid() {
    let (_, queries) = seeded(1);
    for size in ["0", "-3", "ten", "", "2147483648"] {
        let refused = queries.query_paginated_args(&screenings_today(), size, "").await;
        assert!(
            matches!(refused, Err(LedgerError::InvalidArgument(_))),
            "page size {size:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_cursor_failure_discards_partial_results() {
    let (store, queries) = seeded(4);
    store.fail_next_cursor_after(2);

    let refused = queries.query_raw(&screenings_today()).await;
    assert!(matches!(refused, Err(LedgerError::Query(_))));

    // One-shot: the next query runs clean
    assert_eq!(queries.query_raw(&screenings_today()).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_unavailable_index_and_bad_queries_surface_as_query_errors() {
    let (store, queries) = seeded(1);

    let refused = queries.query_raw("not a query").await;
    assert!(matches!(refused, Err(LedgerError::Query(_))));

    store.fail_queries();
    let refused = queries.query(&Selector::new("Screening")).await;
    assert!(matches!(refused, Err(LedgerError::Query(_))));
}

#[tokio::test]
async fn test_typed_decode_through_the_ledger() {
    let h = Harness::new().venue(2).await;
    let title = h.running_title("T1").await;
    h.ledger
        .add_screening(&"S1".into(), &title, "2025-01-01 10:00am")
        .await
        .unwrap();
    h.ledger
        .add_screening(&"S2".into(), &title, "2025-01-01 7:00pm")
        .await
        .unwrap();

    let screenings: Vec<Screening> = h
        .ledger
        .queries()
        .query(&Selector::new("Screening").with("titleId", "T1"))
        .await
        .unwrap()
        .decode()
        .unwrap();
    let ids: Vec<&str> = screenings.iter().map(|s| s.screening_id.as_str()).collect();
    assert_eq!(ids, ["S1", "S2"]);
}

proptest! {
    #[test]
    fn prop_pages_concatenate_to_the_full_query(count in 0usize..12, page_size in 1u32..5) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (full, paged) = runtime.block_on(async {
            let (_, queries) = seeded(count);
            let full: Vec<String> = queries
                .query_raw(&screenings_today())
                .await
                .unwrap()
                .keys()
                .map(str::to_string)
                .collect();

            let mut paged = Vec::new();
            let mut bookmark = String::new();
            loop {
                let page = queries
                    .query_paginated(&screenings_today(), PageSize::new(page_size).unwrap(), &bookmark)
                    .await
                    .unwrap();
                if page.results.is_empty() {
                    break;
                }
                assert!(page.results.len() <= page_size as usize);
                paged.extend(page.results.keys().map(str::to_string));
                bookmark = page.bookmark;
            }
            (full, paged)
        });

        prop_assert_eq!(full.len(), count);
        prop_assert_eq!(full, paged);
    }
}
