//! Shared fixtures for ledger integration tests.

#![allow(dead_code)] // Each test binary uses a different subset
#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use marquee::{AlwaysOpen, ExchangePolicy, Ledger, LedgerConfig, LedgerEnvironment, TitleId};
use marquee_core::environment::{Clock, IdGenerator};
use marquee_testing::{FixedClock, InMemoryRecordStore, SequentialIdGenerator, test_clock};
use std::sync::Arc;

/// Venue every harness registers as.
pub const VENUE: &str = "V1";

/// A ledger wired to in-memory, deterministic collaborators.
pub struct Harness {
    pub ledger: Ledger,
    pub store: Arc<InMemoryRecordStore>,
    pub clock: FixedClock,
}

impl Harness {
    /// Test clock (2025-01-01), sequential ids, gate always open, fast retries.
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let clock = test_clock();
        let store = Arc::new(InMemoryRecordStore::with_clock(Arc::new(clock.clone())));
        let env = LedgerEnvironment::new(store.clone(), Arc::new(clock.clone()), config)
            .with_ids(Arc::new(SequentialIdGenerator::new()))
            .with_exchange_policy(Arc::new(AlwaysOpen));
        let ledger = Ledger::new(env).as_caller(VENUE);
        Self { ledger, store, clock }
    }

    /// Swap the identifier generator, keeping store, locks and caller.
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ledger = Ledger::new(self.ledger.environment().clone().with_ids(ids));
        self
    }

    /// Swap the exchange policy, keeping store, locks and caller.
    pub fn with_exchange_policy(mut self, policy: Arc<dyn ExchangePolicy>) -> Self {
        self.ledger = Ledger::new(self.ledger.environment().clone().with_exchange_policy(policy));
        self
    }

    /// Register the harness venue with `screens` screens.
    pub async fn venue(self, screens: u32) -> Self {
        self.ledger.add_venue("Odeon", "Leeds", screens).await.unwrap();
        self
    }

    /// Register a title released a year before the test clock.
    pub async fn running_title(&self, id: &str) -> TitleId {
        let title_id = TitleId::from(id);
        self.ledger
            .add_title(&title_id, &format!("Title {id}"), 120, date("2024-01-01"))
            .await
            .unwrap();
        title_id
    }

    /// Register a title released after the test clock.
    pub async fn upcoming_title(&self, id: &str, release: &str) -> TitleId {
        let title_id = TitleId::from(id);
        self.ledger
            .add_title(&title_id, &format!("Title {id}"), 120, date(release))
            .await
            .unwrap();
        title_id
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

pub fn fast_config() -> LedgerConfig {
    LedgerConfig {
        retry_initial_delay_ms: 1,
        lock_timeout_ms: 2_000,
        ..LedgerConfig::default()
    }
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}
