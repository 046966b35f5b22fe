//! Configuration management for the ledger.
//!
//! Loads configuration from `MARQUEE_*` environment variables with sensible
//! defaults. Values that fail to parse fall back to the default with a warning.

use crate::types::Slot;
use marquee_runtime::locks::KeyLocks;
use marquee_runtime::retry::ConflictRetry;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Ledger configuration.
///
/// # Default Values
///
/// 100 seats per screening, 100 for morning tickets and 180 otherwise, at
/// most four screenings of a title per day, 200 sodas per day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Seats created with every screening (`MARQUEE_SEATS_PER_SCREENING`)
    pub seats_per_screening: u32,
    /// Ticket price for morning slots (`MARQUEE_MORNING_PRICE`)
    pub morning_price: u32,
    /// Ticket price for all other slots (`MARQUEE_STANDARD_PRICE`)
    pub standard_price: u32,
    /// Slot suffix marking a morning slot (`MARQUEE_MORNING_SUFFIX`)
    pub morning_suffix: String,
    /// Token space for reservation ids (`MARQUEE_RESERVATION_ID_SPACE`)
    pub reservation_id_space: u32,
    /// Token space for seat ids (`MARQUEE_SEAT_ID_SPACE`)
    pub seat_id_space: u32,
    /// Attempts at drawing an unused reservation id (`MARQUEE_RESERVATION_ID_ATTEMPTS`)
    pub reservation_id_attempts: u32,
    /// Screenings of one title per day (`MARQUEE_DAILY_SCREENING_CAP`)
    pub daily_screening_cap: u32,
    /// Item handed out by amenity exchange (`MARQUEE_CONCESSION_ITEM`)
    pub concession_item: String,
    /// Units of the item stocked per date (`MARQUEE_CONCESSION_STOCK`)
    pub concession_stock_per_day: u32,
    /// Gate exchanges behind the coin flip (`MARQUEE_EXCHANGE_GATE`)
    pub exchange_gate_enabled: bool,
    /// Range the coin flip draws from (`MARQUEE_EXCHANGE_GATE_RANGE`)
    pub exchange_gate_range: u32,
    /// Stripes in the key lock table (`MARQUEE_LOCK_STRIPES`)
    pub lock_stripes: usize,
    /// Lock wait before giving up, in ms (`MARQUEE_LOCK_TIMEOUT_MS`)
    pub lock_timeout_ms: u64,
    /// Retries of a conflicting write (`MARQUEE_CONFLICT_RETRIES`)
    pub conflict_retries: usize,
    /// First retry delay in ms, doubling per retry (`MARQUEE_RETRY_INITIAL_DELAY_MS`)
    pub retry_initial_delay_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            seats_per_screening: 100,
            morning_price: 100,
            standard_price: 180,
            morning_suffix: "am".to_string(),
            reservation_id_space: 1_000_000,
            seat_id_space: 100_000,
            reservation_id_attempts: 5,
            daily_screening_cap: 4,
            concession_item: "Soda".to_string(),
            concession_stock_per_day: 200,
            exchange_gate_enabled: true,
            exchange_gate_range: 200,
            lock_stripes: 256,
            lock_timeout_ms: 5_000,
            conflict_retries: 3,
            retry_initial_delay_ms: 10,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: T) -> T {
    match lookup(var) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var, value = %raw, "Ignoring unparsable configuration value");
            default
        }),
        None => default,
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            seats_per_screening: parsed(&lookup, "MARQUEE_SEATS_PER_SCREENING", d.seats_per_screening),
            morning_price: parsed(&lookup, "MARQUEE_MORNING_PRICE", d.morning_price),
            standard_price: parsed(&lookup, "MARQUEE_STANDARD_PRICE", d.standard_price),
            morning_suffix: lookup("MARQUEE_MORNING_SUFFIX").unwrap_or(d.morning_suffix),
            reservation_id_space: parsed(&lookup, "MARQUEE_RESERVATION_ID_SPACE", d.reservation_id_space),
            seat_id_space: parsed(&lookup, "MARQUEE_SEAT_ID_SPACE", d.seat_id_space),
            reservation_id_attempts: parsed(
                &lookup,
                "MARQUEE_RESERVATION_ID_ATTEMPTS",
                d.reservation_id_attempts,
            )
            .max(1),
            daily_screening_cap: parsed(&lookup, "MARQUEE_DAILY_SCREENING_CAP", d.daily_screening_cap),
            concession_item: lookup("MARQUEE_CONCESSION_ITEM").unwrap_or(d.concession_item),
            concession_stock_per_day: parsed(&lookup, "MARQUEE_CONCESSION_STOCK", d.concession_stock_per_day),
            exchange_gate_enabled: parsed(&lookup, "MARQUEE_EXCHANGE_GATE", d.exchange_gate_enabled),
            exchange_gate_range: parsed(&lookup, "MARQUEE_EXCHANGE_GATE_RANGE", d.exchange_gate_range),
            lock_stripes: parsed(&lookup, "MARQUEE_LOCK_STRIPES", d.lock_stripes),
            lock_timeout_ms: parsed(&lookup, "MARQUEE_LOCK_TIMEOUT_MS", d.lock_timeout_ms),
            conflict_retries: parsed(&lookup, "MARQUEE_CONFLICT_RETRIES", d.conflict_retries),
            retry_initial_delay_ms: parsed(&lookup, "MARQUEE_RETRY_INITIAL_DELAY_MS", d.retry_initial_delay_ms),
        }
    }

    /// Ticket price for a slot.
    #[must_use]
    pub fn price_for(&self, slot: &Slot) -> u32 {
        if slot.is_morning(&self.morning_suffix) {
            self.morning_price
        } else {
            self.standard_price
        }
    }

    /// Lock wait as a [`Duration`].
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Retry policy for conflicting writes.
    #[must_use]
    pub fn retry_policy(&self) -> ConflictRetry {
        ConflictRetry::new(
            self.conflict_retries,
            Duration::from_millis(self.retry_initial_delay_ms),
        )
    }

    /// A fresh lock table sized by this configuration.
    #[must_use]
    pub fn key_locks(&self) -> KeyLocks {
        KeyLocks::new(self.lock_stripes, self.lock_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| vars.get(k).cloned()
    }

    #[test]
    fn test_empty_environment_yields_defaults() {
        assert_eq!(LedgerConfig::from_lookup(|_| None), LedgerConfig::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("MARQUEE_SEATS_PER_SCREENING", "40"),
            ("MARQUEE_EXCHANGE_GATE", "false"),
            ("MARQUEE_CONCESSION_ITEM", "Popcorn"),
            ("MARQUEE_LOCK_TIMEOUT_MS", " 250 "),
        ]));
        assert_eq!(config.seats_per_screening, 40);
        assert!(!config.exchange_gate_enabled);
        assert_eq!(config.concession_item, "Popcorn");
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_garbage_falls_back_to_default() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("MARQUEE_DAILY_SCREENING_CAP", "lots"),
            ("MARQUEE_RESERVATION_ID_ATTEMPTS", "0"),
        ]));
        assert_eq!(config.daily_screening_cap, 4);
        assert_eq!(config.reservation_id_attempts, 1);
    }

    #[test]
    fn test_price_tiers() {
        let config = LedgerConfig::default();
        assert_eq!(config.price_for(&Slot::new_unchecked("2025-01-01 10:00am")), 100);
        assert_eq!(config.price_for(&Slot::new_unchecked("2025-01-01 7:00pm")), 180);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = LedgerConfig::default().retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
    }
}
