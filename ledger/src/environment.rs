//! Injected dependencies of the ledger.
//!
//! Everything a ledger operation touches outside its arguments (the store,
//! time, identifiers, the caller's identity, the exchange gate, the lock
//! table) arrives through [`LedgerEnvironment`], so tests can substitute
//! deterministic versions of each.

use crate::config::LedgerConfig;
use crate::types::VenueId;
use marquee_core::environment::{Clock, Entropy, IdGenerator, RandomIdGenerator, TimeSeededEntropy};
use marquee_core::record_store::RecordStore;
use marquee_runtime::locks::KeyLocks;
use std::sync::Arc;

// ============================================================================
// Caller identity
// ============================================================================

/// Resolves the identity of the party invoking an operation.
///
/// A venue's registration key is its caller identity; operations that act
/// "as a venue" (registering it, adding titles and screenings) look it up here.
pub trait CallerIdentity: Send + Sync {
    /// Identity of the current caller, if one is established.
    fn current(&self) -> Option<VenueId>;
}

/// Fixed caller identity (or none at all).
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<VenueId>);

impl StaticIdentity {
    /// Always resolve to `venue`.
    #[must_use]
    pub fn new(venue: impl Into<VenueId>) -> Self {
        Self(Some(venue.into()))
    }

    /// Never resolve; venue-scoped operations fail.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

impl CallerIdentity for StaticIdentity {
    fn current(&self) -> Option<VenueId> {
        self.0.clone()
    }
}

// ============================================================================
// Exchange policy
// ============================================================================

/// Decides whether an amenity exchange may proceed right now.
pub trait ExchangePolicy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// True when the exchange may proceed.
    fn permits_exchange(&self) -> bool;
}

/// The fairness coin: draws from `[0, range)` and admits even draws only.
///
/// # Example
///
/// ```
/// use marquee::environment::{CoinFlipGate, ExchangePolicy};
/// use marquee_testing::ScriptedEntropy;
/// use std::sync::Arc;
///
/// let gate = CoinFlipGate::new(Arc::new(ScriptedEntropy::new([4, 7])), 200);
/// assert!(gate.permits_exchange());
/// assert!(!gate.permits_exchange());
/// ```
#[derive(Clone)]
pub struct CoinFlipGate {
    entropy: Arc<dyn Entropy>,
    range: u32,
}

impl CoinFlipGate {
    /// Gate drawing from `entropy`.
    #[must_use]
    pub fn new(entropy: Arc<dyn Entropy>, range: u32) -> Self {
        Self { entropy, range }
    }

    /// Gate reseeded from `clock` on every draw.
    #[must_use]
    pub fn time_seeded(clock: Arc<dyn Clock>, range: u32) -> Self {
        Self::new(Arc::new(TimeSeededEntropy::new(clock)), range)
    }
}

impl ExchangePolicy for CoinFlipGate {
    fn name(&self) -> &'static str {
        "coin_flip"
    }

    fn permits_exchange(&self) -> bool {
        let draw = self.entropy.next_below(self.range);
        tracing::trace!(draw, range = self.range, "Exchange gate draw");
        draw % 2 == 0
    }
}

impl std::fmt::Debug for CoinFlipGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinFlipGate")
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// Admits every exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl ExchangePolicy for AlwaysOpen {
    fn name(&self) -> &'static str {
        "always_open"
    }

    fn permits_exchange(&self) -> bool {
        true
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for ledger operations
#[derive(Clone)]
pub struct LedgerEnvironment {
    /// Record store (source of truth)
    pub store: Arc<dyn RecordStore>,
    /// Clock for title release checks and the exchange gate
    pub clock: Arc<dyn Clock>,
    /// Identifier tokens for reservations and seats
    pub ids: Arc<dyn IdGenerator>,
    /// Gate in front of amenity exchanges
    pub exchange_policy: Arc<dyn ExchangePolicy>,
    /// Identity of the caller
    pub identity: Arc<dyn CallerIdentity>,
    /// In-process per-key locks
    pub locks: KeyLocks,
    /// House rules and tuning
    pub config: Arc<LedgerConfig>,
}

impl LedgerEnvironment {
    /// Creates a new `LedgerEnvironment` with production capabilities.
    ///
    /// Identifiers are random tokens, the exchange gate follows
    /// `config.exchange_gate_enabled` and no caller identity is established.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        let exchange_policy: Arc<dyn ExchangePolicy> = if config.exchange_gate_enabled {
            Arc::new(CoinFlipGate::time_seeded(Arc::clone(&clock), config.exchange_gate_range))
        } else {
            Arc::new(AlwaysOpen)
        };

        Self {
            store,
            clock,
            ids: Arc::new(RandomIdGenerator::default()),
            exchange_policy,
            identity: Arc::new(StaticIdentity::anonymous()),
            locks: config.key_locks(),
            config: Arc::new(config),
        }
    }

    /// Replace the identifier generator.
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the exchange policy.
    #[must_use]
    pub fn with_exchange_policy(mut self, policy: Arc<dyn ExchangePolicy>) -> Self {
        self.exchange_policy = policy;
        self
    }

    /// Replace the caller identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn CallerIdentity>) -> Self {
        self.identity = identity;
        self
    }
}

impl std::fmt::Debug for LedgerEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerEnvironment")
            .field("exchange_policy", &self.exchange_policy.name())
            .field("caller", &self.identity.current())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
