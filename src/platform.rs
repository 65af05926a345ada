//! Collaborator seams the engine consumes but does not own.
//!
//! The host substrate supplies these: registry lookups, value transfer
//! execution, event delivery, capability checks and the clock. The engine
//! only calls through the traits; `testing` provides in-memory
//! implementations for harnesses.

use crate::errors::EngineResult;
use crate::events::SessionEvent;
use crate::types::{AccountId, Amount, CasinoId, Token};
use ed25519_dalek::VerifyingKey;
use std::time::{SystemTime, UNIX_EPOCH};

/// Read-only platform registry queries.
pub trait PlatformRegistry: Send + Sync {
    fn casino_is_active(&self, casino_id: CasinoId) -> bool;

    /// Whether this engine's game is listed at the given counterparty.
    fn game_is_listed(&self, casino_id: CasinoId) -> bool;

    /// Public key the platform counter-signs signidice phase 1 with.
    fn platform_key(&self) -> VerifyingKey;

    /// Public key registered for the counterparty (signidice phase 2).
    fn casino_key(&self, casino_id: CasinoId) -> Option<VerifyingKey>;

    /// Current game parameter set at the counterparty; snapshotted into the
    /// session at game start.
    fn game_params(&self, casino_id: CasinoId) -> Vec<(u16, u64)>;

    fn token_is_listed(&self, token: &Token) -> bool;
}

/// Value transfer execution. The engine computes settlement plans; the host
/// moves the funds.
pub trait Treasury: Send + Sync {
    /// Pay out of the engine's own escrow.
    fn transfer(&self, to: &AccountId, amount: &Amount, memo: &str) -> EngineResult<()>;

    /// Request a payment from the counterparty's real balance.
    fn casino_transfer(
        &self,
        casino_id: CasinoId,
        to: &AccountId,
        amount: &Amount,
    ) -> EngineResult<()>;

    /// Request a payment from the counterparty's bonus pool.
    fn casino_bonus_transfer(
        &self,
        casino_id: CasinoId,
        to: &AccountId,
        amount: &Amount,
    ) -> EngineResult<()>;

    /// Move engine escrow to the counterparty (its win on a lost wager).
    fn casino_collect(&self, casino_id: CasinoId, amount: &Amount, memo: &str)
        -> EngineResult<()>;
}

/// Outbound event delivery; fire-and-forget from the engine's perspective.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// Capability check against the platform's permission system.
pub trait Authorizer: Send + Sync {
    fn require_capability(&self, account: &AccountId, capability: &str) -> EngineResult<()>;
}

/// Permissive authorizer for hosts that authenticate upstream.
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn require_capability(&self, _account: &AccountId, _capability: &str) -> EngineResult<()> {
        Ok(())
    }
}

/// Time source, unix seconds. Abstracted so TTL behavior is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
