//! Error taxonomy for the wager-session engine.
//!
//! External integrators assert on exact failure categories, so every variant
//! keeps a stable, descriptive message.

use crate::session::SessionState;
use crate::types::{AccountId, Amount, CasinoId, SessionId, Token};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("invalid state transition: {op} not allowed in state {state}")]
    InvalidStateTransition {
        op: &'static str,
        state: SessionState,
    },

    #[error("session {0} has expired")]
    SessionExpired(SessionId),

    #[error("session {0} has not expired yet")]
    SessionNotExpired(SessionId),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("payout {payout} exceeds declared max win cap {cap}")]
    PayoutExceedsCap { payout: Amount, cap: Amount },

    #[error("token mismatch: expected {expected}, got {actual}")]
    TokenMismatch { expected: Token, actual: Token },

    #[error("token {0} is not listed")]
    TokenNotListed(Token),

    #[error("actor {0} is not authorized to perform this operation")]
    UnauthorizedActor(AccountId),

    #[error("counterparty {0} is not active")]
    CounterpartyInactive(CasinoId),

    #[error("no game listed for counterparty {0}")]
    GameNotListed(CasinoId),

    #[error("random counter exhausted")]
    ExhaustedCounter,

    #[error("invalid random range [{from}, {to})")]
    InvalidRange { from: u64, to: u64 },

    #[error("amount arithmetic overflow")]
    AmountOverflow,

    #[error("deposit must be positive, got {0}")]
    InvalidDeposit(Amount),

    #[error("payout cannot be negative")]
    NegativePayout,

    #[error("invalid session reference: {0:?}")]
    InvalidSessionReference(String),

    #[error("invalid max win declaration: {0}")]
    InvalidMaxWin(String),

    #[error("game callback misuse: {0}")]
    CallbackMisuse(&'static str),

    #[error("game rejected the operation: {0}")]
    GameRejected(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_stable_per_category() {
        let err = EngineError::InvalidStateTransition {
            op: "deposit",
            state: SessionState::ReqSignidicePart1,
        };
        assert_eq!(
            err.to_string(),
            "invalid state transition: deposit not allowed in state req_signidice_part_1"
        );

        assert_eq!(
            EngineError::SessionNotFound(7).to_string(),
            "session 7 not found"
        );
        assert_eq!(
            EngineError::InvalidSessionReference("abc".into()).to_string(),
            "invalid session reference: \"abc\""
        );
    }
}
