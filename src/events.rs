//! Typed session events emitted toward the external event bus.
//!
//! The engine produces these; it never interprets them. `player_win` is the
//! signed profit relative to the deposit, so a losing settlement carries a
//! negative value.

use crate::types::{Amount, Digest, SessionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    GameStarted {
        session_id: SessionId,
    },
    ActionRequest {
        session_id: SessionId,
        action_type: u16,
        need_deposit: bool,
    },
    SignidicePart1Request {
        session_id: SessionId,
        digest: Digest,
    },
    SignidicePart2Request {
        session_id: SessionId,
        digest: Digest,
    },
    GameFinished {
        session_id: SessionId,
        player_win: Amount,
        msg: Option<Vec<u8>>,
    },
    GameFailed {
        session_id: SessionId,
        player_win: Amount,
    },
    GameMessage {
        session_id: SessionId,
        payload: Vec<u8>,
    },
    /// Change in the counterparty's worst-case exposure, announced before any
    /// randomness is drawn so liquidity can be pre-authorized.
    MaxWinChanged {
        session_id: SessionId,
        delta: Amount,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::GameStarted { session_id }
            | SessionEvent::ActionRequest { session_id, .. }
            | SessionEvent::SignidicePart1Request { session_id, .. }
            | SessionEvent::SignidicePart2Request { session_id, .. }
            | SessionEvent::GameFinished { session_id, .. }
            | SessionEvent::GameFailed { session_id, .. }
            | SessionEvent::GameMessage { session_id, .. }
            | SessionEvent::MaxWinChanged { session_id, .. } => *session_id,
        }
    }
}
