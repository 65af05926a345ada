//! Session record, lifecycle states and the keyed session store.

use crate::errors::{EngineError, EngineResult};
use crate::types::{AccountId, Amount, CasinoId, Digest, SessionId, Token};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a wager session.
///
/// Forward order: `ReqAllowDeposit → ReqStart → ReqAction` with the
/// `ReqAction ⇄ ReqSignidicePart1 ⇄ ReqSignidicePart2` randomness cycle in
/// between. `Finished` (settled by the game) and `Failed` (settled by the
/// timeout close) are terminal; a session in either is erased immediately
/// and its id may be reused by a new, unrelated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    ReqAllowDeposit,
    ReqStart,
    ReqAction,
    ReqSignidicePart1,
    ReqSignidicePart2,
    Finished,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::ReqAllowDeposit => "req_allow_deposit",
            SessionState::ReqStart => "req_start",
            SessionState::ReqAction => "req_action",
            SessionState::ReqSignidicePart1 => "req_signidice_part_1",
            SessionState::ReqSignidicePart2 => "req_signidice_part_2",
            SessionState::Finished => "finished",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One in-progress wager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Externally supplied primary key.
    pub id: SessionId,
    /// Bound at game start; `None` until the counterparty is validated.
    pub casino_id: Option<CasinoId>,
    /// Per-engine monotonic counter value, entropy input only.
    pub seq: u64,
    pub player: AccountId,
    pub state: SessionState,
    /// Settlement currency, fixed at creation.
    pub token: Token,
    /// Counterparty parameters snapshotted at game start and frozen.
    pub params: Vec<(u16, u64)>,
    /// Total escrowed stake, real plus bonus.
    pub deposit: Amount,
    /// Portion of `deposit` sourced from non-withdrawable bonus credit.
    pub bonus_deposit: Amount,
    /// Current randomness-protocol state.
    pub digest: Digest,
    /// Unix seconds of the last state-changing operation.
    pub last_update: u64,
    /// Declared maximum player profit for the current pending action.
    pub last_max_win: Amount,
    /// True once the player has taken at least one game action.
    pub acted: bool,
}

impl Session {
    pub(crate) fn create(
        id: SessionId,
        seq: u64,
        player: AccountId,
        deposit: Amount,
        bonus_deposit: Amount,
        now: u64,
    ) -> Self {
        let token = deposit.token().clone();
        Self {
            id,
            casino_id: None,
            seq,
            player,
            state: SessionState::ReqStart,
            token: token.clone(),
            params: Vec::new(),
            deposit,
            bonus_deposit,
            digest: Digest::default(),
            last_update: now,
            last_max_win: Amount::zero(token),
            acted: false,
        }
    }

    pub fn expired(&self, now: u64, ttl_secs: u64) -> bool {
        now.saturating_sub(self.last_update) > ttl_secs
    }

    /// First value of the given snapshotted parameter type.
    pub fn param(&self, param_type: u16) -> Option<u64> {
        self.params
            .iter()
            .find(|(ty, _)| *ty == param_type)
            .map(|(_, value)| *value)
    }

    pub(crate) fn touch(&mut self, now: u64) {
        self.last_update = now;
    }
}

/// Keyed table of live sessions.
///
/// Mutation discipline is read-clone, guard, commit: callers fetch an owned
/// copy, validate and mutate it, then write it back in one step, so a failed
/// guard never leaves a partially mutated record visible.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, id: SessionId) -> Option<Session> {
        self.sessions.get(&id).map(|entry| entry.clone())
    }

    pub fn get(&self, id: SessionId) -> EngineResult<Session> {
        self.find(id).ok_or(EngineError::SessionNotFound(id))
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Insert a freshly created session. The id must be free.
    pub(crate) fn emplace(&self, session: Session) -> EngineResult<()> {
        let id = session.id;
        match self.sessions.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EngineError::InvalidStateTransition {
                op: "emplace",
                state: SessionState::ReqStart,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Write back a mutated copy of an existing session.
    pub(crate) fn commit(&self, session: Session) {
        self.sessions.insert(session.id, session);
    }

    pub(crate) fn erase(&self, id: SessionId) -> EngineResult<Session> {
        self.sessions
            .remove(&id)
            .map(|(_, session)| session)
            .ok_or(EngineError::SessionNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
