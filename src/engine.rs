//! Session lifecycle orchestration.
//!
//! `GameEngine` owns the session store and drives every operation: deposits,
//! game start, player actions, both signidice phases, settlement and the
//! timeout close path. Game logic is plugged in through [`GameHandler`] and
//! talks back through a [`GameContext`], which records exactly one
//! continuation per callback. The engine validates the continuation against
//! the session state before anything is committed, so a misbehaving game
//! cannot leave a session half-transitioned.

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::events::SessionEvent;
use crate::games::GameHandler;
use crate::platform::{Authorizer, Clock, EventSink, PlatformRegistry, Treasury};
use crate::session::{Session, SessionState, SessionStore};
use crate::settlement::{self, SettlementPlan, TransferStep};
use crate::signidice;
use crate::types::{AccountId, Amount, CasinoId, SessionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Origin of deposited funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositSource {
    Real,
    Bonus,
}

/// The single next step a game callback may record.
#[derive(Debug, Clone, PartialEq)]
enum Continuation {
    RequireAction { action_type: u16, need_deposit: bool },
    RequireRandom,
    Finish { payout: Amount, msg: Option<Vec<u8>> },
}

/// Mutable view of one session handed to a game callback.
///
/// Callbacks mutate the session only through these methods. At most one
/// continuation may be recorded; `update_max_win` and `send_message` are
/// side channels that queue events without consuming the continuation slot.
pub struct GameContext {
    session: Session,
    continuation: Option<Continuation>,
    queued: Vec<SessionEvent>,
}

impl GameContext {
    fn new(session: Session) -> Self {
        Self {
            session,
            continuation: None,
            queued: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Snapshotted counterparty parameter, by type tag.
    pub fn get_param(&self, param_type: u16) -> Option<u64> {
        self.session.param(param_type)
    }

    fn record(&mut self, continuation: Continuation) -> EngineResult<()> {
        if self.continuation.is_some() {
            return Err(EngineError::CallbackMisuse(
                "continuation already recorded for this callback",
            ));
        }
        self.continuation = Some(continuation);
        Ok(())
    }

    /// Ask the player for another action of the given type.
    pub fn require_action(&mut self, action_type: u16) -> EngineResult<()> {
        self.require_action_inner(action_type, false)
    }

    /// Ask the player for another action that must carry a further deposit.
    pub fn require_action_with_deposit(&mut self, action_type: u16) -> EngineResult<()> {
        self.require_action_inner(action_type, true)
    }

    fn require_action_inner(&mut self, action_type: u16, need_deposit: bool) -> EngineResult<()> {
        match self.session.state {
            SessionState::ReqStart | SessionState::ReqAction | SessionState::ReqSignidicePart2 => {
                self.record(Continuation::RequireAction {
                    action_type,
                    need_deposit,
                })
            }
            state => Err(EngineError::InvalidStateTransition {
                op: "require_action",
                state,
            }),
        }
    }

    /// Request the two-phase randomness protocol over the current digest.
    pub fn require_random(&mut self) -> EngineResult<()> {
        match self.session.state {
            SessionState::ReqAction | SessionState::ReqSignidicePart2 => {
                self.record(Continuation::RequireRandom)
            }
            state => Err(EngineError::InvalidStateTransition {
                op: "require_random",
                state,
            }),
        }
    }

    /// Settle the session at the given total payout (deposit included).
    pub fn finish_game(&mut self, payout: Amount) -> EngineResult<()> {
        self.finish_inner(payout, None)
    }

    /// Settle with an opaque result message attached to the finish event.
    pub fn finish_game_with_message(&mut self, payout: Amount, msg: Vec<u8>) -> EngineResult<()> {
        self.finish_inner(payout, Some(msg))
    }

    fn finish_inner(&mut self, payout: Amount, msg: Option<Vec<u8>>) -> EngineResult<()> {
        match self.session.state {
            SessionState::ReqAction | SessionState::ReqSignidicePart2 => {
                self.record(Continuation::Finish { payout, msg })
            }
            state => Err(EngineError::InvalidStateTransition {
                op: "finish_game",
                state,
            }),
        }
    }

    /// Declare the worst-case total payout of the pending wager. Must be
    /// called before randomness is requested so the counterparty's exposure
    /// is announced up front; any later payout above this cap is rejected.
    pub fn update_max_win(&mut self, total_cap: Amount) -> EngineResult<()> {
        match self.session.state {
            SessionState::ReqAction | SessionState::ReqAllowDeposit => {}
            state => {
                return Err(EngineError::InvalidStateTransition {
                    op: "update_max_win",
                    state,
                })
            }
        }
        let profit = total_cap.checked_sub(&self.session.deposit)?;
        if profit.is_negative() {
            return Err(EngineError::InvalidMaxWin(format!(
                "cap {total_cap} is below the deposit {}",
                self.session.deposit
            )));
        }
        let delta = profit.checked_sub(&self.session.last_max_win)?;
        self.session.last_max_win = profit;
        self.queued.push(SessionEvent::MaxWinChanged {
            session_id: self.session.id,
            delta,
        });
        Ok(())
    }

    /// Queue an informational message toward the event bus.
    pub fn send_message(&mut self, payload: Vec<u8>) {
        self.queued.push(SessionEvent::GameMessage {
            session_id: self.session.id,
            payload,
        });
    }
}

pub struct GameEngine<G: GameHandler> {
    config: EngineConfig,
    store: SessionStore,
    game: G,
    registry: Arc<dyn PlatformRegistry>,
    treasury: Arc<dyn Treasury>,
    events: Arc<dyn EventSink>,
    auth: Arc<dyn Authorizer>,
    clock: Arc<dyn Clock>,
    session_seq: AtomicU64,
}

impl<G: GameHandler> GameEngine<G> {
    pub fn new(
        config: EngineConfig,
        game: G,
        registry: Arc<dyn PlatformRegistry>,
        treasury: Arc<dyn Treasury>,
        events: Arc<dyn EventSink>,
        auth: Arc<dyn Authorizer>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store: SessionStore::new(),
            game,
            registry,
            treasury,
            events,
            auth,
            clock,
            session_seq: AtomicU64::new(0),
        })
    }

    /// Resume the per-session entropy counter, e.g. after a restart.
    pub fn with_sequence_start(self, seq: u64) -> Self {
        self.session_seq.store(seq, Ordering::SeqCst);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self, id: SessionId) -> EngineResult<Session> {
        self.store.get(id)
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Accept funds for a session. Creates the session when the id is free;
    /// otherwise tops up an existing one awaiting a deposit.
    pub fn deposit(
        &self,
        session_id: SessionId,
        from: &AccountId,
        amount: Amount,
        source: DepositSource,
    ) -> EngineResult<()> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidDeposit(amount));
        }

        match self.store.find(session_id) {
            None => {
                if !self.registry.token_is_listed(amount.token()) {
                    return Err(EngineError::TokenNotListed(amount.token().clone()));
                }
                let bonus = match source {
                    DepositSource::Bonus => amount.clone(),
                    DepositSource::Real => Amount::zero(amount.token().clone()),
                };
                let seq = self.session_seq.fetch_add(1, Ordering::SeqCst);
                let session = Session::create(
                    session_id,
                    seq,
                    from.clone(),
                    amount.clone(),
                    bonus,
                    self.clock.now(),
                );
                self.store.emplace(session)?;
                info!(session_id, player = %from, %amount, ?source, "session opened");
                Ok(())
            }
            Some(mut session) => {
                if &session.player != from {
                    return Err(EngineError::UnauthorizedActor(from.clone()));
                }
                self.check_alive(&session)?;
                match session.state {
                    SessionState::ReqAllowDeposit | SessionState::ReqAction => {}
                    state => {
                        return Err(EngineError::InvalidStateTransition {
                            op: "deposit",
                            state,
                        })
                    }
                }
                session.deposit = session.deposit.checked_add(&amount)?;
                if source == DepositSource::Bonus {
                    session.bonus_deposit = session.bonus_deposit.checked_add(&amount)?;
                }
                session.state = SessionState::ReqAction;
                session.touch(self.clock.now());
                debug!(session_id, %amount, "extra deposit accepted");
                self.store.commit(session);
                Ok(())
            }
        }
    }

    /// Deposit routed by a transfer memo carrying the decimal session id.
    pub fn deposit_with_memo(
        &self,
        from: &AccountId,
        amount: Amount,
        source: DepositSource,
        memo: &str,
    ) -> EngineResult<SessionId> {
        let session_id = parse_session_reference(memo)?;
        self.deposit(session_id, from, amount, source)?;
        Ok(session_id)
    }

    /// Bind the session to a counterparty and hand control to the game.
    pub fn start_game(&self, session_id: SessionId, casino_id: CasinoId) -> EngineResult<()> {
        let mut session = self.store.get(session_id)?;
        if session.state != SessionState::ReqStart {
            return Err(EngineError::InvalidStateTransition {
                op: "start_game",
                state: session.state,
            });
        }
        self.check_alive(&session)?;
        if !self.registry.casino_is_active(casino_id) {
            return Err(EngineError::CounterpartyInactive(casino_id));
        }
        if !self.registry.game_is_listed(casino_id) {
            return Err(EngineError::GameNotListed(casino_id));
        }

        session.casino_id = Some(casino_id);
        session.params = self.registry.game_params(casino_id);
        session.digest = signidice::session_seed(
            &self.config.engine_id,
            casino_id,
            session.seq,
            &session.player,
        );
        session.touch(self.clock.now());
        info!(session_id, casino_id, "game started");

        self.run_callback(
            session,
            vec![SessionEvent::GameStarted { session_id }],
            |ctx| self.game.on_new_game(ctx),
        )
    }

    /// Player action dispatched into the game.
    pub fn game_action(
        &self,
        session_id: SessionId,
        actor: &AccountId,
        action_type: u16,
        params: &[u64],
    ) -> EngineResult<()> {
        let mut session = self.store.get(session_id)?;
        if actor != &session.player {
            self.auth
                .require_capability(actor, "game_action")
                .map_err(|_| EngineError::UnauthorizedActor(actor.clone()))?;
        }
        self.check_alive(&session)?;
        match session.state {
            SessionState::ReqAction | SessionState::ReqAllowDeposit => {}
            state => {
                return Err(EngineError::InvalidStateTransition {
                    op: "game_action",
                    state,
                })
            }
        }
        // Acting on a pending extra-deposit request declines it; the session
        // moves to ReqAction before the callback so its continuation guards
        // see the post-action state.
        session.state = SessionState::ReqAction;
        session.acted = true;
        session.touch(self.clock.now());
        debug!(session_id, action_type, ?params, "game action");

        self.run_callback(session, Vec::new(), |ctx| {
            self.game.on_action(ctx, action_type, params)
        })
    }

    /// Phase 1: platform signature over the committed digest.
    pub fn signidice_part_1(&self, session_id: SessionId, signature: &[u8]) -> EngineResult<()> {
        let mut session = self.store.get(session_id)?;
        if session.state != SessionState::ReqSignidicePart1 {
            return Err(EngineError::InvalidStateTransition {
                op: "signidice_part_1",
                state: session.state,
            });
        }
        self.check_alive(&session)?;
        let key = self.registry.platform_key();
        session.digest = signidice::verify_and_advance(&session.digest, signature, &key)?;
        session.state = SessionState::ReqSignidicePart2;
        session.touch(self.clock.now());
        debug!(session_id, digest = %session.digest, "signidice phase 1 advanced");
        self.events.emit(SessionEvent::SignidicePart2Request {
            session_id,
            digest: session.digest,
        });
        self.store.commit(session);
        Ok(())
    }

    /// Phase 2: counterparty signature; the resulting digest feeds the game.
    pub fn signidice_part_2(&self, session_id: SessionId, signature: &[u8]) -> EngineResult<()> {
        let mut session = self.store.get(session_id)?;
        if session.state != SessionState::ReqSignidicePart2 {
            return Err(EngineError::InvalidStateTransition {
                op: "signidice_part_2",
                state: session.state,
            });
        }
        self.check_alive(&session)?;
        let casino_id = session
            .casino_id
            .ok_or(EngineError::InvalidStateTransition {
                op: "signidice_part_2",
                state: session.state,
            })?;
        let key = self
            .registry
            .casino_key(casino_id)
            .ok_or(EngineError::CounterpartyInactive(casino_id))?;
        session.digest = signidice::verify_and_advance(&session.digest, signature, &key)?;
        session.touch(self.clock.now());
        debug!(session_id, digest = %session.digest, "signidice phase 2 advanced");

        let digest = session.digest;
        self.run_callback(session, Vec::new(), |ctx| self.game.on_random(ctx, digest))
    }

    /// Close an expired session. Anyone may call this; the settlement branch
    /// depends on where the session stalled.
    pub fn close(&self, session_id: SessionId) -> EngineResult<()> {
        let mut session = self.store.get(session_id)?;
        let now = self.clock.now();
        if !session.expired(now, self.config.session_ttl_secs) {
            return Err(EngineError::SessionNotExpired(session_id));
        }

        // A session stalled waiting on the counterparty's phase-2 signature
        // defaults in the player's favor at the full declared cap. A session
        // stalled on the player's first move refunds; one abandoned mid-play
        // after acting forfeits the stake.
        let payout = match session.state {
            SessionState::ReqSignidicePart2 => {
                session.deposit.checked_add(&session.last_max_win)?
            }
            SessionState::ReqStart | SessionState::ReqSignidicePart1 => session.deposit.clone(),
            SessionState::ReqAction | SessionState::ReqAllowDeposit => {
                if session.acted {
                    Amount::zero(session.token.clone())
                } else {
                    session.deposit.clone()
                }
            }
            SessionState::Finished | SessionState::Failed => {
                return Err(EngineError::InvalidStateTransition {
                    op: "close",
                    state: session.state,
                })
            }
        };

        let plan = settlement::build_plan(&session, &payout)?;
        self.execute_plan(&session, &plan)?;
        session.state = SessionState::Failed;
        warn!(session_id, state = %session.state, player_win = %plan.player_win, "session closed by timeout");
        self.events.emit(SessionEvent::GameFailed {
            session_id,
            player_win: plan.player_win,
        });
        self.game.on_finish(&session);
        self.store.erase(session_id)?;
        Ok(())
    }

    fn check_alive(&self, session: &Session) -> EngineResult<()> {
        if session.expired(self.clock.now(), self.config.session_ttl_secs) {
            return Err(EngineError::SessionExpired(session.id));
        }
        Ok(())
    }

    /// Run one game callback and apply its recorded continuation. Nothing is
    /// committed and no event leaves until the continuation validates, so a
    /// callback error rolls the whole operation back. `lead_events` are
    /// emitted first on success, ahead of anything the callback queued.
    fn run_callback<F>(
        &self,
        session: Session,
        lead_events: Vec<SessionEvent>,
        callback: F,
    ) -> EngineResult<()>
    where
        F: FnOnce(&mut GameContext) -> EngineResult<()>,
    {
        let mut ctx = GameContext::new(session);
        callback(&mut ctx)?;

        let GameContext {
            mut session,
            continuation,
            queued: callback_events,
        } = ctx;
        let mut queued = lead_events;
        queued.extend(callback_events);
        let session_id = session.id;

        match continuation {
            None => {
                // The game deferred; the session stays put and the timeout
                // path remains available.
                for event in queued {
                    self.events.emit(event);
                }
                self.store.commit(session);
            }
            Some(Continuation::RequireAction {
                action_type,
                need_deposit,
            }) => {
                session.state = if need_deposit {
                    SessionState::ReqAllowDeposit
                } else {
                    SessionState::ReqAction
                };
                for event in queued {
                    self.events.emit(event);
                }
                self.events.emit(SessionEvent::ActionRequest {
                    session_id,
                    action_type,
                    need_deposit,
                });
                self.store.commit(session);
            }
            Some(Continuation::RequireRandom) => {
                session.state = SessionState::ReqSignidicePart1;
                for event in queued {
                    self.events.emit(event);
                }
                self.events.emit(SessionEvent::SignidicePart1Request {
                    session_id,
                    digest: session.digest,
                });
                self.store.commit(session);
            }
            Some(Continuation::Finish { payout, msg }) => {
                let plan = settlement::build_plan(&session, &payout)?;
                self.execute_plan(&session, &plan)?;
                session.state = SessionState::Finished;
                info!(session_id, player_win = %plan.player_win, "session finished");
                for event in queued {
                    self.events.emit(event);
                }
                self.events.emit(SessionEvent::GameFinished {
                    session_id,
                    player_win: plan.player_win,
                    msg,
                });
                self.game.on_finish(&session);
                self.store.erase(session_id)?;
            }
        }
        Ok(())
    }

    /// Execute a settlement plan through the treasury. Counterparty-facing
    /// steps are skipped for a session that never bound one; its bonus stake
    /// has no pool to return to and is burned.
    fn execute_plan(&self, session: &Session, plan: &SettlementPlan) -> EngineResult<()> {
        let memo = format!("session {}", session.id);
        for step in &plan.steps {
            match (step, session.casino_id) {
                (TransferStep::EscrowToPlayer { amount }, _) => {
                    self.treasury.transfer(&session.player, amount, &memo)?;
                }
                (TransferStep::EscrowToCasino { amount }, Some(casino_id)) => {
                    self.treasury.casino_collect(casino_id, amount, &memo)?;
                }
                (TransferStep::CasinoToPlayer { amount }, Some(casino_id)) => {
                    self.treasury
                        .casino_transfer(casino_id, &session.player, amount)?;
                }
                (TransferStep::CasinoBonusToPlayer { amount }, Some(casino_id)) => {
                    self.treasury
                        .casino_bonus_transfer(casino_id, &session.player, amount)?;
                }
                (_, None) => {
                    debug!(session_id = session.id, ?step, "skipping counterparty step, no counterparty bound");
                }
            }
        }
        Ok(())
    }
}

/// Parse a transfer memo of the form `"<decimal session id>"`.
fn parse_session_reference(memo: &str) -> EngineResult<SessionId> {
    memo.trim()
        .parse::<SessionId>()
        .map_err(|_| EngineError::InvalidSessionReference(memo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_reference_parses_trimmed_decimal() {
        assert_eq!(parse_session_reference(" 42 ").unwrap(), 42);
        assert_eq!(parse_session_reference("0").unwrap(), 0);
    }

    #[test]
    fn session_reference_rejects_garbage() {
        for memo in ["", "abc", "-1", "1.5", "42x"] {
            assert!(matches!(
                parse_session_reference(memo),
                Err(EngineError::InvalidSessionReference(_))
            ));
        }
    }
}
