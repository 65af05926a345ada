//! Roll-over dice.
//!
//! The player picks a number in (0, 100) and wins when the drawn roll is
//! greater than or equal to it. The gross payout is
//! `deposit * 98 / (100 - number)`, a 2% edge over the fair multiplier,
//! clamped by the counterparty's max-payout parameter.

use crate::engine::GameContext;
use crate::errors::{EngineError, EngineResult};
use crate::games::GameHandler;
use crate::rng::{DigestRng, Rng};
use crate::session::Session;
use crate::types::{Amount, Digest, SessionId};
use dashmap::DashMap;
use tracing::debug;

/// Minimum stake, raw amount units.
pub const MIN_BET_PARAM: u16 = 0;
/// Maximum stake, raw amount units.
pub const MAX_BET_PARAM: u16 = 1;
/// Gross payout ceiling, raw amount units.
pub const MAX_PAYOUT_PARAM: u16 = 2;

/// The only action type: roll with `params = [number]`.
pub const ROLL_ACTION: u16 = 0;

const RANGE: u64 = 100;
const PAYOUT_PERCENT: i128 = 98;

#[derive(Default)]
pub struct DiceGame {
    rolls: DashMap<SessionId, u64>,
}

impl DiceGame {
    pub fn new() -> Self {
        Self::default()
    }

    fn win_payout(session: &Session, number: u64) -> EngineResult<Amount> {
        let gross =
            (session.deposit.units() as i128) * PAYOUT_PERCENT / (RANGE - number) as i128;
        let mut units = i64::try_from(gross).map_err(|_| EngineError::AmountOverflow)?;
        if let Some(cap) = session.param(MAX_PAYOUT_PARAM) {
            units = units.min(i64::try_from(cap).map_err(|_| EngineError::AmountOverflow)?);
        }
        Ok(Amount::new(units, session.token.clone()))
    }
}

impl GameHandler for DiceGame {
    fn on_new_game(&self, ctx: &mut GameContext) -> EngineResult<()> {
        let session = ctx.session();
        let min_bet = session
            .param(MIN_BET_PARAM)
            .ok_or_else(|| EngineError::GameRejected("min bet parameter missing".into()))?;
        let max_bet = session
            .param(MAX_BET_PARAM)
            .ok_or_else(|| EngineError::GameRejected("max bet parameter missing".into()))?;
        session
            .param(MAX_PAYOUT_PARAM)
            .ok_or_else(|| EngineError::GameRejected("max payout parameter missing".into()))?;

        let stake = session.deposit.units();
        if stake < i64::try_from(min_bet).map_err(|_| EngineError::AmountOverflow)?
            || stake > i64::try_from(max_bet).map_err(|_| EngineError::AmountOverflow)?
        {
            return Err(EngineError::GameRejected(format!(
                "stake {} outside listed bet range",
                session.deposit
            )));
        }

        ctx.require_action(ROLL_ACTION)
    }

    fn on_action(
        &self,
        ctx: &mut GameContext,
        action_type: u16,
        params: &[u64],
    ) -> EngineResult<()> {
        if action_type != ROLL_ACTION {
            return Err(EngineError::GameRejected(format!(
                "unknown action type {action_type}"
            )));
        }
        let number = match params {
            [number] if (1..RANGE).contains(number) => *number,
            _ => {
                return Err(EngineError::GameRejected(
                    "roll takes one number in (0, 100)".into(),
                ))
            }
        };

        let session = ctx.session();
        let payout = Self::win_payout(session, number)?;
        // The declared cap may not drop below the stake; a sub-deposit
        // payout is still a legal bet, just declared at the stake.
        let cap = if payout.units() < session.deposit.units() {
            session.deposit.clone()
        } else {
            payout.clone()
        };
        debug!(session_id = session.id, number, %payout, "roll placed");

        self.rolls.insert(session.id, number);
        ctx.update_max_win(cap)?;
        ctx.require_random()
    }

    fn on_random(&self, ctx: &mut GameContext, digest: Digest) -> EngineResult<()> {
        let session_id = ctx.session().id;
        let number = self
            .rolls
            .get(&session_id)
            .map(|entry| *entry)
            .ok_or(EngineError::CallbackMisuse("no roll recorded for session"))?;

        let mut rng = DigestRng::new(digest);
        let roll = rng.next(0, RANGE)?;
        debug!(session_id, number, roll, "roll resolved");

        if roll >= number {
            let payout = Self::win_payout(ctx.session(), number)?;
            ctx.finish_game_with_message(payout, roll.to_be_bytes().to_vec())
        } else {
            let lost = Amount::zero(ctx.session().token.clone());
            ctx.finish_game_with_message(lost, roll.to_be_bytes().to_vec())
        }
    }

    fn on_finish(&self, session: &Session) {
        self.rolls.remove(&session.id);
    }
}
