//! Settlement plan computation.
//!
//! Pure payout math over a session snapshot: win-cap enforcement, the
//! proportional real/bonus split, and the resulting transfer steps. The
//! engine executes a plan through the `Treasury` trait afterward, so every
//! split rule is unit-testable without collaborators.

use crate::errors::{EngineError, EngineResult};
use crate::session::Session;
use crate::types::Amount;
use serde::Serialize;

/// One transfer instruction of a settlement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TransferStep {
    /// Engine escrow to the player (real principal and real payout parts).
    EscrowToPlayer { amount: Amount },
    /// Engine escrow to the counterparty (its win on a lost wager).
    EscrowToCasino { amount: Amount },
    /// Counterparty real balance to the player.
    CasinoToPlayer { amount: Amount },
    /// Counterparty bonus pool to the player.
    CasinoBonusToPlayer { amount: Amount },
}

/// Complete settlement of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementPlan {
    /// Signed player profit: `payout - deposit`.
    pub player_win: Amount,
    pub steps: Vec<TransferStep>,
    /// Bonus principal destroyed by a loss; informational only.
    pub burned_bonus: Amount,
}

/// Build the settlement plan for paying `payout` (total, including the
/// returned deposit) to the session's player.
///
/// Fails `PayoutExceedsCap` when the profit exceeds the declared
/// `last_max_win` — the core anti-fraud invariant: a game can never pay more
/// than it previously announced to the counterparty.
pub fn build_plan(session: &Session, payout: &Amount) -> EngineResult<SettlementPlan> {
    if payout.token() != &session.token {
        return Err(EngineError::TokenMismatch {
            expected: session.token.clone(),
            actual: payout.token().clone(),
        });
    }
    if payout.is_negative() {
        return Err(EngineError::NegativePayout);
    }

    let player_win = payout.checked_sub(&session.deposit)?;
    if player_win.units() > session.last_max_win.units() {
        return Err(EngineError::PayoutExceedsCap {
            payout: payout.clone(),
            cap: session.deposit.checked_add(&session.last_max_win)?,
        });
    }

    let mut steps = Vec::new();
    let zero = Amount::zero(session.token.clone());

    if player_win.is_positive() {
        // Win: profit splits proportionally to the bonus share of the stake.
        let bonus_win = player_win.mul_div(&session.bonus_deposit, &session.deposit)?;
        let real_win = player_win.checked_sub(&bonus_win)?;
        let real_principal = session.deposit.checked_sub(&session.bonus_deposit)?;
        let bonus_total = session.bonus_deposit.checked_add(&bonus_win)?;

        if real_win.is_positive() {
            steps.push(TransferStep::CasinoToPlayer { amount: real_win });
        }
        if bonus_total.is_positive() {
            steps.push(TransferStep::CasinoBonusToPlayer { amount: bonus_total });
        }
        if real_principal.is_positive() {
            steps.push(TransferStep::EscrowToPlayer {
                amount: real_principal,
            });
        }

        Ok(SettlementPlan {
            player_win,
            steps,
            burned_bonus: zero,
        })
    } else {
        // Loss or tie: the payout itself splits proportionally; the rest of
        // the real deposit is the counterparty's win, lost bonus is burned.
        let bonus_part = payout.mul_div(&session.bonus_deposit, &session.deposit)?;
        let real_part = payout.checked_sub(&bonus_part)?;
        let real_deposit = session.deposit.checked_sub(&session.bonus_deposit)?;
        let casino_win = real_deposit.checked_sub(&real_part)?;
        let burned_bonus = session.bonus_deposit.checked_sub(&bonus_part)?;

        if real_part.is_positive() {
            steps.push(TransferStep::EscrowToPlayer { amount: real_part });
        }
        if bonus_part.is_positive() {
            steps.push(TransferStep::CasinoBonusToPlayer { amount: bonus_part });
        }
        if casino_win.is_positive() {
            steps.push(TransferStep::EscrowToCasino { amount: casino_win });
        }

        Ok(SettlementPlan {
            player_win,
            steps,
            burned_bonus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, Token};

    fn bet(units: i64) -> Amount {
        Amount::new(units, Token::new("BET"))
    }

    fn session(deposit: i64, bonus: i64, max_win: i64) -> Session {
        let mut s = Session::create(
            1,
            0,
            AccountId::from("alice"),
            bet(deposit),
            bet(bonus),
            0,
        );
        s.last_max_win = bet(max_win);
        s
    }

    #[test]
    fn plain_win_pays_profit_from_casino_and_returns_principal() {
        // deposit 5, cap 2.5 profit, payout 7.5
        let s = session(50_000, 0, 25_000);
        let plan = build_plan(&s, &bet(75_000)).unwrap();

        assert_eq!(plan.player_win, bet(25_000));
        assert!(plan.burned_bonus.is_zero());
        assert_eq!(
            plan.steps,
            vec![
                TransferStep::CasinoToPlayer { amount: bet(25_000) },
                TransferStep::EscrowToPlayer { amount: bet(50_000) },
            ]
        );
    }

    #[test]
    fn mixed_win_splits_proportionally() {
        // 2 real + 8 bonus = 10 deposit; win 10 (payout 20)
        let s = session(100_000, 80_000, 100_000);
        let plan = build_plan(&s, &bet(200_000)).unwrap();

        assert_eq!(plan.player_win, bet(100_000));
        assert_eq!(
            plan.steps,
            vec![
                // real_win = 10 - 8 = 2
                TransferStep::CasinoToPlayer { amount: bet(20_000) },
                // bonus_deposit 8 + bonus_win 8 = 16
                TransferStep::CasinoBonusToPlayer { amount: bet(160_000) },
                // real principal back
                TransferStep::EscrowToPlayer { amount: bet(20_000) },
            ]
        );
    }

    #[test]
    fn total_loss_forfeits_real_and_burns_bonus() {
        let s = session(100_000, 80_000, 0);
        let plan = build_plan(&s, &bet(0)).unwrap();

        assert_eq!(plan.player_win, bet(-100_000));
        assert_eq!(plan.burned_bonus, bet(80_000));
        assert_eq!(
            plan.steps,
            vec![TransferStep::EscrowToCasino { amount: bet(20_000) }]
        );
    }

    #[test]
    fn tie_refunds_everything_in_kind() {
        let s = session(100_000, 80_000, 0);
        let plan = build_plan(&s, &bet(100_000)).unwrap();

        assert_eq!(plan.player_win, bet(0));
        assert!(plan.burned_bonus.is_zero());
        assert_eq!(
            plan.steps,
            vec![
                TransferStep::EscrowToPlayer { amount: bet(20_000) },
                TransferStep::CasinoBonusToPlayer { amount: bet(80_000) },
            ]
        );
    }

    #[test]
    fn partial_loss_splits_payout_proportionally() {
        // deposit 10 (8 bonus), payout 5: bonus part 4, real part 1,
        // casino keeps 2 - 1 = 1 real, burned bonus 8 - 4 = 4.
        let s = session(100_000, 80_000, 0);
        let plan = build_plan(&s, &bet(50_000)).unwrap();

        assert_eq!(plan.player_win, bet(-50_000));
        assert_eq!(plan.burned_bonus, bet(40_000));
        assert_eq!(
            plan.steps,
            vec![
                TransferStep::EscrowToPlayer { amount: bet(10_000) },
                TransferStep::CasinoBonusToPlayer { amount: bet(40_000) },
                TransferStep::EscrowToCasino { amount: bet(10_000) },
            ]
        );
    }

    #[test]
    fn payout_above_cap_is_rejected() {
        let s = session(50_000, 0, 25_000);
        let err = build_plan(&s, &bet(75_001)).unwrap_err();
        assert_eq!(
            err,
            EngineError::PayoutExceedsCap {
                payout: bet(75_001),
                cap: bet(75_000),
            }
        );
    }

    #[test]
    fn undeclared_cap_rejects_any_profit() {
        let s = session(50_000, 0, 0);
        assert!(matches!(
            build_plan(&s, &bet(50_001)),
            Err(EngineError::PayoutExceedsCap { .. })
        ));
        // exact refund still fine
        assert!(build_plan(&s, &bet(50_000)).is_ok());
    }

    #[test]
    fn wrong_token_is_rejected() {
        let s = session(50_000, 0, 0);
        let usd = Amount::new(50_000, Token::new("USD"));
        assert!(matches!(
            build_plan(&s, &usd),
            Err(EngineError::TokenMismatch { .. })
        ));
    }

    #[test]
    fn negative_payout_is_rejected() {
        let s = session(50_000, 0, 0);
        assert_eq!(build_plan(&s, &bet(-1)), Err(EngineError::NegativePayout));
    }

    #[test]
    fn bonus_only_win_draws_nothing_real_from_casino() {
        // full-bonus stake of 5, win 5 (payout 10)
        let s = session(50_000, 50_000, 50_000);
        let plan = build_plan(&s, &bet(100_000)).unwrap();

        assert_eq!(
            plan.steps,
            vec![TransferStep::CasinoBonusToPlayer { amount: bet(100_000) }]
        );
    }
}
