//! Minimal game that walks one full lifecycle and always ties.
//!
//! Useful for wiring checks against a live platform and as scaffolding for
//! new games: one action, one randomness round, deposit returned.

use crate::engine::GameContext;
use crate::errors::EngineResult;
use crate::games::GameHandler;
use crate::types::Digest;

pub const STUB_ACTION: u16 = 0;

#[derive(Default)]
pub struct StubGame;

impl StubGame {
    pub fn new() -> Self {
        Self
    }
}

impl GameHandler for StubGame {
    fn on_new_game(&self, ctx: &mut GameContext) -> EngineResult<()> {
        ctx.require_action(STUB_ACTION)
    }

    fn on_action(&self, ctx: &mut GameContext, _action_type: u16, _params: &[u64]) -> EngineResult<()> {
        ctx.require_random()
    }

    fn on_random(&self, ctx: &mut GameContext, _digest: Digest) -> EngineResult<()> {
        let refund = ctx.session().deposit.clone();
        ctx.finish_game(refund)
    }
}
