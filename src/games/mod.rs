//! Game plug-in surface and the bundled games.

use crate::engine::GameContext;
use crate::errors::EngineResult;
use crate::session::Session;
use crate::types::Digest;

pub mod dice;
pub mod stub;

pub use dice::DiceGame;
pub use stub::StubGame;

/// Game logic hooked into the engine's session lifecycle.
///
/// Each callback runs synchronously inside the triggering operation and must
/// record its next step through the [`GameContext`]; returning an error
/// aborts the whole operation with nothing committed.
pub trait GameHandler: Send + Sync {
    /// Session bound to a counterparty, parameters snapshotted.
    fn on_new_game(&self, ctx: &mut GameContext) -> EngineResult<()>;

    /// Player action of `action_type` with free-form numeric parameters.
    fn on_action(&self, ctx: &mut GameContext, action_type: u16, params: &[u64])
        -> EngineResult<()>;

    /// Both signidice phases verified; `digest` is the final protocol state.
    fn on_random(&self, ctx: &mut GameContext, digest: Digest) -> EngineResult<()>;

    /// Session settled and about to be erased, by the game or by timeout.
    /// Games drop any per-session bookkeeping here.
    fn on_finish(&self, _session: &Session) {}
}
