//! Croupier: a wager-session engine with provably fair randomness.
//!
//! One session tracks a single player's stake through a small state machine:
//! funds arrive by deposit, a game is started against a registered
//! counterparty, and each wager is resolved by two-phase commit-reveal
//! randomness ("signidice") in which the platform and the counterparty each
//! sign the evolving session digest. Settlement is bonus-aware and capped by
//! the max win the game declared before randomness was drawn; stalled
//! sessions are recoverable by anyone through the timeout close path.
//!
//! Game logic plugs in through [`games::GameHandler`]; the host platform
//! plugs in through the traits in [`platform`].

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod games;
pub mod logging;
pub mod platform;
pub mod rng;
pub mod session;
pub mod settlement;
pub mod signidice;
pub mod testing;
pub mod types;

pub use config::{ConfigLoader, EngineConfig};
pub use engine::{DepositSource, GameContext, GameEngine};
pub use errors::{EngineError, EngineResult};
pub use events::SessionEvent;
pub use games::GameHandler;
pub use session::{Session, SessionState};
pub use types::{AccountId, Amount, CasinoId, Digest, SessionId, Token};
