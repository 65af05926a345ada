//! In-memory collaborators for exercising the engine without a platform.
//!
//! `TestBench` wires a [`GameEngine`] to a keyed registry, a recording
//! treasury, a recording event sink and a manually advanced clock. The
//! registry holds real signing keys, so both signidice phases run with
//! genuine ed25519 signatures.

use crate::config::EngineConfig;
use crate::engine::{DepositSource, GameEngine};
use crate::errors::{EngineError, EngineResult};
use crate::events::SessionEvent;
use crate::games::GameHandler;
use crate::platform::{AllowAll, Clock, EventSink, PlatformRegistry, Treasury};
use crate::types::{AccountId, Amount, CasinoId, Digest, SessionId, Token};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn guard<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}

struct CasinoEntry {
    key: SigningKey,
    active: bool,
    listed: bool,
    params: Vec<(u16, u64)>,
}

/// Registry with generated platform and per-casino signing keys.
pub struct TestRegistry {
    platform: SigningKey,
    casinos: RwLock<HashMap<CasinoId, CasinoEntry>>,
    tokens: RwLock<HashSet<Token>>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self {
            platform: SigningKey::generate(&mut OsRng),
            casinos: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashSet::new()),
        }
    }

    /// Register an active, listed casino with the given game parameters.
    pub fn add_casino(&self, casino_id: CasinoId, params: Vec<(u16, u64)>) {
        write(&self.casinos).insert(
            casino_id,
            CasinoEntry {
                key: SigningKey::generate(&mut OsRng),
                active: true,
                listed: true,
                params,
            },
        );
    }

    pub fn set_casino_active(&self, casino_id: CasinoId, active: bool) {
        if let Some(entry) = write(&self.casinos).get_mut(&casino_id) {
            entry.active = active;
        }
    }

    pub fn set_game_listed(&self, casino_id: CasinoId, listed: bool) {
        if let Some(entry) = write(&self.casinos).get_mut(&casino_id) {
            entry.listed = listed;
        }
    }

    pub fn list_token(&self, token: Token) {
        write(&self.tokens).insert(token);
    }

    /// Platform signature over a digest (signidice phase 1).
    pub fn sign_part_1(&self, digest: &Digest) -> Vec<u8> {
        self.platform.sign(digest.as_bytes()).to_bytes().to_vec()
    }

    /// Casino signature over a digest (signidice phase 2).
    pub fn sign_part_2(&self, casino_id: CasinoId, digest: &Digest) -> Option<Vec<u8>> {
        read(&self.casinos)
            .get(&casino_id)
            .map(|entry| entry.key.sign(digest.as_bytes()).to_bytes().to_vec())
    }
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformRegistry for TestRegistry {
    fn casino_is_active(&self, casino_id: CasinoId) -> bool {
        read(&self.casinos)
            .get(&casino_id)
            .map(|entry| entry.active)
            .unwrap_or(false)
    }

    fn game_is_listed(&self, casino_id: CasinoId) -> bool {
        read(&self.casinos)
            .get(&casino_id)
            .map(|entry| entry.listed)
            .unwrap_or(false)
    }

    fn platform_key(&self) -> VerifyingKey {
        self.platform.verifying_key()
    }

    fn casino_key(&self, casino_id: CasinoId) -> Option<VerifyingKey> {
        read(&self.casinos)
            .get(&casino_id)
            .map(|entry| entry.key.verifying_key())
    }

    fn game_params(&self, casino_id: CasinoId) -> Vec<(u16, u64)> {
        read(&self.casinos)
            .get(&casino_id)
            .map(|entry| entry.params.clone())
            .unwrap_or_default()
    }

    fn token_is_listed(&self, token: &Token) -> bool {
        read(&self.tokens).contains(token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Engine escrow to a player.
    Escrow,
    /// Casino real balance to a player.
    CasinoReal,
    /// Casino bonus pool to a player.
    CasinoBonus,
    /// Engine escrow collected by a casino.
    CasinoCollect,
}

#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub kind: TransferKind,
    pub casino_id: Option<CasinoId>,
    pub to: Option<AccountId>,
    pub amount: Amount,
    pub memo: String,
}

/// Treasury that records every transfer instead of moving funds.
#[derive(Default)]
pub struct RecordingTreasury {
    records: Mutex<Vec<TransferRecord>>,
}

impl RecordingTreasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TransferRecord> {
        guard(&self.records).clone()
    }

    pub fn clear(&self) {
        guard(&self.records).clear();
    }

    fn push(
        &self,
        kind: TransferKind,
        casino_id: Option<CasinoId>,
        to: Option<&AccountId>,
        amount: &Amount,
        memo: &str,
    ) {
        guard(&self.records).push(TransferRecord {
            kind,
            casino_id,
            to: to.cloned(),
            amount: amount.clone(),
            memo: memo.to_string(),
        });
    }
}

impl Treasury for RecordingTreasury {
    fn transfer(&self, to: &AccountId, amount: &Amount, memo: &str) -> EngineResult<()> {
        self.push(TransferKind::Escrow, None, Some(to), amount, memo);
        Ok(())
    }

    fn casino_transfer(
        &self,
        casino_id: CasinoId,
        to: &AccountId,
        amount: &Amount,
    ) -> EngineResult<()> {
        self.push(TransferKind::CasinoReal, Some(casino_id), Some(to), amount, "");
        Ok(())
    }

    fn casino_bonus_transfer(
        &self,
        casino_id: CasinoId,
        to: &AccountId,
        amount: &Amount,
    ) -> EngineResult<()> {
        self.push(TransferKind::CasinoBonus, Some(casino_id), Some(to), amount, "");
        Ok(())
    }

    fn casino_collect(
        &self,
        casino_id: CasinoId,
        amount: &Amount,
        memo: &str,
    ) -> EngineResult<()> {
        self.push(TransferKind::CasinoCollect, Some(casino_id), None, amount, memo);
        Ok(())
    }
}

/// Event sink that keeps everything emitted, in order.
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        guard(&self.events).clone()
    }

    pub fn take(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *guard(&self.events))
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: SessionEvent) {
        guard(&self.events).push(event);
    }
}

/// Deterministic clock advanced by hand.
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Everything a lifecycle test needs, pre-wired.
pub struct TestBench<G: GameHandler> {
    pub engine: GameEngine<G>,
    pub registry: Arc<TestRegistry>,
    pub treasury: Arc<RecordingTreasury>,
    pub events: Arc<RecordingEvents>,
    pub clock: Arc<ManualClock>,
    pub token: Token,
}

impl<G: GameHandler> TestBench<G> {
    pub fn new(game: G) -> EngineResult<Self> {
        let token = Token::new("BET");
        let registry = Arc::new(TestRegistry::new());
        registry.list_token(token.clone());
        let treasury = Arc::new(RecordingTreasury::new());
        let events = Arc::new(RecordingEvents::new());
        let clock = Arc::new(ManualClock::new(1_000));

        let engine = GameEngine::new(
            EngineConfig::default(),
            game,
            registry.clone(),
            treasury.clone(),
            events.clone(),
            Arc::new(AllowAll),
            clock.clone(),
        )?;

        Ok(Self {
            engine,
            registry,
            treasury,
            events,
            clock,
            token,
        })
    }

    pub fn amount(&self, whole: i64) -> Amount {
        Amount::whole(whole, self.token.clone())
    }

    pub fn amount_units(&self, units: i64) -> Amount {
        Amount::new(units, self.token.clone())
    }

    pub fn open_session(
        &self,
        session_id: SessionId,
        player: &str,
        deposit: Amount,
    ) -> EngineResult<()> {
        self.engine
            .deposit(session_id, &AccountId::from(player), deposit, DepositSource::Real)
    }

    /// Run both signidice phases with the registry's real keys.
    pub fn run_signidice(&self, session_id: SessionId) -> EngineResult<()> {
        let session = self.engine.session(session_id)?;
        let sig1 = self.registry.sign_part_1(&session.digest);
        self.engine.signidice_part_1(session_id, &sig1)?;

        let session = self.engine.session(session_id)?;
        let casino_id = session
            .casino_id
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let sig2 = self
            .registry
            .sign_part_2(casino_id, &session.digest)
            .ok_or(EngineError::CounterpartyInactive(casino_id))?;
        self.engine.signidice_part_2(session_id, &sig2)
    }
}
