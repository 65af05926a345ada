//! Core value types shared across the engine.

use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;

/// Caller-chosen unique identifier of a wager session.
pub type SessionId = u64;

/// Identifier of a casino/operator registered with the platform.
pub type CasinoId = u64;

/// Number of decimal places carried by every [`Amount`].
pub const AMOUNT_DECIMALS: u32 = 4;

const AMOUNT_SCALE: i64 = 10_000;

/// Settlement currency identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    symbol: String,
}

impl Token {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Fixed-point monetary value: `i64` raw units at four decimal places,
/// bound to a [`Token`]. Negative values are legal and represent a deficit
/// (e.g. a losing player's signed win).
///
/// All arithmetic is checked; mixing tokens fails [`EngineError::TokenMismatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    units: i64,
    token: Token,
}

impl Amount {
    pub fn new(units: i64, token: Token) -> Self {
        Self { units, token }
    }

    pub fn zero(token: Token) -> Self {
        Self::new(0, token)
    }

    /// Whole-token constructor: `Amount::whole(5, tok)` is `5.0000 tok`.
    pub fn whole(value: i64, token: Token) -> Self {
        Self::new(value * AMOUNT_SCALE, token)
    }

    pub fn units(&self) -> i64 {
        self.units
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn is_zero(&self) -> bool {
        self.units == 0
    }

    pub fn is_positive(&self) -> bool {
        self.units > 0
    }

    pub fn is_negative(&self) -> bool {
        self.units < 0
    }

    fn require_same_token(&self, other: &Amount) -> EngineResult<()> {
        if self.token != other.token {
            return Err(EngineError::TokenMismatch {
                expected: self.token.clone(),
                actual: other.token.clone(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Amount) -> EngineResult<Amount> {
        self.require_same_token(other)?;
        let units = self
            .units
            .checked_add(other.units)
            .ok_or(EngineError::AmountOverflow)?;
        Ok(Amount::new(units, self.token.clone()))
    }

    pub fn checked_sub(&self, other: &Amount) -> EngineResult<Amount> {
        self.require_same_token(other)?;
        let units = self
            .units
            .checked_sub(other.units)
            .ok_or(EngineError::AmountOverflow)?;
        Ok(Amount::new(units, self.token.clone()))
    }

    /// `self * num / den` with an `i128` intermediate, flooring toward zero.
    /// Used for proportional real/bonus splits.
    pub fn mul_div(&self, num: &Amount, den: &Amount) -> EngineResult<Amount> {
        self.require_same_token(num)?;
        self.require_same_token(den)?;
        if den.units == 0 {
            return Err(EngineError::AmountOverflow);
        }
        let scaled = (self.units as i128) * (num.units as i128) / (den.units as i128);
        let units = i64::try_from(scaled).map_err(|_| EngineError::AmountOverflow)?;
        Ok(Amount::new(units, self.token.clone()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.units < 0 { "-" } else { "" };
        let abs = self.units.unsigned_abs();
        write!(
            f,
            "{}{}.{:04} {}",
            sign,
            abs / AMOUNT_SCALE as u64,
            abs % AMOUNT_SCALE as u64,
            self.token
        )
    }
}

/// Account identifier of a wagering party or operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 256-bit digest value: the randomness-protocol state and the output of
/// every hashing step in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// SHA-256 of arbitrary input.
    pub fn of(input: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(input);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
