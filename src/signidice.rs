//! Two-phase commit-reveal randomness ("signidice").
//!
//! The session digest is seeded at game start from engine-scoped identifiers,
//! then advanced twice: phase 1 binds the platform's ed25519 signature over
//! the seed, phase 2 binds the counterparty's signature over phase 1's
//! output. Neither party alone controls the final digest, and the player's
//! stake is locked before either signature is requested.

use crate::errors::{EngineError, EngineResult};
use crate::types::{AccountId, CasinoId, Digest};
use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest as Sha2Digest, Sha256};

/// Expected signature length for both phases.
pub const SIGNATURE_LENGTH: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// Derive the initial session digest. The sequence number is assigned fresh
/// per session and never reused, so two sessions of the same player at the
/// same counterparty still start from distinct seeds.
pub fn session_seed(
    engine_id: &str,
    casino_id: CasinoId,
    sequence: u64,
    player: &AccountId,
) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(engine_id.as_bytes());
    hasher.update(casino_id.to_be_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.update(player.as_str().as_bytes());
    Digest::new(hasher.finalize().into())
}

/// Verify `signature` over the current digest against `key` and advance the
/// chain: the next digest is the SHA-256 of the signature bytes.
///
/// The next digest is a deterministic function of the signature alone, so
/// replaying an identical signature reproduces the same digest and any other
/// signature yields a different one.
pub fn verify_and_advance(
    digest: &Digest,
    signature: &[u8],
    key: &VerifyingKey,
) -> EngineResult<Digest> {
    let bytes: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| EngineError::InvalidSignature)?;
    let signature = Signature::from_bytes(&bytes);

    key.verify_strict(digest.as_bytes(), &signature)
        .map_err(|_| EngineError::InvalidSignature)?;

    Ok(Digest::of(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand_core::OsRng;

    fn keypair() -> SigningKey {
        SigningKey::generate(&mut OsRng)
    }

    fn sign(key: &SigningKey, digest: &Digest) -> Vec<u8> {
        key.sign(digest.as_bytes()).to_bytes().to_vec()
    }

    #[test]
    fn valid_signature_advances_digest() {
        let key = keypair();
        let seed = session_seed("croupier", 0, 1, &AccountId::from("alice"));

        let sig = sign(&key, &seed);
        let next = verify_and_advance(&seed, &sig, &key.verifying_key()).unwrap();

        assert_ne!(next, seed);
        assert_eq!(next, Digest::of(&sig));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let signer = keypair();
        let other = keypair();
        let seed = session_seed("croupier", 0, 1, &AccountId::from("alice"));

        let sig = sign(&signer, &seed);
        assert_eq!(
            verify_and_advance(&seed, &sig, &other.verifying_key()),
            Err(EngineError::InvalidSignature)
        );
    }

    #[test]
    fn signature_over_other_digest_is_rejected() {
        let key = keypair();
        let seed = session_seed("croupier", 0, 1, &AccountId::from("alice"));
        let unrelated = Digest::of(b"something else");

        let sig = sign(&key, &unrelated);
        assert_eq!(
            verify_and_advance(&seed, &sig, &key.verifying_key()),
            Err(EngineError::InvalidSignature)
        );
    }

    #[test]
    fn malformed_signature_length_is_rejected() {
        let key = keypair();
        let seed = Digest::of(b"seed");
        assert_eq!(
            verify_and_advance(&seed, &[0u8; 10], &key.verifying_key()),
            Err(EngineError::InvalidSignature)
        );
    }

    #[test]
    fn phase_two_digest_depends_on_both_signatures() {
        let platform = keypair();
        let casino_a = keypair();
        let casino_b = keypair();
        let seed = session_seed("croupier", 3, 9, &AccountId::from("bob"));

        let d1 = verify_and_advance(&seed, &sign(&platform, &seed), &platform.verifying_key())
            .unwrap();
        let d2_a =
            verify_and_advance(&d1, &sign(&casino_a, &d1), &casino_a.verifying_key()).unwrap();
        let d2_b =
            verify_and_advance(&d1, &sign(&casino_b, &d1), &casino_b.verifying_key()).unwrap();

        // Different second signers produce different final digests over the
        // same committed phase-1 output.
        assert_ne!(d2_a, d2_b);

        // Replaying the identical signature reproduces the digest exactly.
        let replay =
            verify_and_advance(&d1, &sign(&casino_a, &d1), &casino_a.verifying_key()).unwrap();
        assert_eq!(replay, d2_a);
    }

    #[test]
    fn seeds_differ_per_sequence_and_player() {
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        let base = session_seed("croupier", 0, 0, &alice);
        assert_ne!(base, session_seed("croupier", 0, 1, &alice));
        assert_ne!(base, session_seed("croupier", 1, 0, &alice));
        assert_ne!(base, session_seed("croupier", 0, 0, &bob));
        assert_ne!(base, session_seed("other", 0, 0, &alice));
    }
}
