//! Verifiable Random Function built on deterministic Ed25519 signatures.
//!
//! A VRF produces a pseudorandom output that can be publicly verified but
//! not predicted without the secret key. The engine uses it for the
//! per-round sortition ticket, for vote tokens, and as the transfer
//! signature scheme.
//!
//! Construction: `prove(seed, sk) = (H(sign(sk, tag ‖ seed)), sign(sk, tag ‖ seed))`.
//! RFC 8032 Ed25519 signing is deterministic, so the same `(sk, seed)`
//! pair always yields the same token — required for VRF correctness and
//! for reproducible test fixtures. Key generation hashes caller-supplied
//! entropy through a domain-separated SHA-256, so a fixed entropy array
//! yields the same key pair on every platform.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::constants::PROOF_LEN;
use crate::Hash;

/// A public VRF key: the participant's identifier on the wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// The all-zero sentinel key, used only by the genesis coinbase.
    pub fn nil() -> Self {
        PublicKey([0u8; 32])
    }

    pub fn is_nil(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..4]))
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

/// A long-term VRF key pair.
#[derive(Clone)]
pub struct Keypair {
    pub public: PublicKey,
    secret: SigningKey,
}

impl Keypair {
    /// Derive a key pair from caller-supplied entropy.
    ///
    /// Deterministic: a fixed entropy array yields the same key pair
    /// across runs and platforms.
    pub fn generate(entropy: &[u8]) -> Self {
        let sk_bytes = crate::hash_domain(b"sortis.vrf.keygen.", entropy);
        let secret = SigningKey::from_bytes(&sk_bytes);
        Keypair {
            public: PublicKey(secret.verifying_key().to_bytes()),
            secret,
        }
    }

    /// Derive a key pair from OS randomness.
    pub fn generate_random() -> Self {
        let entropy: [u8; 32] = rand::random();
        Self::generate(&entropy)
    }

    /// Evaluate the VRF on `seed`: returns the 32-byte uniform token and
    /// the proof (a detached Ed25519 signature over the tagged seed).
    pub fn prove(&self, seed: &Hash) -> (Hash, Vec<u8>) {
        let tagged = crate::hash_domain(b"sortis.vrf.input.", seed);
        let sig = self.secret.sign(&tagged);
        let proof = sig.to_bytes().to_vec();
        let token = crate::hash_domain(b"sortis.vrf.token.", &proof);
        (token, proof)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        write!(f, "Keypair({})", self.public)
    }
}

/// Verify a VRF evaluation: the proof must be a valid signature over the
/// tagged seed under `pk`, and the token must be derived from the proof.
pub fn verify(pk: &PublicKey, seed: &Hash, token: &Hash, proof: &[u8]) -> bool {
    if proof.len() != PROOF_LEN {
        return false;
    }
    let Ok(vk) = VerifyingKey::from_bytes(&pk.0) else {
        return false;
    };
    let sig_bytes: [u8; PROOF_LEN] = match proof.try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let sig = Signature::from_bytes(&sig_bytes);
    let tagged = crate::hash_domain(b"sortis.vrf.input.", seed);
    if vk.verify_strict(&tagged, &sig).is_err() {
        return false;
    }
    let expected = crate::hash_domain(b"sortis.vrf.token.", proof);
    token == &expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_deterministic() {
        let mut entropy = [0u8; 32];
        entropy[0] = 0x01;
        let a = Keypair::generate(&entropy);
        let b = Keypair::generate(&entropy);
        assert_eq!(a.public, b.public);

        let (ta, pa) = a.prove(&[0x02; 32]);
        let (tb, pb) = b.prove(&[0x02; 32]);
        assert_eq!(ta, tb);
        assert_eq!(pa, pb);
    }

    #[test]
    fn different_entropy_different_keys() {
        let a = Keypair::generate(&[1u8; 32]);
        let b = Keypair::generate(&[2u8; 32]);
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn prove_verify_roundtrip() {
        let kp = Keypair::generate(b"fixture");
        let seed = crate::hash_domain(b"test.seed.", b"round-1");
        let (token, proof) = kp.prove(&seed);
        assert!(verify(&kp.public, &seed, &token, &proof));
    }

    #[test]
    fn wrong_key_rejected() {
        let kp = Keypair::generate(b"a");
        let other = Keypair::generate(b"b");
        let seed = [7u8; 32];
        let (token, proof) = kp.prove(&seed);
        assert!(!verify(&other.public, &seed, &token, &proof));
    }

    #[test]
    fn wrong_seed_rejected() {
        let kp = Keypair::generate(b"a");
        let (token, proof) = kp.prove(&[1u8; 32]);
        assert!(!verify(&kp.public, &[2u8; 32], &token, &proof));
    }

    #[test]
    fn tampered_token_rejected() {
        let kp = Keypair::generate(b"a");
        let seed = [3u8; 32];
        let (mut token, proof) = kp.prove(&seed);
        token[0] ^= 0xff;
        assert!(!verify(&kp.public, &seed, &token, &proof));
    }

    #[test]
    fn tampered_proof_rejected() {
        let kp = Keypair::generate(b"a");
        let seed = [3u8; 32];
        let (token, mut proof) = kp.prove(&seed);
        proof[10] ^= 0x01;
        assert!(!verify(&kp.public, &seed, &token, &proof));
    }

    #[test]
    fn short_proof_rejected() {
        let kp = Keypair::generate(b"a");
        let seed = [3u8; 32];
        let (token, _) = kp.prove(&seed);
        assert!(!verify(&kp.public, &seed, &token, &[0u8; 12]));
    }

    #[test]
    fn token_uniform_over_seeds() {
        // Distinct seeds must produce distinct tokens.
        let kp = Keypair::generate(b"a");
        let mut tokens = std::collections::HashSet::new();
        for i in 0..32u8 {
            let (token, _) = kp.prove(&[i; 32]);
            tokens.insert(token);
        }
        assert_eq!(tokens.len(), 32);
    }

    #[test]
    fn nil_key_never_verifies() {
        let kp = Keypair::generate(b"a");
        let seed = [9u8; 32];
        let (token, proof) = kp.prove(&seed);
        assert!(!verify(&PublicKey::nil(), &seed, &token, &proof));
    }
}
