//! Stake-weighted lottery: priority draws and their verification.
//!
//! A participant with `stake` units gets `stake` sub-draws per round: for
//! each index `i ∈ [0, stake)` the sub-draw value is
//! `SHA256(ticket ‖ be_u64(i))` read as a 256-bit unsigned integer. The
//! participant's priority is the maximum sub-draw. This weights the
//! lottery by stake without giving verifiers Θ(stake) work: the prover
//! claims the winning index and the verifier recomputes one hash plus one
//! VRF check.
//!
//! The seed for round `r` on the branch ending at a given tip is
//! `SHA256("seed" ‖ tip.ticket ‖ be_u64(r))`, binding sortition to the
//! branch and preventing grinding across forks.

use num_bigint::BigUint;

use crate::crypto::vrf::{self, Keypair, PublicKey};
use crate::{Error, Hash, Result};

/// A complete priority draw: the VRF evaluation plus the winning sub-draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorityDraw {
    /// The winning sub-draw value, big-endian. Higher wins.
    pub priority: Hash,
    /// The index of the winning sub-draw, `< stake`.
    pub index: u64,
    /// The VRF token for the seed.
    pub ticket: Hash,
    /// The VRF proof for the seed.
    pub proof: Vec<u8>,
}

impl PriorityDraw {
    pub fn priority_int(&self) -> BigUint {
        BigUint::from_bytes_be(&self.priority)
    }
}

/// Seed for round `round` on the branch whose tip carries `tip_ticket`.
pub fn seed_for(round: u64, tip_ticket: &Hash) -> Hash {
    crate::sha256_concat(&[b"seed", tip_ticket, &round.to_be_bytes()])
}

/// Sub-draw value at `index` for a given ticket.
pub fn sub_draw(ticket: &Hash, index: u64) -> Hash {
    crate::sha256_concat(&[ticket, &index.to_be_bytes()])
}

/// Roll the lottery: evaluate the VRF on `seed` and take the maximum
/// sub-draw over `stake` indices. Returns `None` for zero stake.
pub fn draw(seed: &Hash, keypair: &Keypair, stake: u64) -> Option<PriorityDraw> {
    if stake == 0 {
        return None;
    }
    let (ticket, proof) = keypair.prove(seed);
    let (priority, index) = best_sub_draw(&ticket, stake);
    Some(PriorityDraw {
        priority,
        index,
        ticket,
        proof,
    })
}

/// Maximum sub-draw and its index over `stake` indices. `stake` must be
/// nonzero.
pub fn best_sub_draw(ticket: &Hash, stake: u64) -> (Hash, u64) {
    let mut best = sub_draw(ticket, 0);
    let mut best_index = 0u64;
    for i in 1..stake {
        let candidate = sub_draw(ticket, i);
        // Big-endian byte order is numeric order.
        if candidate > best {
            best = candidate;
            best_index = i;
        }
    }
    (best, best_index)
}

/// Verify a claimed priority draw: the VRF evaluation must hold, the
/// claimed index must be within the prover's stake, and the priority must
/// equal the sub-draw at that index.
///
/// Accepts exactly the tuples [`draw`] can produce for the same secret
/// key; it does NOT check that the claimed index is the maximum (a prover
/// under-reporting its own priority only hurts itself).
pub fn verify_draw(
    pk: &PublicKey,
    seed: &Hash,
    draw: &PriorityDraw,
    stake: u64,
) -> Result<()> {
    if stake == 0 || draw.index >= stake {
        return Err(Error::BadSortition);
    }
    if !vrf::verify(pk, seed, &draw.ticket, &draw.proof) {
        return Err(Error::BadSortition);
    }
    if sub_draw(&draw.ticket, draw.index) != draw.priority {
        return Err(Error::BadSortition);
    }
    Ok(())
}

/// Deterministic ordering of competing draws: higher priority wins;
/// equal priorities break ties by lexicographic public key.
pub fn beats(a: (&Hash, &PublicKey), b: (&Hash, &PublicKey)) -> bool {
    match a.0.cmp(b.0) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => a.1 > b.1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Keypair {
        Keypair::generate(b"sortition-fixture")
    }

    #[test]
    fn seed_binds_round_and_ticket() {
        let t1 = [1u8; 32];
        let t2 = [2u8; 32];
        assert_ne!(seed_for(1, &t1), seed_for(2, &t1));
        assert_ne!(seed_for(1, &t1), seed_for(1, &t2));
        assert_eq!(seed_for(3, &t1), seed_for(3, &t1));
    }

    #[test]
    fn draw_zero_stake_is_none() {
        let kp = fixture();
        assert!(draw(&[0u8; 32], &kp, 0).is_none());
    }

    #[test]
    fn draw_verifies() {
        let kp = fixture();
        let seed = seed_for(1, &crate::NIL_HASH);
        for stake in [1u64, 2, 5, 17] {
            let d = draw(&seed, &kp, stake).unwrap();
            assert!(d.index < stake);
            verify_draw(&kp.public, &seed, &d, stake).unwrap();
        }
    }

    #[test]
    fn winning_index_is_maximal() {
        let kp = fixture();
        let seed = seed_for(7, &[3u8; 32]);
        let stake = 20;
        let d = draw(&seed, &kp, stake).unwrap();
        for i in 0..stake {
            assert!(sub_draw(&d.ticket, i) <= d.priority);
        }
        assert_eq!(sub_draw(&d.ticket, d.index), d.priority);
    }

    #[test]
    fn more_stake_never_lowers_priority() {
        let kp = fixture();
        let seed = seed_for(2, &[5u8; 32]);
        let small = draw(&seed, &kp, 3).unwrap();
        let large = draw(&seed, &kp, 30).unwrap();
        assert!(large.priority >= small.priority);
    }

    #[test]
    fn verify_rejects_foreign_key() {
        let kp = fixture();
        let other = Keypair::generate(b"other");
        let seed = seed_for(1, &crate::NIL_HASH);
        let d = draw(&seed, &kp, 4).unwrap();
        assert!(matches!(
            verify_draw(&other.public, &seed, &d, 4),
            Err(Error::BadSortition)
        ));
    }

    #[test]
    fn verify_rejects_index_outside_stake() {
        let kp = fixture();
        let seed = seed_for(1, &crate::NIL_HASH);
        let mut d = draw(&seed, &kp, 4).unwrap();
        d.index = 4;
        assert!(verify_draw(&kp.public, &seed, &d, 4).is_err());
    }

    #[test]
    fn verify_rejects_tampered_priority() {
        let kp = fixture();
        let seed = seed_for(1, &crate::NIL_HASH);
        let mut d = draw(&seed, &kp, 4).unwrap();
        d.priority[0] ^= 0xff;
        assert!(verify_draw(&kp.public, &seed, &d, 4).is_err());
    }

    #[test]
    fn verify_rejects_zero_stake() {
        let kp = fixture();
        let seed = seed_for(1, &crate::NIL_HASH);
        let d = draw(&seed, &kp, 4).unwrap();
        assert!(verify_draw(&kp.public, &seed, &d, 0).is_err());
    }

    #[test]
    fn beats_orders_by_priority_then_key() {
        let hi = [2u8; 32];
        let lo = [1u8; 32];
        let pk_a = PublicKey([1u8; 32]);
        let pk_b = PublicKey([2u8; 32]);
        assert!(beats((&hi, &pk_a), (&lo, &pk_b)));
        assert!(!beats((&lo, &pk_b), (&hi, &pk_a)));
        // Tie: lexicographically greater key wins.
        assert!(beats((&hi, &pk_b), (&hi, &pk_a)));
        assert!(!beats((&hi, &pk_a), (&hi, &pk_b)));
    }

    #[test]
    fn draw_is_deterministic() {
        let kp = fixture();
        let seed = seed_for(9, &[8u8; 32]);
        let a = draw(&seed, &kp, 11).unwrap();
        let b = draw(&seed, &kp, 11).unwrap();
        assert_eq!(a, b);
    }
}
