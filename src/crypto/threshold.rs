//! Stake-weighted election threshold: `φ(α, f) = 1 − (1−f)^α`.
//!
//! `α = stake / total_stake ∈ (0, 1]` is the participant's share and
//! `f ∈ (0, 1]` the active-slot coefficient — the probability that a
//! hypothetical participant holding all stake wins a given slot.
//!
//! The comparison `y < φ` decides sortition admission, so every node must
//! compute the exact same digits: all arithmetic runs in arbitrary
//! precision decimal with 16 guard digits and the result is rounded
//! half-even to [`crate::constants::THRESHOLD_PRECISION`] significant
//! digits. Deviating from this rounding rule is a protocol change and
//! causes forks.
//!
//! `(1−f)^α` for fractional `α` is evaluated as `exp(α · ln(1−f))` with
//! power series; the series run with guard precision and terminate once
//! terms drop below 10⁻⁶⁰.

use std::num::NonZeroU64;

use bigdecimal::rounding::RoundingMode;
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};

use crate::constants::THRESHOLD_PRECISION;
use crate::Hash;

/// Working precision of intermediate series terms.
const GUARD_PRECISION: u64 = THRESHOLD_PRECISION + 16;

/// Series terms below this magnitude are discarded.
fn epsilon() -> BigDecimal {
    BigDecimal::new(BigInt::one(), 60)
}

fn round_guard(x: &BigDecimal) -> BigDecimal {
    x.with_precision_round(
        NonZeroU64::new(GUARD_PRECISION).expect("nonzero precision"),
        RoundingMode::HalfEven,
    )
}

/// Round to the protocol-fixed precision (half-even). Both sides of the
/// `y < φ` comparison go through this.
pub fn round_protocol(x: &BigDecimal) -> BigDecimal {
    x.with_precision_round(
        NonZeroU64::new(THRESHOLD_PRECISION).expect("nonzero precision"),
        RoundingMode::HalfEven,
    )
}

/// Natural logarithm via the artanh series, after range reduction into
/// `[3/4, 3/2]` by powers of two. Requires `x > 0`.
fn ln(x: &BigDecimal) -> BigDecimal {
    let two = BigDecimal::from(2);
    let upper = BigDecimal::from(3) / &two; // 3/2
    let lower = BigDecimal::from(3) / BigDecimal::from(4); // 3/4

    let mut x = round_guard(x);
    let mut doublings: i64 = 0;
    while x > upper {
        x = round_guard(&(&x / &two));
        doublings += 1;
    }
    while x < lower {
        x = round_guard(&(&x * &two));
        doublings -= 1;
    }

    let reduced = ln_artanh(&x);
    if doublings == 0 {
        reduced
    } else {
        round_guard(&(reduced + BigDecimal::from(doublings) * ln_two()))
    }
}

/// `ln(2)`, computed once per call site via the artanh series (z = 1/3).
fn ln_two() -> BigDecimal {
    ln_artanh(&BigDecimal::from(2))
}

/// `ln(x) = 2 · artanh((x−1)/(x+1)) = 2 · Σ z^(2k+1)/(2k+1)`.
fn ln_artanh(x: &BigDecimal) -> BigDecimal {
    let one = BigDecimal::one();
    let z = round_guard(&((x - &one) / (x + &one)));
    let z2 = round_guard(&(&z * &z));
    let eps = epsilon();

    let mut power = z.clone();
    let mut sum = z.clone();
    let mut k: u64 = 1;
    while k < 1_000 {
        power = round_guard(&(&power * &z2));
        let term = round_guard(&(&power / BigDecimal::from(2 * k + 1)));
        if term.abs() < eps {
            break;
        }
        sum = round_guard(&(&sum + &term));
        k += 1;
    }
    round_guard(&(BigDecimal::from(2) * sum))
}

/// `exp(x)` via Taylor series after halving `x` into `[-1/2, 1/2]` and
/// squaring the result back up.
fn exp(x: &BigDecimal) -> BigDecimal {
    let two = BigDecimal::from(2);
    let half = BigDecimal::one() / &two;

    let mut x = round_guard(x);
    let mut halvings: u32 = 0;
    while x.abs() > half && halvings < 128 {
        x = round_guard(&(&x / &two));
        halvings += 1;
    }

    let eps = epsilon();
    let mut term = BigDecimal::one();
    let mut sum = BigDecimal::one();
    let mut k: u64 = 1;
    while k < 500 {
        term = round_guard(&(&term * &x / BigDecimal::from(k)));
        sum = round_guard(&(&sum + &term));
        if term.abs() < eps {
            break;
        }
        k += 1;
    }
    for _ in 0..halvings {
        sum = round_guard(&(&sum * &sum));
    }
    sum
}

/// Per-slot election probability for stake share `alpha` under
/// active-slot coefficient `f`: `φ(α, f) = 1 − (1−f)^α`, rounded
/// half-even to the protocol precision.
pub fn phi(alpha: &BigDecimal, f: &BigDecimal) -> BigDecimal {
    if alpha.is_zero() {
        return BigDecimal::zero();
    }
    let one = BigDecimal::one();
    let base = round_guard(&(&one - f));
    if base.is_zero() {
        // f = 1: election is certain for any positive stake.
        return round_protocol(&one);
    }
    let exponent = round_guard(&(alpha * ln(&base)));
    let pow = exp(&exponent);
    round_protocol(&(&one - &pow))
}

/// Normalize a VRF token into `y ∈ [0, 1)` by division by `2^(8·32) − 1`,
/// rounded to the protocol precision.
pub fn normalize_token(token: &Hash) -> BigDecimal {
    let numerator = BigUint::from_bytes_be(token);
    let denominator = (BigUint::one() << 256u32) - BigUint::one();
    let n = BigDecimal::from(BigInt::from(numerator));
    let d = BigDecimal::from(BigInt::from(denominator));
    round_protocol(&round_guard(&(n / d)))
}

/// Does the token clear the stake-weighted threshold?
///
/// Returns `y < φ(stake/total, f)` with both sides rounded to the
/// protocol precision. Zero stake or zero total never qualifies.
pub fn qualifies(stake: u64, total: u64, f: &BigDecimal, token: &Hash) -> bool {
    if stake == 0 || total == 0 {
        return false;
    }
    let stake = stake.min(total);
    let alpha = round_guard(&(BigDecimal::from(stake) / BigDecimal::from(total)));
    normalize_token(token) < phi(&alpha, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    /// Token whose normalized value is exactly `num/den` (den divides
    /// 2^256 − 1 for the fractions used here).
    fn token_from_fraction(num: u32, den: u32) -> Hash {
        let max = (BigUint::one() << 256u32) - BigUint::one();
        let value = max * num / den;
        let bytes = value.to_bytes_be();
        let mut token = [0u8; 32];
        token[32 - bytes.len()..].copy_from_slice(&bytes);
        token
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn phi_of_full_stake_is_f() {
        // φ(1, f) = f
        for f in ["0.1", "0.3", "0.5", "0.9"] {
            let f = dec(f);
            let p = phi(&BigDecimal::one(), &f);
            let diff = (&p - &f).abs();
            assert!(diff < dec("1e-30"), "phi(1,{f}) = {p}");
        }
    }

    #[test]
    fn phi_third_share_reference_value() {
        // φ(1/3, 0.3) = 1 − 0.7^(1/3) = 0.112096…
        let alpha = round_guard(&(BigDecimal::one() / BigDecimal::from(3)));
        let p = phi(&alpha, &dec("0.3"));
        assert!(p.to_string().starts_with("0.112096"), "got {p}");
    }

    #[test]
    fn phi_integer_exponent_matches_closed_form() {
        // φ(2, 0.3) = 1 − 0.49 = 0.51 exactly
        let p = phi(&BigDecimal::from(2), &dec("0.3"));
        let diff = (&p - dec("0.51")).abs();
        assert!(diff < dec("1e-30"), "got {p}");
    }

    #[test]
    fn phi_monotonic_in_alpha() {
        let f = dec("0.3");
        let small = phi(&dec("0.1"), &f);
        let large = phi(&dec("0.9"), &f);
        assert!(small < large);
    }

    #[test]
    fn phi_zero_alpha_is_zero() {
        assert!(phi(&BigDecimal::zero(), &dec("0.3")).is_zero());
    }

    #[test]
    fn phi_f_one_is_certain() {
        let p = phi(&dec("0.25"), &BigDecimal::one());
        assert_eq!(p, round_protocol(&BigDecimal::one()));
    }

    #[test]
    fn normalize_token_bounds() {
        assert!(normalize_token(&[0u8; 32]).is_zero());
        let max = normalize_token(&[0xffu8; 32]);
        assert_eq!(max, round_protocol(&BigDecimal::one()));
        let mid = normalize_token(&token_from_fraction(1, 3));
        assert!(mid > BigDecimal::zero() && mid < BigDecimal::one());
    }

    #[test]
    fn qualifies_oracle_values() {
        // φ(1/2, 0.75) = 1 − 0.25^(1/2) = 0.5: y = 0.4 clears the
        // threshold, y = 0.6 does not.
        let f = dec("0.75");
        assert!(qualifies(3, 6, &f, &token_from_fraction(2, 5)));
        assert!(!qualifies(3, 6, &f, &token_from_fraction(3, 5)));
    }

    #[test]
    fn qualifies_zero_stake_never() {
        let f = dec("0.9");
        assert!(!qualifies(0, 10, &f, &[0u8; 32]));
        assert!(!qualifies(5, 0, &f, &[0u8; 32]));
    }

    #[test]
    fn qualifies_deterministic() {
        let f = dec("0.3");
        let token = token_from_fraction(1, 5);
        let a = qualifies(2, 6, &f, &token);
        let b = qualifies(2, 6, &f, &token);
        assert_eq!(a, b);
    }

    #[test]
    fn rounding_is_stable_across_recomputation() {
        // The protocol comparison must yield identical digits when
        // recomputed — this is the cross-node determinism requirement.
        let alpha = round_guard(&(BigDecimal::from(2) / BigDecimal::from(6)));
        let f = dec("0.3");
        assert_eq!(phi(&alpha, &f).to_string(), phi(&alpha, &f).to_string());
    }

    #[test]
    fn ln_exp_roundtrip() {
        for s in ["0.1", "0.5", "0.7", "0.99"] {
            let x = dec(s);
            let back = exp(&ln(&x));
            let diff = (&back - &x).abs();
            assert!(diff < dec("1e-40"), "roundtrip {s} -> {back}");
        }
    }
}
