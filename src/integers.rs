//! Helpers for working with big integers.
//!
//! Most values in the Paillier and ring-Pedersen world are integers which may be
//! negative, and get used as exponents modulo some RSA modulus.
use libpaillier::unknown_order::BigNumber;
use rand_core::{CryptoRngCore, RngCore};

use crate::{constants::CRYPTOGRAPHIC_RETRY_MAX, paillier::PaillierError};

/// Convert a small integer into a big one.
pub(crate) fn from_u64(x: u64) -> BigNumber {
    BigNumber::from_slice(x.to_be_bytes())
}

/// Return `2^n`.
pub(crate) fn pow2(n: usize) -> BigNumber {
    BigNumber::one() << n
}

pub(crate) fn is_negative(x: &BigNumber) -> bool {
    x < &BigNumber::zero()
}

/// Check if `x` lies in `[-bound, bound]`.
pub(crate) fn within_bound(x: &BigNumber, bound: &BigNumber) -> bool {
    x <= bound && x >= &-bound.clone()
}

/// Check if `x` lies in `[-2^n, 2^n]`.
pub(crate) fn within_bound_by_size(x: &BigNumber, n: usize) -> bool {
    within_bound(x, &pow2(n))
}

/// Check if `x` lies in `[-2^n * m, 2^n * m]`.
pub(crate) fn within_bound_scaled(x: &BigNumber, n: usize, m: &BigNumber) -> bool {
    within_bound(x, &(&pow2(n) * m))
}

/// Check that `x` is in `[1, n)` and coprime to `n`.
pub(crate) fn is_unit(x: &BigNumber, n: &BigNumber) -> bool {
    x > &BigNumber::zero() && x < n && x.gcd(n) == BigNumber::one()
}

/// Compute `base^exp mod n`, where the exponent may be negative.
///
/// This returns None if the exponent is negative, and the base not invertible.
pub(crate) fn modpow(base: &BigNumber, exp: &BigNumber, n: &BigNumber) -> Option<BigNumber> {
    let base = base.nmod(n);
    if is_negative(exp) {
        let inv = base.invert(n)?;
        Some(inv.modpow(&-exp.clone(), n))
    } else {
        Some(base.modpow(exp, n))
    }
}

/// Sample uniformly from `[-bound, bound]`.
pub(crate) fn random_plusminus<R: CryptoRngCore>(rng: &mut R, bound: &BigNumber) -> BigNumber {
    // `from_rng` samples the open interval.
    let val = BigNumber::from_rng(&(bound + &BigNumber::one()), rng);
    if rng.next_u32() & 1 == 1 {
        -val
    } else {
        val
    }
}

/// Sample uniformly from `[-2^n, 2^n]`.
pub(crate) fn random_plusminus_by_size<R: CryptoRngCore>(rng: &mut R, n: usize) -> BigNumber {
    random_plusminus(rng, &pow2(n))
}

/// Sample uniformly from `[-2^n * scale, 2^n * scale]`.
pub(crate) fn random_plusminus_scaled<R: CryptoRngCore>(
    rng: &mut R,
    n: usize,
    scale: &BigNumber,
) -> BigNumber {
    random_plusminus(rng, &(pow2(n) * scale))
}

/// Sample uniformly from `[0, n)`.
pub(crate) fn random_positive<R: CryptoRngCore>(rng: &mut R, n: &BigNumber) -> BigNumber {
    BigNumber::from_rng(n, rng)
}

/// Sample a uniform unit modulo `n`.
pub(crate) fn random_unit<R: CryptoRngCore>(
    rng: &mut R,
    n: &BigNumber,
) -> Result<BigNumber, PaillierError> {
    for _ in 0..CRYPTOGRAPHIC_RETRY_MAX {
        let x = BigNumber::from_rng(n, rng);
        if is_unit(&x, n) {
            return Ok(x);
        }
    }
    Err(PaillierError::RetryExhausted)
}

/// Derive an integer in `[0, n)` from a (transcript) random stream.
///
/// We take 128 extra bits before reducing, making the bias negligible.
/// Unlike the other samplers, this only needs a deterministic stream of bytes,
/// so that provers and verifiers derive the same value.
pub(crate) fn positive_from_stream(stream: &mut impl RngCore, n: &BigNumber) -> BigNumber {
    let len = (n.bit_length() + 7) / 8 + 16;
    let mut bytes = vec![0u8; len];
    stream.fill_bytes(&mut bytes);
    BigNumber::from_slice(&bytes).nmod(n)
}

/// Derive an integer in `[-n, n]` from a (transcript) random stream.
pub(crate) fn plusminus_from_stream(stream: &mut impl RngCore, n: &BigNumber) -> BigNumber {
    let two_n_plus_one = n * &from_u64(2) + BigNumber::one();
    positive_from_stream(stream, &two_n_plus_one) - n
}

/// The Jacobi symbol `(a / n)`, for odd positive `n`.
pub(crate) fn jacobi(a: &BigNumber, n: &BigNumber) -> i8 {
    let zero = BigNumber::zero();
    let one = BigNumber::one();
    let two = from_u64(2);
    let three = from_u64(3);
    let four = from_u64(4);
    let five = from_u64(5);
    let eight = from_u64(8);

    let mut a = a.nmod(n);
    let mut n = n.clone();
    let mut t = 1i8;
    while a != zero {
        while a.nmod(&two) == zero {
            a = a / &two;
            let r = n.nmod(&eight);
            if r == three || r == five {
                t = -t;
            }
        }
        std::mem::swap(&mut a, &mut n);
        if a.nmod(&four) == three && n.nmod(&four) == three {
            t = -t;
        }
        a = a.nmod(&n);
    }
    if n == one {
        t
    } else {
        0
    }
}

/// Combine residues modulo two coprime moduli.
///
/// Returns the unique `x` modulo `p * q` with `x = a_p mod p` and `x = a_q mod q`.
pub(crate) fn crt(
    a_p: &BigNumber,
    a_q: &BigNumber,
    p: &BigNumber,
    q: &BigNumber,
) -> Option<BigNumber> {
    let p_inv = p.invert(q)?;
    let h = (a_q - a_p).nmod(q).modmul(&p_inv, q);
    Some((a_p + &(&h * p)).nmod(&(p * q)))
}

#[cfg(test)]
mod test {
    use rand_chacha::ChaCha20Rng;
    use rand_core::{OsRng, SeedableRng};

    use super::*;

    #[test]
    fn test_jacobi_small_values() {
        // Quadratic residues mod 7 are 1, 2, 4.
        let n = from_u64(7);
        assert_eq!(jacobi(&from_u64(2), &n), 1);
        assert_eq!(jacobi(&from_u64(3), &n), -1);
        assert_eq!(jacobi(&from_u64(14), &n), 0);
        // (2/15) = (2/3)(2/5) = (-1)(-1)
        assert_eq!(jacobi(&from_u64(2), &from_u64(15)), 1);
        assert_eq!(jacobi(&from_u64(7), &from_u64(15)), -1);
    }

    #[test]
    fn test_negative_exponents_invert() {
        let n = from_u64(101);
        let x = from_u64(17);
        let inv = modpow(&x, &-BigNumber::one(), &n).unwrap();
        assert_eq!(inv.modmul(&x, &n), BigNumber::one());
        assert!(modpow(&from_u64(0), &-BigNumber::one(), &n).is_none());
    }

    #[test]
    fn test_crt_recombines() {
        let (p, q) = (from_u64(11), from_u64(13));
        let x = crt(&from_u64(3), &from_u64(5), &p, &q).unwrap();
        assert_eq!(x.nmod(&p), from_u64(3));
        assert_eq!(x.nmod(&q), from_u64(5));
    }

    #[test]
    fn test_samplers_respect_bounds() {
        let bound = from_u64(1000);
        for _ in 0..100 {
            assert!(within_bound(&random_plusminus(&mut OsRng, &bound), &bound));
        }
        let mut stream = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..100 {
            let x = plusminus_from_stream(&mut stream, &bound);
            assert!(within_bound(&x, &bound));
        }
    }

    #[test]
    fn test_stream_sampling_is_deterministic() {
        let n = pow2(300) + from_u64(17);
        let a = positive_from_stream(&mut ChaCha20Rng::seed_from_u64(1), &n);
        let b = positive_from_stream(&mut ChaCha20Rng::seed_from_u64(1), &n);
        assert_eq!(a, b);
    }
}
