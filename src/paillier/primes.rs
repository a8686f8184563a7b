//! Searching for Blum safe primes.
//!
//! A random odd starting point `q` is drawn, and then a window of candidates
//! `q, q + 2, ...` is sieved by small primes, for both `q` and `2q + 1`, before
//! running the expensive primality tests on the survivors.
use libpaillier::unknown_order::BigNumber;
use rand_core::CryptoRngCore;
use tracing::{debug, trace};

use super::PaillierError;
use crate::{
    constants::{PRIME_SEARCH_WINDOWS, PRIME_SEARCH_WINDOW_SIZE},
    integers::{from_u64, pow2, random_positive},
};

/// Sieving bound for the small primes.
const SIEVE_LIMIT: usize = 2048;

fn small_primes() -> Vec<u64> {
    let mut composite = vec![false; SIEVE_LIMIT];
    let mut out = Vec::new();
    for i in 3..SIEVE_LIMIT {
        if composite[i] {
            continue;
        }
        out.push(i as u64);
        let mut j = i * i;
        while j < SIEVE_LIMIT {
            composite[j] = true;
            j += i;
        }
    }
    out
}

fn low_u64(x: &BigNumber) -> u64 {
    x.to_bytes()
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Check if p is a prime with p = 3 mod 4, and (p - 1) / 2 also prime.
pub(crate) fn is_blum_safe_prime(p: &BigNumber) -> bool {
    if p.nmod(&from_u64(4)) != from_u64(3) {
        return false;
    }
    let q = (p - &BigNumber::one()) / &from_u64(2);
    q.is_prime() && p.is_prime()
}

/// Find a Blum safe prime with exactly `bits` bits, and its top two bits set.
///
/// The top two bits being set makes the product of two such primes have
/// exactly `2 * bits` bits.
pub(crate) fn blum_safe_prime<R: CryptoRngCore>(
    rng: &mut R,
    bits: usize,
) -> Result<BigNumber, PaillierError> {
    if bits < 32 {
        return Err(PaillierError::InvalidKey("safe primes must have at least 32 bits"));
    }
    let sieve = small_primes();
    let two = from_u64(2);

    for window in 0..PRIME_SEARCH_WINDOWS {
        // q has bits - 1 bits, with the top two set.
        let top = pow2(bits - 2) + pow2(bits - 3);
        let mut q0 = top + random_positive(rng, &pow2(bits - 3));
        if q0.nmod(&two) == BigNumber::zero() {
            q0 = q0 + BigNumber::one();
        }
        let residues: Vec<u64> = sieve
            .iter()
            .map(|&s| low_u64(&q0.nmod(&from_u64(s))))
            .collect();

        for step in 0..PRIME_SEARCH_WINDOW_SIZE as u64 {
            let delta = 2 * step;
            let survives = sieve.iter().zip(residues.iter()).all(|(&s, &r)| {
                let q_mod = (r + delta) % s;
                // Neither q nor 2q + 1 may be divisible by s.
                q_mod != 0 && (2 * q_mod + 1) % s != 0
            });
            if !survives {
                continue;
            }
            let q = &q0 + &from_u64(delta);
            if q.bit_length() != bits - 1 || !q.is_prime() {
                continue;
            }
            let p = &(&q * &two) + &BigNumber::one();
            if p.is_prime() {
                debug!(window, bits, "found safe prime");
                return Ok(p);
            }
        }
        trace!(window, "safe prime search window exhausted");
    }
    Err(PaillierError::PrimeGenerationExhausted)
}

/// Find two distinct Blum safe primes.
///
/// With the `parallel` feature, both searches run concurrently, each with its
/// own generator seeded from the caller's.
pub(crate) fn safe_prime_pair<R: CryptoRngCore>(
    rng: &mut R,
    bits: usize,
) -> Result<(BigNumber, BigNumber), PaillierError> {
    #[cfg(feature = "parallel")]
    let (p, q) = {
        use rand_chacha::ChaCha20Rng;
        use rand_core::SeedableRng;

        let mut rng_p = ChaCha20Rng::from_seed(random_seed(rng));
        let mut rng_q = ChaCha20Rng::from_seed(random_seed(rng));
        rayon::join(
            || blum_safe_prime(&mut rng_p, bits),
            || blum_safe_prime(&mut rng_q, bits),
        )
    };
    #[cfg(not(feature = "parallel"))]
    let (p, q) = (blum_safe_prime(rng, bits), blum_safe_prime(rng, bits));

    let (p, q) = (p?, q?);
    if p == q {
        return Err(PaillierError::PrimeGenerationExhausted);
    }
    Ok((p, q))
}

#[cfg(feature = "parallel")]
fn random_seed<R: CryptoRngCore>(rng: &mut R) -> [u8; 32] {
    let mut seed = [0u8; 32];
    rng.fill_bytes(&mut seed);
    seed
}

#[cfg(test)]
mod test {
    use rand_core::OsRng;

    use super::*;
    use crate::paillier::test_primes;

    #[test]
    fn test_generated_primes_are_blum_safe_primes() {
        let (p, q) = safe_prime_pair(&mut OsRng, 128).unwrap();
        for x in [&p, &q] {
            assert_eq!(x.bit_length(), 128);
            assert!(is_blum_safe_prime(x));
        }
        assert_eq!((&p * &q).bit_length(), 256);
    }

    #[test]
    fn test_fixture_primes_are_blum_safe_primes() {
        for i in 0..2 * test_primes::KEY_COUNT {
            assert!(is_blum_safe_prime(&test_primes::prime(i)));
        }
    }

    #[test]
    fn test_small_sizes_are_refused() {
        assert_eq!(
            blum_safe_prime(&mut OsRng, 16).unwrap_err(),
            PaillierError::InvalidKey("safe primes must have at least 32 bits")
        );
    }

    #[test]
    fn test_rejects_non_safe_primes() {
        // 23 = 2 * 11 + 1 is a Blum safe prime, 29 is prime but 1 mod 4, 31 = 2 * 15 + 1.
        assert!(is_blum_safe_prime(&from_u64(23)));
        assert!(!is_blum_safe_prime(&from_u64(29)));
        assert!(!is_blum_safe_prime(&from_u64(31)));
    }
}
