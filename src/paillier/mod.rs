//! The Paillier cryptosystem.
//!
//! Ciphertexts live in `Z_{N^2}`, and encrypting `m` with nonce `r` gives
//! `(1 + N)^m * r^N mod N^2`. Adding ciphertexts adds plaintexts, and raising
//! a ciphertext to some integer multiplies its plaintext by that integer.
//!
//! All operations here are pure, returning new ciphertexts.
use std::fmt;

use libpaillier::unknown_order::BigNumber;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::{
    constants::{PAILLIER_BITS, PRIME_BITS},
    integers::{self, from_u64, is_unit, modpow, random_unit},
};

pub(crate) mod primes;
#[cfg(test)]
pub(crate) mod test_primes;

/// Errors produced by local Paillier arithmetic.
///
/// These indicate bad inputs, and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaillierError {
    #[error("plaintext is outside of the range [-(N-1)/2, (N-1)/2]")]
    RangeViolation,
    #[error("ciphertext is not a unit modulo N^2")]
    InvalidCiphertext,
    #[error("invalid Paillier key: {0}")]
    InvalidKey(&'static str),
    #[error("value is not invertible modulo the given modulus")]
    NotInvertible,
    #[error("safe prime search exceeded its iteration bound")]
    PrimeGenerationExhausted,
    #[error("exceeded the maximum number of attempts while sampling a random value")]
    RetryExhausted,
}

/// An encrypted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(#[serde(with = "crate::serde::bignum")] BigNumber);

impl Ciphertext {
    pub fn as_bignum(&self) -> &BigNumber {
        &self.0
    }
}

impl From<BigNumber> for Ciphertext {
    fn from(x: BigNumber) -> Self {
        Self(x)
    }
}

/// The randomness used when encrypting.
///
/// Knowing the nonce of a ciphertext lets you prove things about its plaintext.
#[derive(Clone)]
pub struct Nonce(BigNumber);

impl Nonce {
    #[cfg(test)]
    pub(crate) fn as_bignum(&self) -> &BigNumber {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce([REDACTED])")
    }
}

/// A Paillier public key, i.e. the modulus `N`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPublicKey", into = "RawPublicKey")]
pub struct PublicKey {
    n: BigNumber,
    nn: BigNumber,
}

#[derive(Serialize, Deserialize)]
struct RawPublicKey(#[serde(with = "crate::serde::bignum")] BigNumber);

impl From<PublicKey> for RawPublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(pk.n)
    }
}

impl TryFrom<RawPublicKey> for PublicKey {
    type Error = PaillierError;

    fn try_from(raw: RawPublicKey) -> Result<Self, Self::Error> {
        Self::from_modulus(raw.0)
    }
}

impl PublicKey {
    /// Create a public key from a modulus.
    ///
    /// This only checks that the modulus is odd and large enough to be usable,
    /// not that it has the right size or structure.
    pub fn from_modulus(n: BigNumber) -> Result<Self, PaillierError> {
        if n <= from_u64(2) || n.nmod(&from_u64(2)) == BigNumber::zero() {
            return Err(PaillierError::InvalidKey("modulus must be odd"));
        }
        let nn = &n * &n;
        Ok(Self { n, nn })
    }

    /// The modulus `N`.
    pub fn n(&self) -> &BigNumber {
        &self.n
    }

    /// The ciphertext modulus `N^2`.
    pub fn nn(&self) -> &BigNumber {
        &self.nn
    }

    /// Check that a ciphertext is a unit modulo `N^2`.
    pub fn validate(&self, c: &Ciphertext) -> Result<(), PaillierError> {
        if !is_unit(&c.0, &self.nn) {
            return Err(PaillierError::InvalidCiphertext);
        }
        Ok(())
    }

    /// Compute `(1 + N)^m * r^N mod N^2`, for any integer `m`.
    ///
    /// The nonce is not checked, and the plaintext not bounded, which is what
    /// proof verification needs.
    pub(crate) fn raw_encrypt(&self, m: &BigNumber, r: &BigNumber) -> BigNumber {
        // (1 + N)^m = 1 + mN mod N^2
        let gm = (BigNumber::one() + &(m.nmod(&self.n) * &self.n)).nmod(&self.nn);
        gm.modmul(&r.modpow(&self.n, &self.nn), &self.nn)
    }

    fn check_range(&self, m: &BigNumber) -> Result<(), PaillierError> {
        let bound = (&self.n - &BigNumber::one()) / &from_u64(2);
        if !integers::within_bound(m, &bound) {
            error!("plaintext out of range for encryption");
            return Err(PaillierError::RangeViolation);
        }
        Ok(())
    }

    /// Encrypt a plaintext, returning the nonce used.
    ///
    /// The plaintext must lie in `[-(N-1)/2, (N-1)/2]`.
    pub fn encrypt<R: CryptoRngCore>(
        &self,
        rng: &mut R,
        m: &BigNumber,
    ) -> Result<(Ciphertext, Nonce), PaillierError> {
        self.check_range(m)?;
        let r = random_unit(rng, &self.n)?;
        let c = self.raw_encrypt(m, &r);
        Ok((Ciphertext(c), Nonce(r)))
    }

    /// Encrypt a plaintext with a specific nonce.
    pub fn encrypt_with_nonce(
        &self,
        m: &BigNumber,
        nonce: &Nonce,
    ) -> Result<Ciphertext, PaillierError> {
        self.check_range(m)?;
        if !is_unit(&nonce.0, &self.n) {
            return Err(PaillierError::NotInvertible);
        }
        Ok(Ciphertext(self.raw_encrypt(m, &nonce.0)))
    }

    /// Homomorphically add the plaintexts of two ciphertexts.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, PaillierError> {
        self.validate(a)?;
        self.validate(b)?;
        Ok(Ciphertext(a.0.modmul(&b.0, &self.nn)))
    }

    /// Homomorphically multiply the plaintext of a ciphertext by an integer.
    pub fn mul(&self, c: &Ciphertext, k: &BigNumber) -> Result<Ciphertext, PaillierError> {
        self.validate(c)?;
        let out = modpow(&c.0, k, &self.nn).ok_or(PaillierError::InvalidCiphertext)?;
        Ok(Ciphertext(out))
    }

    /// Re-blind a ciphertext, without changing its plaintext.
    ///
    /// A fresh nonce is sampled unless one is provided. The nonce used is returned.
    pub fn randomize<R: CryptoRngCore>(
        &self,
        rng: &mut R,
        c: &Ciphertext,
        nonce: Option<&Nonce>,
    ) -> Result<(Ciphertext, Nonce), PaillierError> {
        self.validate(c)?;
        let r = match nonce {
            Some(nonce) if is_unit(&nonce.0, &self.n) => nonce.0.clone(),
            Some(_) => return Err(PaillierError::NotInvertible),
            None => random_unit(rng, &self.n)?,
        };
        let out = c.0.modmul(&r.modpow(&self.n, &self.nn), &self.nn);
        Ok((Ciphertext(out), Nonce(r)))
    }

    /// Multiply a nonce by another nonce raised to some integer, modulo `N`.
    ///
    /// This is how the masked nonces in proofs are formed.
    pub(crate) fn combine_nonces(
        &self,
        r: &BigNumber,
        rho: &Nonce,
        e: &BigNumber,
    ) -> Result<BigNumber, PaillierError> {
        let rho_e = modpow(&rho.0, e, &self.n).ok_or(PaillierError::NotInvertible)?;
        Ok(r.modmul(&rho_e, &self.n))
    }
}

/// A Paillier secret key, i.e. the factorization of the modulus.
///
/// This never leaves the party which generated it.
#[derive(Clone)]
pub struct SecretKey {
    p: BigNumber,
    q: BigNumber,
    phi: BigNumber,
    phi_inv: BigNumber,
    public: PublicKey,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl SecretKey {
    /// Generate a fresh key, from two new Blum safe primes.
    ///
    /// With the `parallel` feature, both primes are searched for concurrently.
    pub fn generate<R: CryptoRngCore>(rng: &mut R) -> Result<Self, PaillierError> {
        let (p, q) = primes::safe_prime_pair(rng, PRIME_BITS)?;
        Self::from_primes(p, q)
    }

    /// Create a key from two known primes.
    ///
    /// Both primes must be Blum safe primes, with a product of exactly the right size.
    pub fn from_primes(p: BigNumber, q: BigNumber) -> Result<Self, PaillierError> {
        if p == q {
            return Err(PaillierError::InvalidKey("primes must be distinct"));
        }
        if !primes::is_blum_safe_prime(&p) || !primes::is_blum_safe_prime(&q) {
            return Err(PaillierError::InvalidKey("factors must be Blum safe primes"));
        }
        let n = &p * &q;
        if n.bit_length() != PAILLIER_BITS {
            return Err(PaillierError::InvalidKey("modulus has the wrong size"));
        }
        let one = BigNumber::one();
        let phi = &(&p - &one) * &(&q - &one);
        let phi_inv = phi
            .invert(&n)
            .ok_or(PaillierError::InvalidKey("phi(N) is not invertible modulo N"))?;
        let public = PublicKey::from_modulus(n)?;
        Ok(Self {
            p,
            q,
            phi,
            phi_inv,
            public,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub(crate) fn p(&self) -> &BigNumber {
        &self.p
    }

    pub(crate) fn q(&self) -> &BigNumber {
        &self.q
    }

    pub(crate) fn phi(&self) -> &BigNumber {
        &self.phi
    }

    /// Decrypt a ciphertext.
    ///
    /// This returns the symmetric representative of the plaintext, in `[-(N-1)/2, (N-1)/2]`.
    pub fn decrypt(&self, c: &Ciphertext) -> Result<BigNumber, PaillierError> {
        let n = self.public.n();
        let nn = self.public.nn();
        if let Err(e) = self.public.validate(c) {
            error!("refusing to decrypt a malformed ciphertext");
            return Err(e);
        }
        // L(u) = (u - 1) / N
        let u = c.0.modpow(&self.phi, nn);
        let l = (u - BigNumber::one()) / n;
        let m = l.modmul(&self.phi_inv, n);
        let half = (n - &BigNumber::one()) / &from_u64(2);
        if m > half {
            Ok(m - n)
        } else {
            Ok(m)
        }
    }
}
