//! Ring-Pedersen commitments.
//!
//! These are commitments of the form `s^x t^y mod N`, where `N` is the
//! Paillier modulus of the party owning the parameters. The zero-knowledge
//! proofs all use the *verifier's* parameters, so that the prover can't
//! know the trapdoor.
use std::fmt;

use libpaillier::unknown_order::BigNumber;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use crate::{
    constants::CRYPTOGRAPHIC_RETRY_MAX,
    integers::{is_unit, modpow, random_positive, random_unit},
    paillier::{PaillierError, SecretKey},
};

/// Public parameters for ring-Pedersen commitments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedersenParams {
    #[serde(with = "crate::serde::bignum")]
    n: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    s: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    t: BigNumber,
}

/// The secret exponent with `s = t^lambda mod N`.
///
/// This is only needed to prove that the parameters are well formed.
#[derive(Clone)]
pub struct PedersenTrapdoor {
    lambda: BigNumber,
    phi: BigNumber,
}

impl fmt::Debug for PedersenTrapdoor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PedersenTrapdoor([REDACTED])")
    }
}

impl PedersenTrapdoor {
    pub(crate) fn lambda(&self) -> &BigNumber {
        &self.lambda
    }

    pub(crate) fn phi(&self) -> &BigNumber {
        &self.phi
    }
}

impl PedersenParams {
    /// Generate fresh parameters over the modulus of a Paillier key.
    pub fn generate<R: CryptoRngCore>(
        rng: &mut R,
        sk: &SecretKey,
    ) -> Result<(Self, PedersenTrapdoor), PaillierError> {
        let n = sk.public_key().n();
        let phi = sk.phi();
        for _ in 0..CRYPTOGRAPHIC_RETRY_MAX {
            let tau = random_unit(rng, n)?;
            let t = tau.modmul(&tau, n);
            let lambda = random_positive(rng, phi);
            let s = t.modpow(&lambda, n);
            let params = Self {
                n: n.clone(),
                s,
                t,
            };
            if params.validate().is_ok() {
                return Ok((params, PedersenTrapdoor { lambda, phi: phi.clone() }));
            }
        }
        Err(PaillierError::RetryExhausted)
    }

    /// Build parameters from their components, checking them.
    pub fn new(n: BigNumber, s: BigNumber, t: BigNumber) -> Result<Self, PaillierError> {
        let out = Self { n, s, t };
        out.validate()?;
        Ok(out)
    }

    pub fn n(&self) -> &BigNumber {
        &self.n
    }

    pub fn s(&self) -> &BigNumber {
        &self.s
    }

    pub fn t(&self) -> &BigNumber {
        &self.t
    }

    /// Check that `s` and `t` are distinct units, other than 1.
    pub fn validate(&self) -> Result<(), PaillierError> {
        let one = BigNumber::one();
        if !is_unit(&self.s, &self.n) || !is_unit(&self.t, &self.n) {
            return Err(PaillierError::InvalidKey("pedersen bases must be units"));
        }
        if self.s == self.t || self.s == one || self.t == one {
            return Err(PaillierError::InvalidKey("pedersen bases are degenerate"));
        }
        Ok(())
    }

    /// Compute `s^x t^y mod N`.
    pub fn commit(&self, x: &BigNumber, y: &BigNumber) -> Result<BigNumber, PaillierError> {
        let sx = modpow(&self.s, x, &self.n).ok_or(PaillierError::NotInvertible)?;
        let ty = modpow(&self.t, y, &self.n).ok_or(PaillierError::NotInvertible)?;
        Ok(sx.modmul(&ty, &self.n))
    }

    /// Check that `s^a t^b = S T^e mod N`.
    ///
    /// `S` and `T` must be units.
    #[must_use]
    pub fn verify(
        &self,
        a: &BigNumber,
        b: &BigNumber,
        e: &BigNumber,
        big_s: &BigNumber,
        big_t: &BigNumber,
    ) -> bool {
        if !is_unit(big_s, &self.n) || !is_unit(big_t, &self.n) {
            return false;
        }
        let Ok(lhs) = self.commit(a, b) else {
            return false;
        };
        let Some(t_e) = modpow(big_t, e, &self.n) else {
            return false;
        };
        lhs == big_s.modmul(&t_e, &self.n)
    }
}

#[cfg(test)]
mod test {
    use rand_core::OsRng;

    use super::*;
    use crate::{
        integers::{from_u64, random_plusminus_by_size},
        paillier::test_primes,
    };

    #[test]
    fn test_trapdoor_relates_bases() {
        let sk = test_primes::secret_key(0);
        let (params, trapdoor) = PedersenParams::generate(&mut OsRng, &sk).unwrap();
        assert_eq!(params.n(), sk.public_key().n());
        assert_eq!(params.t().modpow(trapdoor.lambda(), params.n()), *params.s());
    }

    #[test]
    fn test_commitments_verify() {
        let sk = test_primes::secret_key(1);
        let (params, _) = PedersenParams::generate(&mut OsRng, &sk).unwrap();
        let x = random_plusminus_by_size(&mut OsRng, 256);
        let y = random_plusminus_by_size(&mut OsRng, 2300);
        let alpha = random_plusminus_by_size(&mut OsRng, 768);
        let gamma = random_plusminus_by_size(&mut OsRng, 2800);
        let e = random_plusminus_by_size(&mut OsRng, 256);

        let big_s = params.commit(&x, &y).unwrap();
        let big_c = params.commit(&alpha, &gamma).unwrap();
        let z1 = &alpha + &(&e * &x);
        let z2 = &gamma + &(&e * &y);
        assert!(params.verify(&z1, &z2, &e, &big_c, &big_s));
        assert!(!params.verify(&(z1 + BigNumber::one()), &z2, &e, &big_c, &big_s));
        assert!(!params.verify(&alpha, &gamma, &e, &big_c, &BigNumber::zero()));
    }

    #[test]
    fn test_degenerate_parameters_are_rejected() {
        let sk = test_primes::secret_key(0);
        let n = sk.public_key().n().clone();
        assert!(PedersenParams::new(n.clone(), from_u64(4), from_u64(4)).is_err());
        assert!(PedersenParams::new(n.clone(), BigNumber::one(), from_u64(4)).is_err());
        assert!(PedersenParams::new(n.clone(), sk.p().clone(), from_u64(4)).is_err());
        assert!(PedersenParams::new(n, from_u64(9), from_u64(4)).is_ok());
    }
}
