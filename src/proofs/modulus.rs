//! Proof that a modulus is a product of two primes (a Paillier-Blum modulus).
//!
//! The prover picks `w` with Jacobi symbol `-1`, and then for each of the
//! challenges `y_i` reveals a fourth root of `(-1)^a w^b y_i`, along with an
//! `N`-th root of `y_i`. Only someone knowing the factorization of a Blum
//! modulus can do this for random challenges.
use libpaillier::unknown_order::BigNumber;
use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::par_map;
use crate::{
    constants::{CRYPTOGRAPHIC_RETRY_MAX, STAT_PARAM},
    integers::{crt, from_u64, is_unit, jacobi, positive_from_stream, random_unit},
    paillier::{PaillierError, PublicKey},
    serde::encode,
};

const STATEMENT_LABEL: &[u8] = b"mod proof statement";
const COMMITMENT_LABEL: &[u8] = b"mod proof commitment";
const CHALLENGE_LABEL: &[u8] = b"mod proof challenge";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Statement<'a> {
    pub pk: &'a PublicKey,
}

/// The factorization of the modulus.
#[derive(Clone, Copy)]
pub struct Witness<'a> {
    pub p: &'a BigNumber,
    pub q: &'a BigNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Response {
    #[serde(with = "crate::serde::bignum")]
    x: BigNumber,
    a: bool,
    b: bool,
    #[serde(with = "crate::serde::bignum")]
    z: BigNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    #[serde(with = "crate::serde::bignum")]
    w: BigNumber,
    responses: Vec<Response>,
}

fn challenges(
    transcript: &mut Transcript,
    statement: &Statement<'_>,
    w: &BigNumber,
) -> Vec<BigNumber> {
    transcript.message(STATEMENT_LABEL, &encode(statement));
    transcript.message(COMMITMENT_LABEL, &w.to_bytes());
    let mut stream = transcript.challenge(CHALLENGE_LABEL);
    (0..STAT_PARAM)
        .map(|_| positive_from_stream(&mut stream, statement.pk.n()))
        .collect()
}

/// `(-1)^a w^b y mod N`.
fn adjust(n: &BigNumber, w: &BigNumber, y: &BigNumber, a: bool, b: bool) -> BigNumber {
    let mut out = y.nmod(n);
    if b {
        out = out.modmul(w, n);
    }
    if a {
        out = (n - &out).nmod(n);
    }
    out
}

/// A fourth root modulo a Blum prime, of a quadratic residue.
fn fourth_root(y: &BigNumber, p: &BigNumber) -> BigNumber {
    let e = (p + &BigNumber::one()) / &from_u64(4);
    y.modpow(&e, p).modpow(&e, p)
}

pub fn prove(
    rng: &mut impl CryptoRngCore,
    transcript: &mut Transcript,
    statement: Statement<'_>,
    witness: Witness<'_>,
) -> Result<Proof, PaillierError> {
    let n = statement.pk.n();
    let (p, q) = (witness.p, witness.q);

    let mut w = None;
    for _ in 0..CRYPTOGRAPHIC_RETRY_MAX {
        let candidate = random_unit(rng, n)?;
        if jacobi(&candidate, n) == -1 {
            w = Some(candidate);
            break;
        }
    }
    let w = w.ok_or(PaillierError::RetryExhausted)?;

    let one = BigNumber::one();
    let phi = &(p - &one) * &(q - &one);
    let n_inv = n.invert(&phi).ok_or(PaillierError::NotInvertible)?;

    let ys = challenges(transcript, &statement, &w);
    let responses = par_map(&ys, |y| -> Result<Response, PaillierError> {
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            let y_prime = adjust(n, &w, y, a, b);
            if jacobi(&y_prime, p) == 1 && jacobi(&y_prime, q) == 1 {
                let x = crt(&fourth_root(&y_prime, p), &fourth_root(&y_prime, q), p, q)
                    .ok_or(PaillierError::NotInvertible)?;
                let z = y.modpow(&n_inv, n);
                return Ok(Response { x, a, b, z });
            }
        }
        Err(PaillierError::NotInvertible)
    });

    Ok(Proof {
        w,
        responses: responses.into_iter().collect::<Result<_, _>>()?,
    })
}

#[must_use]
pub fn verify(transcript: &mut Transcript, statement: Statement<'_>, proof: &Proof) -> bool {
    let n = statement.pk.n();

    if n.nmod(&from_u64(2)) == BigNumber::zero() || n.is_prime() {
        return false;
    }
    if !is_unit(&proof.w, n) || jacobi(&proof.w, n) != -1 {
        return false;
    }
    if proof.responses.len() != STAT_PARAM {
        return false;
    }

    let ys = challenges(transcript, &statement, &proof.w);
    let items: Vec<_> = ys.iter().zip(proof.responses.iter()).collect();
    let four = from_u64(4);
    par_map(&items, |(y, r)| {
        if !is_unit(y, n) {
            return false;
        }
        r.z.modpow(n, n) == **y && r.x.modpow(&four, n) == adjust(n, &proof.w, y, r.a, r.b)
    })
    .into_iter()
    .all(|ok| ok)
}

#[cfg(test)]
mod test {
    use rand_core::OsRng;

    use super::*;
    use crate::paillier::test_primes;

    #[test]
    fn test_valid_proof_verifies() {
        let sk = test_primes::secret_key(0);
        let statement = Statement {
            pk: sk.public_key(),
        };
        let transcript = Transcript::new(b"test");
        let proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[0]),
            statement,
            Witness {
                p: sk.p(),
                q: sk.q(),
            },
        )
        .unwrap();
        assert!(verify(
            &mut transcript.forked(b"party", &[0]),
            statement,
            &proof
        ));
        assert!(!verify(
            &mut transcript.forked(b"party", &[1]),
            statement,
            &proof
        ));

        let mut bad = proof.clone();
        bad.responses[3].a = !bad.responses[3].a;
        assert!(!verify(
            &mut transcript.forked(b"party", &[0]),
            statement,
            &bad
        ));

        let mut bad = proof;
        bad.responses.pop();
        assert!(!verify(
            &mut transcript.forked(b"party", &[0]),
            statement,
            &bad
        ));
    }

    #[test]
    fn test_prime_modulus_is_rejected() {
        // With N = p a Blum prime, every response can be computed without
        // knowing any factorization.
        let p = test_primes::prime(0);
        let pk = PublicKey::from_modulus(p.clone()).unwrap();
        let statement = Statement { pk: &pk };
        let w = &p - &BigNumber::one();
        assert_eq!(jacobi(&w, &p), -1);

        let transcript = Transcript::new(b"test");
        let ys = challenges(&mut transcript.forked(b"party", &[0]), &statement, &w);
        let four = from_u64(4);
        let responses: Vec<Response> = ys
            .iter()
            .map(|y| {
                let b = jacobi(y, &p) != 1;
                let x = fourth_root(&adjust(&p, &w, y, false, b), &p);
                // z^p = z mod p, so z = y is a p-th root of y.
                let z = y.clone();
                assert!(z.modpow(&p, &p) == *y);
                assert!(x.modpow(&four, &p) == adjust(&p, &w, y, false, b));
                Response { x, a: false, b, z }
            })
            .collect();
        let proof = Proof { w, responses };

        assert!(!verify(
            &mut transcript.forked(b"party", &[0]),
            statement,
            &proof
        ));
    }

    #[test]
    fn test_other_modulus_fails() {
        let sk = test_primes::secret_key(0);
        let other = test_primes::secret_key(1);
        let transcript = Transcript::new(b"test");
        let proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[0]),
            Statement {
                pk: sk.public_key(),
            },
            Witness {
                p: sk.p(),
                q: sk.q(),
            },
        )
        .unwrap();
        assert!(!verify(
            &mut transcript.forked(b"party", &[0]),
            Statement {
                pk: other.public_key(),
            },
            &proof
        ));
    }
}
