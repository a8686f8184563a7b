//! Proof that ring-Pedersen parameters are well formed.
//!
//! This shows that `s` lies in the group generated by `t`, i.e. that the
//! prover knows `lambda` with `s = t^lambda mod N`. Each repetition has a
//! binary challenge, so there are as many repetitions as bits of
//! statistical security.
use libpaillier::unknown_order::BigNumber;
use magikitten::Transcript;
use rand_core::{CryptoRngCore, RngCore};
use serde::{Deserialize, Serialize};

use super::par_map;
use crate::{
    constants::STAT_PARAM,
    integers::{is_negative, is_unit, random_positive},
    pedersen::{PedersenParams, PedersenTrapdoor},
    serde::encode,
};

const STATEMENT_LABEL: &[u8] = b"prm proof statement";
const COMMITMENT_LABEL: &[u8] = b"prm proof commitment";
const CHALLENGE_LABEL: &[u8] = b"prm proof challenge";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Statement<'a> {
    pub aux: &'a PedersenParams,
}

#[derive(Clone, Copy)]
pub struct Witness<'a> {
    pub trapdoor: &'a PedersenTrapdoor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    #[serde(with = "crate::serde::bignums")]
    commitments: Vec<BigNumber>,
    #[serde(with = "crate::serde::bignums")]
    responses: Vec<BigNumber>,
}

fn challenge_bits(
    transcript: &mut Transcript,
    statement: &Statement<'_>,
    commitments: &[BigNumber],
) -> Vec<bool> {
    transcript.message(STATEMENT_LABEL, &encode(statement));
    for a in commitments {
        transcript.message(COMMITMENT_LABEL, &a.to_bytes());
    }
    let mut bytes = vec![0u8; STAT_PARAM];
    transcript.challenge(CHALLENGE_LABEL).fill_bytes(&mut bytes);
    bytes.into_iter().map(|b| b & 1 == 1).collect()
}

pub fn prove(
    rng: &mut impl CryptoRngCore,
    transcript: &mut Transcript,
    statement: Statement<'_>,
    witness: Witness<'_>,
) -> Proof {
    let n = statement.aux.n();
    let t = statement.aux.t();
    let phi = witness.trapdoor.phi();

    let nonces: Vec<BigNumber> = (0..STAT_PARAM).map(|_| random_positive(rng, phi)).collect();
    let commitments = par_map(&nonces, |a| t.modpow(a, n));

    let bits = challenge_bits(transcript, &statement, &commitments);
    let lambda = witness.trapdoor.lambda();
    let responses = nonces
        .iter()
        .zip(bits)
        .map(|(a, e)| if e { (a + lambda).nmod(phi) } else { a.clone() })
        .collect();

    Proof {
        commitments,
        responses,
    }
}

#[must_use]
pub fn verify(transcript: &mut Transcript, statement: Statement<'_>, proof: &Proof) -> bool {
    let aux = statement.aux;
    let n = aux.n();
    if aux.validate().is_err() {
        return false;
    }
    if proof.commitments.len() != STAT_PARAM || proof.responses.len() != STAT_PARAM {
        return false;
    }
    if !proof.commitments.iter().all(|a| is_unit(a, n)) {
        return false;
    }
    if proof.responses.iter().any(|z| is_negative(z) || z >= n) {
        return false;
    }

    let bits = challenge_bits(transcript, &statement, &proof.commitments);
    let items: Vec<_> = proof
        .commitments
        .iter()
        .zip(proof.responses.iter())
        .zip(bits)
        .collect();
    par_map(&items, |((a, z), e)| {
        let rhs = if *e {
            a.modmul(aux.s(), n)
        } else {
            (*a).clone()
        };
        aux.t().modpow(z, n) == rhs
    })
    .into_iter()
    .all(|ok| ok)
}

#[cfg(test)]
mod test {
    use rand_core::OsRng;

    use super::*;
    use crate::{constants::PAILLIER_BITS, integers::pow2, paillier::test_primes};

    #[test]
    fn test_valid_proof_verifies() {
        let sk = test_primes::secret_key(0);
        let (aux, trapdoor) = PedersenParams::generate(&mut OsRng, &sk).unwrap();
        let statement = Statement { aux: &aux };
        let transcript = Transcript::new(b"test");
        let proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[0]),
            statement,
            Witness {
                trapdoor: &trapdoor,
            },
        );
        assert!(verify(
            &mut transcript.forked(b"party", &[0]),
            statement,
            &proof
        ));

        let mut bad = proof.clone();
        bad.responses[0] = &bad.responses[0] + &BigNumber::one();
        assert!(!verify(
            &mut transcript.forked(b"party", &[0]),
            statement,
            &bad
        ));

        // Still a valid exponent, but out of range.
        let mut bad = proof;
        bad.responses[0] = &bad.responses[0] + &(&pow2(PAILLIER_BITS) * trapdoor.phi());
        assert!(!verify(
            &mut transcript.forked(b"party", &[0]),
            statement,
            &bad
        ));
    }

    #[test]
    fn test_unrelated_bases_fail() {
        let sk = test_primes::secret_key(1);
        let (aux, trapdoor) = PedersenParams::generate(&mut OsRng, &sk).unwrap();
        let (other, _) = PedersenParams::generate(&mut OsRng, &sk).unwrap();
        // s from one set of parameters, t from another.
        let mixed =
            PedersenParams::new(aux.n().clone(), other.s().clone(), aux.t().clone()).unwrap();
        let statement = Statement { aux: &mixed };
        let transcript = Transcript::new(b"test");
        let proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[0]),
            statement,
            Witness {
                trapdoor: &trapdoor,
            },
        );
        assert!(!verify(
            &mut transcript.forked(b"party", &[0]),
            statement,
            &proof
        ));
    }
}
