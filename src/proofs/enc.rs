//! Proof that a Paillier ciphertext encrypts a small plaintext.
//!
//! The prover knows `k` in `[-2^l, 2^l]` and `rho` with `K = Enc(k; rho)`.
use libpaillier::unknown_order::BigNumber;
use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::challenge;
use crate::{
    compat::CSCurve,
    constants::{EPSILON, L_BOUND},
    integers::{
        is_unit, modpow, random_plusminus_by_size, random_plusminus_scaled, random_unit,
        within_bound_by_size, within_bound_scaled,
    },
    paillier::{Ciphertext, Nonce, PaillierError, PublicKey},
    pedersen::PedersenParams,
    serde::encode,
};

const STATEMENT_LABEL: &[u8] = b"enc proof statement";
const COMMITMENT_LABEL: &[u8] = b"enc proof commitment";
const CHALLENGE_LABEL: &[u8] = b"enc proof challenge";

/// The public statement: `K` encrypts a small value under `pk`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Statement<'a> {
    pub pk: &'a PublicKey,
    /// The verifier's commitment parameters.
    pub aux: &'a PedersenParams,
    pub big_k: &'a Ciphertext,
}

#[derive(Clone, Copy)]
pub struct Witness<'a> {
    pub k: &'a BigNumber,
    pub rho: &'a Nonce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Commitment {
    #[serde(with = "crate::serde::bignum")]
    big_s: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_a: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_c: BigNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    commitment: Commitment,
    #[serde(with = "crate::serde::bignum")]
    z1: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    z2: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    z3: BigNumber,
}

fn challenge_for<C: CSCurve>(
    transcript: &mut Transcript,
    statement: &Statement<'_>,
    commitment: &Commitment,
) -> BigNumber {
    transcript.message(STATEMENT_LABEL, &encode(statement));
    transcript.message(COMMITMENT_LABEL, &encode(commitment));
    challenge::<C>(transcript, CHALLENGE_LABEL)
}

pub fn prove<C: CSCurve>(
    rng: &mut impl CryptoRngCore,
    transcript: &mut Transcript,
    statement: Statement<'_>,
    witness: Witness<'_>,
) -> Result<Proof, PaillierError> {
    let aux = statement.aux;

    let alpha = random_plusminus_by_size(rng, L_BOUND + EPSILON);
    let mu = random_plusminus_scaled(rng, L_BOUND, aux.n());
    let r = random_unit(rng, statement.pk.n())?;
    let gamma = random_plusminus_scaled(rng, L_BOUND + EPSILON, aux.n());

    let commitment = Commitment {
        big_s: aux.commit(witness.k, &mu)?,
        big_a: statement.pk.raw_encrypt(&alpha, &r),
        big_c: aux.commit(&alpha, &gamma)?,
    };

    let e = challenge_for::<C>(transcript, &statement, &commitment);

    let z1 = &alpha + &(&e * witness.k);
    let z2 = statement.pk.combine_nonces(&r, witness.rho, &e)?;
    let z3 = &gamma + &(&e * &mu);

    Ok(Proof {
        commitment,
        z1,
        z2,
        z3,
    })
}

#[must_use]
pub fn verify<C: CSCurve>(
    transcript: &mut Transcript,
    statement: Statement<'_>,
    proof: &Proof,
) -> bool {
    let pk = statement.pk;
    let Commitment {
        big_s,
        big_a,
        big_c,
    } = &proof.commitment;

    if pk.validate(statement.big_k).is_err() || !is_unit(big_a, pk.nn()) {
        return false;
    }
    if !is_unit(&proof.z2, pk.n()) {
        return false;
    }
    if !within_bound_by_size(&proof.z1, L_BOUND + EPSILON)
        || !within_bound_scaled(&proof.z3, L_BOUND + EPSILON + 1, statement.aux.n())
    {
        return false;
    }

    let e = challenge_for::<C>(transcript, &statement, &proof.commitment);

    // Enc(z1; z2) = A * K^e
    let lhs = pk.raw_encrypt(&proof.z1, &proof.z2);
    let Some(k_e) = modpow(statement.big_k.as_bignum(), &e, pk.nn()) else {
        return false;
    };
    if lhs != big_a.modmul(&k_e, pk.nn()) {
        return false;
    }

    // s^z1 t^z3 = C * S^e
    statement.aux.verify(&proof.z1, &proof.z3, &e, big_c, big_s)
}
