//! Proof that a Paillier plaintext is the discrete logarithm of a point.
//!
//! The prover knows `x` in `[-2^l, 2^l]` and `rho` with `C = Enc(x; rho)` and
//! `X = x * g`, for some base point `g`.
use libpaillier::unknown_order::BigNumber;
use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::challenge;
use crate::{
    compat::{bignum_to_scalar, CSCurve},
    constants::{EPSILON, L_BOUND},
    integers::{
        is_unit, modpow, random_plusminus_by_size, random_plusminus_scaled, random_unit,
        within_bound_by_size, within_bound_scaled,
    },
    paillier::{Ciphertext, Nonce, PaillierError, PublicKey},
    pedersen::PedersenParams,
    serde::{deserialize_projective_point, encode, serialize_projective_point},
};

const STATEMENT_LABEL: &[u8] = b"logstar proof statement";
const COMMITMENT_LABEL: &[u8] = b"logstar proof commitment";
const CHALLENGE_LABEL: &[u8] = b"logstar proof challenge";

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(bound = "C: CSCurve")]
pub struct Statement<'a, C: CSCurve> {
    pub pk: &'a PublicKey,
    /// The verifier's commitment parameters.
    pub aux: &'a PedersenParams,
    pub big_c: &'a Ciphertext,
    #[serde(serialize_with = "serialize_projective_point::<C, _>")]
    pub big_x: &'a C::ProjectivePoint,
    #[serde(serialize_with = "serialize_projective_point::<C, _>")]
    pub base: &'a C::ProjectivePoint,
}

#[derive(Clone, Copy)]
pub struct Witness<'a> {
    pub x: &'a BigNumber,
    pub rho: &'a Nonce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: CSCurve")]
struct Commitment<C: CSCurve> {
    #[serde(with = "crate::serde::bignum")]
    big_s: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_a: BigNumber,
    #[serde(
        serialize_with = "serialize_projective_point::<C, _>",
        deserialize_with = "deserialize_projective_point::<C, _>"
    )]
    big_y: C::ProjectivePoint,
    #[serde(with = "crate::serde::bignum")]
    big_d: BigNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: CSCurve")]
pub struct Proof<C: CSCurve> {
    commitment: Commitment<C>,
    #[serde(with = "crate::serde::bignum")]
    z1: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    z2: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    z3: BigNumber,
}

fn challenge_for<C: CSCurve>(
    transcript: &mut Transcript,
    statement: &Statement<'_, C>,
    commitment: &Commitment<C>,
) -> BigNumber {
    transcript.message(STATEMENT_LABEL, &encode(statement));
    transcript.message(COMMITMENT_LABEL, &encode(commitment));
    challenge::<C>(transcript, CHALLENGE_LABEL)
}

pub fn prove<C: CSCurve>(
    rng: &mut impl CryptoRngCore,
    transcript: &mut Transcript,
    statement: Statement<'_, C>,
    witness: Witness<'_>,
) -> Result<Proof<C>, PaillierError> {
    let aux = statement.aux;

    let alpha = random_plusminus_by_size(rng, L_BOUND + EPSILON);
    let mu = random_plusminus_scaled(rng, L_BOUND, aux.n());
    let r = random_unit(rng, statement.pk.n())?;
    let gamma = random_plusminus_scaled(rng, L_BOUND + EPSILON, aux.n());

    let commitment = Commitment {
        big_s: aux.commit(witness.x, &mu)?,
        big_a: statement.pk.raw_encrypt(&alpha, &r),
        big_y: *statement.base * bignum_to_scalar::<C>(&alpha),
        big_d: aux.commit(&alpha, &gamma)?,
    };

    let e = challenge_for(transcript, &statement, &commitment);

    Ok(Proof {
        commitment,
        z1: &alpha + &(&e * witness.x),
        z2: statement.pk.combine_nonces(&r, witness.rho, &e)?,
        z3: &gamma + &(&e * &mu),
    })
}

#[must_use]
pub fn verify<C: CSCurve>(
    transcript: &mut Transcript,
    statement: Statement<'_, C>,
    proof: &Proof<C>,
) -> bool {
    let pk = statement.pk;
    let com = &proof.commitment;

    if pk.validate(statement.big_c).is_err()
        || !is_unit(&com.big_a, pk.nn())
        || !is_unit(&proof.z2, pk.n())
    {
        return false;
    }
    if !within_bound_by_size(&proof.z1, L_BOUND + EPSILON)
        || !within_bound_scaled(&proof.z3, L_BOUND + EPSILON + 1, statement.aux.n())
    {
        return false;
    }

    let e = challenge_for(transcript, &statement, com);

    // Enc(z1; z2) = A C^e
    let Some(c_e) = modpow(statement.big_c.as_bignum(), &e, pk.nn()) else {
        return false;
    };
    if pk.raw_encrypt(&proof.z1, &proof.z2) != com.big_a.modmul(&c_e, pk.nn()) {
        return false;
    }

    // z1 * g = Y + e * X
    if *statement.base * bignum_to_scalar::<C>(&proof.z1)
        != com.big_y + *statement.big_x * bignum_to_scalar::<C>(&e)
    {
        return false;
    }

    statement
        .aux
        .verify(&proof.z1, &proof.z3, &e, &com.big_d, &com.big_s)
}
