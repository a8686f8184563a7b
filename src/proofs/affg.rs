//! Proof of a Paillier affine operation, with the multiplier committed in the group.
//!
//! The statement involves two Paillier keys: `pk0`, the verifier's, and
//! `pk1`, the prover's. The prover knows `x` in `[-2^l, 2^l]` and `y` in
//! `[-2^l', 2^l']` such that:
//!
//! - `D = C^x * Enc0(y; rho)`,
//! - `Y = Enc1(y; rho_y)`,
//! - `X = x * G`.
//!
//! This is what makes the share conversion in presigning safe.
use elliptic_curve::Group;
use libpaillier::unknown_order::BigNumber;
use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::challenge;
use crate::{
    compat::{bignum_to_scalar, CSCurve},
    constants::{EPSILON, L_BOUND, L_PRIME_BOUND},
    integers::{
        is_unit, modpow, random_plusminus_by_size, random_plusminus_scaled, random_unit,
        within_bound_by_size, within_bound_scaled,
    },
    paillier::{Ciphertext, Nonce, PaillierError, PublicKey},
    pedersen::PedersenParams,
    serde::{deserialize_projective_point, encode, serialize_projective_point},
};

const STATEMENT_LABEL: &[u8] = b"affg proof statement";
const COMMITMENT_LABEL: &[u8] = b"affg proof commitment";
const CHALLENGE_LABEL: &[u8] = b"affg proof challenge";

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(bound = "C: CSCurve")]
pub struct Statement<'a, C: CSCurve> {
    /// The verifier's key, under which `C` and `D` are encrypted.
    pub pk0: &'a PublicKey,
    /// The prover's key, under which `Y` is encrypted.
    pub pk1: &'a PublicKey,
    /// The verifier's commitment parameters.
    pub aux: &'a PedersenParams,
    pub big_c: &'a Ciphertext,
    pub big_d: &'a Ciphertext,
    pub big_y: &'a Ciphertext,
    #[serde(serialize_with = "serialize_projective_point::<C, _>")]
    pub big_x: &'a C::ProjectivePoint,
}

#[derive(Clone, Copy)]
pub struct Witness<'a> {
    pub x: &'a BigNumber,
    pub y: &'a BigNumber,
    /// The nonce of the encryption of `y` inside `D`.
    pub rho: &'a Nonce,
    /// The nonce of `Y`.
    pub rho_y: &'a Nonce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: CSCurve")]
struct Commitment<C: CSCurve> {
    #[serde(with = "crate::serde::bignum")]
    big_a: BigNumber,
    #[serde(
        serialize_with = "serialize_projective_point::<C, _>",
        deserialize_with = "deserialize_projective_point::<C, _>"
    )]
    big_bx: C::ProjectivePoint,
    #[serde(with = "crate::serde::bignum")]
    big_by: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_e: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_s: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_f: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_t: BigNumber,
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
    #[serde(with = "crate::serde::bignum")]
    z4: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    w: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    w_y: BigNumber,
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

/// Compute `C^x * Enc(y; r) mod N^2`.
fn affine(
    pk: &PublicKey,
    c: &BigNumber,
    x: &BigNumber,
    y: &BigNumber,
    r: &BigNumber,
) -> Option<BigNumber> {
    let c_x = modpow(c, x, pk.nn())?;
    Some(c_x.modmul(&pk.raw_encrypt(y, r), pk.nn()))
}

pub fn prove<C: CSCurve>(
    rng: &mut impl CryptoRngCore,
    transcript: &mut Transcript,
    statement: Statement<'_, C>,
    witness: Witness<'_>,
) -> Result<Proof<C>, PaillierError> {
    let aux = statement.aux;
    let (pk0, pk1) = (statement.pk0, statement.pk1);

    let alpha = random_plusminus_by_size(rng, L_BOUND + EPSILON);
    let beta = random_plusminus_by_size(rng, L_PRIME_BOUND + EPSILON);
    let r = random_unit(rng, pk0.n())?;
    let r_y = random_unit(rng, pk1.n())?;
    let gamma = random_plusminus_scaled(rng, L_BOUND + EPSILON, aux.n());
    let m = random_plusminus_scaled(rng, L_BOUND, aux.n());
    let delta = random_plusminus_scaled(rng, L_BOUND + EPSILON, aux.n());
    let mu = random_plusminus_scaled(rng, L_BOUND, aux.n());

    let big_a = affine(pk0, statement.big_c.as_bignum(), &alpha, &beta, &r)
        .ok_or(PaillierError::InvalidCiphertext)?;
    let commitment = Commitment {
        big_a,
        big_bx: C::ProjectivePoint::generator() * bignum_to_scalar::<C>(&alpha),
        big_by: pk1.raw_encrypt(&beta, &r_y),
        big_e: aux.commit(&alpha, &gamma)?,
        big_s: aux.commit(witness.x, &m)?,
        big_f: aux.commit(&beta, &delta)?,
        big_t: aux.commit(witness.y, &mu)?,
    };

    let e = challenge_for(transcript, &statement, &commitment);

    Ok(Proof {
        commitment,
        z1: &alpha + &(&e * witness.x),
        z2: &beta + &(&e * witness.y),
        z3: &gamma + &(&e * &m),
        z4: &delta + &(&e * &mu),
        w: pk0.combine_nonces(&r, witness.rho, &e)?,
        w_y: pk1.combine_nonces(&r_y, witness.rho_y, &e)?,
    })
}

#[must_use]
pub fn verify<C: CSCurve>(
    transcript: &mut Transcript,
    statement: Statement<'_, C>,
    proof: &Proof<C>,
) -> bool {
    let (pk0, pk1) = (statement.pk0, statement.pk1);
    let com = &proof.commitment;

    let well_formed = pk0.validate(statement.big_c).is_ok()
        && pk0.validate(statement.big_d).is_ok()
        && pk1.validate(statement.big_y).is_ok()
        && is_unit(&com.big_a, pk0.nn())
        && is_unit(&com.big_by, pk1.nn())
        && is_unit(&proof.w, pk0.n())
        && is_unit(&proof.w_y, pk1.n());
    if !well_formed {
        return false;
    }
    if !within_bound_by_size(&proof.z1, L_BOUND + EPSILON)
        || !within_bound_by_size(&proof.z2, L_PRIME_BOUND + EPSILON)
        || !within_bound_scaled(&proof.z3, L_BOUND + EPSILON + 1, statement.aux.n())
        || !within_bound_scaled(&proof.z4, L_BOUND + EPSILON + 1, statement.aux.n())
    {
        return false;
    }

    let e = challenge_for(transcript, &statement, com);

    // C^z1 Enc0(z2; w) = A D^e
    let Some(lhs) = affine(
        pk0,
        statement.big_c.as_bignum(),
        &proof.z1,
        &proof.z2,
        &proof.w,
    ) else {
        return false;
    };
    let Some(d_e) = modpow(statement.big_d.as_bignum(), &e, pk0.nn()) else {
        return false;
    };
    if lhs != com.big_a.modmul(&d_e, pk0.nn()) {
        return false;
    }

    // z1 * G = Bx + e * X
    let e_scalar = bignum_to_scalar::<C>(&e);
    if C::ProjectivePoint::generator() * bignum_to_scalar::<C>(&proof.z1)
        != com.big_bx + *statement.big_x * e_scalar
    {
        return false;
    }

    // Enc1(z2; w_y) = By Y^e
    let Some(y_e) = modpow(statement.big_y.as_bignum(), &e, pk1.nn()) else {
        return false;
    };
    if pk1.raw_encrypt(&proof.z2, &proof.w_y) != com.big_by.modmul(&y_e, pk1.nn()) {
        return false;
    }

    let aux = statement.aux;
    aux.verify(&proof.z1, &proof.z3, &e, &com.big_e, &com.big_s)
        && aux.verify(&proof.z2, &proof.z4, &e, &com.big_f, &com.big_t)
}
