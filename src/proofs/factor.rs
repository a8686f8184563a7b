//! Proof that a modulus has no small factors.
//!
//! The prover shows that `N0 = p * q` with both `p` and `q` bounded by
//! `sqrt(N0) * 2^(l + epsilon)`, which rules out factorizations with a tiny
//! factor. Everything is committed with the verifier's ring-Pedersen
//! parameters.
use libpaillier::unknown_order::BigNumber;
use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::challenge;
use crate::{
    compat::CSCurve,
    constants::{EPSILON, L_BOUND},
    integers::{
        is_unit, modpow, pow2, random_plusminus_scaled, within_bound, within_bound_scaled,
    },
    paillier::{PaillierError, PublicKey},
    pedersen::PedersenParams,
    serde::encode,
};

const STATEMENT_LABEL: &[u8] = b"fac proof statement";
const COMMITMENT_LABEL: &[u8] = b"fac proof commitment";
const CHALLENGE_LABEL: &[u8] = b"fac proof challenge";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Statement<'a> {
    /// The key whose modulus is being factored.
    pub pk: &'a PublicKey,
    /// The verifier's commitment parameters.
    pub aux: &'a PedersenParams,
}

#[derive(Clone, Copy)]
pub struct Witness<'a> {
    pub p: &'a BigNumber,
    pub q: &'a BigNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Commitment {
    #[serde(with = "crate::serde::bignum")]
    big_p: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_q: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_a: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_b: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    big_t: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    sigma: BigNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    commitment: Commitment,
    #[serde(with = "crate::serde::bignum")]
    z1: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    z2: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    w1: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    w2: BigNumber,
    #[serde(with = "crate::serde::bignum")]
    v: BigNumber,
}

/// A power of two at least as large as `sqrt(N)`.
fn sqrt_bound(n: &BigNumber) -> BigNumber {
    pow2((n.bit_length() + 1) / 2)
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
    let n0 = statement.pk.n();
    let n_hat = aux.n();
    let sqrt_n0 = sqrt_bound(n0);
    let n0_n_hat = n0 * n_hat;

    let alpha = random_plusminus_scaled(rng, L_BOUND + EPSILON, &sqrt_n0);
    let beta = random_plusminus_scaled(rng, L_BOUND + EPSILON, &sqrt_n0);
    let mu = random_plusminus_scaled(rng, L_BOUND, n_hat);
    let nu = random_plusminus_scaled(rng, L_BOUND, n_hat);
    let sigma = random_plusminus_scaled(rng, L_BOUND, &n0_n_hat);
    let r = random_plusminus_scaled(rng, L_BOUND + EPSILON, &n0_n_hat);
    let x = random_plusminus_scaled(rng, L_BOUND + EPSILON, n_hat);
    let y = random_plusminus_scaled(rng, L_BOUND + EPSILON, n_hat);

    let big_q = aux.commit(witness.q, &nu)?;
    // T = Q^alpha t^r
    let big_t = {
        let q_alpha = modpow(&big_q, &alpha, n_hat).ok_or(PaillierError::NotInvertible)?;
        q_alpha.modmul(&aux.commit(&BigNumber::zero(), &r)?, n_hat)
    };
    let commitment = Commitment {
        big_p: aux.commit(witness.p, &mu)?,
        big_q,
        big_a: aux.commit(&alpha, &x)?,
        big_b: aux.commit(&beta, &y)?,
        big_t,
        sigma: sigma.clone(),
    };

    let e = challenge_for::<C>(transcript, &statement, &commitment);

    let sigma_hat = &sigma - &(&nu * witness.p);
    Ok(Proof {
        commitment,
        z1: &alpha + &(&e * witness.p),
        z2: &beta + &(&e * witness.q),
        w1: &x + &(&e * &mu),
        w2: &y + &(&e * &nu),
        v: &r + &(&e * &sigma_hat),
    })
}

#[must_use]
pub fn verify<C: CSCurve>(
    transcript: &mut Transcript,
    statement: Statement<'_>,
    proof: &Proof,
) -> bool {
    let aux = statement.aux;
    let n_hat = aux.n();
    let com = &proof.commitment;

    let bound = pow2(L_BOUND + EPSILON) * sqrt_bound(statement.pk.n());
    if !within_bound(&proof.z1, &bound) || !within_bound(&proof.z2, &bound) {
        return false;
    }
    let n0_n_hat = statement.pk.n() * n_hat;
    if !within_bound_scaled(&proof.w1, L_BOUND + EPSILON + 1, n_hat)
        || !within_bound_scaled(&proof.w2, L_BOUND + EPSILON + 1, n_hat)
        || !within_bound_scaled(&proof.v, L_BOUND + EPSILON + 1, &n0_n_hat)
    {
        return false;
    }
    if !is_unit(&com.big_t, n_hat) {
        return false;
    }

    let e = challenge_for::<C>(transcript, &statement, com);

    if !aux.verify(&proof.z1, &proof.w1, &e, &com.big_a, &com.big_p)
        || !aux.verify(&proof.z2, &proof.w2, &e, &com.big_b, &com.big_q)
    {
        return false;
    }

    // Q^z1 t^v = T R^e, with R = s^N0 t^sigma
    let Ok(big_r) = aux.commit(statement.pk.n(), &com.sigma) else {
        return false;
    };
    let Some(lhs) = modpow(&com.big_q, &proof.z1, n_hat) else {
        return false;
    };
    let Ok(t_v) = aux.commit(&BigNumber::zero(), &proof.v) else {
        return false;
    };
    let Some(r_e) = modpow(&big_r, &e, n_hat) else {
        return false;
    };
    lhs.modmul(&t_v, n_hat) == com.big_t.modmul(&r_e, n_hat)
}
