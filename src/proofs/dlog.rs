//! Schnorr proofs of knowledge of a discrete logarithm.
//!
//! Besides the usual one-shot form, the proof can be split in two phases:
//! the first message can be generated (and committed to) before the statement
//! is revealed, and then used to finish the proof later.
use elliptic_curve::{Field, Group};
use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use crate::{
    compat::CSCurve,
    serde::{
        deserialize_projective_point, deserialize_scalar, encode, serialize_projective_point,
        serialize_scalar,
    },
};

/// The label we use for hashing the statement.
const STATEMENT_LABEL: &[u8] = b"dlog proof statement";
/// The label we use for hashing the first prover message.
const COMMITMENT_LABEL: &[u8] = b"dlog proof commitment";
/// The label we use for generating the challenge.
const CHALLENGE_LABEL: &[u8] = b"dlog proof challenge";

/// The public statement for this proof.
///
/// This statement claims knowledge of the discrete logarithm of some point.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(bound = "C: CSCurve")]
pub struct Statement<'a, C: CSCurve> {
    #[serde(serialize_with = "serialize_projective_point::<C, _>")]
    pub public: &'a C::ProjectivePoint,
}

impl<'a, C: CSCurve> Statement<'a, C> {
    /// Calculate the homomorphism we want to prove things about.
    fn phi(&self, x: &C::Scalar) -> C::ProjectivePoint {
        C::ProjectivePoint::generator() * x
    }
}

/// The private witness for this proof.
///
/// This holds the scalar the prover needs to know.
#[derive(Clone, Copy)]
pub struct Witness<'a, C: CSCurve> {
    pub x: &'a C::Scalar,
}

/// The first message of the prover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "C: CSCurve")]
pub struct Commitment<C: CSCurve> {
    #[serde(
        serialize_with = "serialize_projective_point::<C, _>",
        deserialize_with = "deserialize_projective_point::<C, _>"
    )]
    big_k: C::ProjectivePoint,
}

/// The secret nonce behind a commitment, kept until the proof is finished.
#[derive(Clone)]
pub struct Precommitment<C: CSCurve> {
    k: C::Scalar,
    commitment: Commitment<C>,
}

impl<C: CSCurve> Precommitment<C> {
    pub fn commitment(&self) -> &Commitment<C> {
        &self.commitment
    }
}

/// Represents a proof of the statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: CSCurve")]
pub struct Proof<C: CSCurve> {
    commitment: Commitment<C>,
    #[serde(
        serialize_with = "serialize_scalar::<C, _>",
        deserialize_with = "deserialize_scalar::<C, _>"
    )]
    s: C::Scalar,
}

impl<C: CSCurve> Proof<C> {
    pub fn commitment(&self) -> &Commitment<C> {
        &self.commitment
    }
}

/// Generate the first message of a proof, before knowing the statement.
pub fn precommit<C: CSCurve>(rng: &mut impl CryptoRngCore) -> Precommitment<C> {
    let k = C::Scalar::random(rng);
    let big_k = C::ProjectivePoint::generator() * k;
    Precommitment {
        k,
        commitment: Commitment { big_k },
    }
}

fn challenge<C: CSCurve>(
    transcript: &mut Transcript,
    statement: &Statement<'_, C>,
    commitment: &Commitment<C>,
) -> C::Scalar {
    transcript.message(STATEMENT_LABEL, &encode(statement));
    transcript.message(COMMITMENT_LABEL, &encode(commitment));
    C::Scalar::random(&mut transcript.challenge(CHALLENGE_LABEL))
}

/// Finish a proof, using a nonce generated earlier.
///
/// The precommitment is consumed, since using it twice leaks the witness.
pub fn prove_with_precommitment<'a, C: CSCurve>(
    transcript: &mut Transcript,
    statement: Statement<'a, C>,
    witness: Witness<'a, C>,
    precommitment: Precommitment<C>,
) -> Proof<C> {
    let e = challenge(transcript, &statement, &precommitment.commitment);
    let s = precommitment.k + e * witness.x;
    Proof {
        commitment: precommitment.commitment,
        s,
    }
}

/// Prove that a witness satisfies a given statement.
///
/// We need some randomness for the proof, and also a transcript, which is
/// used for the Fiat-Shamir transform.
#[cfg(test)]
pub fn prove<'a, C: CSCurve>(
    rng: &mut impl CryptoRngCore,
    transcript: &mut Transcript,
    statement: Statement<'a, C>,
    witness: Witness<'a, C>,
) -> Proof<C> {
    prove_with_precommitment(transcript, statement, witness, precommit(rng))
}

/// Verify that a proof attesting to the validity of some statement.
///
/// We use a transcript in order to verify the Fiat-Shamir transformation.
#[must_use]
pub fn verify<C: CSCurve>(
    transcript: &mut Transcript,
    statement: Statement<'_, C>,
    proof: &Proof<C>,
) -> bool {
    let e = challenge(transcript, &statement, &proof.commitment);
    statement.phi(&proof.s) == proof.commitment.big_k + *statement.public * e
}

#[cfg(test)]
mod test {
    use rand_core::OsRng;

    use super::*;
    use k256::{ProjectivePoint, Scalar, Secp256k1};

    #[test]
    fn test_valid_proof_verifies() {
        let x = Scalar::generate_biased(&mut OsRng);

        let statement = Statement::<Secp256k1> {
            public: &(ProjectivePoint::GENERATOR * x),
        };
        let witness = Witness { x: &x };

        let transcript = Transcript::new(b"protocol");

        let proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[1]),
            statement,
            witness,
        );

        let ok = verify(&mut transcript.forked(b"party", &[1]), statement, &proof);

        assert!(ok);
        // Bound to the prover's identity.
        assert!(!verify(
            &mut transcript.forked(b"party", &[2]),
            statement,
            &proof
        ));
    }

    #[test]
    fn test_precommitted_proof_verifies() {
        let x = Scalar::generate_biased(&mut OsRng);
        let public = ProjectivePoint::GENERATOR * x;
        let statement = Statement::<Secp256k1> { public: &public };
        let transcript = Transcript::new(b"protocol");

        let pre = precommit::<Secp256k1>(&mut OsRng);
        let commitment = *pre.commitment();
        let proof = prove_with_precommitment(
            &mut transcript.forked(b"party", &[0]),
            statement,
            Witness { x: &x },
            pre,
        );
        assert_eq!(proof.commitment(), &commitment);
        assert!(verify(
            &mut transcript.forked(b"party", &[0]),
            statement,
            &proof
        ));

        let other = *precommit::<Secp256k1>(&mut OsRng).commitment();
        assert_ne!(proof.commitment(), &other);
    }

    #[test]
    fn test_tampered_response_fails() {
        let x = Scalar::generate_biased(&mut OsRng);
        let public = ProjectivePoint::GENERATOR * x;
        let statement = Statement::<Secp256k1> { public: &public };
        let transcript = Transcript::new(b"protocol");

        let mut proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[0]),
            statement,
            Witness { x: &x },
        );
        proof.s += Scalar::ONE;
        assert!(!verify(&mut transcript.forked(b"party", &[0]), statement, &proof));
    }

    #[test]
    fn test_valid_proof_verifies_on_p256() {
        use p256::{NistP256, ProjectivePoint, Scalar};

        let x = Scalar::random(&mut OsRng);
        let public = ProjectivePoint::GENERATOR * x;
        let statement = Statement::<NistP256> { public: &public };
        let transcript = Transcript::new(b"protocol");

        let proof = prove(
            &mut OsRng,
            &mut transcript.forked(b"party", &[0]),
            statement,
            Witness { x: &x },
        );
        assert!(verify(&mut transcript.forked(b"party", &[0]), statement, &proof));

        let bytes = crate::serde::encode(&proof);
        let decoded: Proof<NistP256> = crate::serde::decode(&bytes).unwrap();
        assert!(verify(&mut transcript.forked(b"party", &[0]), statement, &decoded));
    }
}
