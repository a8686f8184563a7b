use elliptic_curve::{ops::Invert, scalar::IsHigh, Field, Group, ScalarPrimitive};
use subtle::ConditionallySelectable;
use tracing::{debug, error};

use crate::{
    compat::{self, CSCurve},
    participants::{check_participants, ParticipantCounter, ParticipantList},
    protocol::{
        internal::{make_protocol, Context, SharedChannel},
        InitializationError, Participant, Protocol, ProtocolError,
    },
    PresignOutput,
};

/// Represents a signature with extra information, to support different variants of ECDSA.
///
/// An ECDSA signature is usually two scalars. The first scalar is derived from
/// a point on the curve, and because this process is lossy, some other variants
/// of ECDSA also include some extra information in order to recover this point.
///
/// Furthermore, some signature formats may disagree on how precisely to serialize
/// different values as bytes.
///
/// To support these variants, this simply gives you a normal signature, along with the entire
/// first point.
#[derive(Clone)]
pub struct FullSignature<C: CSCurve> {
    /// This is the entire first point.
    pub big_r: C::AffinePoint,
    /// This is the second scalar, normalized to be in the lower range.
    pub s: C::Scalar,
}

impl<C: CSCurve> FullSignature<C> {
    /// The first scalar of the signature.
    pub fn r(&self) -> C::Scalar {
        compat::x_coordinate::<C>(&self.big_r)
    }

    /// Check this signature against a public key, and the hash of a message.
    #[must_use]
    pub fn verify(&self, public_key: &C::AffinePoint, msg_hash: &C::Scalar) -> bool {
        let r = self.r();
        if r.is_zero().into() {
            return false;
        }
        let Some(s_inv) = Option::<C::Scalar>::from(self.s.invert_vartime()) else {
            return false;
        };
        let reproduced = (C::ProjectivePoint::generator() * (*msg_hash * s_inv))
            + (C::ProjectivePoint::from(*public_key) * (r * s_inv));
        compat::x_coordinate::<C>(&reproduced.into()) == r
    }
}

async fn do_sign<C: CSCurve>(
    mut chan: SharedChannel,
    participants: ParticipantList,
    me: Participant,
    public_key: C::AffinePoint,
    presignature: PresignOutput<C>,
    msg_hash: C::Scalar,
) -> Result<FullSignature<C>, ProtocolError> {
    // The presignature shares already sum to k and k * x.
    let r = compat::x_coordinate::<C>(&presignature.big_r);
    let s_i: C::Scalar = msg_hash * presignature.k + r * presignature.chi;

    let wait0 = chan.next_waitpoint();
    {
        let s_i: ScalarPrimitive<C> = s_i.into();
        chan.send_many(wait0, &s_i);
    }

    let mut seen = ParticipantCounter::new(&participants);
    let mut s: C::Scalar = s_i;
    seen.put(me);
    while !seen.full() {
        let (_, s_j): (_, ScalarPrimitive<C>) = chan.recv(wait0, &mut seen).await?;
        s += C::Scalar::from(s_j)
    }
    debug!(?me, "sign: received all signature shares");

    s.conditional_assign(&(-s), s.is_high());
    let sig = FullSignature {
        big_r: presignature.big_r,
        s,
    };
    if !sig.verify(&public_key, &msg_hash) {
        error!(?me, "sign: aggregated signature failed to verify");
        return Err(ProtocolError::SignatureVerificationFailed);
    }

    Ok(sig)
}

/// The signature protocol, allowing us to use a presignature to sign a message.
///
/// The participants must be exactly those who created the presignature.
/// The presignature is consumed, whether signing succeeds or not.
///
/// **WARNING** You must absolutely hash an actual message before passing it to
/// this function. Allowing the signing of arbitrary scalars *is* a security risk,
/// and this function only tolerates this risk to allow for genericity.
pub fn sign<C: CSCurve>(
    participants: &[Participant],
    me: Participant,
    public_key: C::AffinePoint,
    presignature: PresignOutput<C>,
    msg_hash: C::Scalar,
) -> Result<impl Protocol<Output = FullSignature<C>>, InitializationError> {
    let participants = check_participants(participants, me)?;

    let ctx = Context::new();
    let fut = do_sign(
        ctx.shared_channel(),
        participants,
        me,
        public_key,
        presignature,
        msg_hash,
    );
    Ok(make_protocol(ctx, fut))
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use ecdsa::Signature;
    use k256::{
        ecdsa::signature::Verifier, ecdsa::VerifyingKey, ProjectivePoint, PublicKey, Scalar,
        Secp256k1,
    };
    use rand_core::OsRng;

    use crate::{compat::scalar_hash, protocol::run_protocol};

    use super::*;

    /// Split a value into random additive shares.
    fn additive_shares(x: Scalar, n: usize) -> Vec<Scalar> {
        let mut out: Vec<Scalar> = (1..n).map(|_| Scalar::random(&mut OsRng)).collect();
        let rest: Scalar = out.iter().sum();
        out.push(x - rest);
        out
    }

    #[allow(clippy::type_complexity)]
    fn run_sign(
        participants: &[Participant],
        public_key: k256::AffinePoint,
        presignatures: Vec<PresignOutput<Secp256k1>>,
        msg_hash: Scalar,
    ) -> Result<Vec<(Participant, FullSignature<Secp256k1>)>, ProtocolError> {
        let mut protocols: Vec<(
            Participant,
            Box<dyn Protocol<Output = FullSignature<Secp256k1>>>,
        )> = Vec::with_capacity(participants.len());
        for (p, presignature) in participants.iter().zip(presignatures) {
            let protocol = sign(participants, *p, public_key, presignature, msg_hash)
                .map_err(|e| ProtocolError::AssertionFailed(e.to_string()))?;
            protocols.push((*p, Box::new(protocol)));
        }
        run_protocol(protocols)
    }

    #[test]
    fn test_sign() -> Result<(), Box<dyn Error>> {
        let msg = b"hello?";
        let participants = vec![
            Participant::from(0u32),
            Participant::from(1u32),
            Participant::from(2u32),
        ];

        // Run 4 times for flakiness reasons
        for _ in 0..4 {
            let x = Scalar::random(&mut OsRng);
            let public_key = (ProjectivePoint::GENERATOR * x).to_affine();

            let k = Scalar::random(&mut OsRng);
            let big_r = (ProjectivePoint::GENERATOR * k.invert().unwrap()).to_affine();

            let presignatures = additive_shares(k, participants.len())
                .into_iter()
                .zip(additive_shares(k * x, participants.len()))
                .map(|(k, chi)| PresignOutput { big_r, k, chi })
                .collect();

            let result = run_sign(&participants, public_key, presignatures, scalar_hash(msg))?;
            let sig = result[0].1.clone();
            let sig = Signature::from_scalars(sig.r(), sig.s)?;
            VerifyingKey::from(&PublicKey::from_affine(public_key).unwrap())
                .verify(&msg[..], &sig)?;
        }
        Ok(())
    }

    #[test]
    fn test_bad_shares_fail_verification() {
        let participants = vec![Participant::from(0u32), Participant::from(1u32)];
        let x = Scalar::random(&mut OsRng);
        let public_key = (ProjectivePoint::GENERATOR * x).to_affine();
        let k = Scalar::random(&mut OsRng);
        let big_r = (ProjectivePoint::GENERATOR * k.invert().unwrap()).to_affine();

        let mut chis = additive_shares(k * x, 2);
        chis[1] += Scalar::ONE;
        let presignatures = additive_shares(k, 2)
            .into_iter()
            .zip(chis)
            .map(|(k, chi)| PresignOutput { big_r, k, chi })
            .collect();

        let result = run_sign(&participants, public_key, presignatures, scalar_hash(b"hi"));
        assert!(matches!(
            result,
            Err(ProtocolError::SignatureVerificationFailed)
        ));
    }
}
