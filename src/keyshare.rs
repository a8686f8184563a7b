use std::collections::BTreeMap;

use elliptic_curve::{Field, Group, ScalarPrimitive};
use magikitten::Transcript;
use rand_core::CryptoRngCore;
use tracing::{debug, error};

use crate::compat::CSCurve;
use crate::crypto::{commit, hash, Digest, Randomizer};
use crate::math::{GroupPolynomial, Polynomial};
use crate::participants::{check_participants, ParticipantCounter, ParticipantList, ParticipantMap};
use crate::proofs::dlog;
use crate::protocol::internal::{make_protocol, Context, SharedChannel};
use crate::protocol::{InitializationError, Participant, Protocol, ProtocolError};
use crate::serde::encode;

const LABEL: &[u8] = b"cggmp-ecdsa v0.1.0 keygen";

/// Represents the output of the key generation protocol.
///
/// This contains our share of the private key, along with the public key,
/// and the public counterpart of every participant's share, which presigning
/// needs to check the other participants' proofs.
#[derive(Debug, Clone)]
pub struct KeygenOutput<C: CSCurve> {
    pub private_share: C::Scalar,
    pub public_key: C::AffinePoint,
    pub public_shares: BTreeMap<Participant, C::AffinePoint>,
}

async fn do_keyshare<C: CSCurve>(
    mut rng: impl CryptoRngCore,
    mut chan: SharedChannel,
    participants: ParticipantList,
    me: Participant,
    threshold: usize,
    s_i: C::Scalar,
    big_s: Option<C::ProjectivePoint>,
) -> Result<KeygenOutput<C>, ProtocolError> {
    let mut transcript = Transcript::new(LABEL);

    transcript.message(b"group", C::NAME);
    transcript.message(b"participants", &encode(&participants));
    // To allow interop between platforms where usize is different!
    transcript.message(b"threshold", &(threshold as u64).to_be_bytes());

    let f: Polynomial<C> = Polynomial::extend_random(&mut rng, threshold, &s_i);
    let mut big_f = f.commit();

    // The first message of the proof is committed along with the polynomial.
    let precommitment = dlog::precommit::<C>(&mut rng);
    let (my_commitment, my_randomizer) =
        commit(&mut rng, &(&big_f, precommitment.commitment()));

    let wait0 = chan.next_waitpoint();
    chan.send_many(wait0, &my_commitment);

    let mut seen = ParticipantCounter::new(&participants);
    let mut all_commitments = ParticipantMap::new(&participants);
    all_commitments.put(me, my_commitment);
    seen.put(me);
    while !seen.full() {
        let (from, commitment) = chan.recv(wait0, &mut seen).await?;
        all_commitments.put(from, commitment);
    }
    debug!(?me, "keygen: received all commitments");

    let my_confirmation = hash(&all_commitments);
    transcript.message(b"confirmation", my_confirmation.as_ref());

    let wait1 = chan.next_waitpoint();
    chan.send_many(wait1, &my_confirmation);

    let statement = dlog::Statement::<C> {
        public: &big_f.evaluate_zero(),
    };
    let witness = dlog::Witness::<C> {
        x: &f.evaluate_zero(),
    };
    let my_proof = dlog::prove_with_precommitment(
        &mut transcript.forked(b"dlog0", &me.bytes()),
        statement,
        witness,
        precommitment,
    );

    let wait2 = chan.next_waitpoint();
    chan.send_many(wait2, &(&big_f, &my_randomizer, &my_proof));

    let wait3 = chan.next_waitpoint();
    for p in participants.others(me) {
        let x_i_j: ScalarPrimitive<C> = f.evaluate(&p.scalar::<C>()).into();
        chan.send_private(wait3, p, &x_i_j);
    }
    let mut x_i = f.evaluate(&me.scalar::<C>());

    seen.clear();
    seen.put(me);
    while !seen.full() {
        let (from, confirmation): (_, Digest) = chan.recv(wait1, &mut seen).await?;
        if confirmation != my_confirmation {
            error!(?from, "keygen: confirmation mismatch");
            return Err(ProtocolError::TranscriptMismatch {
                from,
                reason: "confirmation of the commitments does not match ours".to_string(),
            });
        }
    }

    let mut their_polynomials = ParticipantMap::new(&participants);
    seen.clear();
    seen.put(me);
    while !seen.full() {
        let (from, (their_big_f, their_randomizer, their_proof)): (
            _,
            (GroupPolynomial<C>, Randomizer, dlog::Proof<C>),
        ) = chan.recv(wait2, &mut seen).await?;
        if their_big_f.len() != threshold {
            error!(?from, "keygen: polynomial has the wrong length");
            return Err(ProtocolError::MalformedMessage {
                from,
                reason: "polynomial has the wrong length".to_string(),
            });
        }
        if !all_commitments[from]
            .check(&(&their_big_f, their_proof.commitment()), &their_randomizer)
        {
            error!(?from, "keygen: commitment did not open");
            return Err(ProtocolError::ProofVerificationFailed {
                from,
                proof: "decommitment",
            });
        }
        let statement = dlog::Statement::<C> {
            public: &their_big_f.evaluate_zero(),
        };
        if !dlog::verify(
            &mut transcript.forked(b"dlog0", &from.bytes()),
            statement,
            &their_proof,
        ) {
            error!(?from, "keygen: dlog proof failed to verify");
            return Err(ProtocolError::ProofVerificationFailed {
                from,
                proof: "dlog",
            });
        }
        big_f += &their_big_f;
        their_polynomials.put(from, their_big_f);
    }
    debug!(?me, "keygen: checked all revealed polynomials");

    let my_scalar = me.scalar::<C>();
    seen.clear();
    seen.put(me);
    while !seen.full() {
        let (from, x_j_i): (_, ScalarPrimitive<C>) = chan.recv(wait3, &mut seen).await?;
        let x_j_i = C::Scalar::from(x_j_i);
        if their_polynomials[from].evaluate(&my_scalar) != C::ProjectivePoint::generator() * x_j_i
        {
            error!(?from, "keygen: private share does not match polynomial");
            return Err(ProtocolError::ProofVerificationFailed {
                from,
                proof: "share",
            });
        }
        x_i += x_j_i;
    }

    let big_x = big_f.evaluate_zero();
    match big_s {
        Some(big_s) if big_s != big_x => {
            return Err(ProtocolError::AssertionFailed(
                "new public key does not match old public key".to_string(),
            ))
        }
        _ => {}
    };

    let public_shares = participants
        .iter()
        .map(|p| (p, big_f.evaluate(&p.scalar::<C>()).into()))
        .collect();

    Ok(KeygenOutput {
        private_share: x_i,
        public_key: big_x.into(),
        public_shares,
    })
}

fn check_threshold(participants: &[Participant], threshold: usize) -> Result<(), InitializationError> {
    if threshold < 1 || threshold > participants.len() {
        return Err(InitializationError::BadParameters(
            "threshold must be between 1 and the participant count".to_string(),
        ));
    }
    Ok(())
}

/// The key generation protocol, with a given threshold.
///
/// This produces a new key pair, such that any set of participants
/// of size `>= threshold` can reconstruct the private key,
/// but no smaller set can do the same.
///
/// This needs to be run once, before then being able to perform threshold
/// signatures using the key.
pub fn keygen<C: CSCurve>(
    rng: impl CryptoRngCore + Send + 'static,
    participants: &[Participant],
    me: Participant,
    threshold: usize,
) -> Result<impl Protocol<Output = KeygenOutput<C>>, InitializationError> {
    check_threshold(participants, threshold)?;
    let participants = check_participants(participants, me)?;

    let mut rng = rng;
    let s_i = C::Scalar::random(&mut rng);
    let ctx = Context::new();
    let fut = do_keyshare::<C>(
        rng,
        ctx.shared_channel(),
        participants,
        me,
        threshold,
        s_i,
        None,
    );
    Ok(make_protocol(ctx, fut))
}

/// The refresh protocol.
///
/// This gives every participant a fresh share of the same key, with the same
/// participants and threshold. Old shares become useless once the new ones
/// are in use.
pub fn refresh<C: CSCurve>(
    rng: impl CryptoRngCore + Send + 'static,
    participants: &[Participant],
    threshold: usize,
    me: Participant,
    my_share: C::Scalar,
    public_key: C::AffinePoint,
) -> Result<impl Protocol<Output = KeygenOutput<C>>, InitializationError> {
    check_threshold(participants, threshold)?;
    let participants = check_participants(participants, me)?;

    let s_i = participants.lagrange::<C>(me) * my_share;
    let ctx = Context::new();
    let fut = do_keyshare::<C>(
        rng,
        ctx.shared_channel(),
        participants,
        me,
        threshold,
        s_i,
        Some(public_key.into()),
    );
    Ok(make_protocol(ctx, fut))
}

#[cfg(test)]
pub(crate) mod test {
    use std::error::Error;

    use k256::{ProjectivePoint, Secp256k1};
    use rand_core::OsRng;

    use super::*;
    use crate::protocol::{run_protocol, Action};

    #[allow(clippy::type_complexity)]
    pub(crate) fn do_keygen(
        participants: &[Participant],
        threshold: usize,
    ) -> Result<Vec<(Participant, KeygenOutput<Secp256k1>)>, Box<dyn Error>> {
        let mut protocols: Vec<(
            Participant,
            Box<dyn Protocol<Output = KeygenOutput<Secp256k1>>>,
        )> = Vec::with_capacity(participants.len());

        for p in participants.iter() {
            let protocol = keygen(OsRng, participants, *p, threshold)?;
            protocols.push((*p, Box::new(protocol)));
        }

        let mut result = run_protocol(protocols)?;
        result.sort_by_key(|(p, _)| *p);
        Ok(result)
    }

    fn check_shares(
        result: &[(Participant, KeygenOutput<Secp256k1>)],
        pub_key: k256::AffinePoint,
    ) {
        let participants: Vec<_> = result.iter().map(|(p, _)| *p).collect();
        let p_list = ParticipantList::new(&participants).unwrap();
        let x: k256::Scalar = result
            .iter()
            .map(|(p, out)| p_list.lagrange::<Secp256k1>(*p) * out.private_share)
            .sum();
        assert_eq!(ProjectivePoint::GENERATOR * x, pub_key);

        for (p, out) in result {
            assert_eq!(out.public_key, pub_key);
            assert_eq!(
                ProjectivePoint::from(result[0].1.public_shares[p]),
                ProjectivePoint::GENERATOR * out.private_share
            );
        }
    }

    #[test]
    fn test_keygen() -> Result<(), Box<dyn Error>> {
        let participants = vec![
            Participant::from(0u32),
            Participant::from(1u32),
            Participant::from(2u32),
        ];
        let threshold = 3;

        let result = do_keygen(&participants, threshold)?;
        assert!(result.len() == participants.len());
        check_shares(&result, result[0].1.public_key);

        Ok(())
    }

    #[test]
    fn test_threshold_subsets_reconstruct() -> Result<(), Box<dyn Error>> {
        let participants = vec![
            Participant::from(0u32),
            Participant::from(1u32),
            Participant::from(2u32),
        ];
        let result = do_keygen(&participants, 2)?;
        let pub_key = result[0].1.public_key;

        let subset = ParticipantList::new(&[participants[0], participants[2]]).unwrap();
        let x: k256::Scalar = result
            .iter()
            .filter(|(p, _)| subset.contains(*p))
            .map(|(p, out)| subset.lagrange::<Secp256k1>(*p) * out.private_share)
            .sum();
        assert_eq!(ProjectivePoint::GENERATOR * x, pub_key);

        Ok(())
    }

    #[test]
    fn test_refresh() -> Result<(), Box<dyn Error>> {
        let participants = vec![
            Participant::from(0u32),
            Participant::from(1u32),
            Participant::from(2u32),
        ];
        let threshold = 2;

        let result0 = do_keygen(&participants, threshold)?;
        let pub_key = result0[2].1.public_key;

        #[allow(clippy::type_complexity)]
        let mut protocols: Vec<(
            Participant,
            Box<dyn Protocol<Output = KeygenOutput<Secp256k1>>>,
        )> = Vec::with_capacity(participants.len());

        for (p, out) in result0.iter() {
            let protocol = refresh::<Secp256k1>(
                OsRng,
                &participants,
                threshold,
                *p,
                out.private_share,
                out.public_key,
            )?;
            protocols.push((*p, Box::new(protocol)));
        }

        let result1 = run_protocol(protocols)?;
        check_shares(&result1, pub_key);
        for (p, out) in result1.iter() {
            let old = &result0.iter().find(|(q, _)| q == p).unwrap().1;
            assert_ne!(old.private_share, out.private_share);
        }

        Ok(())
    }

    #[test]
    fn test_bad_thresholds_are_refused() {
        let participants = [Participant::from(0u32), Participant::from(1u32)];
        assert!(keygen::<Secp256k1>(OsRng, &participants, participants[0], 3).is_err());
        assert!(keygen::<Secp256k1>(OsRng, &participants, participants[0], 0).is_err());
    }

    #[test]
    fn test_outsiders_cannot_abort() {
        let participants = [
            Participant::from(0u32),
            Participant::from(1u32),
            Participant::from(2u32),
        ];
        let mut protocol = keygen::<Secp256k1>(OsRng, &participants, participants[0], 2).unwrap();
        loop {
            match protocol.poke() {
                Ok(Action::Wait) => break,
                Ok(Action::SendMany(_)) | Ok(Action::SendPrivate(..)) => continue,
                other => panic!("unexpected action: {:?}", other.err()),
            }
        }

        // Undecodable messages, from outside the session and from ourselves.
        protocol.message(Participant::from(99u32), vec![0, 0xc1]);
        protocol.message(participants[0], vec![0, 0xc1]);
        assert!(matches!(protocol.poke(), Ok(Action::Wait)));

        // The same garbage from a participant is their fault.
        protocol.message(participants[1], vec![0, 0xc1]);
        match protocol.poke() {
            Err(e) => assert_eq!(e.culprit(), Some(participants[1])),
            Ok(_) => panic!("expected the malformed message to abort"),
        }
    }
}
