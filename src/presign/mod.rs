//! The presigning protocol.
//!
//! This runs among the participants who will later sign, before the message
//! is known. Each participant ends up with a share of a nonce `k`, and of
//! `k * x`, with `x` the secret key, along with the public point `R = k^-1 * G`.
//!
//! Every message a participant sends is accompanied by proofs, so that
//! a participant deviating from the protocol is caught, and blamed.
use std::collections::BTreeMap;

use elliptic_curve::Group;
use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    auxinfo::AuxInfoOutput,
    compat::{CSCurve, SerializablePoint},
    crypto::SessionId,
    keyshare::KeygenOutput,
    participants::{check_participants, ParticipantCounter, ParticipantList},
    protocol::{
        internal::{make_protocol, Context, SharedChannel, Waitpoint},
        InitializationError, Participant, Protocol, ProtocolError,
    },
    serde::encode,
};

pub(crate) mod rounds;

use rounds::Setup;

const LABEL: &[u8] = b"cggmp-ecdsa v0.1.0 presign";

/// The output of the presigning protocol.
///
/// This must be used for at most one signature.
#[derive(Debug, Clone)]
pub struct PresignOutput<C: CSCurve> {
    /// The public nonce commitment.
    pub big_r: C::AffinePoint,
    /// Our share of the nonce value.
    pub k: C::Scalar,
    /// Our share of the nonce times the secret key.
    pub chi: C::Scalar,
}

/// The arguments needed to create a presignature.
#[derive(Debug, Clone)]
pub struct PresignArguments<C: CSCurve> {
    /// The output of key generation, i.e. our share of the secret key, and the public key.
    pub keygen_out: KeygenOutput<C>,
    /// The output of the auxiliary information protocol.
    pub aux_info: AuxInfoOutput,
    /// A fresh identifier, agreed on by all the participants.
    pub ssid: SessionId,
    /// The threshold used for the shares of the secret key.
    pub threshold: usize,
}

/// Check the arguments, and compute everything fixed before the first round.
pub(crate) fn setup<C: CSCurve>(
    participants: &[Participant],
    me: Participant,
    args: PresignArguments<C>,
) -> Result<Setup<C>, InitializationError> {
    let participants = check_participants(participants, me)?;
    if participants.len() < args.threshold {
        return Err(InitializationError::BadParameters(format!(
            "{} participants cannot reach a threshold of {}",
            participants.len(),
            args.threshold
        )));
    }

    let PresignArguments {
        keygen_out,
        aux_info,
        ssid,
        threshold,
    } = args;

    for p in participants.iter() {
        if !aux_info.public.contains_key(&p) {
            return Err(InitializationError::BadParameters(format!(
                "missing auxiliary information for {p:?}"
            )));
        }
        if !keygen_out.public_shares.contains_key(&p) {
            return Err(InitializationError::BadParameters(format!(
                "missing public share for {p:?}"
            )));
        }
    }
    if aux_info.public[&me].paillier != *aux_info.paillier.public_key() {
        return Err(InitializationError::BadParameters(
            "our Paillier key does not match our auxiliary information".to_string(),
        ));
    }
    let my_public_share = C::ProjectivePoint::from(keygen_out.public_shares[&me]);
    if my_public_share != C::ProjectivePoint::generator() * keygen_out.private_share {
        return Err(InitializationError::BadParameters(
            "our private share does not match our public share".to_string(),
        ));
    }

    let mut transcript = Transcript::new(LABEL);
    transcript.message(b"group", C::NAME);
    transcript.message(b"participants", &encode(&participants));
    transcript.message(b"threshold", &(threshold as u64).to_be_bytes());
    transcript.message(
        b"public key",
        &encode(&SerializablePoint::<C>::from_projective(
            &keygen_out.public_key.into(),
        )),
    );
    transcript.message(b"ssid", ssid.as_bytes());

    let w = participants.lagrange::<C>(me) * keygen_out.private_share;
    let big_w = participants
        .iter()
        .map(|p| {
            let share = C::ProjectivePoint::from(keygen_out.public_shares[&p]);
            (p, share * participants.lagrange::<C>(p))
        })
        .collect();
    let aux = participants
        .iter()
        .map(|p| (p, aux_info.public[&p].clone()))
        .collect();

    Ok(Setup {
        ssid,
        me,
        participants,
        transcript,
        w,
        big_w,
        sk: aux_info.paillier,
        aux,
    })
}

/// Receive one message from every other participant on a waitpoint.
async fn recv_all<T: DeserializeOwned>(
    chan: &SharedChannel,
    participants: &ParticipantList,
    me: Participant,
    waitpoint: Waitpoint,
) -> Result<BTreeMap<Participant, T>, ProtocolError> {
    let mut out = BTreeMap::new();
    let mut seen = ParticipantCounter::new(participants);
    seen.put(me);
    while !seen.full() {
        let (from, message): (_, T) = chan.recv(waitpoint, &mut seen).await?;
        out.insert(from, message);
    }
    Ok(out)
}

async fn do_presign<C: CSCurve>(
    mut rng: impl CryptoRngCore,
    mut chan: SharedChannel,
    setup: Setup<C>,
) -> Result<PresignOutput<C>, ProtocolError> {
    let me = setup.me;

    let (round1, proofs) = rounds::round1(&mut rng, &setup)?;
    let wait0 = chan.next_waitpoint();
    chan.send_many(wait0, round1.broadcast());
    let wait1 = chan.next_waitpoint();
    for (to, proof) in proofs.iter() {
        chan.send_private(wait1, *to, proof);
    }

    let broadcasts = recv_all(&chan, &setup.participants, me, wait0).await?;
    let proofs = recv_all(&chan, &setup.participants, me, wait1).await?;
    debug!(?me, "presign: received round 1");

    let (round2, messages) = rounds::round2(&mut rng, &setup, round1, broadcasts, &proofs)?;
    let wait2 = chan.next_waitpoint();
    for (to, message) in messages.iter() {
        chan.send_private(wait2, *to, message);
    }

    let messages = recv_all(&chan, &setup.participants, me, wait2).await?;
    debug!(?me, "presign: received round 2");

    let (round3, messages) = rounds::round3(&mut rng, &setup, round2, &messages)?;
    let wait3 = chan.next_waitpoint();
    for (to, message) in messages.iter() {
        chan.send_private(wait3, *to, message);
    }

    let messages = recv_all(&chan, &setup.participants, me, wait3).await?;
    debug!(?me, "presign: received round 3");

    rounds::finish(&setup, round3, &messages)
}

/// The presignature protocol.
///
/// This is the first phase of performing a signature, in which we perform
/// all the work we can do without yet knowing the message to be signed.
///
/// The participants here are the future signers, and there must be at least
/// as many of them as the threshold of the key.
pub fn presign<C: CSCurve>(
    rng: impl CryptoRngCore + Send + 'static,
    participants: &[Participant],
    me: Participant,
    args: PresignArguments<C>,
) -> Result<impl Protocol<Output = PresignOutput<C>>, InitializationError> {
    let setup = setup(participants, me, args)?;
    let ctx = Context::new();
    let fut = do_presign(rng, ctx.shared_channel(), setup);
    Ok(make_protocol(ctx, fut))
}
