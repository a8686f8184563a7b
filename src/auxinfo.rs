//! Generation of the auxiliary information needed for presigning.
//!
//! Every party publishes a Paillier key, along with ring-Pedersen parameters
//! over the same modulus. The parameters are proven well formed to everybody,
//! and the modulus is proven to be a product of two large primes to each
//! counterparty, using that counterparty's own parameters.
use std::collections::BTreeMap;

use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    compat::CSCurve,
    constants::PAILLIER_BITS,
    crypto::{commit, hash, Commitment, Digest, Randomizer},
    paillier::{PublicKey, SecretKey},
    participants::{
        check_participants, pair_bytes, ParticipantCounter, ParticipantList, ParticipantMap,
    },
    pedersen::PedersenParams,
    proofs::{factor, modulus, prm},
    protocol::{
        internal::{make_protocol, Context, SharedChannel},
        InitializationError, Participant, Protocol, ProtocolError,
    },
    serde::encode,
};

const LABEL: &[u8] = b"cggmp-ecdsa v0.1.0 aux info";

/// The auxiliary information one party publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxInfoPublic {
    pub paillier: PublicKey,
    pub pedersen: PedersenParams,
}

/// The output of the auxiliary information protocol.
///
/// The secret key stays with this party, the public information of every
/// party (ours included) is needed to presign.
#[derive(Debug, Clone)]
pub struct AuxInfoOutput {
    pub paillier: SecretKey,
    pub public: BTreeMap<Participant, AuxInfoPublic>,
}

fn check_public(from: Participant, public: &AuxInfoPublic) -> Result<(), ProtocolError> {
    let malformed = |reason: &str| {
        error!(?from, reason, "aux info: bad public parameters");
        Err(ProtocolError::MalformedMessage {
            from,
            reason: reason.to_string(),
        })
    };
    if public.paillier.n().bit_length() != PAILLIER_BITS {
        return malformed("Paillier modulus has the wrong size");
    }
    if public.pedersen.n() != public.paillier.n() {
        return malformed("Pedersen parameters use a different modulus");
    }
    if public.pedersen.validate().is_err() {
        return malformed("Pedersen parameters are degenerate");
    }
    Ok(())
}

async fn do_aux_info<C: CSCurve>(
    mut rng: impl CryptoRngCore,
    mut chan: SharedChannel,
    participants: ParticipantList,
    me: Participant,
    paillier: SecretKey,
) -> Result<AuxInfoOutput, ProtocolError> {
    let mut transcript = Transcript::new(LABEL);
    transcript.message(b"group", C::NAME);
    transcript.message(b"participants", &encode(&participants));

    let (pedersen, trapdoor) = PedersenParams::generate(&mut rng, &paillier)?;
    let my_public = AuxInfoPublic {
        paillier: paillier.public_key().clone(),
        pedersen,
    };

    let (my_commitment, my_randomizer) = commit(&mut rng, &my_public);
    let wait0 = chan.next_waitpoint();
    chan.send_many(wait0, &my_commitment);

    let mut seen = ParticipantCounter::new(&participants);
    let mut all_commitments = ParticipantMap::new(&participants);
    all_commitments.put(me, my_commitment);
    seen.put(me);
    while !seen.full() {
        let (from, commitment): (_, Commitment) = chan.recv(wait0, &mut seen).await?;
        all_commitments.put(from, commitment);
    }
    debug!(?me, "aux info: received all commitments");

    let my_confirmation = hash(&all_commitments);
    transcript.message(b"confirmation", my_confirmation.as_ref());
    let wait1 = chan.next_waitpoint();
    chan.send_many(wait1, &my_confirmation);

    let prm_proof = prm::prove(
        &mut rng,
        &mut transcript.forked(b"prm", &me.bytes()),
        prm::Statement {
            aux: &my_public.pedersen,
        },
        prm::Witness {
            trapdoor: &trapdoor,
        },
    );
    let mod_proof = modulus::prove(
        &mut rng,
        &mut transcript.forked(b"mod", &me.bytes()),
        modulus::Statement {
            pk: &my_public.paillier,
        },
        modulus::Witness {
            p: paillier.p(),
            q: paillier.q(),
        },
    )?;
    let wait2 = chan.next_waitpoint();
    chan.send_many(wait2, &(&my_public, &my_randomizer, &prm_proof, &mod_proof));

    seen.clear();
    seen.put(me);
    while !seen.full() {
        let (from, confirmation): (_, Digest) = chan.recv(wait1, &mut seen).await?;
        if confirmation != my_confirmation {
            error!(?from, "aux info: confirmation mismatch");
            return Err(ProtocolError::TranscriptMismatch {
                from,
                reason: "confirmation of the commitments does not match ours".to_string(),
            });
        }
    }

    let mut publics = BTreeMap::new();
    seen.clear();
    seen.put(me);
    while !seen.full() {
        let (from, (their_public, their_randomizer, their_prm, their_mod)): (
            _,
            (AuxInfoPublic, Randomizer, prm::Proof, modulus::Proof),
        ) = chan.recv(wait2, &mut seen).await?;
        if !all_commitments[from].check(&their_public, &their_randomizer) {
            error!(?from, "aux info: commitment did not open");
            return Err(ProtocolError::ProofVerificationFailed {
                from,
                proof: "decommitment",
            });
        }
        check_public(from, &their_public)?;
        if their_public.paillier == my_public.paillier {
            error!(?from, "aux info: reused our Paillier modulus");
            return Err(ProtocolError::MalformedMessage {
                from,
                reason: "Paillier modulus is not fresh".to_string(),
            });
        }
        if !prm::verify(
            &mut transcript.forked(b"prm", &from.bytes()),
            prm::Statement {
                aux: &their_public.pedersen,
            },
            &their_prm,
        ) {
            error!(?from, "aux info: prm proof failed to verify");
            return Err(ProtocolError::ProofVerificationFailed {
                from,
                proof: "prm",
            });
        }
        if !modulus::verify(
            &mut transcript.forked(b"mod", &from.bytes()),
            modulus::Statement {
                pk: &their_public.paillier,
            },
            &their_mod,
        ) {
            error!(?from, "aux info: mod proof failed to verify");
            return Err(ProtocolError::ProofVerificationFailed {
                from,
                proof: "mod",
            });
        }
        publics.insert(from, their_public);
    }
    debug!(?me, "aux info: checked all public parameters");

    // The factoring proofs use the verifier's parameters, so they can only
    // be made now.
    let wait3 = chan.next_waitpoint();
    for (to, their_public) in publics.iter() {
        let proof = factor::prove::<C>(
            &mut rng,
            &mut transcript.forked(b"fac", &pair_bytes(me, *to)),
            factor::Statement {
                pk: &my_public.paillier,
                aux: &their_public.pedersen,
            },
            factor::Witness {
                p: paillier.p(),
                q: paillier.q(),
            },
        )?;
        chan.send_private(wait3, *to, &proof);
    }

    seen.clear();
    seen.put(me);
    while !seen.full() {
        let (from, proof): (_, factor::Proof) = chan.recv(wait3, &mut seen).await?;
        let Some(their_public) = publics.get(&from) else {
            continue;
        };
        if !factor::verify::<C>(
            &mut transcript.forked(b"fac", &pair_bytes(from, me)),
            factor::Statement {
                pk: &their_public.paillier,
                aux: &my_public.pedersen,
            },
            &proof,
        ) {
            error!(?from, "aux info: fac proof failed to verify");
            return Err(ProtocolError::ProofVerificationFailed {
                from,
                proof: "fac",
            });
        }
    }

    publics.insert(me, my_public);
    Ok(AuxInfoOutput {
        paillier,
        public: publics,
    })
}

/// The auxiliary information protocol.
///
/// Each participant contributes a Paillier key, which should be fresh, and
/// of exactly 2048 bits. Keys can be generated with [`SecretKey::generate`].
///
/// The output can be reused for many presignatures, with any subset of
/// the participants.
pub fn aux_info<C: CSCurve>(
    rng: impl CryptoRngCore + Send + 'static,
    participants: &[Participant],
    me: Participant,
    paillier: SecretKey,
) -> Result<impl Protocol<Output = AuxInfoOutput>, InitializationError> {
    let participants = check_participants(participants, me)?;
    if paillier.public_key().n().bit_length() != PAILLIER_BITS {
        return Err(InitializationError::BadParameters(format!(
            "Paillier modulus must have {PAILLIER_BITS} bits"
        )));
    }

    let ctx = Context::new();
    let fut = do_aux_info::<C>(rng, ctx.shared_channel(), participants, me, paillier);
    Ok(make_protocol(ctx, fut))
}
