//! The rounds of presigning.
//!
//! Each round takes the state left by the previous one, along with the
//! messages received from every other participant, and produces the next
//! state and the messages to send. Nothing here touches the network.
use std::collections::BTreeMap;

use elliptic_curve::{Field, Group};
use libpaillier::unknown_order::BigNumber;
use magikitten::Transcript;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::PresignOutput;
use crate::{
    auxinfo::AuxInfoPublic,
    compat::{bignum_to_scalar, scalar_to_bignum, CSCurve},
    crypto::SessionId,
    mta::{self, MtaMessage},
    paillier::{Ciphertext, Nonce, SecretKey},
    participants::{pair_bytes, ParticipantList},
    proofs::{enc, logstar, par_map},
    protocol::{Participant, ProtocolError},
    serde::{
        deserialize_projective_point, deserialize_scalar, serialize_projective_point,
        serialize_scalar,
    },
};

/// Everything fixed before the first round.
pub(crate) struct Setup<C: CSCurve> {
    pub ssid: SessionId,
    pub me: Participant,
    pub participants: ParticipantList,
    pub transcript: Transcript,
    /// Our share of the secret key, weighted so that the shares of the signers sum to it.
    pub w: C::Scalar,
    /// The weighted public share of every signer.
    pub big_w: BTreeMap<Participant, C::ProjectivePoint>,
    pub sk: SecretKey,
    pub aux: BTreeMap<Participant, AuxInfoPublic>,
}

impl<C: CSCurve> Setup<C> {
    fn my_aux(&self) -> &AuxInfoPublic {
        &self.aux[&self.me]
    }

    fn others(&self) -> Vec<Participant> {
        self.participants.others(self.me).collect()
    }

    fn fork(&self, label: &'static [u8], from: Participant, to: Participant) -> Transcript {
        self.transcript.forked(label, &pair_bytes(from, to))
    }

    fn check_ssid(&self, from: Participant, ssid: &SessionId) -> Result<(), ProtocolError> {
        if *ssid != self.ssid {
            error!(?from, "presign: message from another session");
            return Err(ProtocolError::TranscriptMismatch {
                from,
                reason: "session id does not match".to_string(),
            });
        }
        Ok(())
    }
}

fn proof_failed(from: Participant, proof: &'static str) -> ProtocolError {
    error!(?from, proof, "presign: proof failed to verify");
    ProtocolError::ProofVerificationFailed { from, proof }
}

fn missing(from: Participant) -> ProtocolError {
    ProtocolError::AssertionFailed(format!("no message received from {from:?}"))
}

fn random_seeds(
    rng: &mut impl CryptoRngCore,
    others: &[Participant],
) -> Vec<(Participant, [u8; 32])> {
    others
        .iter()
        .map(|&j| {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            (j, seed)
        })
        .collect()
}

/// The encrypted nonces of a participant, sent to everybody.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Round1Broadcast {
    pub ssid: SessionId,
    /// `Enc(k)`.
    pub big_k: Ciphertext,
    /// `Enc(gamma)`.
    pub big_g: Ciphertext,
}

pub(crate) struct Round1<C: CSCurve> {
    k: C::Scalar,
    gamma: C::Scalar,
    rho: Nonce,
    nu: Nonce,
    broadcast: Round1Broadcast,
}

impl<C: CSCurve> Round1<C> {
    pub fn broadcast(&self) -> &Round1Broadcast {
        &self.broadcast
    }
}

/// Sample our nonce shares, encrypt them, and prove `K` to every other participant.
pub(crate) fn round1<C: CSCurve>(
    rng: &mut impl CryptoRngCore,
    setup: &Setup<C>,
) -> Result<(Round1<C>, Vec<(Participant, enc::Proof)>), ProtocolError> {
    let me = setup.me;
    let pk = setup.sk.public_key();

    let k = C::Scalar::random(&mut *rng);
    let gamma = C::Scalar::random(&mut *rng);
    let k_int = scalar_to_bignum::<C>(&k);
    let (big_k, rho) = pk.encrypt(rng, &k_int)?;
    let (big_g, nu) = pk.encrypt(rng, &scalar_to_bignum::<C>(&gamma))?;

    let mut proofs = Vec::with_capacity(setup.participants.len() - 1);
    for j in setup.others() {
        let proof = enc::prove::<C>(
            rng,
            &mut setup.fork(b"enc", me, j),
            enc::Statement {
                pk,
                aux: &setup.aux[&j].pedersen,
                big_k: &big_k,
            },
            enc::Witness {
                k: &k_int,
                rho: &rho,
            },
        )?;
        proofs.push((j, proof));
    }

    Ok((
        Round1 {
            k,
            gamma,
            rho,
            nu,
            broadcast: Round1Broadcast {
                ssid: setup.ssid,
                big_k,
                big_g,
            },
        },
        proofs,
    ))
}

/// The pairwise message of the second round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: CSCurve")]
pub(crate) struct Round2Message<C: CSCurve> {
    ssid: SessionId,
    #[serde(
        serialize_with = "serialize_projective_point::<C, _>",
        deserialize_with = "deserialize_projective_point::<C, _>"
    )]
    big_gamma: C::ProjectivePoint,
    delta: MtaMessage<C>,
    chi: MtaMessage<C>,
    proof: logstar::Proof<C>,
}

pub(crate) struct Round2<C: CSCurve> {
    round1: Round1<C>,
    big_gamma: C::ProjectivePoint,
    others: BTreeMap<Participant, Round1Broadcast>,
    /// Our masks from the two conversions with each participant.
    betas: BTreeMap<Participant, (BigNumber, BigNumber)>,
}

/// Check everybody's encrypted nonces, then start both share conversions
/// with every other participant.
pub(crate) fn round2<C: CSCurve>(
    rng: &mut impl CryptoRngCore,
    setup: &Setup<C>,
    round1: Round1<C>,
    broadcasts: BTreeMap<Participant, Round1Broadcast>,
    proofs: &BTreeMap<Participant, enc::Proof>,
) -> Result<(Round2<C>, Vec<(Participant, Round2Message<C>)>), ProtocolError> {
    let me = setup.me;
    let my_aux = setup.my_aux();
    let my_pk = setup.sk.public_key();
    let others = setup.others();

    par_map(&others, |&j| -> Result<(), ProtocolError> {
        let (Some(broadcast), Some(proof)) = (broadcasts.get(&j), proofs.get(&j)) else {
            return Err(missing(j));
        };
        setup.check_ssid(j, &broadcast.ssid)?;
        let their_pk = &setup.aux[&j].paillier;
        if !enc::verify::<C>(
            &mut setup.fork(b"enc", j, me),
            enc::Statement {
                pk: their_pk,
                aux: &my_aux.pedersen,
                big_k: &broadcast.big_k,
            },
            proof,
        ) {
            return Err(proof_failed(j, "enc"));
        }
        if their_pk.validate(&broadcast.big_g).is_err() {
            error!(from = ?j, "presign: invalid gamma ciphertext");
            return Err(ProtocolError::InvalidCiphertext { from: j });
        }
        Ok(())
    })
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;

    let generator = C::ProjectivePoint::generator();
    let big_gamma = generator * round1.gamma;
    let gamma_int = scalar_to_bignum::<C>(&round1.gamma);
    let my_big_w = setup.big_w[&me];

    let seeds = random_seeds(rng, &others);
    let results = par_map(
        &seeds,
        |(j, seed)| -> Result<(Participant, BigNumber, BigNumber, Round2Message<C>), ProtocolError> {
            let j = *j;
            let mut rng = ChaCha20Rng::from_seed(*seed);
            let their = &setup.aux[&j];
            let big_k = &broadcasts[&j].big_k;

            let (beta, delta) = mta::send(
                &mut rng,
                &mut setup.fork(b"affg delta", me, j),
                mta::Setup {
                    sender: my_pk,
                    receiver: &their.paillier,
                    receiver_aux: &their.pedersen,
                    big_b: big_k,
                    big_a: &big_gamma,
                },
                &round1.gamma,
            )?;
            let (beta_hat, chi) = mta::send(
                &mut rng,
                &mut setup.fork(b"affg chi", me, j),
                mta::Setup {
                    sender: my_pk,
                    receiver: &their.paillier,
                    receiver_aux: &their.pedersen,
                    big_b: big_k,
                    big_a: &my_big_w,
                },
                &setup.w,
            )?;
            let proof = logstar::prove::<C>(
                &mut rng,
                &mut setup.fork(b"logstar gamma", me, j),
                logstar::Statement {
                    pk: my_pk,
                    aux: &their.pedersen,
                    big_c: &round1.broadcast.big_g,
                    big_x: &big_gamma,
                    base: &generator,
                },
                logstar::Witness {
                    x: &gamma_int,
                    rho: &round1.nu,
                },
            )?;

            Ok((
                j,
                beta,
                beta_hat,
                Round2Message {
                    ssid: setup.ssid,
                    big_gamma,
                    delta,
                    chi,
                    proof,
                },
            ))
        },
    );

    let mut betas = BTreeMap::new();
    let mut messages = Vec::with_capacity(results.len());
    for result in results {
        let (j, beta, beta_hat, message) = result?;
        betas.insert(j, (beta, beta_hat));
        messages.push((j, message));
    }

    Ok((
        Round2 {
            round1,
            big_gamma,
            others: broadcasts,
            betas,
        },
        messages,
    ))
}

/// The pairwise message of the third round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: CSCurve")]
pub(crate) struct Round3Message<C: CSCurve> {
    ssid: SessionId,
    #[serde(
        serialize_with = "serialize_scalar::<C, _>",
        deserialize_with = "deserialize_scalar::<C, _>"
    )]
    delta: C::Scalar,
    #[serde(
        serialize_with = "serialize_projective_point::<C, _>",
        deserialize_with = "deserialize_projective_point::<C, _>"
    )]
    big_delta: C::ProjectivePoint,
    proof: logstar::Proof<C>,
}

pub(crate) struct Round3<C: CSCurve> {
    k: C::Scalar,
    chi: C::Scalar,
    /// The sum of everybody's `Gamma`.
    big_gamma: C::ProjectivePoint,
    delta: C::Scalar,
    big_delta: C::ProjectivePoint,
    others: BTreeMap<Participant, Round1Broadcast>,
}

/// Finish the share conversions, and reveal our share of `gamma * k`.
pub(crate) fn round3<C: CSCurve>(
    rng: &mut impl CryptoRngCore,
    setup: &Setup<C>,
    round2: Round2<C>,
    messages: &BTreeMap<Participant, Round2Message<C>>,
) -> Result<(Round3<C>, Vec<(Participant, Round3Message<C>)>), ProtocolError> {
    let me = setup.me;
    let my_aux = setup.my_aux();
    let my_pk = setup.sk.public_key();
    let others = setup.others();
    let generator = C::ProjectivePoint::generator();

    let alphas = par_map(
        &others,
        |&j| -> Result<(Participant, BigNumber, BigNumber), ProtocolError> {
            let Some(message) = messages.get(&j) else {
                return Err(missing(j));
            };
            setup.check_ssid(j, &message.ssid)?;
            let their = &setup.aux[&j];

            if !logstar::verify::<C>(
                &mut setup.fork(b"logstar gamma", j, me),
                logstar::Statement {
                    pk: &their.paillier,
                    aux: &my_aux.pedersen,
                    big_c: &round2.others[&j].big_g,
                    big_x: &message.big_gamma,
                    base: &generator,
                },
                &message.proof,
            ) {
                return Err(proof_failed(j, "logstar"));
            }

            let alpha = mta::receive(
                &mut setup.fork(b"affg delta", j, me),
                mta::Setup {
                    sender: &their.paillier,
                    receiver: my_pk,
                    receiver_aux: &my_aux.pedersen,
                    big_b: &round2.round1.broadcast.big_k,
                    big_a: &message.big_gamma,
                },
                j,
                &setup.sk,
                &message.delta,
            )?;
            let alpha_hat = mta::receive(
                &mut setup.fork(b"affg chi", j, me),
                mta::Setup {
                    sender: &their.paillier,
                    receiver: my_pk,
                    receiver_aux: &my_aux.pedersen,
                    big_b: &round2.round1.broadcast.big_k,
                    big_a: &setup.big_w[&j],
                },
                j,
                &setup.sk,
                &message.chi,
            )?;
            Ok((j, alpha, alpha_hat))
        },
    );

    let Round2 {
        round1,
        big_gamma: my_big_gamma,
        others: broadcasts,
        betas,
    } = round2;

    let mut big_gamma = my_big_gamma;
    let mut delta = round1.gamma * round1.k;
    let mut chi = setup.w * round1.k;
    for result in alphas {
        let (j, alpha, alpha_hat) = result?;
        let (beta, beta_hat) = &betas[&j];
        big_gamma += messages[&j].big_gamma;
        delta += bignum_to_scalar::<C>(&(&alpha + beta));
        chi += bignum_to_scalar::<C>(&(&alpha_hat + beta_hat));
    }
    let big_delta = big_gamma * round1.k;
    let k_int = scalar_to_bignum::<C>(&round1.k);

    let seeds = random_seeds(rng, &others);
    let outgoing = par_map(
        &seeds,
        |(j, seed)| -> Result<(Participant, Round3Message<C>), ProtocolError> {
            let mut rng = ChaCha20Rng::from_seed(*seed);
            let proof = logstar::prove::<C>(
                &mut rng,
                &mut setup.fork(b"logstar delta", me, *j),
                logstar::Statement {
                    pk: my_pk,
                    aux: &setup.aux[j].pedersen,
                    big_c: &round1.broadcast.big_k,
                    big_x: &big_delta,
                    base: &big_gamma,
                },
                logstar::Witness {
                    x: &k_int,
                    rho: &round1.rho,
                },
            )?;
            Ok((
                *j,
                Round3Message {
                    ssid: setup.ssid,
                    delta,
                    big_delta,
                    proof,
                },
            ))
        },
    )
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;

    Ok((
        Round3 {
            k: round1.k,
            chi,
            big_gamma,
            delta,
            big_delta,
            others: broadcasts,
        },
        outgoing,
    ))
}

/// Check everybody's share of `gamma * k`, and produce the presignature.
pub(crate) fn finish<C: CSCurve>(
    setup: &Setup<C>,
    round3: Round3<C>,
    messages: &BTreeMap<Participant, Round3Message<C>>,
) -> Result<PresignOutput<C>, ProtocolError> {
    let me = setup.me;
    let my_aux = setup.my_aux();
    let others = setup.others();

    par_map(&others, |&j| -> Result<(), ProtocolError> {
        let Some(message) = messages.get(&j) else {
            return Err(missing(j));
        };
        setup.check_ssid(j, &message.ssid)?;
        if !logstar::verify::<C>(
            &mut setup.fork(b"logstar delta", j, me),
            logstar::Statement {
                pk: &setup.aux[&j].paillier,
                aux: &my_aux.pedersen,
                big_c: &round3.others[&j].big_k,
                big_x: &message.big_delta,
                base: &round3.big_gamma,
            },
            &message.proof,
        ) {
            return Err(proof_failed(j, "logstar"));
        }
        Ok(())
    })
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;

    let mut delta = round3.delta;
    let mut big_delta = round3.big_delta;
    for j in others {
        delta += messages[&j].delta;
        big_delta += messages[&j].big_delta;
    }

    if C::ProjectivePoint::generator() * delta != big_delta {
        error!(?me, "presign: delta shares do not match delta points");
        return Err(ProtocolError::AggregateMismatch);
    }

    let delta_inv = Option::<C::Scalar>::from(delta.invert())
        .ok_or_else(|| ProtocolError::AssertionFailed("delta is zero".to_string()))?;

    Ok(PresignOutput {
        big_r: (round3.big_gamma * delta_inv).into(),
        k: round3.k,
        chi: round3.chi,
    })
}

#[cfg(test)]
mod test {
    use k256::{ProjectivePoint, Scalar, Secp256k1};
    use rand_core::OsRng;

    use super::*;
    use crate::{
        keyshare::test::do_keygen,
        presign::{setup, test::fixture_aux_info, PresignArguments},
    };

    fn make_setups(n: u32) -> Vec<Setup<Secp256k1>> {
        let participants: Vec<Participant> = (0..n).map(Participant::from).collect();
        let keygen_out = do_keygen(&participants, 2).unwrap();
        let aux_info = fixture_aux_info(&participants);
        let ssid = SessionId::random(&mut OsRng);

        keygen_out
            .into_iter()
            .zip(aux_info)
            .map(|((p, keygen_out), aux_info)| {
                setup(
                    &participants,
                    p,
                    PresignArguments {
                        keygen_out,
                        aux_info,
                        ssid,
                        threshold: 2,
                    },
                )
                .unwrap()
            })
            .collect()
    }

    /// Deliver the messages each participant sent to `to`.
    fn inbox<T: Clone>(
        outboxes: &[(Participant, Vec<(Participant, T)>)],
        to: Participant,
    ) -> BTreeMap<Participant, T> {
        outboxes
            .iter()
            .filter_map(|(from, out)| {
                out.iter()
                    .find(|(p, _)| *p == to)
                    .map(|(_, m)| (*from, m.clone()))
            })
            .collect()
    }

    fn broadcasts(
        firsts: &[Round1<Secp256k1>],
        setups: &[Setup<Secp256k1>],
        me: Participant,
    ) -> BTreeMap<Participant, Round1Broadcast> {
        setups
            .iter()
            .zip(firsts)
            .filter(|(s, _)| s.me != me)
            .map(|(s, r)| (s.me, r.broadcast().clone()))
            .collect()
    }

    #[test]
    fn test_rounds_produce_consistent_presignatures() {
        let setups = make_setups(3);

        let (firsts, proofs): (Vec<_>, Vec<_>) = setups
            .iter()
            .map(|s| round1(&mut OsRng, s).unwrap())
            .unzip();
        let proofs: Vec<_> = setups.iter().map(|s| s.me).zip(proofs).collect();

        let mut round2s = Vec::new();
        let mut outboxes2 = Vec::new();
        let all_broadcasts: Vec<_> = setups
            .iter()
            .map(|s| broadcasts(&firsts, &setups, s.me))
            .collect();
        for ((s, r1), b) in setups.iter().zip(firsts).zip(all_broadcasts) {
            let (r2, out) = round2(&mut OsRng, s, r1, b, &inbox(&proofs, s.me)).unwrap();
            round2s.push(r2);
            outboxes2.push((s.me, out));
        }

        let mut round3s = Vec::new();
        let mut outboxes3 = Vec::new();
        for (s, r2) in setups.iter().zip(round2s) {
            let (r3, out) = round3(&mut OsRng, s, r2, &inbox(&outboxes2, s.me)).unwrap();
            round3s.push(r3);
            outboxes3.push((s.me, out));
        }

        // Fewer than all the delta shares don't add up to the sum of the points.
        let big_delta: ProjectivePoint = round3s.iter().map(|r| r.big_delta).sum();
        let partial: Scalar = round3s[..2].iter().map(|r| r.delta).sum();
        assert_ne!(ProjectivePoint::GENERATOR * partial, big_delta);
        let full: Scalar = round3s.iter().map(|r| r.delta).sum();
        assert_eq!(ProjectivePoint::GENERATOR * full, big_delta);

        let outputs: Vec<_> = setups
            .iter()
            .zip(round3s)
            .map(|(s, r3)| finish(s, r3, &inbox(&outboxes3, s.me)).unwrap())
            .collect();

        let k: Scalar = outputs.iter().map(|o| o.k).sum();
        let k_inv = Option::<Scalar>::from(k.invert()).unwrap();
        for o in outputs.iter() {
            assert_eq!(o.big_r, outputs[0].big_r);
        }
        assert_eq!(
            ProjectivePoint::from(outputs[0].big_r),
            ProjectivePoint::GENERATOR * k_inv
        );
        let x: Scalar = setups.iter().map(|s| s.w).sum();
        let chi: Scalar = outputs.iter().map(|o| o.chi).sum();
        assert_eq!(chi, x * k);
    }

    #[test]
    fn test_corrupted_k_is_blamed() {
        let setups = make_setups(2);
        let (firsts, proofs): (Vec<_>, Vec<_>) = setups
            .iter()
            .map(|s| round1(&mut OsRng, s).unwrap())
            .unzip();
        let proofs: Vec<_> = setups.iter().map(|s| s.me).zip(proofs).collect();

        let victim = &setups[1];
        let mut received = broadcasts(&firsts, &setups, victim.me);
        let corrupted = received.get_mut(&setups[0].me).unwrap();
        let mut bytes = corrupted.big_k.as_bignum().to_bytes();
        bytes[17] ^= 1;
        corrupted.big_k = Ciphertext::from(BigNumber::from_slice(&bytes));

        let r1 = firsts.into_iter().nth(1).unwrap();
        let err = round2(&mut OsRng, victim, r1, received, &inbox(&proofs, victim.me))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ProtocolError::ProofVerificationFailed { proof: "enc", .. }
        ));
        assert_eq!(err.culprit(), Some(setups[0].me));
    }

    #[test]
    fn test_other_sessions_are_rejected() {
        let setups = make_setups(2);
        let (firsts, proofs): (Vec<_>, Vec<_>) = setups
            .iter()
            .map(|s| round1(&mut OsRng, s).unwrap())
            .unzip();
        let proofs: Vec<_> = setups.iter().map(|s| s.me).zip(proofs).collect();

        let victim = &setups[1];
        let mut received = broadcasts(&firsts, &setups, victim.me);
        received.get_mut(&setups[0].me).unwrap().ssid = SessionId::random(&mut OsRng);

        let r1 = firsts.into_iter().nth(1).unwrap();
        let err = round2(&mut OsRng, victim, r1, received, &inbox(&proofs, victim.me))
            .err()
            .unwrap();
        assert!(matches!(err, ProtocolError::TranscriptMismatch { .. }));
    }
}
