//! Multiplicative-to-additive share conversion.
//!
//! The receiver holds `b`, and has published `B = Enc_receiver(b)`.
//! The sender holds `a`, with `A = a * G` public. After one message from
//! the sender, the receiver learns `alpha` and the sender keeps `beta`, with
//! `alpha + beta = a * b`, and neither learns anything else.
use libpaillier::unknown_order::BigNumber;
use magikitten::Transcript;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    compat::{scalar_to_bignum, CSCurve},
    constants::L_PRIME_BOUND,
    integers::random_plusminus_by_size,
    paillier::{Ciphertext, PaillierError, PublicKey, SecretKey},
    pedersen::PedersenParams,
    proofs::affg,
    protocol::{Participant, ProtocolError},
};

/// The public values of one conversion, known to both parties.
#[derive(Clone, Copy)]
pub(crate) struct Setup<'a, C: CSCurve> {
    pub sender: &'a PublicKey,
    pub receiver: &'a PublicKey,
    /// The receiver's commitment parameters, used for the proof.
    pub receiver_aux: &'a PedersenParams,
    /// The receiver's encrypted input.
    pub big_b: &'a Ciphertext,
    /// The sender's input, committed in the group.
    pub big_a: &'a C::ProjectivePoint,
}

/// The message sent from the sender to the receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "C: CSCurve")]
pub(crate) struct MtaMessage<C: CSCurve> {
    /// `a * B + Enc_receiver(-beta)`.
    big_d: Ciphertext,
    /// `Enc_sender(-beta)`.
    big_f: Ciphertext,
    proof: affg::Proof<C>,
}

impl<'a, C: CSCurve> Setup<'a, C> {
    fn statement<'b>(
        &'b self,
        big_d: &'b Ciphertext,
        big_f: &'b Ciphertext,
    ) -> affg::Statement<'b, C> {
        affg::Statement {
            pk0: self.receiver,
            pk1: self.sender,
            aux: self.receiver_aux,
            big_c: self.big_b,
            big_d,
            big_y: big_f,
            big_x: self.big_a,
        }
    }
}

/// Run the sender's side, returning `beta`, and the message for the receiver.
pub(crate) fn send<C: CSCurve>(
    rng: &mut impl CryptoRngCore,
    transcript: &mut Transcript,
    setup: Setup<'_, C>,
    a: &C::Scalar,
) -> Result<(BigNumber, MtaMessage<C>), PaillierError> {
    let a = scalar_to_bignum::<C>(a);
    let beta = random_plusminus_by_size(rng, L_PRIME_BOUND);
    let minus_beta = -beta.clone();

    let (enc_minus_beta, s) = setup.receiver.encrypt(rng, &minus_beta)?;
    let big_d = setup
        .receiver
        .add(&setup.receiver.mul(setup.big_b, &a)?, &enc_minus_beta)?;
    let (big_f, r) = setup.sender.encrypt(rng, &minus_beta)?;

    let proof = affg::prove(
        rng,
        transcript,
        setup.statement(&big_d, &big_f),
        affg::Witness {
            x: &a,
            y: &minus_beta,
            rho: &s,
            rho_y: &r,
        },
    )?;
    Ok((
        beta,
        MtaMessage {
            big_d,
            big_f,
            proof,
        },
    ))
}

/// Run the receiver's side, returning `alpha`.
///
/// Any problem with the message is blamed on its sender.
pub(crate) fn receive<C: CSCurve>(
    transcript: &mut Transcript,
    setup: Setup<'_, C>,
    from: Participant,
    receiver: &SecretKey,
    msg: &MtaMessage<C>,
) -> Result<BigNumber, ProtocolError> {
    if setup.receiver.validate(&msg.big_d).is_err() || setup.sender.validate(&msg.big_f).is_err()
    {
        error!(?from, "invalid ciphertext in share conversion");
        return Err(ProtocolError::InvalidCiphertext { from });
    }
    if !affg::verify(transcript, setup.statement(&msg.big_d, &msg.big_f), &msg.proof) {
        error!(?from, "affg proof failed to verify");
        return Err(ProtocolError::ProofVerificationFailed {
            from,
            proof: "affg",
        });
    }
    Ok(receiver.decrypt(&msg.big_d)?)
}
