//! This crate implements threshold ECDSA, following the CGGMP protocol,
//! with identifiable aborts.
//!
//! The protocol supports arbitrary numbers of parties and thresholds.
//!
//! # Warning
//!
//! This is experimental cryptographic software, exercise caution.
//!
//! - This library has not undergone any form of audit.
//! - Only the non-interactive presigning variant of the protocol is implemented.
//!
//! # Design
//!
//! Using the library happens in a few phases:
//!
//! - The parties run a distributed key generation protocol ([`keygen`]) to setup a new key pair,
//! which can be used for many signatures. Shares can later be [`refresh`]ed.
//! - Each party also contributes a Paillier key, along with ring-Pedersen parameters,
//! which everybody checks with zero-knowledge proofs ([`aux_info`]).
//! - Before knowing the message to sign, a set of at least `threshold` parties
//! create a presignature ([`presign`]).
//! - Once they know the message, they use the presignature to create a complete
//! signature ([`sign`]).
//!
//! It's important that presignatures are **never** reused.
//!
//! Every message in these protocols is checked. When a participant deviates
//! from the protocol, the other participants abort with an error naming them,
//! see [`protocol::ProtocolError::culprit`].
//!
//! ## API Design
//!
//! Internally, the API tries to be as simple as possible abstracting away
//! as many details as possible into a simple interface.
//!
//! This interface just has two methods:
//! ```ignore
//! pub trait Protocol {
//!    type Output;
//!
//!    fn poke(&mut self) -> Result<Action<Self::Output>, ProtocolError>;
//!    fn message(&mut self, from: Participant, data: MessageData);
//! }
//! ```
//! Given an instance of this trait, which represents a single party
//! participating in a protocol, you can do two things:
//! - You can provide a new message received from some other party.
//! - You can "poke" the protocol to see if it has some kind of action it wants you to perform, or if an error happened.
//!
//! This action is either:
//! - The protocol telling you it has finished, with a return value of type `Output`.
//! - The protocol asking you to send a message to all other parties.
//! - The protocol asking you to *privately* send a message to one party.
//! - The protocol informing you that no more progress can be made until it receives new messages.
//!
//! In particular, details about rounds and message serialization are abstracted
//! away, and all performed internally.
//!
//! # Generic Curves
//!
//! The support for generic curves is done through a custom `CSCurve` trait,
//! which can be easily implemented for any curve from the
//! RustCrypto [elliptic-curves](https://github.com/RustCrypto/elliptic-curves)
//! suite of libraries.
//!
//! This crate also provides implementations of some existing curves behind features,
//! as per the following table:
//!
//! | Curve | Feature |
//! |-------|---------|
//! |Secp256k1|`k256`|
//! |P-256|`p256`|
//!
//! For supporting any message hash, the API requires the user to supply
//! the hash of a message when signing as a scalar directly.
//!
//! # Features
//!
//! The `parallel` feature, on by default, runs independent pieces of work,
//! like the repetitions of some proofs, or the work with each other participant,
//! on a thread pool.
mod auxinfo;
mod compat;
mod constants;
mod crypto;
mod integers;
mod keyshare;
mod math;
mod mta;
pub mod paillier;
mod participants;
pub mod pedersen;
mod presign;
mod proofs;
pub mod protocol;
mod serde;
mod sign;

pub use auxinfo::{aux_info, AuxInfoOutput, AuxInfoPublic};
pub use compat::CSCurve;
pub use crypto::SessionId;
pub use keyshare::{keygen, refresh, KeygenOutput};
pub use presign::{presign, PresignArguments, PresignOutput};
pub use sign::{sign, FullSignature};
