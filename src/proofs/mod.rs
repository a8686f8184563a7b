//! Non-interactive zero-knowledge proofs.
//!
//! Every proof follows the same shape: a `Statement` holding public values,
//! a `Witness` holding the secret ones, `prove` producing a `Proof`, and
//! `verify` checking it. The Fiat-Shamir challenge is drawn from a transcript,
//! which callers fork with the proof name and the identity of the prover
//! (and of the verifier, for pairwise proofs), so that proofs can't be replayed
//! from one party to another.
//!
//! The proofs about Paillier plaintexts use the ring-Pedersen parameters of
//! the verifier.
use libpaillier::unknown_order::BigNumber;
use magikitten::Transcript;

use crate::{
    compat::{order, CSCurve},
    integers::plusminus_from_stream,
};

pub mod affg;
pub mod dlog;
pub mod enc;
pub mod factor;
pub mod logstar;
pub mod modulus;
pub mod prm;

/// Draw a signed challenge in `[-q, q]`, with `q` the order of the curve.
pub(crate) fn challenge<C: CSCurve>(
    transcript: &mut Transcript,
    label: &'static [u8],
) -> BigNumber {
    plusminus_from_stream(&mut transcript.challenge(label), &order::<C>())
}

/// Map a function over independent items, in parallel if possible.
///
/// The output is in the same order as the input either way.
pub(crate) fn par_map<T, U, F>(items: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        items.par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        items.iter().map(f).collect()
    }
}

#[cfg(test)]
mod test {
    use k256::Secp256k1;

    use super::*;
    use crate::integers::within_bound;

    #[test]
    fn test_challenges_are_deterministic_and_bounded() {
        let transcript = Transcript::new(b"test");
        let a = challenge::<Secp256k1>(&mut transcript.forked(b"party", &[0]), b"e");
        let b = challenge::<Secp256k1>(&mut transcript.forked(b"party", &[0]), b"e");
        let c = challenge::<Secp256k1>(&mut transcript.forked(b"party", &[1]), b"e");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(within_bound(&a, &order::<Secp256k1>()));
    }

    #[test]
    fn test_par_map_keeps_order() {
        let items: Vec<u64> = (0..100).collect();
        assert_eq!(par_map(&items, |x| x * 2), (0..100).map(|x| x * 2).collect::<Vec<_>>());
    }
}
