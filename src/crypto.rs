use std::io::Write;

use ck_meow::Meow;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{SECURITY_PARAMETER, SESSION_ID_LEN},
    serde::encode_writer,
};

const COMMIT_LABEL: &[u8] = b"cggmp-ecdsa commitment";
const COMMIT_LEN: usize = SECURITY_PARAMETER / 8;
const RANDOMIZER_LEN: usize = SECURITY_PARAMETER / 8;
const HASH_LABEL: &[u8] = b"cggmp-ecdsa hash";
const HASH_LEN: usize = SECURITY_PARAMETER / 8;
const SESSION_ID_LABEL: &[u8] = b"cggmp-ecdsa session id";

struct MeowWriter<'a>(&'a mut Meow);

impl<'a> MeowWriter<'a> {
    fn init(meow: &'a mut Meow) -> Self {
        meow.ad(&[], false);
        Self(meow)
    }
}

impl<'a> Write for MeowWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.ad(buf, true);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// The randomness used to hide a commitment, revealed when opening it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Randomizer([u8; RANDOMIZER_LEN]);

impl Randomizer {
    fn random<R: CryptoRngCore>(rng: &mut R) -> Self {
        let mut out = [0u8; RANDOMIZER_LEN];
        // An all-zero randomizer is rejected when opening.
        while out == [0u8; RANDOMIZER_LEN] {
            rng.fill_bytes(&mut out);
        }
        Self(out)
    }
}

impl AsRef<[u8]> for Randomizer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Represents a commitment to some value.
///
/// This commit is both binding, in that it can't be opened to a different
/// value than the one committed, and hiding, in that it hides the value
/// committed inside (perfectly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment([u8; COMMIT_LEN]);

impl Commitment {
    fn compute<T: Serialize>(val: &T, r: &Randomizer) -> Self {
        let mut meow = Meow::new(COMMIT_LABEL);

        meow.ad(r.as_ref(), false);
        encode_writer(&mut MeowWriter::init(&mut meow), val);

        let mut out = [0u8; COMMIT_LEN];
        meow.prf(&mut out, false);

        Commitment(out)
    }

    /// Check that a value and a randomizer match this commitment.
    ///
    /// All-zero commitments or randomizers are never accepted.
    #[must_use]
    pub fn check<T: Serialize>(&self, val: &T, r: &Randomizer) -> bool {
        if self.0 == [0u8; COMMIT_LEN] || r.0 == [0u8; RANDOMIZER_LEN] {
            return false;
        }
        let actual = Self::compute(val, r);
        *self == actual
    }
}

/// Commit to an arbitrary serializable value.
///
/// This also returns a fresh randomizer, which is used to hide the value.
/// It's important to keep the randomizer around, since it's needed to open
/// the commitment later.
pub fn commit<T: Serialize, R: CryptoRngCore>(rng: &mut R, val: &T) -> (Commitment, Randomizer) {
    let r = Randomizer::random(rng);
    let c = Commitment::compute(val, &r);
    (c, r)
}

/// The output of a generic hash function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest([u8; HASH_LEN]);

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hash some value to produce a short digest.
pub fn hash<T: Serialize>(val: &T) -> Digest {
    let mut meow = Meow::new(HASH_LABEL);
    encode_writer(&mut MeowWriter::init(&mut meow), val);

    let mut out = [0u8; HASH_LEN];
    meow.prf(&mut out, false);

    Digest(out)
}

/// Identifies a single run of a protocol.
///
/// Every message of that run carries this identifier, and receivers check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    /// Derive a fresh session identifier by hashing random bytes.
    pub fn random<R: CryptoRngCore>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);

        let mut meow = Meow::new(SESSION_ID_LABEL);
        meow.ad(&seed, false);
        let mut out = [0u8; SESSION_ID_LEN];
        meow.prf(&mut out, false);

        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; SESSION_ID_LEN]> for SessionId {
    fn from(bytes: [u8; SESSION_ID_LEN]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod test {
    use rand_core::OsRng;

    use super::*;

    #[test]
    fn test_commitment_opens_only_to_committed_value() {
        let (c, r) = commit(&mut OsRng, &(1u32, b"hello".to_vec()));
        assert!(c.check(&(1u32, b"hello".to_vec()), &r));
        assert!(!c.check(&(2u32, b"hello".to_vec()), &r));

        let (_, other_r) = commit(&mut OsRng, &0u8);
        assert!(!c.check(&(1u32, b"hello".to_vec()), &other_r));
    }

    #[test]
    fn test_all_zero_values_are_rejected() {
        let val = 7u64;
        let zero_r = Randomizer([0u8; RANDOMIZER_LEN]);
        let c = Commitment::compute(&val, &zero_r);
        assert!(!c.check(&val, &zero_r));

        let (_, r) = commit(&mut OsRng, &val);
        assert!(!Commitment([0u8; COMMIT_LEN]).check(&val, &r));
    }

    #[test]
    fn test_session_ids_are_fresh() {
        let a = SessionId::random(&mut OsRng);
        let b = SessionId::random(&mut OsRng);
        assert_ne!(a, b);
        assert_eq!(a.as_bytes().len(), SESSION_ID_LEN);
    }
}
