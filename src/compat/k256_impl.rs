use elliptic_curve::bigint::Bounded;
use k256::Secp256k1;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::CSCurve;

impl CSCurve for Secp256k1 {
    const NAME: &'static [u8] = b"Secp256k1";
    const BITS: usize = <Self::Uint as Bounded>::BITS;

    fn serialize_point<S: Serializer>(
        point: &Self::AffinePoint,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        point.serialize(serializer)
    }

    fn deserialize_point<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self::AffinePoint, D::Error> {
        Self::AffinePoint::deserialize(deserializer)
    }
}

/// Hash a message into a scalar, the way ECDSA over secp256k1 does.
#[cfg(test)]
pub(crate) fn scalar_hash(msg: &[u8]) -> k256::Scalar {
    use digest::{Digest, FixedOutput};
    use ecdsa::hazmat::DigestPrimitive;
    use elliptic_curve::{ops::Reduce, Curve};

    let digest = <Secp256k1 as DigestPrimitive>::Digest::new_with_prefix(msg);
    let m_bytes: k256::FieldBytes = digest.finalize_fixed();
    <k256::Scalar as Reduce<<Secp256k1 as Curve>::Uint>>::reduce_bytes(&m_bytes)
}
