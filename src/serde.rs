use std::io::Write;

use elliptic_curve::ScalarPrimitive;
use libpaillier::unknown_order::BigNumber;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

use crate::compat::{CSCurve, SerializablePoint};

/// Encode an arbitrary serializable value into a vec.
pub fn encode<T: Serialize + ?Sized>(val: &T) -> Vec<u8> {
    rmp_serde::encode::to_vec(val).expect("failed to encode value")
}

/// Encode an arbitrary serializable value, prefixed with some tag bytes.
pub fn encode_with_tag<T: Serialize + ?Sized>(tag: &[u8], val: &T) -> Vec<u8> {
    // Matches rmp_serde's internal default.
    let mut out = Vec::with_capacity(128);
    out.extend_from_slice(tag);
    rmp_serde::encode::write(&mut out, val).expect("failed to encode value");
    out
}

/// Encode an arbitrary serializable value into a writer.
pub fn encode_writer<T: Serialize, W: Write>(w: &mut W, val: &T) {
    rmp_serde::encode::write(w, val).expect("failed to encode value");
}

/// Decode an arbitrary value from a slice of bytes.
pub fn decode<T: DeserializeOwned>(input: &[u8]) -> Result<T, rmp_serde::decode::Error> {
    rmp_serde::decode::from_slice(input)
}

/// Serialize a single projective point.
pub fn serialize_projective_point<C: CSCurve, S: Serializer>(
    data: &C::ProjectivePoint,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    C::serialize_point(&(*data).into(), serializer)
}

/// Deserialize a single projective point.
pub fn deserialize_projective_point<'de, C: CSCurve, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<C::ProjectivePoint, D::Error> {
    C::deserialize_point(deserializer).map(Into::into)
}

/// Serialize a list of projective points.
pub fn serialize_projective_points<C: CSCurve, S: Serializer>(
    data: &[C::ProjectivePoint],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(data.iter().map(SerializablePoint::<C>::from_projective))
}

/// Serialize an arbitrary scalar.
pub fn serialize_scalar<C: CSCurve, S: Serializer>(
    data: &C::Scalar,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let data: ScalarPrimitive<C> = (*data).into();
    data.serialize(serializer)
}

/// Deserialize an arbitrary scalar.
pub fn deserialize_scalar<'de, C: CSCurve, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<C::Scalar, D::Error> {
    let out: ScalarPrimitive<C> = ScalarPrimitive::deserialize(deserializer)?;
    Ok(out.into())
}

/// Serde support for signed big integers.
///
/// The value is encoded as a sign flag followed by its big-endian magnitude.
pub mod bignum {
    use super::*;

    pub fn serialize<S: Serializer>(data: &BigNumber, serializer: S) -> Result<S::Ok, S::Error> {
        let negative = data < &BigNumber::zero();
        let magnitude = if negative {
            -data.clone()
        } else {
            data.clone()
        };
        (negative, magnitude.to_bytes()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigNumber, D::Error> {
        let (negative, bytes): (bool, Vec<u8>) = Deserialize::deserialize(deserializer)?;
        let magnitude = BigNumber::from_slice(bytes);
        if negative {
            Ok(-magnitude)
        } else {
            Ok(magnitude)
        }
    }
}

/// Serde support for lists of signed big integers.
pub mod bignums {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Wrapped(#[serde(with = "super::bignum")] BigNumber);

    pub fn serialize<S: Serializer>(data: &[BigNumber], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(data.iter().map(|x| Wrapped(x.clone())))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigNumber>, D::Error> {
        let wrapped: Vec<Wrapped> = Deserialize::deserialize(deserializer)?;
        Ok(wrapped.into_iter().map(|w| w.0).collect())
    }
}
