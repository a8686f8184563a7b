use elliptic_curve::{
    ops::Reduce, point::AffineCoordinates, Curve, CurveArithmetic, Field, FieldBytes, PrimeCurve,
};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[cfg(any(feature = "k256", test))]
mod k256_impl;
#[cfg(any(feature = "p256", test))]
mod p256_impl;

#[cfg(test)]
pub(crate) use k256_impl::scalar_hash;

/// Represents a curve suitable for use in this library.
///
/// The bulk of the trait are the bounds requiring a curve according
/// to RustCrypto's traits.
///
/// Beyond that, we also require that curves have a name, for domain separation,
/// and a way to serialize points with serde.
pub trait CSCurve: PrimeCurve + CurveArithmetic {
    const NAME: &'static [u8];

    const BITS: usize;

    /// Serialize a point with serde.
    fn serialize_point<S: Serializer>(
        point: &Self::AffinePoint,
        serializer: S,
    ) -> Result<S::Ok, S::Error>;

    /// Deserialize a point with serde.
    fn deserialize_point<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self::AffinePoint, D::Error>;
}

#[derive(Clone, Copy)]
pub(crate) struct SerializablePoint<C: CSCurve>(C::AffinePoint);

impl<C: CSCurve> SerializablePoint<C> {
    pub fn to_projective(self) -> C::ProjectivePoint {
        self.0.into()
    }

    pub fn from_projective(point: &C::ProjectivePoint) -> Self {
        Self((*point).into())
    }
}

impl<C: CSCurve> Serialize for SerializablePoint<C> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        C::serialize_point(&self.0, serializer)
    }
}

impl<'de, C: CSCurve> Deserialize<'de> for SerializablePoint<C> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let affine = C::deserialize_point(deserializer)?;
        Ok(Self(affine))
    }
}

/// Get the x coordinate of a point, as a scalar
pub(crate) fn x_coordinate<C: CSCurve>(point: &C::AffinePoint) -> C::Scalar {
    <C::Scalar as Reduce<<C as Curve>::Uint>>::reduce_bytes(&point.x())
}

/// Convert a scalar into a non-negative integer.
pub(crate) fn scalar_to_bignum<C: CSCurve>(x: &C::Scalar) -> BigNumber {
    let bytes: FieldBytes<C> = (*x).into();
    BigNumber::from_slice(bytes.as_slice())
}

/// Convert an integer into a scalar, reducing it modulo the group order.
///
/// Negative integers map to their additive inverse.
pub(crate) fn bignum_to_scalar<C: CSCurve>(x: &BigNumber) -> C::Scalar {
    let reduced = x.nmod(&order::<C>());
    let bytes = reduced.to_bytes();
    let mut repr = FieldBytes::<C>::default();
    // The reduced value is below the order, so it always fits.
    let offset = repr.len() - bytes.len();
    repr[offset..].copy_from_slice(&bytes);
    <C::Scalar as Reduce<<C as Curve>::Uint>>::reduce_bytes(&repr)
}

/// The order of the group, as an integer.
pub(crate) fn order<C: CSCurve>() -> BigNumber {
    scalar_to_bignum::<C>(&-C::Scalar::ONE) + BigNumber::one()
}

#[cfg(test)]
mod test {
    use elliptic_curve::Field;
    use k256::{Scalar, Secp256k1};
    use rand_core::OsRng;

    use super::*;

    #[test]
    fn test_order_matches_curve() {
        let q = order::<Secp256k1>();
        assert_eq!(q.bit_length(), 256);
        assert_eq!(bignum_to_scalar::<Secp256k1>(&q), Scalar::ZERO);
    }

    #[test]
    fn test_negative_integers_reduce_to_inverses() {
        let x = Scalar::random(&mut OsRng);
        let minus_x = -scalar_to_bignum::<Secp256k1>(&x);
        assert_eq!(bignum_to_scalar::<Secp256k1>(&minus_x), -x);
        assert_eq!(
            bignum_to_scalar::<Secp256k1>(&scalar_to_bignum::<Secp256k1>(&x)),
            x
        );
    }
}
