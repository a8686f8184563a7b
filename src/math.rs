use std::ops::AddAssign;

use elliptic_curve::{Field, Group};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    compat::{CSCurve, SerializablePoint},
    serde::serialize_projective_points,
};

/// Represents a polynomial with coefficients in the scalar field of the curve.
#[derive(Debug, Clone)]
pub struct Polynomial<C: CSCurve> {
    /// The coefficients of our polynomial, from 0..size-1.
    coefficients: Vec<C::Scalar>,
}

impl<C: CSCurve> Polynomial<C> {
    /// Generate a random polynomial with a certain number of coefficients.
    #[cfg(test)]
    pub fn random(rng: &mut impl CryptoRngCore, size: usize) -> Self {
        let coefficients = (0..size).map(|_| C::Scalar::random(&mut *rng)).collect();
        Self { coefficients }
    }

    /// Extend a constant to a random polynomial of a certain size.
    ///
    /// This is useful if you want the polynomial to have a certain value, but
    /// otherwise be random.
    pub fn extend_random(rng: &mut impl CryptoRngCore, size: usize, constant: &C::Scalar) -> Self {
        let mut coefficients = Vec::with_capacity(size);
        coefficients.push(*constant);
        for _ in 1..size {
            coefficients.push(C::Scalar::random(&mut *rng));
        }
        Self { coefficients }
    }

    /// Evaluate this polynomial at 0.
    pub fn evaluate_zero(&self) -> C::Scalar {
        self.coefficients.first().copied().unwrap_or(C::Scalar::ZERO)
    }

    /// Evaluate this polynomial at a specific point.
    pub fn evaluate(&self, x: &C::Scalar) -> C::Scalar {
        let mut out = C::Scalar::ZERO;
        for c in self.coefficients.iter().rev() {
            out = out * x + c;
        }
        out
    }

    /// Commit to this polynomial by acting on the generator
    pub fn commit(&self) -> GroupPolynomial<C> {
        let coefficients = self
            .coefficients
            .iter()
            .map(|x| C::ProjectivePoint::generator() * x)
            .collect();
        GroupPolynomial { coefficients }
    }
}

/// A polynomial with group coefficients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupPolynomial<C: CSCurve> {
    #[serde(serialize_with = "serialize_projective_points::<C, _>")]
    coefficients: Vec<C::ProjectivePoint>,
}

impl<C: CSCurve> GroupPolynomial<C> {
    /// Evaluate this polynomial at 0.
    pub fn evaluate_zero(&self) -> C::ProjectivePoint {
        self.coefficients
            .first()
            .copied()
            .unwrap_or(C::ProjectivePoint::identity())
    }

    /// Evaluate this polynomial at a specific value.
    pub fn evaluate(&self, x: &C::Scalar) -> C::ProjectivePoint {
        let mut out = C::ProjectivePoint::identity();
        for c in self.coefficients.iter().rev() {
            out = out * x + c;
        }
        out
    }

    /// Return the length of this polynomial.
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }
}

impl<'de, C: CSCurve> Deserialize<'de> for GroupPolynomial<C> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(bound = "C: CSCurve")]
        struct Raw<C: CSCurve> {
            coefficients: Vec<SerializablePoint<C>>,
        }

        let raw = Raw::<C>::deserialize(deserializer)?;
        Ok(Self {
            coefficients: raw
                .coefficients
                .into_iter()
                .map(SerializablePoint::to_projective)
                .collect(),
        })
    }
}

impl<C: CSCurve> AddAssign<&Self> for GroupPolynomial<C> {
    fn add_assign(&mut self, rhs: &Self) {
        self.coefficients
            .iter_mut()
            .zip(rhs.coefficients.iter())
            .for_each(|(a, b)| *a += b);
    }
}
