use std::ops::{Add, AddAssign, Sub, SubAssign, Neg, Mul, MulAssign, Div, Index, IndexMut, BitXor};

/// A 3-dimensional vector of `f64` values.
///
/// The dot product is implemented as `v * w`, and the cross product as
/// `v ^ w`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Vector3D([f64; 3]);

impl Vector3D {
    /// Create a new `Vector3D` with components `x`, `y`, `z`
    pub fn new(x: f64, y: f64, z: f64) -> Vector3D {
        Vector3D([x, y, z])
    }

    /// Create a new null `Vector3D`
    pub fn zero() -> Vector3D {
        Vector3D([0.0, 0.0, 0.0])
    }

    /// Get the squared euclidean norm of this vector
    pub fn norm2(&self) -> f64 {
        self * self
    }

    /// Get the euclidean norm of this vector
    pub fn norm(&self) -> f64 {
        f64::sqrt(self.norm2())
    }

    /// Get a normalized copy of this vector, with a norm of 1
    pub fn normalized(&self) -> Vector3D {
        let norm = self.norm();
        assert!(norm > 0.0, "can not normalize a null vector");
        self / norm
    }
}

impl From<[f64; 3]> for Vector3D {
    fn from(array: [f64; 3]) -> Vector3D {
        Vector3D(array)
    }
}

impl Index<usize> for Vector3D {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Vector3D {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl Add for Vector3D {
    type Output = Vector3D;

    #[inline]
    fn add(self, other: Vector3D) -> Vector3D {
        Vector3D([self[0] + other[0], self[1] + other[1], self[2] + other[2]])
    }
}

impl AddAssign for Vector3D {
    #[inline]
    fn add_assign(&mut self, other: Vector3D) {
        self.0[0] += other[0];
        self.0[1] += other[1];
        self.0[2] += other[2];
    }
}

impl Sub for Vector3D {
    type Output = Vector3D;

    #[inline]
    fn sub(self, other: Vector3D) -> Vector3D {
        Vector3D([self[0] - other[0], self[1] - other[1], self[2] - other[2]])
    }
}

impl SubAssign for Vector3D {
    #[inline]
    fn sub_assign(&mut self, other: Vector3D) {
        self.0[0] -= other[0];
        self.0[1] -= other[1];
        self.0[2] -= other[2];
    }
}

impl Neg for Vector3D {
    type Output = Vector3D;

    #[inline]
    fn neg(self) -> Vector3D {
        Vector3D([-self[0], -self[1], -self[2]])
    }
}

/// Scalar product
impl Mul<Vector3D> for Vector3D {
    type Output = f64;

    #[inline]
    fn mul(self, other: Vector3D) -> f64 {
        self[0] * other[0] + self[1] * other[1] + self[2] * other[2]
    }
}

/// Scalar product, by reference
impl Mul<&Vector3D> for &Vector3D {
    type Output = f64;

    #[inline]
    fn mul(self, other: &Vector3D) -> f64 {
        self[0] * other[0] + self[1] * other[1] + self[2] * other[2]
    }
}

impl Mul<f64> for Vector3D {
    type Output = Vector3D;

    #[inline]
    fn mul(self, scalar: f64) -> Vector3D {
        Vector3D([self[0] * scalar, self[1] * scalar, self[2] * scalar])
    }
}

impl MulAssign<f64> for Vector3D {
    #[inline]
    fn mul_assign(&mut self, scalar: f64) {
        self.0[0] *= scalar;
        self.0[1] *= scalar;
        self.0[2] *= scalar;
    }
}

impl Mul<Vector3D> for f64 {
    type Output = Vector3D;

    #[inline]
    fn mul(self, vector: Vector3D) -> Vector3D {
        vector * self
    }
}

impl Div<f64> for Vector3D {
    type Output = Vector3D;

    #[inline]
    fn div(self, scalar: f64) -> Vector3D {
        Vector3D([self[0] / scalar, self[1] / scalar, self[2] / scalar])
    }
}

impl Div<f64> for &Vector3D {
    type Output = Vector3D;

    #[inline]
    fn div(self, scalar: f64) -> Vector3D {
        Vector3D([self[0] / scalar, self[1] / scalar, self[2] / scalar])
    }
}

/// Cross product
impl BitXor<Vector3D> for Vector3D {
    type Output = Vector3D;

    #[inline]
    fn bitxor(self, other: Vector3D) -> Vector3D {
        Vector3D([
            self[1] * other[2] - self[2] * other[1],
            self[2] * other[0] - self[0] * other[2],
            self[0] * other[1] - self[1] * other[0],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    #[test]
    fn arithmetic() {
        let u = Vector3D::new(1.0, 2.0, 3.0);
        let v = Vector3D::new(-2.0, 1.0, 0.5);

        assert_eq!(u + v, Vector3D::new(-1.0, 3.0, 3.5));
        assert_eq!(u - v, Vector3D::new(3.0, 1.0, 2.5));
        assert_eq!(-u, Vector3D::new(-1.0, -2.0, -3.0));
        assert_eq!(2.0 * u, Vector3D::new(2.0, 4.0, 6.0));
        assert_eq!(u / 2.0, Vector3D::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn products() {
        let u = Vector3D::new(1.0, 0.0, 0.0);
        let v = Vector3D::new(0.0, 1.0, 0.0);

        assert_eq!(u * v, 0.0);
        assert_eq!(u ^ v, Vector3D::new(0.0, 0.0, 1.0));

        let w = Vector3D::new(1.0, 2.0, 2.0);
        assert_eq!(w.norm2(), 9.0);
        assert_eq!(w.norm(), 3.0);
        assert_ulps_eq!(w.normalized().norm(), 1.0);
    }

    #[test]
    #[should_panic(expected = "can not normalize a null vector")]
    fn normalize_zero() {
        let _ = Vector3D::zero().normalized();
    }
}
