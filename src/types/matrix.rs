use std::ops::{Index, IndexMut, Mul};

use super::Vector3D;

/// A 3x3 matrix of `f64` values, stored in row-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Matrix3([[f64; 3]; 3]);

impl Matrix3 {
    /// Create a new `Matrix3` from the given rows
    pub fn new(rows: [[f64; 3]; 3]) -> Matrix3 {
        Matrix3(rows)
    }

    /// Create a matrix with all elements set to 0
    pub fn zero() -> Matrix3 {
        Matrix3([[0.0; 3]; 3])
    }

    /// Create the identity matrix
    pub fn one() -> Matrix3 {
        Matrix3([
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ])
    }

    /// Compute the determinant of this matrix
    pub fn determinant(&self) -> f64 {
        self[0][0] * (self[1][1] * self[2][2] - self[1][2] * self[2][1])
            - self[0][1] * (self[1][0] * self[2][2] - self[1][2] * self[2][0])
            + self[0][2] * (self[1][0] * self[2][1] - self[1][1] * self[2][0])
    }

    /// Get the transpose of this matrix
    pub fn transposed(&self) -> Matrix3 {
        Matrix3([
            [self[0][0], self[1][0], self[2][0]],
            [self[0][1], self[1][1], self[2][1]],
            [self[0][2], self[1][2], self[2][2]],
        ])
    }

    /// Compute the inverse of this matrix, which must be invertible
    pub fn inverse(&self) -> Matrix3 {
        let determinant = self.determinant();
        assert!(determinant.abs() > 1e-30, "matrix is not invertible");

        let inv_det = 1.0 / determinant;
        let mut result = Matrix3::zero();
        result[0][0] = inv_det * (self[1][1] * self[2][2] - self[2][1] * self[1][2]);
        result[0][1] = inv_det * (self[0][2] * self[2][1] - self[0][1] * self[2][2]);
        result[0][2] = inv_det * (self[0][1] * self[1][2] - self[0][2] * self[1][1]);
        result[1][0] = inv_det * (self[1][2] * self[2][0] - self[1][0] * self[2][2]);
        result[1][1] = inv_det * (self[0][0] * self[2][2] - self[0][2] * self[2][0]);
        result[1][2] = inv_det * (self[1][0] * self[0][2] - self[0][0] * self[1][2]);
        result[2][0] = inv_det * (self[1][0] * self[2][1] - self[2][0] * self[1][1]);
        result[2][1] = inv_det * (self[2][0] * self[0][1] - self[0][0] * self[2][1]);
        result[2][2] = inv_det * (self[0][0] * self[1][1] - self[1][0] * self[0][1]);
        return result;
    }
}

impl Index<usize> for Matrix3 {
    type Output = [f64; 3];

    #[inline]
    fn index(&self, index: usize) -> &[f64; 3] {
        &self.0[index]
    }
}

impl IndexMut<usize> for Matrix3 {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut [f64; 3] {
        &mut self.0[index]
    }
}

impl From<[[f64; 3]; 3]> for Matrix3 {
    fn from(rows: [[f64; 3]; 3]) -> Matrix3 {
        Matrix3::new(rows)
    }
}

/// Matrix-vector product
impl Mul<Vector3D> for Matrix3 {
    type Output = Vector3D;

    fn mul(self, vector: Vector3D) -> Vector3D {
        Vector3D::new(
            self[0][0] * vector[0] + self[0][1] * vector[1] + self[0][2] * vector[2],
            self[1][0] * vector[0] + self[1][1] * vector[1] + self[1][2] * vector[2],
            self[2][0] * vector[0] + self[2][1] * vector[1] + self[2][2] * vector[2],
        )
    }
}

/// Matrix-matrix product
impl Mul<Matrix3> for Matrix3 {
    type Output = Matrix3;

    fn mul(self, other: Matrix3) -> Matrix3 {
        let mut result = Matrix3::zero();
        for i in 0..3 {
            for j in 0..3 {
                for (k, row) in other.0.iter().enumerate() {
                    result[i][j] += self[i][k] * row[j];
                }
            }
        }
        return result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    #[test]
    fn determinant_inverse() {
        let matrix = Matrix3::new([
            [2.0, 0.0, 0.0],
            [1.0, 3.0, 0.0],
            [0.5, 2.0, 4.0],
        ]);
        assert_eq!(matrix.determinant(), 24.0);

        let product = matrix * matrix.inverse();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_ulps_eq!(product[i][j], expected, max_ulps = 5);
            }
        }
    }

    #[test]
    fn matrix_vector() {
        let matrix = Matrix3::new([
            [1.0, 2.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 3.0],
        ]);
        let vector = Vector3D::new(1.0, 1.0, 1.0);
        assert_eq!(matrix * vector, Vector3D::new(3.0, 1.0, 3.0));
    }

    #[test]
    fn transpose() {
        let matrix = Matrix3::new([
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 9.0],
        ]);
        assert_eq!(matrix.transposed()[0], [1.0, 4.0, 7.0]);
        assert_eq!(matrix.transposed().transposed(), matrix);
    }

    #[test]
    #[should_panic(expected = "matrix is not invertible")]
    fn singular() {
        let _ = Matrix3::zero().inverse();
    }
}
