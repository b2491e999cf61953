use crate::Matrix3;

/// Euler angles describing the orientation of a rigid body, using the ZXZ
/// convention: a rotation by `phi` about the z axis, then by `theta` about
/// the new x axis, then by `psi` about the new z axis.
///
/// The angles are constrained to `phi` in `[-pi, pi]`, `theta` in `[0, pi]`
/// and `psi` in `[-pi, pi]`, matching the ranges produced by
/// [`Euler::from_matrix`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Euler {
    phi: f64,
    theta: f64,
    psi: f64,
}

impl Euler {
    pub fn new(phi: f64, theta: f64, psi: f64) -> Euler {
        Euler { phi, theta, psi }
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn psi(&self) -> f64 {
        self.psi
    }

    /// Build the rotation matrix `R = Rz(phi) Rx(theta) Rz(psi)`
    /// corresponding to these angles.
    pub fn rotation_matrix(&self) -> Matrix3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        let (sin_psi, cos_psi) = self.psi.sin_cos();

        Matrix3::new([
            [
                cos_phi * cos_psi - sin_phi * cos_theta * sin_psi,
                -cos_phi * sin_psi - sin_phi * cos_theta * cos_psi,
                sin_phi * sin_theta,
            ],
            [
                sin_phi * cos_psi + cos_phi * cos_theta * sin_psi,
                -sin_phi * sin_psi + cos_phi * cos_theta * cos_psi,
                -cos_phi * sin_theta,
            ],
            [
                sin_theta * sin_psi,
                sin_theta * cos_psi,
                cos_theta,
            ],
        ])
    }

    /// Extract the ZXZ Euler angles from a rotation matrix.
    ///
    /// When `sin(theta)` vanishes the decomposition is degenerate (only
    /// `phi + psi` or `phi - psi` is defined); in that case `psi` is set to
    /// zero and the full rotation is assigned to `phi`.
    pub fn from_matrix(rotation: &Matrix3) -> Euler {
        let cos_theta = f64::clamp(rotation[2][2], -1.0, 1.0);
        let theta = f64::acos(cos_theta);
        if theta.sin().abs() > 1e-12 {
            let phi = f64::atan2(rotation[0][2], -rotation[1][2]);
            let psi = f64::atan2(rotation[2][0], rotation[2][1]);
            Euler { phi, theta, psi }
        } else {
            // gimbal lock: the matrix reduces to a single z rotation
            let phi = f64::atan2(rotation[1][0], rotation[0][0]);
            Euler { phi, theta, psi: 0.0 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn identity() {
        let euler = Euler::default();
        assert_eq!(euler.rotation_matrix(), Matrix3::one());
    }

    #[test]
    fn round_trip() {
        let angles = [
            (0.3, 0.8, -1.2),
            (-2.9, 0.01, 2.9),
            (1.5, 3.0, -0.4),
            (PI - 1e-6, 1.6, -PI + 1e-6),
        ];
        for (phi, theta, psi) in angles {
            let euler = Euler::new(phi, theta, psi);
            let recovered = Euler::from_matrix(&euler.rotation_matrix());
            assert_relative_eq!(recovered.phi(), phi, max_relative = 1e-9);
            assert_relative_eq!(recovered.theta(), theta, max_relative = 1e-9);
            assert_relative_eq!(recovered.psi(), psi, max_relative = 1e-9);
        }
    }

    #[test]
    fn gimbal_lock() {
        // theta == 0: only phi + psi matters
        let euler = Euler::new(0.7, 0.0, 0.5);
        let recovered = Euler::from_matrix(&euler.rotation_matrix());
        assert_relative_eq!(recovered.phi(), 1.2, max_relative = 1e-12);
        assert_eq!(recovered.theta(), 0.0);
        assert_eq!(recovered.psi(), 0.0);
    }

    #[test]
    fn rotation_is_orthogonal() {
        let rotation = Euler::new(0.4, 1.1, -2.3).rotation_matrix();
        assert_relative_eq!(rotation.determinant(), 1.0, max_relative = 1e-12);
        let product = rotation * rotation.transposed();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(product[i][j], expected, epsilon = 1e-12);
            }
        }
    }
}
