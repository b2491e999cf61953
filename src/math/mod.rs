//! Geometric and interpolation primitives shared by the pairwise visitors.

use crate::Vector3D;

mod euler;
pub use self::euler::Euler;

mod tables;
pub use self::tables::{Table5D, Table6D, TableSnapshot};

/// Large finite sentinel energy used for hard-core overlaps.
///
/// This is a valid domain value consumed by the Monte Carlo acceptance rule
/// (such a trial is always rejected); it is kept finite so that energy
/// differences never produce `NaN`.
pub const NEAR_INFINITY: f64 = 1e30;

/// Tolerance below which floating point values are considered zero.
pub const NEAR_ZERO: f64 = 1e-15;

/// Convert a Cartesian vector to spherical coordinates
/// `(rho, theta, phi)`, where `rho` is the distance from the origin,
/// `theta` is the azimuthal angle in `[-pi, pi]` and `phi` is the polar
/// angle in `[0, pi]`.
pub fn spherical_coordinates(vector: Vector3D) -> (f64, f64, f64) {
    let rho = vector.norm();
    let theta = f64::atan2(vector[1], vector[0]);
    let phi = if rho > 0.0 {
        f64::acos(f64::clamp(vector[2] / rho, -1.0, 1.0))
    } else {
        0.0
    };
    return (rho, theta, phi);
}
