//! This module provides 3D vectors and matrix to be used in all other modules.

mod vectors;
pub use self::vectors::Vector3D;

mod matrix;
pub use self::matrix::Matrix3;
