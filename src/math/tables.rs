use ndarray::{Array5, Array6};

use crate::Error;

/// Schema version for table snapshots, checked on restore.
const TABLE_SNAPSHOT_VERSION: u32 = 1;

/// Serializable snapshot of a table, replacing stream-based serialization
/// with an explicit, versioned codec.
#[derive(Debug, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct TableSnapshot {
    pub schema_version: u32,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

/// Compute the pair of grid indexes bracketing a fractional coordinate in
/// `[0, 1]` on an axis with `n` points, along with the interpolation weight
/// of the upper index.
///
/// A coordinate of exactly `1.0` resolves to the last grid index (boundary
/// clamp, not wraparound).
fn bracket(value: f64, n: usize) -> (usize, usize, f64) {
    assert!(
        (0.0..=1.0).contains(&value),
        "fractional coordinate {} is outside [0, 1]", value
    );
    if n == 1 {
        return (0, 0, 0.0);
    }
    let scaled = value * (n - 1) as f64;
    let lower = scaled.floor() as usize;
    let upper = if lower + 1 >= n { lower } else { lower + 1 };
    return (lower, upper, scaled - lower as f64);
}

macro_rules! impl_table_common {
    ($Table: ident, $k: literal) => {
        impl $Table {
            /// Return the minimum of all elements.
            pub fn minimum(&self) -> f64 {
                self.data.iter().copied().fold(f64::INFINITY, f64::min)
            }

            /// Return the maximum of all elements.
            pub fn maximum(&self) -> f64 {
                self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            }

            /// Return true if any element is NaN or infinite.
            pub fn has_bad_value(&self) -> bool {
                self.data.iter().any(|value| !value.is_finite())
            }

            /// Extract a serializable snapshot of this table.
            pub fn snapshot(&self) -> TableSnapshot {
                TableSnapshot {
                    schema_version: TABLE_SNAPSHOT_VERSION,
                    shape: self.data.shape().to_vec(),
                    data: self.data.iter().copied().collect(),
                }
            }

            /// Rebuild a table from a snapshot, validating the schema
            /// version and the shape.
            pub fn from_snapshot(snapshot: &TableSnapshot) -> Result<$Table, Error> {
                if snapshot.schema_version != TABLE_SNAPSHOT_VERSION {
                    return Err(Error::InvalidParameter(format!(
                        "unsupported table snapshot version {}, expected {}",
                        snapshot.schema_version, TABLE_SNAPSHOT_VERSION,
                    )));
                }
                if snapshot.shape.len() != $k {
                    return Err(Error::InvalidParameter(format!(
                        "expected a {}-dimensional table snapshot, got {} axes",
                        $k, snapshot.shape.len(),
                    )));
                }
                let mut shape = [0; $k];
                shape.copy_from_slice(&snapshot.shape);
                let data = ndarray::Array::from_shape_vec(shape, snapshot.data.clone())
                    .map_err(|e| Error::InvalidParameter(format!("bad snapshot shape: {}", e)))?;
                return Ok($Table { data });
            }

            /// Serialize this table as a versioned JSON snapshot.
            pub fn to_json(&self) -> Result<String, Error> {
                let json = serde_json::to_string(&self.snapshot())?;
                return Ok(json);
            }

            /// Restore a table from a JSON snapshot.
            pub fn from_json(json: &str) -> Result<$Table, Error> {
                let snapshot: TableSnapshot = serde_json::from_str(json)?;
                return $Table::from_snapshot(&snapshot);
            }
        }
    };
}

/// A dense regular grid over 5 axes, supporting multilinear interpolation
/// with each fractional input coordinate in `[0, 1]`.
///
/// Used to store the hard-contact distance of an anisotropic pair as a
/// function of the 5 orientational degrees of freedom.
#[derive(Debug, Clone)]
pub struct Table5D {
    data: Array5<f64>,
}

impl Table5D {
    /// Create a table with the given number of points on each axis, filled
    /// with zeros.
    pub fn new(n0: usize, n1: usize, n2: usize, n3: usize, n4: usize) -> Table5D {
        assert!(n0 * n1 * n2 * n3 * n4 > 0, "table axes must be non-empty");
        Table5D {
            data: Array5::zeros([n0, n1, n2, n3, n4]),
        }
    }

    pub fn num0(&self) -> usize { self.data.shape()[0] }
    pub fn num1(&self) -> usize { self.data.shape()[1] }
    pub fn num2(&self) -> usize { self.data.shape()[2] }
    pub fn num3(&self) -> usize { self.data.shape()[3] }
    pub fn num4(&self) -> usize { self.data.shape()[4] }

    pub fn set_data(&mut self, i0: usize, i1: usize, i2: usize, i3: usize, i4: usize, value: f64) {
        self.data[[i0, i1, i2, i3, i4]] = value;
    }

    pub fn value(&self, i0: usize, i1: usize, i2: usize, i3: usize, i4: usize) -> f64 {
        self.data[[i0, i1, i2, i3, i4]]
    }

    /// Multilinear interpolation: each `x` is scaled to its axis and the
    /// weighted sum over the 32 surrounding grid points is returned.
    pub fn linear_interpolation(&self, x0: f64, x1: f64, x2: f64, x3: f64, x4: f64) -> f64 {
        let shape = self.data.shape();
        let brackets = [
            bracket(x0, shape[0]),
            bracket(x1, shape[1]),
            bracket(x2, shape[2]),
            bracket(x3, shape[3]),
            bracket(x4, shape[4]),
        ];

        let mut result = 0.0;
        for corner in 0..32_usize {
            let mut weight = 1.0;
            let mut index = [0; 5];
            for (axis, &(lower, upper, fraction)) in brackets.iter().enumerate() {
                if corner & (1 << axis) == 0 {
                    index[axis] = lower;
                    weight *= 1.0 - fraction;
                } else {
                    index[axis] = upper;
                    weight *= fraction;
                }
            }
            if weight != 0.0 {
                result += weight * self.data[index];
            }
        }
        return result;
    }
}

impl_table_common!(Table5D, 5);

/// A dense regular grid over 6 axes: the 5 orientational axes of
/// [`Table5D`] plus a radial `z` axis in `[0, 1]`.
///
/// Used to store the pair energy between the hard-contact distance (`z = 0`)
/// and the outer cutoff (`z = 1`).
#[derive(Debug, Clone)]
pub struct Table6D {
    data: Array6<f64>,
}

impl Table6D {
    /// Create a table with the given number of points on each axis, filled
    /// with zeros.
    pub fn new(n0: usize, n1: usize, n2: usize, n3: usize, n4: usize, n5: usize) -> Table6D {
        assert!(n0 * n1 * n2 * n3 * n4 * n5 > 0, "table axes must be non-empty");
        Table6D {
            data: Array6::zeros([n0, n1, n2, n3, n4, n5]),
        }
    }

    pub fn num0(&self) -> usize { self.data.shape()[0] }
    pub fn num5(&self) -> usize { self.data.shape()[5] }

    #[allow(clippy::too_many_arguments)]
    pub fn set_data(&mut self, i0: usize, i1: usize, i2: usize, i3: usize, i4: usize, i5: usize, value: f64) {
        self.data[[i0, i1, i2, i3, i4, i5]] = value;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn value(&self, i0: usize, i1: usize, i2: usize, i3: usize, i4: usize, i5: usize) -> f64 {
        self.data[[i0, i1, i2, i3, i4, i5]]
    }

    /// Multilinear interpolation over the 64 surrounding grid points.
    pub fn linear_interpolation(&self, x0: f64, x1: f64, x2: f64, x3: f64, x4: f64, x5: f64) -> f64 {
        let shape = self.data.shape();
        let brackets = [
            bracket(x0, shape[0]),
            bracket(x1, shape[1]),
            bracket(x2, shape[2]),
            bracket(x3, shape[3]),
            bracket(x4, shape[4]),
            bracket(x5, shape[5]),
        ];

        let mut result = 0.0;
        for corner in 0..64_usize {
            let mut weight = 1.0;
            let mut index = [0; 6];
            for (axis, &(lower, upper, fraction)) in brackets.iter().enumerate() {
                if corner & (1 << axis) == 0 {
                    index[axis] = lower;
                    weight *= 1.0 - fraction;
                } else {
                    index[axis] = upper;
                    weight *= fraction;
                }
            }
            if weight != 0.0 {
                result += weight * self.data[index];
            }
        }
        return result;
    }
}

impl_table_common!(Table6D, 6);
