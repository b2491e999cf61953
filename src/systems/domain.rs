//! The `Domain` type represents the periodic boundaries of a simulated
//! system: an origin-centered cuboid or triclinic box.
use log::info;

use crate::{Matrix3, Vector3D};
use super::Cells;

/// Schema version for domain snapshots, checked on restore.
const DOMAIN_SNAPSHOT_VERSION: u32 = 1;

/// A `Domain` defines the spatial boundaries imposed on particle positions.
///
/// The origin is always located at the center of the domain, and
/// periodicity is enabled on every axis by default.
///
/// A cuboid domain has mutually perpendicular edges; a triclinic domain
/// additionally carries tilt factors `xy`, `xz` and `yz`, so that the three
/// lattice vectors are `(lx, 0, 0)`, `(xy, ly, 0)` and `(xz, yz, lz)`.
/// Cartesian coordinates `x` relate to scaled coordinates `s` through the
/// cell matrix `H = [l_x, l_y, l_z]` as `x = H s`.
#[derive(Debug, Clone)]
pub struct Domain {
    side_lengths: Vector3D,
    xy: f64,
    xz: f64,
    yz: f64,
    is_tilted: bool,
    periodic: [bool; 3],
    /// Cell matrix, cached from side lengths and tilts
    h: Matrix3,
    /// Inverse of the cell matrix, cached from side lengths and tilts
    h_inv: Matrix3,
    cells: Vec<Cells>,
}

/// Serializable snapshot of a `Domain`, excluding cell occupancy (which is
/// rebuilt from particle positions on restore).
#[derive(Debug, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct DomainSnapshot {
    pub schema_version: u32,
    pub side_lengths: [f64; 3],
    pub tilt: [f64; 3],
    pub periodic: [bool; 3],
}

impl Domain {
    /// Create a cuboid domain with the given side lengths, periodic in all
    /// directions.
    pub fn cuboid(side_lengths: Vector3D) -> Domain {
        assert!(
            side_lengths[0] > 0.0 && side_lengths[1] > 0.0 && side_lengths[2] > 0.0,
            "side lengths must be positive"
        );
        let mut domain = Domain {
            side_lengths: side_lengths,
            xy: 0.0,
            xz: 0.0,
            yz: 0.0,
            is_tilted: false,
            periodic: [true; 3],
            h: Matrix3::zero(),
            h_inv: Matrix3::zero(),
            cells: Vec::new(),
        };
        domain.update_h();
        return domain;
    }

    /// Create a cubic domain with the given side length.
    pub fn cubic(length: f64) -> Domain {
        Domain::cuboid(Vector3D::new(length, length, length))
    }

    /// Create a triclinic domain with the given side lengths and tilt
    /// factors `(xy, xz, yz)`.
    pub fn triclinic(side_lengths: Vector3D, xy: f64, xz: f64, yz: f64) -> Domain {
        let mut domain = Domain::cuboid(side_lengths);
        domain.xy = xy;
        domain.xz = xz;
        domain.yz = yz;
        domain.is_tilted = xy.abs() > crate::math::NEAR_ZERO
            || xz.abs() > crate::math::NEAR_ZERO
            || yz.abs() > crate::math::NEAR_ZERO;
        domain.update_h();
        return domain;
    }

    fn update_h(&mut self) {
        let (lx, ly, lz) = (self.side_lengths[0], self.side_lengths[1], self.side_lengths[2]);
        self.h = Matrix3::new([
            [lx, self.xy, self.xz],
            [0.0, ly, self.yz],
            [0.0, 0.0, lz],
        ]);
        self.h_inv = self.h.inverse();
    }

    /// Get the side length along the given axis.
    pub fn side_length(&self, dimension: usize) -> f64 {
        self.side_lengths[dimension]
    }

    /// Get all side lengths.
    pub fn side_lengths(&self) -> Vector3D {
        self.side_lengths
    }

    /// Change the side lengths, keeping tilt factors. Any cell grids are
    /// rebuilt at the new dimensions with empty occupancy; the caller is
    /// responsible for re-adding the particles.
    pub fn set_side_lengths(&mut self, side_lengths: Vector3D) {
        assert!(
            side_lengths[0] > 0.0 && side_lengths[1] > 0.0 && side_lengths[2] > 0.0,
            "side lengths must be positive"
        );
        self.side_lengths = side_lengths;
        self.update_h();
        let sides = [side_lengths[0], side_lengths[1], side_lengths[2]];
        for cells in &mut self.cells {
            *cells = Cells::create(cells.min_length(), &sides, cells.group());
        }
    }

    /// Change a single side length, keeping the others.
    pub fn set_side_length(&mut self, dimension: usize, length: f64) {
        let mut side_lengths = self.side_lengths;
        side_lengths[dimension] = length;
        self.set_side_lengths(side_lengths);
    }

    /// Make the domain cubic with the given side length, keeping tilt and
    /// periodicity.
    pub fn set_cubic(&mut self, length: f64) {
        self.set_side_lengths(Vector3D::new(length, length, length));
    }

    pub fn xy(&self) -> f64 { self.xy }
    pub fn xz(&self) -> f64 { self.xz }
    pub fn yz(&self) -> f64 { self.yz }

    pub fn is_tilted(&self) -> bool {
        self.is_tilted
    }

    /// Return true if all side lengths are equal.
    pub fn is_cubic(&self) -> bool {
        self.side_lengths[0] == self.side_lengths[1]
            && self.side_lengths[1] == self.side_lengths[2]
    }

    /// Disable periodicity along the given axis.
    pub fn disable(&mut self, dimension: usize) {
        self.periodic[dimension] = false;
    }

    /// Return true if the given axis is periodic.
    pub fn periodic(&self, dimension: usize) -> bool {
        self.periodic[dimension]
    }

    /// Get the volume of the domain.
    pub fn volume(&self) -> f64 {
        if self.is_tilted {
            // |det H|; H is upper triangular so this is the product of the
            // side lengths anyway, but compute it from the matrix so a
            // future change of parameterization stays correct
            self.h.determinant().abs()
        } else {
            self.side_lengths[0] * self.side_lengths[1] * self.side_lengths[2]
        }
    }

    /// Return the minimum side length.
    pub fn min_side_length(&self) -> f64 {
        f64::min(self.side_lengths[0], f64::min(self.side_lengths[1], self.side_lengths[2]))
    }

    /// Return the maximum side length.
    pub fn max_side_length(&self) -> f64 {
        f64::max(self.side_lengths[0], f64::max(self.side_lengths[1], self.side_lengths[2]))
    }

    /// Return the diameter of the largest sphere that fits inside the
    /// domain, which bounds the usable interaction cutoff.
    pub fn inscribed_sphere_diameter(&self) -> f64 {
        let a = Vector3D::from(self.h.transposed()[0]);
        let b = Vector3D::from(self.h.transposed()[1]);
        let c = Vector3D::from(self.h.transposed()[2]);
        let na = (b ^ c).normalized();
        let nb = (c ^ a).normalized();
        let nc = (a ^ b).normalized();
        f64::min((na * a).abs(), f64::min((nb * b).abs(), (nc * c).abs()))
    }

    /// Get the matrix transforming scaled coordinates into Cartesian ones.
    pub fn h(&self) -> Matrix3 {
        self.h
    }

    /// Return the scaled coordinates of a Cartesian position.
    pub fn cartesian2scaled(&self, cartesian: Vector3D) -> Vector3D {
        self.h_inv * cartesian
    }

    /// Same as [`Domain::cartesian2scaled`], but wrapped in `[-0.5, 0.5]`
    /// on every periodic axis.
    pub fn cartesian2scaled_wrap(&self, cartesian: Vector3D) -> Vector3D {
        let mut scaled = self.cartesian2scaled(cartesian);
        for dimension in 0..3 {
            if self.periodic[dimension] {
                scaled[dimension] -= scaled[dimension].round();
            }
        }
        return scaled;
    }

    /// Wrap a position into the origin-centered domain.
    pub fn wrap(&self, position: &mut Vector3D) {
        let (wrapped, _) = self.wrap_opt(*position, Vector3D::zero());
        *position = wrapped;
    }

    /// Compute the minimum-image relative vector `pos1 - pos2` and its
    /// squared norm.
    ///
    /// Positions are expected to be inside (or within one box length of)
    /// the domain, so a single correction per axis is sufficient. This is
    /// the hot path of every pair evaluation.
    #[inline]
    pub fn wrap_opt(&self, pos1: Vector3D, pos2: Vector3D) -> (Vector3D, f64) {
        if self.is_tilted {
            return self.wrap_triclinic_opt(pos1, pos2);
        }
        let mut relative = pos1 - pos2;
        let mut squared_distance = 0.0;
        for dimension in 0..3 {
            if self.periodic[dimension] {
                let side = self.side_lengths[dimension];
                if relative[dimension] > 0.5 * side {
                    relative[dimension] -= side;
                } else if relative[dimension] < -0.5 * side {
                    relative[dimension] += side;
                }
            }
            squared_distance += relative[dimension] * relative[dimension];
        }
        return (relative, squared_distance);
    }

    /// Triclinic variant of [`Domain::wrap_opt`].
    ///
    /// The axes must be unwrapped in descending order (z, then y, then x):
    /// wrapping z also shifts x and y by the `xz`/`yz` tilt factors, and
    /// wrapping y shifts x by `xy`. Changing this order silently produces
    /// wrong minimum images for non-zero tilt.
    pub fn wrap_triclinic_opt(&self, pos1: Vector3D, pos2: Vector3D) -> (Vector3D, f64) {
        let mut relative = pos1 - pos2;
        if self.periodic[2] {
            let side = self.side_lengths[2];
            if relative[2] > 0.5 * side {
                relative[2] -= side;
                relative[1] -= self.yz;
                relative[0] -= self.xz;
            } else if relative[2] < -0.5 * side {
                relative[2] += side;
                relative[1] += self.yz;
                relative[0] += self.xz;
            }
        }
        if self.periodic[1] {
            let side = self.side_lengths[1];
            if relative[1] > 0.5 * side {
                relative[1] -= side;
                relative[0] -= self.xy;
            } else if relative[1] < -0.5 * side {
                relative[1] += side;
                relative[0] += self.xy;
            }
        }
        if self.periodic[0] {
            let side = self.side_lengths[0];
            if relative[0] > 0.5 * side {
                relative[0] -= side;
            } else if relative[0] < -0.5 * side {
                relative[0] += side;
            }
        }
        return (relative, relative.norm2());
    }

    /// Build a cell grid with cells at least `min_length` wide, tracking
    /// the particles of the given group (0 is the whole configuration).
    ///
    /// If `min_length` does not allow a useful decomposition (fewer than
    /// `3^D` cells), the request is rejected and no grid is stored.
    pub fn init_cells(&mut self, min_length: f64, group: usize) {
        assert!(!self.is_tilted, "cell lists are not implemented for triclinic domains");
        let sides = [self.side_lengths[0], self.side_lengths[1], self.side_lengths[2]];
        let cells = Cells::create(min_length, &sides, group);
        if cells.num_total() > 0 {
            self.cells.push(cells);
        } else {
            info!(
                "requested cell list rejected: min_length {} does not allow enough cells",
                min_length
            );
        }
    }

    /// Get the cell grids attached to this domain.
    pub fn cells(&self) -> &[Cells] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cells] {
        &mut self.cells
    }

    /// Return the cell holding the given Cartesian position in the given
    /// grid.
    pub fn cell_id(&self, position: Vector3D, cells: &Cells) -> usize {
        let scaled = self.cartesian2scaled_wrap(position);
        cells.id(&[scaled[0], scaled[1], scaled[2]])
    }

    /// Extract a serializable snapshot of this domain.
    pub fn snapshot(&self) -> DomainSnapshot {
        DomainSnapshot {
            schema_version: DOMAIN_SNAPSHOT_VERSION,
            side_lengths: [self.side_lengths[0], self.side_lengths[1], self.side_lengths[2]],
            tilt: [self.xy, self.xz, self.yz],
            periodic: self.periodic,
        }
    }

    /// Rebuild a domain from a snapshot, validating the schema version.
    pub fn from_snapshot(snapshot: &DomainSnapshot) -> Result<Domain, crate::Error> {
        if snapshot.schema_version != DOMAIN_SNAPSHOT_VERSION {
            return Err(crate::Error::InvalidParameter(format!(
                "unsupported domain snapshot version {}, expected {}",
                snapshot.schema_version, DOMAIN_SNAPSHOT_VERSION,
            )));
        }
        let mut domain = Domain::triclinic(
            Vector3D::from(snapshot.side_lengths),
            snapshot.tilt[0], snapshot.tilt[1], snapshot.tilt[2],
        );
        domain.periodic = snapshot.periodic;
        return Ok(domain);
    }

    /// Serialize this domain as a versioned JSON snapshot.
    pub fn to_json(&self) -> Result<String, crate::Error> {
        let json = serde_json::to_string(&self.snapshot())?;
        return Ok(json);
    }

    /// Restore a domain from a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Domain, crate::Error> {
        let snapshot: DomainSnapshot = serde_json::from_str(json)?;
        return Domain::from_snapshot(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_ulps_eq, assert_relative_eq};

    #[test]
    #[should_panic(expected = "side lengths must be positive")]
    fn negative_cubic() {
        let _ = Domain::cubic(-4.0);
    }

    #[test]
    fn cuboid() {
        let domain = Domain::cuboid(Vector3D::new(3.0, 4.0, 5.0));
        assert!(!domain.is_tilted());
        assert!(!domain.is_cubic());
        assert_eq!(domain.volume(), 60.0);
        assert_eq!(domain.min_side_length(), 3.0);
        assert_eq!(domain.max_side_length(), 5.0);
        assert_eq!(domain.inscribed_sphere_diameter(), 3.0);
    }

    #[test]
    fn cubic_wrap() {
        let domain = Domain::cubic(10.0);
        let (relative, r2) = domain.wrap_opt(
            Vector3D::new(4.0, -4.0, 1.0),
            Vector3D::new(-4.0, 4.0, 0.0),
        );
        assert_eq!(relative, Vector3D::new(-2.0, 2.0, 1.0));
        assert_eq!(r2, 9.0);
    }

    #[test]
    fn minimum_image_idempotence() {
        let domain = Domain::cuboid(Vector3D::new(6.0, 8.0, 10.0));
        let pos1 = Vector3D::new(1.2, -3.1, 4.9);
        let pos2 = Vector3D::new(-2.3, 3.5, -4.2);
        let (reference, r2_reference) = domain.wrap_opt(pos1, pos2);

        // translating one position by whole lattice vectors changes nothing
        for shift in [
            Vector3D::new(6.0, 0.0, 0.0),
            Vector3D::new(0.0, -8.0, 0.0),
            Vector3D::new(-6.0, 8.0, 10.0),
        ] {
            let (relative, r2) = domain.wrap_opt(pos1 + shift, pos2);
            assert_ulps_eq!(relative[0], reference[0], max_ulps = 5);
            assert_ulps_eq!(relative[1], reference[1], max_ulps = 5);
            assert_ulps_eq!(relative[2], reference[2], max_ulps = 5);
            assert_ulps_eq!(r2, r2_reference, max_ulps = 5);
        }

        for dimension in 0..3 {
            assert!(reference[dimension].abs() <= 0.5 * domain.side_length(dimension));
        }
    }

    #[test]
    fn non_periodic_axis() {
        let mut domain = Domain::cubic(10.0);
        domain.disable(2);
        let (relative, _) = domain.wrap_opt(
            Vector3D::new(0.0, 0.0, 6.0),
            Vector3D::new(0.0, 0.0, -3.0),
        );
        assert_eq!(relative[2], 9.0);
    }

    #[test]
    fn triclinic_unwrap_ordering() {
        // tilted box where the minimum image needs a z correction followed
        // by a y correction, each shifting the lower axes
        let domain = Domain::triclinic(Vector3D::new(10.0, 10.0, 10.0), 1.0, 2.0, 3.0);
        let delta = Vector3D::new(0.5, 9.0, 6.0);
        let (relative, r2) = domain.wrap_opt(delta, Vector3D::zero());

        // direct lattice-vector subtraction: delta - b - c with
        // b = (xy, ly, 0) and c = (xz, yz, lz)
        let b = Vector3D::new(1.0, 10.0, 0.0);
        let c = Vector3D::new(2.0, 3.0, 10.0);
        let expected = delta - b - c;
        assert_ulps_eq!(relative[0], expected[0]);
        assert_ulps_eq!(relative[1], expected[1]);
        assert_ulps_eq!(relative[2], expected[2]);
        assert_ulps_eq!(r2, expected.norm2());
    }

    #[test]
    fn triclinic_volume() {
        let domain = Domain::triclinic(Vector3D::new(3.0, 4.0, 5.0), 1.0, 0.5, -0.5);
        // tilting does not change the volume
        assert_relative_eq!(domain.volume(), 60.0, max_relative = 1e-12);
    }

    #[test]
    fn scaled_coordinates() {
        let domain = Domain::cubic(5.0);
        let scaled = domain.cartesian2scaled(Vector3D::new(0.0, 10.0, 4.0));
        assert_eq!(scaled, Vector3D::new(0.0, 2.0, 0.8));

        let wrapped = domain.cartesian2scaled_wrap(Vector3D::new(0.0, 10.0, 4.0));
        assert_ulps_eq!(wrapped[0], 0.0);
        assert_ulps_eq!(wrapped[1], 0.0);
        assert_ulps_eq!(wrapped[2], -0.2);
    }

    #[test]
    fn cell_grid_lifecycle() {
        let mut domain = Domain::cubic(12.0);
        domain.init_cells(3.0, 0);
        assert_eq!(domain.cells().len(), 1);
        assert_eq!(domain.cells()[0].num_total(), 64);

        // too coarse for a useful grid: rejected
        domain.init_cells(6.0, 0);
        assert_eq!(domain.cells().len(), 1);

        // resizing rebuilds the grid at the new dimensions
        domain.set_side_lengths(Vector3D::new(15.0, 15.0, 15.0));
        assert_eq!(domain.cells()[0].num_total(), 125);

        domain.set_cubic(12.0);
        assert!(domain.is_cubic());
        assert_eq!(domain.cells()[0].num_total(), 64);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut domain = Domain::triclinic(Vector3D::new(3.0, 4.0, 5.0), 0.0, 1.0, 0.5);
        domain.disable(0);

        let json = domain.to_json().unwrap();
        let restored = Domain::from_json(&json).unwrap();
        assert_eq!(restored.side_lengths(), domain.side_lengths());
        assert_eq!(restored.xz(), 1.0);
        assert!(!restored.periodic(0));
        assert!(restored.periodic(1));
    }
}
