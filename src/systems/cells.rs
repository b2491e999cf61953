//! Spatial cell lists over scaled coordinates, used to restrict pair
//! visitation to neighboring regions of the domain.

/// Refuse to allocate absurdly fine grids.
const MAX_NUMBER_OF_CELLS: f64 = 1e8;

/// A `Cells` grid partitions the scaled coordinates `[-0.5, 0.5]^D` into
/// equal boxes at least `min_length` wide in Cartesian space, and tracks
/// which sites currently occupy each box.
///
/// Cells are identified by a single serial index; the neighbor stencil of
/// each cell (itself included) is precomputed at construction. Grids with
/// fewer than `3^D` cells are degenerate (every cell would neighbor every
/// other), so construction returns an empty grid instead.
#[derive(Debug, Clone)]
pub struct Cells {
    /// number of cells along each axis
    num: Vec<usize>,
    /// serial indices of the neighbors of each cell, including itself
    neighbors: Vec<Vec<usize>>,
    /// `(particle, site)` pairs currently inside each cell
    occupants: Vec<Vec<(usize, usize)>>,
    /// requested minimal Cartesian width, kept for grid rebuilds
    min_length: f64,
    /// particle group tracked by this grid, 0 for all particles
    group: usize,
}

impl Cells {
    /// Build a grid over a domain with the given Cartesian side lengths.
    /// One entry in `side_lengths` per spatial dimension.
    pub fn create(min_length: f64, side_lengths: &[f64], group: usize) -> Cells {
        assert!(min_length > crate::math::NEAR_ZERO, "cell min_length must be positive");
        let dimensions = side_lengths.len();
        assert!(dimensions == 2 || dimensions == 3, "cell grids must be 2D or 3D");

        let num = side_lengths.iter()
            .map(|&side| (side / min_length).floor() as usize)
            .collect::<Vec<_>>();
        let total: usize = num.iter().product();
        assert!(
            (total as f64) < MAX_NUMBER_OF_CELLS,
            "min_length {} would require {} cells", min_length, total
        );

        let mut cells = Cells {
            num: num,
            neighbors: Vec::new(),
            occupants: Vec::new(),
            min_length: min_length,
            group: group,
        };
        // fewer than 3 cells on an axis would make the periodic stencil
        // visit the same cell twice
        if total <= 3_usize.pow(dimensions as u32) || cells.num.iter().any(|&n| n < 3) {
            cells.num.clear();
            return cells;
        }
        cells.occupants = vec![Vec::new(); total];
        cells.build_neighbors();
        return cells;
    }

    fn build_neighbors(&mut self) {
        let total = self.num_total();
        self.neighbors = Vec::with_capacity(total);
        match self.num.len() {
            2 => {
                let (nx, ny) = (self.num[0] as isize, self.num[1] as isize);
                for cell in 0..total {
                    let cell = cell as isize;
                    let x = cell % nx;
                    let y = cell / nx;
                    let mut stencil = Vec::with_capacity(9);
                    for dy in -1..=1 {
                        for dx in -1..=1 {
                            let nbx = (x + dx).rem_euclid(nx);
                            let nby = (y + dy).rem_euclid(ny);
                            stencil.push((nbx + nx * nby) as usize);
                        }
                    }
                    self.neighbors.push(stencil);
                }
            }
            3 => {
                let (nx, ny, nz) = (
                    self.num[0] as isize, self.num[1] as isize, self.num[2] as isize,
                );
                for cell in 0..total {
                    let cell = cell as isize;
                    let x = cell % nx;
                    let y = (cell / nx) % ny;
                    let z = cell / (nx * ny);
                    let mut stencil = Vec::with_capacity(27);
                    for dz in -1..=1 {
                        for dy in -1..=1 {
                            for dx in -1..=1 {
                                let nbx = (x + dx).rem_euclid(nx);
                                let nby = (y + dy).rem_euclid(ny);
                                let nbz = (z + dz).rem_euclid(nz);
                                stencil.push((nbx + nx * (nby + ny * nbz)) as usize);
                            }
                        }
                    }
                    self.neighbors.push(stencil);
                }
            }
            _ => unreachable!(),
        }
    }

    /// Total number of cells, 0 for a degenerate grid.
    pub fn num_total(&self) -> usize {
        if self.num.is_empty() {
            return 0;
        }
        self.num.iter().product()
    }

    /// Number of cells along the given axis.
    pub fn num(&self, dimension: usize) -> usize {
        self.num[dimension]
    }

    pub fn min_length(&self) -> f64 {
        self.min_length
    }

    pub fn group(&self) -> usize {
        self.group
    }

    /// Serial index of the cell holding the given scaled coordinates,
    /// which must lie in `[-0.5, 0.5]` on every axis.
    pub fn id(&self, scaled: &[f64]) -> usize {
        debug_assert_eq!(scaled.len(), self.num.len());
        let mut cell = 0;
        let mut stride = 1;
        for (dimension, &s) in scaled.iter().enumerate() {
            assert!(
                (-0.5..=0.5).contains(&s),
                "scaled coordinate {} is outside [-0.5, 0.5]", s
            );
            let n = self.num[dimension];
            let mut index = ((s + 0.5) * n as f64).floor() as usize;
            // s == 0.5 lands exactly on the upper edge
            if index == n {
                index = n - 1;
            }
            cell += stride * index;
            stride *= n;
        }
        return cell;
    }

    /// Neighbor stencil of the given cell, including the cell itself.
    pub fn neighbors(&self, cell: usize) -> &[usize] {
        &self.neighbors[cell]
    }

    /// Sites currently inside the given cell.
    pub fn occupants(&self, cell: usize) -> &[(usize, usize)] {
        &self.occupants[cell]
    }

    /// Record a site inside a cell.
    pub fn add(&mut self, cell: usize, particle: usize, site: usize) {
        self.occupants[cell].push((particle, site));
    }

    /// Remove a site from a cell. Panics if the site is not there.
    pub fn remove(&mut self, cell: usize, particle: usize, site: usize) {
        let occupants = &mut self.occupants[cell];
        let position = occupants.iter()
            .position(|&entry| entry == (particle, site))
            .unwrap_or_else(|| panic!(
                "site {} of particle {} is not in cell {}", site, particle, cell
            ));
        occupants.swap_remove(position);
    }

    /// Move a site from one cell to another.
    pub fn update(&mut self, old_cell: usize, new_cell: usize, particle: usize, site: usize) {
        if old_cell == new_cell {
            return;
        }
        self.remove(old_cell, particle, site);
        self.add(new_cell, particle, site);
    }

    /// Shift particle indices after `removed` down by one, following a
    /// particle removal from the configuration.
    pub fn reindex_removed(&mut self, removed: usize) {
        for occupants in &mut self.occupants {
            for entry in occupants {
                if entry.0 > removed {
                    entry.0 -= 1;
                }
            }
        }
    }

    /// Drop all occupancy information, keeping the grid geometry.
    pub fn clear_occupants(&mut self) {
        for occupants in &mut self.occupants {
            occupants.clear();
        }
    }
}
