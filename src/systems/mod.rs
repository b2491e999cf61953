//! Particle systems: periodic domain geometry, cell lists, and the
//! configuration data model consumed by the pairwise visitors.

mod domain;
pub use self::domain::{Domain, DomainSnapshot};

mod cells;
pub use self::cells::Cells;

use log::warn;

use crate::math::Euler;
use crate::Vector3D;

/// A single interaction site: a position, a site type indexing into
/// [`ModelParams`], and a rigid-body orientation for anisotropic models.
#[derive(Debug, Clone)]
pub struct Site {
    pub position: Vector3D,
    pub site_type: usize,
    pub euler: Euler,
    /// Non-physical sites (e.g. centers of mass, reference frames) are
    /// skipped by energy visitors.
    pub physical: bool,
}

impl Site {
    pub fn new(position: Vector3D, site_type: usize) -> Site {
        Site {
            position: position,
            site_type: site_type,
            euler: Euler::default(),
            physical: true,
        }
    }

    pub fn with_euler(position: Vector3D, site_type: usize, euler: Euler) -> Site {
        Site {
            position: position,
            site_type: site_type,
            euler: euler,
            physical: true,
        }
    }
}

/// A particle is an ordered list of sites moving as one rigid unit.
#[derive(Debug, Clone)]
pub struct Particle {
    pub sites: Vec<Site>,
}

impl Particle {
    pub fn new(sites: Vec<Site>) -> Particle {
        Particle { sites: sites }
    }

    /// Single-site particle, the common case for tabulated rigid bodies.
    pub fn single(position: Vector3D, site_type: usize) -> Particle {
        Particle { sites: vec![Site::new(position, site_type)] }
    }
}

/// Per-site-type interaction parameters with symmetric mixed values.
///
/// Mixing follows Lorentz-Berthelot: arithmetic mean for `sigma` and
/// `cutoff`, geometric mean for `epsilon`. Individual mixed entries can be
/// overridden, which is how tabulated evaluators install their
/// `r_hard_max + delta` cutoffs.
#[derive(Debug, Clone)]
pub struct ModelParams {
    epsilon: Vec<f64>,
    sigma: Vec<f64>,
    cutoff: Vec<f64>,
    /// per-type point charge, part of the parameter contract but not
    /// consumed by any of the pairwise evaluators
    charge: Vec<f64>,
    anisotropic: Vec<bool>,
    mixed_epsilon: Vec<Vec<f64>>,
    mixed_sigma: Vec<Vec<f64>>,
    mixed_cutoff: Vec<Vec<f64>>,
}

impl ModelParams {
    /// Create parameters for `num_types` site types, with epsilon and
    /// sigma of 1, a cutoff of 3 and no charge.
    pub fn new(num_types: usize) -> ModelParams {
        assert!(num_types > 0, "at least one site type is required");
        let mut params = ModelParams {
            epsilon: vec![1.0; num_types],
            sigma: vec![1.0; num_types],
            cutoff: vec![3.0; num_types],
            charge: vec![0.0; num_types],
            anisotropic: vec![false; num_types],
            mixed_epsilon: Vec::new(),
            mixed_sigma: Vec::new(),
            mixed_cutoff: Vec::new(),
        };
        params.mix();
        return params;
    }

    /// Recompute all mixed values from the per-type ones, discarding any
    /// manual overrides.
    pub fn mix(&mut self) {
        let n = self.num_types();
        self.mixed_epsilon = vec![vec![0.0; n]; n];
        self.mixed_sigma = vec![vec![0.0; n]; n];
        self.mixed_cutoff = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                self.mixed_epsilon[i][j] = f64::sqrt(self.epsilon[i] * self.epsilon[j]);
                self.mixed_sigma[i][j] = 0.5 * (self.sigma[i] + self.sigma[j]);
                self.mixed_cutoff[i][j] = 0.5 * (self.cutoff[i] + self.cutoff[j]);
            }
        }
    }

    pub fn num_types(&self) -> usize {
        self.epsilon.len()
    }

    pub fn set_epsilon(&mut self, site_type: usize, value: f64) {
        self.epsilon[site_type] = value;
        self.mix();
    }

    pub fn set_sigma(&mut self, site_type: usize, value: f64) {
        self.sigma[site_type] = value;
        self.mix();
    }

    pub fn set_cutoff(&mut self, site_type: usize, value: f64) {
        self.cutoff[site_type] = value;
        self.mix();
    }

    pub fn set_charge(&mut self, site_type: usize, value: f64) {
        self.charge[site_type] = value;
    }

    pub fn set_anisotropic(&mut self, site_type: usize, value: bool) {
        self.anisotropic[site_type] = value;
    }

    pub fn charge(&self, site_type: usize) -> f64 {
        self.charge[site_type]
    }

    pub fn anisotropic(&self, site_type: usize) -> bool {
        self.anisotropic[site_type]
    }

    pub fn mixed_epsilon(&self, type1: usize, type2: usize) -> f64 {
        self.mixed_epsilon[type1][type2]
    }

    pub fn mixed_sigma(&self, type1: usize, type2: usize) -> f64 {
        self.mixed_sigma[type1][type2]
    }

    pub fn mixed_cutoff(&self, type1: usize, type2: usize) -> f64 {
        self.mixed_cutoff[type1][type2]
    }

    /// Override a single mixed cutoff, symmetrically.
    pub fn set_mixed_cutoff(&mut self, type1: usize, type2: usize, value: f64) {
        self.mixed_cutoff[type1][type2] = value;
        self.mixed_cutoff[type2][type1] = value;
    }

    /// Largest mixed cutoff over all type pairs, bounding the cell size
    /// and the usable domain.
    pub fn max_cutoff(&self) -> f64 {
        let mut max = 0.0_f64;
        for row in &self.mixed_cutoff {
            for &value in row {
                max = max.max(value);
            }
        }
        return max;
    }
}

/// Tag on a trial selection describing how its energy contribution enters
/// the running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    /// positions unchanged, contribution is subtracted before a move
    Old,
    /// recomputed at new positions, contribution is added
    Move,
    /// particle leaving the system, contribution is subtracted
    Remove,
    /// particle entering the system, contribution is added
    Add,
}

impl TrialState {
    /// True when the selection refers to positions as they were before
    /// the trial.
    pub fn is_old_config(self) -> bool {
        matches!(self, TrialState::Old | TrialState::Remove)
    }
}

/// An ordered set of `(particle, site indices)` targeted by a trial move.
#[derive(Debug, Clone)]
pub struct Select {
    items: Vec<(usize, Vec<usize>)>,
    trial_state: TrialState,
}

impl Select {
    /// Select every site of one particle.
    pub fn particle(configuration: &Configuration, particle: usize, trial_state: TrialState) -> Select {
        let sites = (0..configuration.particles[particle].sites.len()).collect();
        Select {
            items: vec![(particle, sites)],
            trial_state: trial_state,
        }
    }

    /// Select a single site.
    pub fn site(particle: usize, site: usize, trial_state: TrialState) -> Select {
        Select {
            items: vec![(particle, vec![site])],
            trial_state: trial_state,
        }
    }

    pub fn from_items(items: Vec<(usize, Vec<usize>)>, trial_state: TrialState) -> Select {
        Select { items: items, trial_state: trial_state }
    }

    pub fn items(&self) -> &[(usize, Vec<usize>)] {
        &self.items
    }

    pub fn num_particles(&self) -> usize {
        self.items.len()
    }

    pub fn trial_state(&self) -> TrialState {
        self.trial_state
    }

    pub fn set_trial_state(&mut self, trial_state: TrialState) {
        self.trial_state = trial_state;
    }

    pub fn contains(&self, particle: usize) -> bool {
        self.items.iter().any(|&(p, _)| p == particle)
    }
}

/// A `Configuration` owns the particles, the periodic domain and the
/// interaction parameters, and keeps any active cell lists consistent with
/// the particle positions.
#[derive(Debug, Clone)]
pub struct Configuration {
    particles: Vec<Particle>,
    domain: Domain,
    model_params: ModelParams,
}

impl Configuration {
    pub fn new(domain: Domain, model_params: ModelParams) -> Configuration {
        Configuration {
            particles: Vec::new(),
            domain: domain,
            model_params: model_params,
        }
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, index: usize) -> &Particle {
        &self.particles[index]
    }

    pub fn site(&self, particle: usize, site: usize) -> &Site {
        &self.particles[particle].sites[site]
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn model_params(&self) -> &ModelParams {
        &self.model_params
    }

    pub fn model_params_mut(&mut self) -> &mut ModelParams {
        &mut self.model_params
    }

    /// Select every site of every particle.
    pub fn selection_of_all(&self, trial_state: TrialState) -> Select {
        let items = self.particles.iter().enumerate()
            .map(|(i, particle)| (i, (0..particle.sites.len()).collect()))
            .collect();
        Select::from_items(items, trial_state)
    }

    /// Add a particle, registering its sites in any active cell list.
    /// Returns the index of the new particle.
    pub fn add_particle(&mut self, mut particle: Particle) -> usize {
        for site in &mut particle.sites {
            self.domain.wrap(&mut site.position);
        }
        let index = self.particles.len();
        for site_index in 0..particle.sites.len() {
            let position = particle.sites[site_index].position;
            let cell_ids = self.cell_ids(position);
            for (grid, cell) in cell_ids {
                self.domain.cells_mut()[grid].add(cell, index, site_index);
            }
        }
        self.particles.push(particle);
        return index;
    }

    /// Remove a particle. Later particles shift down by one index, and
    /// cell lists are reindexed to match.
    pub fn remove_particle(&mut self, index: usize) {
        for site_index in 0..self.particles[index].sites.len() {
            let position = self.particles[index].sites[site_index].position;
            let cell_ids = self.cell_ids(position);
            for (grid, cell) in cell_ids {
                self.domain.cells_mut()[grid].remove(cell, index, site_index);
            }
        }
        self.particles.remove(index);
        for cells in self.domain.cells_mut() {
            cells.reindex_removed(index);
        }
    }

    /// Rigidly translate a particle, wrapping each site back into the
    /// domain and moving it between cells as needed.
    pub fn displace_particle(&mut self, index: usize, displacement: Vector3D) {
        for site_index in 0..self.particles[index].sites.len() {
            let old_position = self.particles[index].sites[site_index].position;
            let mut new_position = old_position + displacement;
            self.domain.wrap(&mut new_position);
            self.particles[index].sites[site_index].position = new_position;

            for grid in 0..self.domain.cells().len() {
                let old_cell = self.domain.cell_id(old_position, &self.domain.cells()[grid]);
                let new_cell = self.domain.cell_id(new_position, &self.domain.cells()[grid]);
                self.domain.cells_mut()[grid].update(old_cell, new_cell, index, site_index);
            }
        }
    }

    /// Set the orientation of a single site.
    pub fn rotate_site(&mut self, particle: usize, site: usize, euler: Euler) {
        self.particles[particle].sites[site].euler = euler;
    }

    fn cell_ids(&self, position: Vector3D) -> Vec<(usize, usize)> {
        self.domain.cells().iter().enumerate()
            .map(|(grid, cells)| (grid, self.domain.cell_id(position, cells)))
            .collect()
    }

    /// Build a cell list over the domain and populate it with the current
    /// particles. `min_length` must cover the largest interaction cutoff
    /// for the cell-narrowed energy traversal to be exact.
    pub fn init_cells(&mut self, min_length: f64) {
        if min_length < self.model_params.max_cutoff() {
            warn!(
                "cell min_length {} is below the largest cutoff {}, \
                cell-narrowed energies will miss interactions",
                min_length, self.model_params.max_cutoff(),
            );
        }
        let before = self.domain.cells().len();
        self.domain.init_cells(min_length, 0);
        if self.domain.cells().len() > before {
            self.populate_cells(self.domain.cells().len() - 1);
        }
    }

    fn populate_cells(&mut self, grid: usize) {
        for particle in 0..self.particles.len() {
            for site in 0..self.particles[particle].sites.len() {
                let position = self.particles[particle].sites[site].position;
                let cell = self.domain.cell_id(position, &self.domain.cells()[grid]);
                self.domain.cells_mut()[grid].add(cell, particle, site);
            }
        }
    }

    /// Change the domain side lengths and rebuild cell occupancy at the
    /// new dimensions.
    pub fn resize_domain(&mut self, side_lengths: Vector3D) {
        self.domain.set_side_lengths(side_lengths);
        for grid in 0..self.domain.cells().len() {
            self.domain.cells_mut()[grid].clear_occupants();
            if self.domain.cells()[grid].num_total() > 0 {
                self.populate_cells(grid);
            }
        }
    }
}
