//! Pairwise energy visitation: the outer double loop over particles and
//! sites, cutoff pre-filtering, optional cell-list narrowing, and the
//! trial-state bookkeeping consumed by Monte Carlo acceptance.

mod inner;
pub use self::inner::PairEvaluator;

mod table;
pub use self::table::{PairTable, TableEvaluator};

mod virial;
pub use self::virial::VirialParams;

use log::warn;

use crate::systems::{Configuration, Select, TrialState};

/// Drives pairwise energy computation over a [`Configuration`] and keeps
/// the running total consistent through Monte Carlo trials.
///
/// The total is held as two slots: the committed energy of the current
/// configuration, and a pending value accumulated during a trial. Each
/// [`VisitModel::compute_selection`] call folds the selection's
/// contribution into the pending slot according to the selection's
/// [`TrialState`]; [`VisitModel::finalize`] commits the pending value on
/// acceptance and [`VisitModel::revert`] drops it on rejection, leaving no
/// residual state.
#[derive(Debug, Clone)]
pub struct VisitModel {
    evaluator: PairEvaluator,
    current_energy: f64,
    pending_energy: Option<f64>,
    /// abort whole-configuration sweeps once the accumulated energy
    /// exceeds this, the configuration is rejected anyway
    energy_cutoff: Option<f64>,
}

impl VisitModel {
    pub fn new(evaluator: PairEvaluator) -> VisitModel {
        VisitModel {
            evaluator: evaluator,
            current_energy: 0.0,
            pending_energy: None,
            energy_cutoff: None,
        }
    }

    pub fn evaluator(&self) -> &PairEvaluator {
        &self.evaluator
    }

    pub fn set_energy_cutoff(&mut self, energy_cutoff: Option<f64>) {
        self.energy_cutoff = energy_cutoff;
    }

    /// One-time setup: install evaluator-derived cutoffs into the model
    /// parameters.
    pub fn precompute(&self, configuration: &mut Configuration) {
        self.evaluator.precompute(configuration.model_params_mut());
    }

    /// Committed energy of the current configuration.
    pub fn energy(&self) -> f64 {
        self.current_energy
    }

    /// Energy the configuration would have if the trial in flight were
    /// accepted.
    pub fn trial_energy(&self) -> f64 {
        self.pending_energy.unwrap_or(self.current_energy)
    }

    /// Start a trial, discarding any stale pending value.
    pub fn begin_trial(&mut self) {
        self.pending_energy = None;
    }

    /// Accept the trial in flight: commit the pending energy.
    pub fn finalize(&mut self) {
        if let Some(energy) = self.pending_energy.take() {
            self.current_energy = energy;
        }
    }

    /// Reject the trial in flight: drop the pending energy.
    pub fn revert(&mut self) {
        self.pending_energy = None;
    }

    /// Total energy of the whole configuration, committed as the current
    /// energy.
    #[time_graph::instrument(name = "VisitModel::compute_all")]
    pub fn compute_all(&mut self, configuration: &Configuration) -> f64 {
        let energy = self.total_energy(configuration);
        self.current_energy = energy;
        self.pending_energy = None;
        return energy;
    }

    /// Same as [`VisitModel::compute_all`], narrowed by the given cell
    /// grid. Exact when the grid's `min_length` covers the largest cutoff.
    #[time_graph::instrument(name = "VisitModel::compute_all_with_cells")]
    pub fn compute_all_with_cells(&mut self, configuration: &Configuration, grid: usize) -> f64 {
        let cells = &configuration.domain().cells()[grid];
        let mut energy = 0.0;
        'cells: for cell in 0..cells.num_total() {
            for &neighbor in cells.neighbors(cell) {
                if neighbor < cell {
                    continue;
                }
                let occupants = cells.occupants(cell);
                if neighbor == cell {
                    for (a, &(part1, site1)) in occupants.iter().enumerate() {
                        for &(part2, site2) in &occupants[a + 1..] {
                            if part1 != part2 {
                                energy += self.pair_energy(configuration, part1, site1, part2, site2);
                            }
                        }
                    }
                } else {
                    for &(part1, site1) in occupants {
                        for &(part2, site2) in cells.occupants(neighbor) {
                            if part1 != part2 {
                                energy += self.pair_energy(configuration, part1, site1, part2, site2);
                            }
                        }
                    }
                }
            }
            if let Some(cutoff) = self.energy_cutoff {
                if energy > cutoff {
                    break 'cells;
                }
            }
        }
        self.current_energy = energy;
        self.pending_energy = None;
        return energy;
    }

    /// Energy of a selection against the rest of the configuration (plus
    /// the pairs inside the selection), folded into the pending energy
    /// according to the selection's trial state.
    pub fn compute_selection(&mut self, configuration: &Configuration, select: &Select) -> f64 {
        let energy = self.selection_energy(configuration, select);
        self.accumulate(select.trial_state(), energy);
        return energy;
    }

    /// Cell-narrowed variant of [`VisitModel::compute_selection`]. Cell
    /// membership must already reflect the positions being evaluated.
    pub fn compute_selection_with_cells(
        &mut self,
        configuration: &Configuration,
        select: &Select,
        grid: usize,
    ) -> f64 {
        let cells = &configuration.domain().cells()[grid];
        let mut energy = 0.0;
        for &(part1, ref sites1) in select.items() {
            for &site1 in sites1 {
                let site = configuration.site(part1, site1);
                if !site.physical {
                    continue;
                }
                let cell = configuration.domain().cell_id(site.position, cells);
                for &neighbor in cells.neighbors(cell) {
                    for &(part2, site2) in cells.occupants(neighbor) {
                        if part2 == part1 || select.contains(part2) {
                            continue;
                        }
                        energy += self.pair_energy(configuration, part1, site1, part2, site2);
                    }
                }
            }
        }
        energy += self.intra_selection_energy(configuration, select);
        self.accumulate(select.trial_state(), energy);
        return energy;
    }

    /// Consistency check: the whole-configuration energy must equal half
    /// the sum of single-particle selection energies. Returns the
    /// deviation, warning when it exceeds the expected floating-point
    /// noise.
    pub fn check_energy(&self, configuration: &Configuration) -> f64 {
        let total = self.total_energy(configuration);
        let mut sum = 0.0;
        for particle in 0..configuration.num_particles() {
            let select = Select::particle(configuration, particle, TrialState::Old);
            sum += self.selection_energy(configuration, &select);
        }
        let deviation = f64::abs(total - 0.5 * sum);
        let num = configuration.num_particles() as f64;
        let tolerance = f64::max(1.0, total.abs()) * num * num * 1e-15;
        if deviation > tolerance {
            warn!(
                "inconsistent energies: total {} but half the per-particle sum is {}",
                total, 0.5 * sum,
            );
        }
        return deviation;
    }

    fn total_energy(&self, configuration: &Configuration) -> f64 {
        let mut energy = 0.0;
        let num = configuration.num_particles();
        'pairs: for part1 in 0..num {
            for part2 in (part1 + 1)..num {
                for site1 in 0..configuration.particle(part1).sites.len() {
                    for site2 in 0..configuration.particle(part2).sites.len() {
                        energy += self.pair_energy(configuration, part1, site1, part2, site2);
                    }
                }
                if let Some(cutoff) = self.energy_cutoff {
                    if energy > cutoff {
                        break 'pairs;
                    }
                }
            }
        }
        return energy;
    }

    fn selection_energy(&self, configuration: &Configuration, select: &Select) -> f64 {
        let mut energy = 0.0;
        for &(part1, ref sites1) in select.items() {
            for part2 in 0..configuration.num_particles() {
                if part2 == part1 || select.contains(part2) {
                    continue;
                }
                for &site1 in sites1 {
                    for site2 in 0..configuration.particle(part2).sites.len() {
                        energy += self.pair_energy(configuration, part1, site1, part2, site2);
                    }
                }
            }
        }
        energy += self.intra_selection_energy(configuration, select);
        return energy;
    }

    fn intra_selection_energy(&self, configuration: &Configuration, select: &Select) -> f64 {
        let mut energy = 0.0;
        for (a, &(part1, ref sites1)) in select.items().iter().enumerate() {
            for &(part2, ref sites2) in &select.items()[a + 1..] {
                if part1 == part2 {
                    continue;
                }
                for &site1 in sites1 {
                    for &site2 in sites2 {
                        energy += self.pair_energy(configuration, part1, site1, part2, site2);
                    }
                }
            }
        }
        return energy;
    }

    /// Minimum image, isotropic cutoff pre-filter, then the evaluator.
    fn pair_energy(
        &self,
        configuration: &Configuration,
        part1: usize,
        site1: usize,
        part2: usize,
        site2: usize,
    ) -> f64 {
        let site_a = configuration.site(part1, site1);
        let site_b = configuration.site(part2, site2);
        if !site_a.physical || !site_b.physical {
            return 0.0;
        }
        let (relative, squared_distance) = configuration.domain().wrap_opt(
            site_a.position, site_b.position,
        );
        let cutoff = configuration.model_params().mixed_cutoff(
            site_a.site_type, site_b.site_type,
        );
        if squared_distance > cutoff * cutoff {
            return 0.0;
        }
        return self.evaluator.compute(
            configuration, part1, site1, part2, site2, relative, squared_distance,
        );
    }

    fn accumulate(&mut self, trial_state: TrialState, energy: f64) {
        let base = self.pending_energy.unwrap_or(self.current_energy);
        let updated = match trial_state {
            TrialState::Old | TrialState::Remove => base - energy,
            TrialState::Move | TrialState::Add => base + energy,
        };
        self.pending_energy = Some(updated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::NEAR_INFINITY;
    use crate::systems::{Domain, ModelParams, Particle};
    use crate::Vector3D;
    use approx::assert_relative_eq;

    fn lj_triangle() -> Configuration {
        let mut configuration = Configuration::new(Domain::cubic(20.0), ModelParams::new(1));
        configuration.add_particle(Particle::single(Vector3D::zero(), 0));
        configuration.add_particle(Particle::single(Vector3D::new(1.5, 0.0, 0.0), 0));
        configuration.add_particle(Particle::single(Vector3D::new(0.0, 1.5, 0.0), 0));
        return configuration;
    }

    fn lj(r: f64) -> f64 {
        let s6 = r.powi(-6);
        4.0 * (s6 * s6 - s6)
    }

    #[test]
    fn whole_configuration_energy() {
        let configuration = lj_triangle();
        let mut visitor = VisitModel::new(PairEvaluator::LennardJones);
        let energy = visitor.compute_all(&configuration);
        let expected = 2.0 * lj(1.5) + lj(1.5 * f64::sqrt(2.0));
        assert_relative_eq!(energy, expected, max_relative = 1e-12);
        assert_eq!(visitor.energy(), energy);
    }

    #[test]
    fn move_trial_lifecycle() {
        let mut configuration = lj_triangle();
        let mut visitor = VisitModel::new(PairEvaluator::LennardJones);
        visitor.compute_all(&configuration);

        // trial: move particle 1, accept
        visitor.begin_trial();
        let old = Select::particle(&configuration, 1, TrialState::Old);
        visitor.compute_selection(&configuration, &old);
        configuration.displace_particle(1, Vector3D::new(0.25, 0.0, 0.0));
        let moved = Select::particle(&configuration, 1, TrialState::Move);
        visitor.compute_selection(&configuration, &moved);

        let mut fresh = VisitModel::new(PairEvaluator::LennardJones);
        let expected = fresh.compute_all(&configuration);
        assert_relative_eq!(visitor.trial_energy(), expected, max_relative = 1e-10);

        visitor.finalize();
        assert_relative_eq!(visitor.energy(), expected, max_relative = 1e-10);

        // trial: move particle 2, reject
        visitor.begin_trial();
        let old = Select::particle(&configuration, 2, TrialState::Old);
        visitor.compute_selection(&configuration, &old);
        configuration.displace_particle(2, Vector3D::new(0.0, 0.5, 0.0));
        let moved = Select::particle(&configuration, 2, TrialState::Move);
        visitor.compute_selection(&configuration, &moved);
        visitor.revert();
        configuration.displace_particle(2, Vector3D::new(0.0, -0.5, 0.0));
        assert_relative_eq!(visitor.energy(), expected, max_relative = 1e-10);
    }

    #[test]
    fn add_and_remove_trials() {
        let mut configuration = lj_triangle();
        let mut visitor = VisitModel::new(PairEvaluator::LennardJones);
        visitor.compute_all(&configuration);

        // insertion
        visitor.begin_trial();
        let index = configuration.add_particle(
            Particle::single(Vector3D::new(1.5, 1.5, 0.0), 0),
        );
        let added = Select::particle(&configuration, index, TrialState::Add);
        visitor.compute_selection(&configuration, &added);
        visitor.finalize();

        let mut fresh = VisitModel::new(PairEvaluator::LennardJones);
        assert_relative_eq!(
            visitor.energy(), fresh.compute_all(&configuration), max_relative = 1e-10,
        );

        // deletion of the same particle
        visitor.begin_trial();
        let removed = Select::particle(&configuration, index, TrialState::Remove);
        visitor.compute_selection(&configuration, &removed);
        configuration.remove_particle(index);
        visitor.finalize();
        assert_relative_eq!(
            visitor.energy(), fresh.compute_all(&configuration), max_relative = 1e-10,
        );
    }

    #[test]
    fn cells_match_full_loop() {
        let mut configuration = Configuration::new(Domain::cubic(10.0), ModelParams::new(1));
        configuration.model_params_mut().set_cutoff(0, 2.5);
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    let position = Vector3D::new(
                        -3.75 + 2.5 * x as f64,
                        -3.75 + 2.5 * y as f64,
                        -3.75 + 2.5 * z as f64,
                    );
                    configuration.add_particle(Particle::single(position, 0));
                }
            }
        }
        configuration.init_cells(2.5);

        let mut visitor = VisitModel::new(PairEvaluator::LennardJones);
        let full = visitor.compute_all(&configuration);
        let narrowed = visitor.compute_all_with_cells(&configuration, 0);
        assert!(full.abs() > 1e-6);
        assert_relative_eq!(full, narrowed, max_relative = 1e-10);

        let select = Select::particle(&configuration, 0, TrialState::Old);
        let plain = visitor.selection_energy(&configuration, &select);
        visitor.begin_trial();
        let with_cells = visitor.compute_selection_with_cells(&configuration, &select, 0);
        assert_relative_eq!(plain, with_cells, max_relative = 1e-10);
    }

    #[test]
    fn energy_cutoff_aborts() {
        let mut configuration = Configuration::new(Domain::cubic(20.0), ModelParams::new(1));
        for i in 0..4 {
            let position = Vector3D::new(0.1 * i as f64, 0.0, 0.0);
            configuration.add_particle(Particle::single(position, 0));
        }
        let mut visitor = VisitModel::new(PairEvaluator::HardSphere);
        visitor.set_energy_cutoff(Some(1e20));
        let energy = visitor.compute_all(&configuration);
        assert!(energy >= NEAR_INFINITY);

        // the cell-narrowed sweep aborts the same way
        configuration.init_cells(5.0);
        let narrowed = visitor.compute_all_with_cells(&configuration, 0);
        assert!(narrowed >= NEAR_INFINITY);
    }

    #[test]
    fn non_physical_sites_are_skipped() {
        let mut configuration = Configuration::new(Domain::cubic(20.0), ModelParams::new(1));
        configuration.add_particle(Particle::single(Vector3D::zero(), 0));
        let mut ghost = Particle::single(Vector3D::new(1.1, 0.0, 0.0), 0);
        ghost.sites[0].physical = false;
        configuration.add_particle(ghost);

        let mut visitor = VisitModel::new(PairEvaluator::LennardJones);
        assert_eq!(visitor.compute_all(&configuration), 0.0);
    }

    #[test]
    fn energy_consistency() {
        let configuration = lj_triangle();
        let visitor = VisitModel::new(PairEvaluator::LennardJones);
        assert!(visitor.check_energy(&configuration) < 1e-12);
    }
}
