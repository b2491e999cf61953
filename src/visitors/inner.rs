//! Per-pair energy evaluators, dispatched over a closed set of potential
//! forms.

use crate::math::NEAR_INFINITY;
use crate::systems::{Configuration, ModelParams};
use crate::Vector3D;

use super::TableEvaluator;

/// The pairwise potential evaluated between two sites.
///
/// All variants share the same contract: given the minimum-image relative
/// vector and squared distance of a pair of sites, return the pair energy;
/// a hard overlap is the large finite sentinel `NEAR_INFINITY`, never an
/// infinity or a NaN.
#[derive(Debug, Clone)]
pub enum PairEvaluator {
    /// `4 epsilon [(sigma/r)^12 - (sigma/r)^6]` with mixed parameters
    LennardJones,
    /// overlap below the mixed sigma, ideal gas beyond
    HardSphere,
    /// anisotropic tabulated potential
    Table(TableEvaluator),
}

impl PairEvaluator {
    /// One-time setup before any energy computation: tabulated evaluators
    /// install their cutoffs into the model parameters.
    pub fn precompute(&self, model_params: &mut ModelParams) {
        match self {
            PairEvaluator::LennardJones | PairEvaluator::HardSphere => {}
            PairEvaluator::Table(table) => table.precompute(model_params),
        }
    }

    /// Energy of one pair of sites. `relative` and `squared_distance`
    /// come from `Domain::wrap_opt(position1, position2)`.
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        &self,
        configuration: &Configuration,
        part1: usize,
        site1: usize,
        part2: usize,
        site2: usize,
        relative: Vector3D,
        squared_distance: f64,
    ) -> f64 {
        let params = configuration.model_params();
        let type1 = configuration.site(part1, site1).site_type;
        let type2 = configuration.site(part2, site2).site_type;
        match self {
            PairEvaluator::LennardJones => {
                let cutoff = params.mixed_cutoff(type1, type2);
                if squared_distance > cutoff * cutoff {
                    return 0.0;
                }
                let sigma = params.mixed_sigma(type1, type2);
                let epsilon = params.mixed_epsilon(type1, type2);
                let s2 = sigma * sigma / squared_distance;
                let s6 = s2 * s2 * s2;
                4.0 * epsilon * (s6 * s6 - s6)
            }
            PairEvaluator::HardSphere => {
                let sigma = params.mixed_sigma(type1, type2);
                if squared_distance < sigma * sigma {
                    NEAR_INFINITY
                } else {
                    0.0
                }
            }
            PairEvaluator::Table(table) => table.compute_pair(
                configuration, part1, site1, part2, site2, relative, squared_distance,
            ),
        }
    }
}
