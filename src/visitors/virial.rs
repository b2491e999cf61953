//! Second virial coefficient of a tabulated anisotropic potential, by
//! nested trapezoidal quadrature over the five orientation axes and the
//! radial axis.

use rayon::prelude::*;

use std::f64::consts::PI;

use crate::Error;
use super::TableEvaluator;

/// Parameters of the B2 integration.
#[derive(Debug, Clone)]
pub struct VirialParams {
    /// global site type of the first body
    pub site_type1: usize,
    /// global site type of the second body
    pub site_type2: usize,
    /// oversampling factor for the orientation axes: each axis is sampled
    /// at `n * expand_t` nodes instead of the table's `n` grid points
    pub expand_t: usize,
    /// oversampling factor for the radial axis
    pub expand_z: usize,
    /// inverse temperature weighting the Mayer function
    pub beta: f64,
}

impl Default for VirialParams {
    fn default() -> VirialParams {
        VirialParams {
            site_type1: 0,
            site_type2: 0,
            expand_t: 1,
            expand_z: 1,
            beta: 1.0,
        }
    }
}

impl TableEvaluator {
    /// Integrate the second virial coefficient:
    /// `B2 = B2_hard + B2_attractive`, with the hard-core volume term
    /// `∫ r_hard³ sin(s2) sin(e2) …` and the Mayer term
    /// `∫ (1 - e^(-beta u)) (r_c - r_h) r² sin(s2) sin(e2) …` over the
    /// interaction shell.
    ///
    /// The outer angle loop is a parallel reduction; each term of the sum
    /// is independent.
    pub fn second_virial_coefficient(&self, params: &VirialParams) -> Result<f64, Error> {
        let index1 = self.table_index(params.site_type1).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "no table covers site type {}", params.site_type1,
            ))
        })?;
        let index2 = self.table_index(params.site_type2).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "no table covers site type {}", params.site_type2,
            ))
        })?;
        if params.expand_t == 0 || params.expand_z == 0 {
            return Err(Error::InvalidParameter(
                "expand_t and expand_z must be at least 1".into(),
            ));
        }
        let table = self.pair(usize::min(index1, index2), usize::max(index1, index2));
        let inner = table.inner();

        let expand_t = params.expand_t;
        let ns1 = inner.num0() * expand_t;
        let ns2 = inner.num1() * expand_t;
        let ne1 = inner.num2() * expand_t;
        let ne2 = inner.num3() * expand_t;
        let ne3 = inner.num4() * expand_t;
        let ds1 = 1.0 / (ns1 - 1) as f64;
        let ds2 = 1.0 / (ns2 - 1) as f64;
        let de1 = 1.0 / (ne1 - 1) as f64;
        let de2 = 1.0 / (ne2 - 1) as f64;
        let de3 = 1.0 / (ne3 - 1) as f64;

        let energy = table.energy();
        let (num_z, dz) = match energy {
            Some(energy) => {
                let num_z = energy.num5() * params.expand_z;
                (num_z, 1.0 / (num_z - 1) as f64)
            }
            None => (0, 0.0),
        };
        let exact_grid = expand_t == 1;

        // each (s2 bin, corner) term of the trapezoidal sum is
        // independent, reduce them in parallel
        let (mut b2_h, mut b2_a) = (0..ns2 - 1).into_par_iter().map(|s2| {
            let mut b2_h = 0.0;
            let mut b2_a = 0.0;
            for is2 in 0..=1 {
            let sin_s2 = f64::sin(PI * (s2 + is2) as f64 * ds2);
            for e2 in 0..ne2 - 1 {
            for ie2 in 0..=1 {
            let sin_e2 = f64::sin(PI * (e2 + ie2) as f64 * de2);
            for s1 in 0..ns1 - 1 {
            for e1 in 0..ne1 - 1 {
            for e3 in 0..ne3 - 1 {
            for is1 in 0..=1 {
            for ie1 in 0..=1 {
            for ie3 in 0..=1 {
                let rh = if exact_grid {
                    inner.value(s1 + is1, s2 + is2, e1 + ie1, e2 + ie2, e3 + ie3)
                } else {
                    inner.linear_interpolation(
                        (s1 + is1) as f64 * ds1,
                        (s2 + is2) as f64 * ds2,
                        (e1 + ie1) as f64 * de1,
                        (e2 + ie2) as f64 * de2,
                        (e3 + ie3) as f64 * de3,
                    )
                };
                b2_h += rh * rh * rh * sin_s2 * sin_e2;

                if let Some(energy) = energy {
                    let rc = rh + table.delta();
                    for z in 0..num_z - 1 {
                    for iz in 0..=1 {
                        let u = if exact_grid && params.expand_z == 1 {
                            energy.value(s1 + is1, s2 + is2, e1 + ie1, e2 + ie2, e3 + ie3, z + iz)
                        } else {
                            energy.linear_interpolation(
                                (s1 + is1) as f64 * ds1,
                                (s2 + is2) as f64 * ds2,
                                (e1 + ie1) as f64 * de1,
                                (e2 + ie2) as f64 * de2,
                                (e3 + ie3) as f64 * de3,
                                (z + iz) as f64 * dz,
                            )
                        };
                        let zval = (z + iz) as f64 * dz;
                        let r = (rc - rh) * zval + rh;
                        b2_a += (1.0 - f64::exp(-params.beta * u)) * (rc - rh) * r * r * sin_s2 * sin_e2;
                    }}
                }
            }}}}}}}}
            }
            (b2_h, b2_a)
        }).reduce(|| (0.0, 0.0), |left, right| (left.0 + right.0, left.1 + right.1));

        // hard-core integral prefactor
        b2_h *= 1.0 / 3.0;
        // radial norm and its trapezoid factor
        b2_a *= dz / 2.0;
        let mut b2 = b2_h + b2_a;
        b2 *= ds1 * ds2 * de1 * de2 * de3;
        // trapezoid normalization for the five orientation axes
        b2 /= f64::powi(2.0, 5);
        // symmetry in s1
        b2 *= 2.0;
        // B2 prefactor
        b2 /= 2.0;
        // angular normalization for ds1 * ds2
        b2 *= PI * PI;
        // angular normalization for de1 * de2 * de3
        b2 *= PI / 2.0;
        return Ok(b2);
    }
}
