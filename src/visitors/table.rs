//! Tabulated anisotropic pair potential: a hard-contact distance and an
//! energy well, both functions of the relative orientation of two rigid
//! sites, stored as multilinear-interpolation grids loaded from a text
//! file.

use std::path::Path;

use log::info;

use crate::math::{spherical_coordinates, Euler, Table5D, Table6D, NEAR_INFINITY, NEAR_ZERO};
use crate::systems::{Configuration, ModelParams};
use crate::{Error, Vector3D};

use std::f64::consts::PI;

/// Tables and scaling parameters for one canonical site-type pair.
#[derive(Debug, Clone)]
pub struct PairTable {
    /// radial stretching exponent of the z-transform, 0 for a square well
    gamma: f64,
    /// width of the interaction shell beyond hard contact
    delta: f64,
    /// width of the linear taper at the outer edge of the shell
    smoothing_distance: f64,
    /// hard-contact distance over (s1, s2, e1, e2, e3)
    inner: Table5D,
    /// energy over (s1, s2, e1, e2, e3, z), absent for hard-only tables
    energy: Option<Table6D>,
}

impl PairTable {
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn smoothing_distance(&self) -> f64 {
        self.smoothing_distance
    }

    pub fn inner(&self) -> &Table5D {
        &self.inner
    }

    pub fn energy(&self) -> Option<&Table6D> {
        self.energy.as_ref()
    }
}

/// Anisotropic tabulated pair evaluator over a set of site types.
///
/// Tables are stored for canonical pairs `(i, j)` with `i <= j` only; the
/// per-pair computation first canonicalizes the site order with a
/// deterministic tie-break. The tie-break (type order, then sign of the
/// x-component of the relative vector, then particle index) selects which
/// orientation is looked up, so it must stay bit-stable across versions
/// for trajectories to be reproducible.
#[derive(Debug, Clone)]
pub struct TableEvaluator {
    /// global site type of each table index, strictly increasing
    site_types: Vec<usize>,
    /// global site type to table index
    type_to_index: Vec<Option<usize>>,
    /// upper-triangular matrix of tables, populated for `i <= j`
    tables: Vec<Vec<Option<PairTable>>>,
}

/// Whitespace-delimited token reader over the full file content.
struct Tokens<'a> {
    tokens: std::str::SplitAsciiWhitespace<'a>,
    file_name: &'a str,
}

impl<'a> Tokens<'a> {
    fn next(&mut self) -> Result<&'a str, Error> {
        self.tokens.next().ok_or_else(|| Error::InvalidParameter(format!(
            "unexpected end of table file {}", self.file_name,
        )))
    }

    fn expect(&mut self, keyword: &str) -> Result<(), Error> {
        let token = self.next()?;
        if token != keyword {
            return Err(Error::InvalidParameter(format!(
                "format error in {}: expected '{}', got '{}'",
                self.file_name, keyword, token,
            )));
        }
        return Ok(());
    }

    fn parse<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, Error> {
        let token = self.next()?;
        token.parse().map_err(|_| Error::InvalidParameter(format!(
            "format error in {}: invalid {} '{}'", self.file_name, what, token,
        )))
    }
}

impl TableEvaluator {
    /// Read tables from a file, see the crate documentation for the
    /// format. With `ignore_energy`, the energy grids are skipped and only
    /// the hard-contact distances are kept (hard-particle mode).
    pub fn from_file(path: impl AsRef<Path>, ignore_energy: bool) -> Result<TableEvaluator, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file_name = path.to_string_lossy();
        let mut tokens = Tokens {
            tokens: content.split_ascii_whitespace(),
            file_name: &file_name,
        };

        tokens.expect("site_types")?;
        let num_types: usize = tokens.parse("site type count")?;
        if num_types == 0 {
            return Err(Error::InvalidParameter(format!(
                "table file {} declares no site types", file_name,
            )));
        }
        let mut site_types = Vec::with_capacity(num_types);
        for _ in 0..num_types {
            site_types.push(tokens.parse::<usize>("site type")?);
        }
        if !site_types.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(Error::InvalidParameter(format!(
                "site types in {} must be strictly increasing, got {:?}",
                file_name, site_types,
            )));
        }

        let mut tables: Vec<Vec<Option<PairTable>>> = vec![vec![None; num_types]; num_types];
        for itype in 0..num_types {
            for jtype in itype..num_types {
                let table = read_pair_table(&mut tokens, itype == jtype, ignore_energy)?;
                if table.inner.has_bad_value() {
                    return Err(Error::InvalidParameter(format!(
                        "non-finite hard-contact value in {} for site types {}-{}",
                        file_name, site_types[itype], site_types[jtype],
                    )));
                }
                if let Some(energy) = &table.energy {
                    if energy.has_bad_value() {
                        return Err(Error::InvalidParameter(format!(
                            "non-finite energy value in {} for site types {}-{}",
                            file_name, site_types[itype], site_types[jtype],
                        )));
                    }
                }
                tables[itype][jtype] = Some(table);
            }
        }

        // the file must end exactly after the last value
        if let Some(extra) = tokens.tokens.next() {
            return Err(Error::InvalidParameter(format!(
                "improper table file {}: trailing content starting at '{}'",
                file_name, extra,
            )));
        }

        let max_type = site_types.iter().copied().max().unwrap_or(0);
        let mut type_to_index = vec![None; max_type + 1];
        for (index, &site_type) in site_types.iter().enumerate() {
            type_to_index[site_type] = Some(index);
        }

        return Ok(TableEvaluator {
            site_types: site_types,
            type_to_index: type_to_index,
            tables: tables,
        });
    }

    /// Global site types covered by the tables.
    pub fn site_types(&self) -> &[usize] {
        &self.site_types
    }

    /// The table for a canonical pair of table indices (`i <= j`).
    pub fn pair(&self, i: usize, j: usize) -> &PairTable {
        self.tables[i][j].as_ref().unwrap_or_else(|| panic!(
            "no table for pair ({}, {}), pairs are stored with i <= j", i, j,
        ))
    }

    /// Table index of a global site type, if covered.
    pub fn table_index(&self, site_type: usize) -> Option<usize> {
        self.type_to_index.get(site_type).copied().flatten()
    }

    /// True when the tables carry an energy well on top of the
    /// hard-contact distance.
    pub fn is_energy_table(&self) -> bool {
        self.tables[0][0].as_ref().map_or(false, |table| table.energy.is_some())
    }

    /// Derive the mixed cutoffs (`max hard contact + delta` per pair) and
    /// mark the covered site types as anisotropic.
    pub fn precompute(&self, model_params: &mut ModelParams) {
        for (i, &type1) in self.site_types.iter().enumerate() {
            for (j, &type2) in self.site_types.iter().enumerate().skip(i) {
                let table = self.pair(i, j);
                let cutoff = table.inner.maximum() + table.delta;
                model_params.set_mixed_cutoff(type1, type2, cutoff);
                info!("cutoff for {}-{} site types: {}", type1, type2, cutoff);
            }
            model_params.set_anisotropic(type1, true);
        }
    }

    /// Tabulated energy of one pair of sites.
    ///
    /// `relative` is the minimum-image vector from site 2 to site 1 and
    /// `squared_distance` its squared norm, as returned by
    /// `Domain::wrap_opt`. Hard overlap yields `NEAR_INFINITY`.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_pair(
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
        let site_a = configuration.site(part1, site1);
        let site_b = configuration.site(part2, site2);
        let mut type1 = site_a.site_type;
        let mut type2 = site_b.site_type;

        if !params.anisotropic(type1) || !params.anisotropic(type2) {
            return 0.0;
        }

        let cutoff = params.mixed_cutoff(type1, type2);
        if squared_distance > cutoff * cutoff {
            return 0.0;
        }

        // canonicalize to type1 <= type2, so only half the tables are
        // stored; for equal types the sign of the relative x component
        // and then the particle order break the tie. This choice is
        // arbitrary but must stay reproducible.
        let mut flip = false;
        if type1 > type2 {
            flip = true;
        } else if type1 == type2 {
            if relative[0] > 0.0 {
                flip = true;
            } else if relative[0] == 0.0 && part1 > part2 {
                flip = true;
            }
        }
        if flip {
            std::mem::swap(&mut type1, &mut type2);
        }

        // inverse rotation setting the reference frame on the first
        // canonical site
        let reference = if flip { site_b } else { site_a };
        let other = if flip { site_a } else { site_b };
        let rot1 = reference.euler.rotation_matrix().transposed();

        // relative points from site 2 toward site 1, reverse it when the
        // reference is site 1
        let relative = if flip { relative } else { -relative };
        let (_rho, theta, phi) = spherical_coordinates(rot1 * relative);

        // relative orientation of the other site in the reference frame
        let rot3 = rot1 * other.euler.rotation_matrix();
        let euler = Euler::from_matrix(&rot3);

        let mut s1 = if type1 == type2 {
            theta / PI
        } else {
            theta / (2.0 * PI)
        };
        if s1 < 0.0 {
            s1 += 1.0;
        }
        let s2 = phi / PI;
        let e1 = euler.phi() / (2.0 * PI) + 0.5;
        let e2 = euler.theta() / PI;
        let e3 = euler.psi() / (2.0 * PI) + 0.5;
        assert!((0.0..=1.0).contains(&s1), "s1: {}", s1);
        assert!((0.0..=1.0).contains(&s2), "s2: {}", s2);
        assert!((0.0..=1.0).contains(&e1), "e1: {}", e1);
        assert!((0.0..=1.0).contains(&e2), "e2: {}", e2);
        assert!((0.0..=1.0).contains(&e3), "e3: {}", e3);

        let index1 = self.table_index(type1).unwrap_or_else(|| panic!(
            "no table covers site type {}", type1,
        ));
        let index2 = self.table_index(type2).unwrap_or_else(|| panic!(
            "no table covers site type {}", type2,
        ));
        let table = self.pair(index1, index2);

        let inner = table.inner.linear_interpolation(s1, s2, e1, e2, e3);
        if squared_distance < inner * inner {
            return NEAR_INFINITY;
        }

        let outer = inner + table.delta;
        if squared_distance >= outer * outer {
            return 0.0;
        }

        if table.gamma.abs() < NEAR_ZERO {
            // square well
            return -1.0;
        }

        if let Some(energy) = &table.energy {
            let smooth = table.smoothing_distance;
            let rhg = inner.powf(table.gamma);
            let rcg = (outer - smooth).powf(table.gamma);
            let rg = squared_distance.powf(0.5 * table.gamma);
            let mut z = (rg - rhg) / (rcg - rhg);
            if z < 0.0 && z > -1e-6 {
                z = 0.0;
            }
            let en;
            if z > 1.0 {
                // inside the smoothing taper at the outer edge
                en = energy.linear_interpolation(s1, s2, e1, e2, e3, 1.0);
                let dx = outer - squared_distance.sqrt();
                if dx > smooth && dx < smooth + 1e-5 {
                    return 0.0;
                }
                assert!((0.0..=smooth).contains(&dx), "dx: {}", dx);
                return en * dx / smooth;
            }
            assert!((0.0..=1.0).contains(&z), "z: {}", z);
            en = energy.linear_interpolation(s1, s2, e1, e2, e3, z);
            debug_assert!(en.is_finite(), "non-finite tabulated energy {}", en);
            return en;
        }

        return 0.0;
    }
}

fn read_pair_table(
    tokens: &mut Tokens<'_>,
    same_type: bool,
    ignore_energy: bool,
) -> Result<PairTable, Error> {
    tokens.expect("num_orientations_per_pi")?;
    let k: usize = tokens.parse("orientation count")?;
    tokens.expect("gamma")?;
    let gamma: f64 = tokens.parse("gamma")?;
    tokens.expect("delta")?;
    let delta: f64 = tokens.parse("delta")?;
    tokens.expect("num_z")?;
    let num_z: usize = tokens.parse("num_z")?;
    tokens.expect("smoothing_distance")?;
    let smoothing_distance: f64 = tokens.parse("smoothing_distance")?;

    let ns1 = if same_type { k + 1 } else { 2 * k + 1 };
    let ns2 = k + 1;
    let ne1 = 2 * k + 1;
    let ne2 = ns2;
    let ne3 = ne1;

    let mut inner = Table5D::new(ns1, ns2, ne1, ne2, ne3);
    let mut energy = if num_z > 0 && !ignore_energy {
        Some(Table6D::new(ns1, ns2, ne1, ne2, ne3, num_z))
    } else {
        None
    };

    // values already seen, recalled by duplicate-orientation records
    let num_orientations = ns1 * ns2 * ne1 * ne2 * ne3;
    let mut store = vec![vec![0.0; num_z + 1]; num_orientations];
    let mut orientation = 0;
    for s1 in 0..ns1 {
    for s2 in 0..ns2 {
    for e1 in 0..ne1 {
    for e2 in 0..ne2 {
    for e3 in 0..ne3 {
        let first: f64 = tokens.parse("hard-contact distance")?;
        if (first + 1.0).abs() < NEAR_ZERO {
            // back-reference to a previously seen orientation
            let unique: usize = tokens.parse("orientation back-reference")?;
            if unique >= orientation {
                return Err(Error::InvalidParameter(format!(
                    "back-reference {} points at or past orientation {}",
                    unique, orientation,
                )));
            }
            inner.set_data(s1, s2, e1, e2, e3, store[unique][0]);
            if let Some(energy) = &mut energy {
                for z in 0..num_z {
                    energy.set_data(s1, s2, e1, e2, e3, z, store[unique][z + 1]);
                }
            }
        } else {
            inner.set_data(s1, s2, e1, e2, e3, first);
            store[orientation][0] = first;
            for z in 0..num_z {
                let value: f64 = tokens.parse("energy")?;
                if let Some(energy) = &mut energy {
                    energy.set_data(s1, s2, e1, e2, e3, z, value);
                    store[orientation][z + 1] = value;
                }
            }
        }
        orientation += 1;
    }}}}}

    return Ok(PairTable {
        gamma: gamma,
        delta: delta,
        smoothing_distance: smoothing_distance,
        inner: inner,
        energy: energy,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::{Domain, Particle};
    use approx::assert_relative_eq;
    use std::io::Write;

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        return file;
    }

    /// minimal hard-sphere table: one site type, isotropic contact at 1
    fn hard_sphere_content() -> String {
        let mut content = String::from(
            "site_types 1 0\n\
             num_orientations_per_pi 0\n\
             gamma 0\n\
             delta 0\n\
             num_z 0\n\
             smoothing_distance 0\n",
        );
        // (k+1)^2 (2k+1)^3 = 1 orientation for k = 0
        content.push_str("1.0\n");
        return content;
    }

    #[test]
    fn hard_sphere_round_trip() {
        let file = write_file(&hard_sphere_content());
        let evaluator = TableEvaluator::from_file(file.path(), false).unwrap();
        assert_eq!(evaluator.site_types(), &[0]);
        assert!(!evaluator.is_energy_table());

        let table = evaluator.pair(0, 0);
        assert_eq!(table.inner().minimum(), 1.0);
        assert_eq!(table.inner().maximum(), 1.0);
    }

    #[test]
    fn back_references() {
        let content = "site_types 1 0\n\
             num_orientations_per_pi 1\n\
             gamma 0\n\
             delta 0.5\n\
             num_z 1\n\
             smoothing_distance 0\n"
            .to_string()
            // 2*2*3*2*3 = 72 orientations: one full record, the rest
            // referencing it
            + &"1.0 -2.0\n".to_string()
            + &"-1 0\n".repeat(71);
        let file = write_file(&content);
        let evaluator = TableEvaluator::from_file(file.path(), false).unwrap();
        let table = evaluator.pair(0, 0);
        assert_eq!(table.inner().minimum(), 1.0);
        assert_eq!(table.inner().maximum(), 1.0);
        let energy = table.energy().unwrap();
        assert_eq!(energy.minimum(), -2.0);
        assert_eq!(energy.maximum(), -2.0);
    }

    #[test]
    fn ignore_energy() {
        let content = "site_types 1 0\n\
             num_orientations_per_pi 0\n\
             gamma 0\n\
             delta 0.5\n\
             num_z 2\n\
             smoothing_distance 0\n\
             1.0 -1.0 -1.0\n";
        let file = write_file(content);
        let evaluator = TableEvaluator::from_file(file.path(), true).unwrap();
        assert!(!evaluator.is_energy_table());
        assert!(evaluator.pair(0, 0).energy().is_none());
    }

    #[test]
    fn format_errors() {
        // wrong keyword
        let file = write_file("site_kinds 1 0\n");
        let error = TableEvaluator::from_file(file.path(), false).unwrap_err();
        assert!(error.to_string().contains("expected 'site_types'"));

        // truncated file
        let file = write_file("site_types 1 0\nnum_orientations_per_pi 0\n");
        let error = TableEvaluator::from_file(file.path(), false).unwrap_err();
        assert!(error.to_string().contains("unexpected end of table file"));

        // trailing garbage
        let content = hard_sphere_content() + "0.5\n";
        let file = write_file(&content);
        let error = TableEvaluator::from_file(file.path(), false).unwrap_err();
        assert!(error.to_string().contains("trailing content"));

        // non-finite value
        let content = hard_sphere_content().replace("1.0", "nan");
        let file = write_file(&content);
        let error = TableEvaluator::from_file(file.path(), false).unwrap_err();
        assert!(error.to_string().contains("non-finite"));
    }

    #[test]
    fn stretched_energy_and_smoothing_taper() {
        // gamma = 2, contact at 1, shell width 0.5, taper width 0.1, three
        // energy nodes along z
        let content = "site_types 1 0\n\
             num_orientations_per_pi 0\n\
             gamma 2\n\
             delta 0.5\n\
             num_z 3\n\
             smoothing_distance 0.1\n\
             1.0 -1.0 -0.6 -0.2\n";
        let file = write_file(content);
        let evaluator = TableEvaluator::from_file(file.path(), false).unwrap();
        assert!(evaluator.is_energy_table());

        let mut configuration = Configuration::new(Domain::cubic(20.0), ModelParams::new(1));
        configuration.add_particle(Particle::single(Vector3D::zero(), 0));
        configuration.add_particle(Particle::single(Vector3D::new(1.2, 0.0, 0.0), 0));
        evaluator.precompute(configuration.model_params_mut());

        let energy = |r: f64| {
            evaluator.compute_pair(
                &configuration, 0, 0, 1, 0, Vector3D::new(-r, 0.0, 0.0), r * r,
            )
        };

        // mid-shell: z = (r^2 - 1) / ((1.5 - 0.1)^2 - 1), interpolated
        // between the first two energy nodes
        let z = (1.2_f64 * 1.2 - 1.0) / 0.96;
        assert_relative_eq!(energy(1.2), -1.0 + 0.4 * z / 0.5, max_relative = 1e-12);

        // just inside the edge of the stretched grid, between the last two
        // energy nodes
        let z = (1.39_f64 * 1.39 - 1.0) / 0.96;
        assert_relative_eq!(energy(1.39), -0.6 + 0.4 * (2.0 * z - 1.0), max_relative = 1e-10);

        // the taper scales the z = 1 value linearly to zero at the outer
        // cutoff: dx = 1.5 - 1.45, en = -0.2 * dx / 0.1
        assert_relative_eq!(energy(1.45), -0.1, max_relative = 1e-10);

        // hard overlap and the outer edge of the shell
        assert_eq!(energy(0.9), NEAR_INFINITY);
        assert_eq!(energy(1.5), 0.0);
    }

    #[test]
    fn pair_order_does_not_change_the_energy() {
        let mut content = String::from(
            "site_types 1 0\n\
             num_orientations_per_pi 1\n\
             gamma 0\n\
             delta 0.8\n\
             num_z 0\n\
             smoothing_distance 0\n",
        );
        // 2*2*3*2*3 = 72 orientations with distinct contact distances, so
        // looking up through the wrong canonical frame changes the answer
        for i in 0..72 {
            content.push_str(&format!("{}\n", 0.5 + 0.01 * i as f64));
        }
        let file = write_file(&content);
        let evaluator = TableEvaluator::from_file(file.path(), false).unwrap();

        let mut configuration = Configuration::new(Domain::cubic(20.0), ModelParams::new(1));
        configuration.add_particle(Particle::single(Vector3D::zero(), 0));
        configuration.add_particle(Particle::single(Vector3D::new(1.1, 0.0, 0.0), 0));
        evaluator.precompute(configuration.model_params_mut());

        let orientations = [
            Euler::new(0.0, 0.0, 0.0),
            Euler::new(0.4, 0.3, -1.7),
            Euler::new(-2.2, 1.3, 0.8),
            Euler::new(1.9, 2.9, -0.6),
        ];
        let relatives = [
            // below the smallest contact distance and inside every well:
            // both regimes are reached whatever the orientations
            Vector3D::new(0.3, 0.2, 0.1),
            Vector3D::new(0.7, 0.9, 0.5),
            // near the contact range, where the looked-up orientation
            // decides between overlap and well
            Vector3D::new(0.9, 0.5, 0.3),
            Vector3D::new(-1.1, 0.2, -0.4),
            // zero x component exercises the particle-index tie-break
            Vector3D::new(0.0, 1.05, 0.2),
        ];

        let mut seen_well = false;
        let mut seen_overlap = false;
        for &euler1 in &orientations {
            for &euler2 in &orientations {
                configuration.rotate_site(0, 0, euler1);
                configuration.rotate_site(1, 0, euler2);
                for &relative in &relatives {
                    let squared = relative.norm2();
                    let forward = evaluator.compute_pair(
                        &configuration, 0, 0, 1, 0, relative, squared,
                    );
                    let swapped = evaluator.compute_pair(
                        &configuration, 1, 0, 0, 0, -relative, squared,
                    );
                    assert_eq!(forward.to_bits(), swapped.to_bits());
                    if forward == -1.0 {
                        seen_well = true;
                    }
                    if forward == NEAR_INFINITY {
                        seen_overlap = true;
                    }
                }
            }
        }
        assert!(seen_well && seen_overlap);
    }

    #[test]
    fn precompute_sets_cutoffs() {
        let content = "site_types 1 0\n\
             num_orientations_per_pi 0\n\
             gamma 0\n\
             delta 0.5\n\
             num_z 0\n\
             smoothing_distance 0\n\
             1.0\n";
        let file = write_file(content);
        let evaluator = TableEvaluator::from_file(file.path(), false).unwrap();
        let mut params = ModelParams::new(1);
        evaluator.precompute(&mut params);
        assert_eq!(params.mixed_cutoff(0, 0), 1.5);
        assert!(params.anisotropic(0));
    }
}
