//! The effective mass charge density solver
//!
//! The two dimensional confinement problem is treated as separable. Each slice at fixed `y`
//! is solved along `z` for its ground sub-band, the resulting sub-band edges then form a
//! one dimensional potential along `y` which is solved in full. Every longitudinal state
//! less than `N kT` above the lowest one, or above the Fermi level when the lowest state is
//! already occupied, is filled according to the one dimensional density of states of the
//! free direction.
//!
//! Potentials are energies in meV measured from the Fermi level. The chemical potential
//! field `mu` enters the electron potential energy as `V = Eg / 2 - mu + V_xc`.

mod exchange;
mod hamiltonian;
mod occupation;

use crate::{
    constants::{BOLTZMANN, ELECTRON_CHARGE},
    device::{DeviceError, LayerLookup},
    fields::{FieldError, GridField, SpinResolved},
};
use hamiltonian::{Eigenpairs, TridiagonalHamiltonian};
use heterostructure_mesher::{GridError, RegularGrid2d};
use miette::Diagnostic;
use nalgebra::DVector;
use ndarray::Array2;
use occupation::{occupation_cutoff, one_dimensional_density, Occupation};
use rayon::prelude::*;

/// Default width of the occupied energy window in units of `kT`
pub const DEFAULT_NUMBER_OF_KT: f64 = 50.0;

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum DensityError {
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("the potential holds non-finite values")]
    NonFinite,
    #[error("the temperature must be finite and positive, found {0} K")]
    Temperature(f64),
}

/// Computes carrier densities for a given chemical potential
pub trait DensitySolver {
    /// The spin-resolved charge density in zC / nm^3
    fn charge_density(
        &self,
        chemical_potential: &GridField,
        exchange: &GridField,
    ) -> Result<SpinResolved, DensityError>;
    /// The derivative of the charge density with respect to the chemical potential
    ///
    /// Each point only responds to its own potential, this is the diagonal approximation to
    /// the Jacobian of the charge density.
    fn charge_density_derivative(
        &self,
        chemical_potential: &GridField,
        exchange: &GridField,
    ) -> Result<SpinResolved, DensityError>;
    /// Energies of the occupied longitudinal sub-bands in ascending order
    fn energy_levels(
        &self,
        chemical_potential: &GridField,
        exchange: &GridField,
    ) -> Result<Vec<f64>, DensityError>;
    /// Local density exchange potential for the given charge density
    fn exchange_potential(&self, charge_density: &GridField) -> Result<GridField, DensityError>;
}

/// Builder for the effective mass solver
pub struct EffectiveMassSolverBuilder<RefGrid, RefLayers> {
    grid: RefGrid,
    layers: RefLayers,
    temperature: f64,
    number_of_kt: f64,
}

impl EffectiveMassSolverBuilder<(), ()> {
    pub fn new() -> Self {
        Self {
            grid: (),
            layers: (),
            temperature: 0_f64,
            number_of_kt: DEFAULT_NUMBER_OF_KT,
        }
    }
}

impl Default for EffectiveMassSolverBuilder<(), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefGrid, RefLayers> EffectiveMassSolverBuilder<RefGrid, RefLayers> {
    /// Attach the simulation grid
    pub fn with_grid<Grid>(self, grid: &Grid) -> EffectiveMassSolverBuilder<&Grid, RefLayers> {
        EffectiveMassSolverBuilder {
            grid,
            layers: self.layers,
            temperature: self.temperature,
            number_of_kt: self.number_of_kt,
        }
    }

    /// Attach the layer stack
    pub fn with_layers<Layers>(
        self,
        layers: &Layers,
    ) -> EffectiveMassSolverBuilder<RefGrid, &Layers> {
        EffectiveMassSolverBuilder {
            grid: self.grid,
            layers,
            temperature: self.temperature,
            number_of_kt: self.number_of_kt,
        }
    }

    /// Set the lattice temperature in Kelvin
    pub fn with_temperature(self, temperature: f64) -> Self {
        Self {
            temperature,
            ..self
        }
    }

    /// Set the width of the occupied energy window in units of `kT`
    pub fn with_number_of_kt(self, number_of_kt: f64) -> Self {
        Self {
            number_of_kt,
            ..self
        }
    }
}

impl<'a, L: LayerLookup> EffectiveMassSolverBuilder<&'a RegularGrid2d<f64>, &'a L> {
    /// Sample the layer stack on the grid and build the solver
    pub fn build(self) -> Result<EffectiveMassSolver<'a>, DensityError> {
        if !self.temperature.is_finite() || self.temperature <= 0_f64 {
            return Err(DensityError::Temperature(self.temperature));
        }
        let grid = self.grid;
        let mut band_edge = Array2::zeros(grid.shape());
        let mut masses = Array2::zeros(grid.shape());
        let mut permittivity = Array2::zeros(grid.shape());
        for ((i, j), edge) in band_edge.indexed_iter_mut() {
            let point = grid.point(i, j);
            let layer = self.layers.layer_at(0_f64, point.x, point.y)?;
            *edge = 0.5 * layer.band_gap;
            masses[[i, j]] = layer.effective_mass;
            permittivity[[i, j]] = layer.permittivity;
        }
        Ok(EffectiveMassSolver {
            grid,
            band_edge,
            masses,
            permittivity,
            thermal_energy: BOLTZMANN * self.temperature,
            number_of_kt: self.number_of_kt,
        })
    }
}

/// Separable effective mass solver on a regular grid
#[derive(Debug)]
pub struct EffectiveMassSolver<'a> {
    grid: &'a RegularGrid2d<f64>,
    /// Conduction band edge relative to mid-gap, `Eg / 2`
    band_edge: Array2<f64>,
    masses: Array2<f64>,
    permittivity: Array2<f64>,
    thermal_energy: f64,
    number_of_kt: f64,
}

/// Ground sub-band of a single transverse slice
struct Slice {
    energy: f64,
    mass: f64,
    /// `|psi(z)|^2 / dz`
    probability: DVector<f64>,
}

impl EffectiveMassSolver<'_> {
    pub fn grid(&self) -> &RegularGrid2d<f64> {
        self.grid
    }

    /// Absolute permittivity sampled on the grid
    pub fn permittivity(&self) -> &Array2<f64> {
        &self.permittivity
    }

    /// Band structure minus chemical potential, the conduction band edge in meV
    pub fn band_structure(&self, chemical_potential: &GridField) -> Result<GridField, DensityError> {
        chemical_potential.check_shape(self.grid.shape())?;
        Ok(chemical_potential.with_values(&self.band_edge - chemical_potential.values())?)
    }

    fn potential_energy(
        &self,
        chemical_potential: &GridField,
        exchange: &GridField,
    ) -> Result<Array2<f64>, DensityError> {
        chemical_potential.check_shape(self.grid.shape())?;
        exchange.check_shape(self.grid.shape())?;
        let potential = &self.band_edge - chemical_potential.values() + exchange.values();
        if potential.iter().any(|v| !v.is_finite()) {
            return Err(DensityError::NonFinite);
        }
        Ok(potential)
    }

    /// Solve every slice along `z`, in parallel but collected in slice order
    fn transverse_slices(&self, potential: &Array2<f64>) -> Vec<Slice> {
        let dz = self.grid.dz();
        (0..self.grid.ny())
            .into_par_iter()
            .map(|i| {
                let row = potential.row(i).to_vec();
                let masses = self.masses.row(i).to_vec();
                let (energy, state) = TridiagonalHamiltonian::effective_mass(&row, &masses, dz)
                    .eigen()
                    .ground_state();
                let inverse_mass: f64 = state
                    .iter()
                    .zip(masses.iter())
                    .map(|(psi, m)| psi * psi / m)
                    .sum();
                Slice {
                    energy,
                    mass: 1_f64 / inverse_mass,
                    probability: state.map(|psi| psi * psi / dz),
                }
            })
            .collect()
    }

    fn longitudinal_states(&self, slices: &[Slice]) -> (Eigenpairs, usize) {
        let energies: Vec<f64> = slices.iter().map(|slice| slice.energy).collect();
        let masses: Vec<f64> = slices.iter().map(|slice| slice.mass).collect();
        let pairs =
            TridiagonalHamiltonian::effective_mass(&energies, &masses, self.grid.dy()).eigen();
        let cutoff = occupation_cutoff(pairs.values[0], self.number_of_kt * self.thermal_energy);
        let occupied = pairs.values.iter().take_while(|&&e| e < cutoff).count();
        (pairs, occupied)
    }

    /// Total charge density, or its derivative, summed over both spins
    fn resolve(
        &self,
        chemical_potential: &GridField,
        exchange: &GridField,
        occupation: Occupation,
    ) -> Result<GridField, DensityError> {
        let potential = self.potential_energy(chemical_potential, exchange)?;
        let slices = self.transverse_slices(&potential);
        let (pairs, occupied) = self.longitudinal_states(&slices);

        let dy = self.grid.dy();
        let window = self.number_of_kt * self.thermal_energy;
        let mut line_density = vec![0_f64; self.grid.ny()];
        for k in 0..occupied {
            let state = pairs.vectors.column(k);
            let inverse_mass: f64 = state
                .iter()
                .zip(slices.iter())
                .map(|(phi, slice)| phi * phi / slice.mass)
                .sum();
            let density = one_dimensional_density(
                pairs.values[k],
                1_f64 / inverse_mass,
                self.thermal_energy,
                window,
                occupation,
            );
            for (line, phi) in line_density.iter_mut().zip(state.iter()) {
                *line += phi * phi / dy * density;
            }
        }

        let values = Array2::from_shape_fn(self.grid.shape(), |(i, j)| {
            -ELECTRON_CHARGE * slices[i].probability[j] * line_density[i]
        });
        Ok(chemical_potential.with_values(values)?)
    }
}

impl DensitySolver for EffectiveMassSolver<'_> {
    fn charge_density(
        &self,
        chemical_potential: &GridField,
        exchange: &GridField,
    ) -> Result<SpinResolved, DensityError> {
        // no spin dependent term, so the channels are split equally
        let total = self.resolve(chemical_potential, exchange, Occupation::Density)?;
        Ok(SpinResolved::from_total(&total))
    }

    fn charge_density_derivative(
        &self,
        chemical_potential: &GridField,
        exchange: &GridField,
    ) -> Result<SpinResolved, DensityError> {
        let total = self.resolve(chemical_potential, exchange, Occupation::Derivative)?;
        Ok(SpinResolved::from_total(&total))
    }

    fn energy_levels(
        &self,
        chemical_potential: &GridField,
        exchange: &GridField,
    ) -> Result<Vec<f64>, DensityError> {
        let potential = self.potential_energy(chemical_potential, exchange)?;
        let slices = self.transverse_slices(&potential);
        let (pairs, occupied) = self.longitudinal_states(&slices);
        Ok(pairs.values[..occupied].to_vec())
    }

    fn exchange_potential(&self, charge_density: &GridField) -> Result<GridField, DensityError> {
        Ok(exchange::exchange_potential(
            charge_density,
            &self.permittivity,
        )?)
    }
}

/// Charge density and its derivative for the chemical potential `potential`
///
/// This is a pure function of its arguments, the grid is recovered from the field and the
/// exchange potential is taken to be zero.
pub fn compute_density<L: LayerLookup>(
    potential: &GridField,
    layers: &L,
    temperature: f64,
) -> Result<(SpinResolved, SpinResolved), DensityError> {
    let grid = potential.grid()?;
    let solver = EffectiveMassSolverBuilder::new()
        .with_grid(&grid)
        .with_layers(layers)
        .with_temperature(temperature)
        .build()?;
    let exchange = GridField::zeros(&grid);
    Ok((
        solver.charge_density(potential, &exchange)?,
        solver.charge_density_derivative(potential, &exchange)?,
    ))
}

#[cfg(test)]
mod test {
    use super::{
        compute_density, hamiltonian::TridiagonalHamiltonian, DensityError, DensitySolver,
        EffectiveMassSolverBuilder,
    };
    use crate::{
        constants::{ELECTRON_MASS, EPSILON_0, HBAR},
        device::{DeviceInfoDesk, LayerRecord, Material},
        fields::GridField,
    };
    use approx::assert_relative_eq;
    use heterostructure_mesher::RegularGrid2d;
    use std::f64::consts::PI;

    fn well_stack(gap: f64) -> DeviceInfoDesk {
        let record = |material, zmin, zmax, band_gap| LayerRecord {
            material,
            zmin,
            zmax,
            band_gap,
            permittivity: 12.9 * EPSILON_0,
            effective_mass: 0.067 * ELECTRON_MASS,
            is_substrate: false,
        };
        DeviceInfoDesk::from_records(
            vec![
                record(Material::AlGaAs(0.3), -40., -25., gap + 300.),
                record(Material::GaAs, -25., -15., gap),
                record(Material::AlGaAs(0.3), -15., 0., gap + 300.),
            ],
            1.5,
        )
        .unwrap()
    }

    fn grid() -> RegularGrid2d<f64> {
        RegularGrid2d::new([9, 21], [5., 2.], [-20., -40.]).unwrap()
    }

    fn bulk_stack(gap: f64) -> DeviceInfoDesk {
        DeviceInfoDesk::from_records(
            vec![LayerRecord {
                material: Material::GaAs,
                zmin: -100.,
                zmax: 0.,
                band_gap: gap,
                permittivity: 12.9 * EPSILON_0,
                effective_mass: 0.067 * ELECTRON_MASS,
                is_substrate: false,
            }],
            1.5,
        )
        .unwrap()
    }

    /// A single transverse slice of five points
    fn slice() -> RegularGrid2d<f64> {
        RegularGrid2d::new([1, 5], [10., 5.], [0., -40.]).unwrap()
    }

    fn hopping(spacing: f64) -> f64 {
        HBAR * HBAR / (2. * 0.067 * ELECTRON_MASS * spacing * spacing)
    }

    #[test]
    fn flat_single_slice_matches_the_closed_form_eigenvalue() {
        let grid = slice();
        let layers = bulk_stack(-300.);
        let potential = GridField::zeros(&grid);
        let (density, derivative) = compute_density(&potential, &layers, 1.5).unwrap();
        assert_eq!(density.shape(), (1, 5));
        assert_eq!(density.up(), density.down());
        assert_eq!(derivative.up(), derivative.down());
        assert!(density.spin_summed().max_abs() > 0.);

        let solver = EffectiveMassSolverBuilder::new()
            .with_grid(&grid)
            .with_layers(&layers)
            .with_temperature(1.5)
            .build()
            .unwrap();
        let levels = solver.energy_levels(&potential, &potential).unwrap();
        // the lone point along y adds the hard wall energy of a one site chain
        let expected =
            -150. + 2. * hopping(5.) * (1. - (PI / 6.).cos()) + 2. * hopping(10.);
        assert_relative_eq!(levels[0], expected, max_relative = 1e-9);
    }

    #[test]
    fn parabolic_single_slice_matches_the_tridiagonal_ground_state() {
        let grid = slice();
        let layers = bulk_stack(-300.);
        let potential = GridField::from_fn(&grid, |(_, j)| -20. * (j as f64 - 2.).powi(2));
        let (density, _) = compute_density(&potential, &layers, 1.5).unwrap();
        assert!(density.spin_summed().all_finite());

        let solver = EffectiveMassSolverBuilder::new()
            .with_grid(&grid)
            .with_layers(&layers)
            .with_temperature(1.5)
            .build()
            .unwrap();
        let exchange = GridField::zeros(&grid);
        let levels = solver.energy_levels(&potential, &exchange).unwrap();

        let well: Vec<f64> = (0..5).map(|j| -150. + 20. * (j as f64 - 2.).powi(2)).collect();
        let (ground, _) = TridiagonalHamiltonian::effective_mass(
            &well,
            &[0.067 * ELECTRON_MASS; 5],
            5.,
        )
        .eigen()
        .ground_state();
        assert_relative_eq!(levels[0], ground + 2. * hopping(10.), max_relative = 1e-9);
    }

    #[test]
    fn zero_potential_gives_identical_spin_channels() {
        let grid = grid();
        let layers = well_stack(-300.);
        let potential = GridField::zeros(&grid);
        let (density, derivative) = compute_density(&potential, &layers, 1.5).unwrap();
        assert_eq!(density.up(), density.down());
        assert_eq!(derivative.up(), derivative.down());
        assert!(density.spin_summed().max_abs() > 0.);
    }

    #[test]
    fn density_is_deterministic() {
        let grid = grid();
        let layers = well_stack(-300.);
        let potential = GridField::from_fn(&grid, |(i, j)| 0.3 * i as f64 - 0.1 * j as f64);
        let first = compute_density(&potential, &layers, 4.2).unwrap();
        let second = compute_density(&potential, &layers, 4.2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn density_is_non_positive_and_derivative_is_non_positive() {
        let grid = grid();
        let layers = well_stack(-300.);
        let (density, derivative) =
            compute_density(&GridField::zeros(&grid), &layers, 1.5).unwrap();
        assert!(density.spin_summed().values().iter().all(|&x| x <= 0.));
        assert!(derivative.spin_summed().values().iter().all(|&x| x <= 0.));
    }

    #[test]
    fn wide_gap_material_holds_no_charge() {
        let grid = grid();
        let layers = well_stack(1500.);
        let (density, _) = compute_density(&GridField::zeros(&grid), &layers, 1.).unwrap();
        assert_eq!(density.spin_summed().max_abs(), 0.);
    }

    #[test]
    fn mismatched_potential_is_rejected() {
        let grid = grid();
        let layers = well_stack(-300.);
        let solver = EffectiveMassSolverBuilder::new()
            .with_grid(&grid)
            .with_layers(&layers)
            .with_temperature(1.5)
            .build()
            .unwrap();
        let other = RegularGrid2d::new([8, 21], [5., 2.], [-20., -40.]).unwrap();
        let result = solver.charge_density(&GridField::zeros(&other), &GridField::zeros(&grid));
        assert!(matches!(result, Err(DensityError::Field(_))));
    }

    #[test]
    fn lowering_the_chemical_potential_empties_the_well() {
        let grid = grid();
        let layers = well_stack(-300.);
        let solver = EffectiveMassSolverBuilder::new()
            .with_grid(&grid)
            .with_layers(&layers)
            .with_temperature(1.5)
            .build()
            .unwrap();
        let exchange = GridField::zeros(&grid);
        let full = solver
            .charge_density(&GridField::zeros(&grid), &exchange)
            .unwrap()
            .spin_summed()
            .max_abs();
        let depleted = solver
            .charge_density(&GridField::from_element(&grid, -40.), &exchange)
            .unwrap()
            .spin_summed()
            .max_abs();
        assert!(depleted < full);
        assert!(!solver.energy_levels(&GridField::zeros(&grid), &exchange).unwrap().is_empty());
    }
}
