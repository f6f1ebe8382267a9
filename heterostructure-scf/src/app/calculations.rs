//! A single self-consistent experiment, from device file to persisted results

use super::{
    configuration::Configuration, error::SimulationError, tracker::TrackerBuilder, Tracker,
};
use crate::{
    density::{DensitySolver, EffectiveMassSolver, EffectiveMassSolverBuilder},
    device::{BuildInfoDesk, Device, DeviceInfoDesk},
    fields::GridField,
    outer_loop::{
        poisson::{BoundaryConditions, EllipticBackend, Laplacian, PoissonSolver, SubprocessBackend},
        LoopOutcome, LoopStatus, Outer, OuterLoopBuilder,
    },
    postprocessor::OutputWriterBuilder,
};
use heterostructure_mesher::RegularGrid2d;
use std::path::Path;

/// Run the experiment described by `device_path` with the external elliptic solver
pub fn run_experiment(
    configuration: &Configuration,
    device_path: &Path,
) -> Result<LoopOutcome, SimulationError> {
    let device: Device<f64> =
        Device::build(device_path.to_path_buf()).map_err(|source| SimulationError::DeviceFile {
            path: device_path.to_path_buf(),
            source,
        })?;
    let info_desk = device.build_device_info_desk()?;
    let backend = SubprocessBackend::new(configuration.poisson.clone());
    run_with_backend(configuration, &info_desk, backend)
}

/// Build the grid for the configuration, filling in an unset origin from the device
///
/// An unset `ymin` centres the grid on `y = 0`, an unset `zmin` starts it at the bottom of
/// the potential domain.
pub fn build_grid(
    configuration: &Configuration,
    info_desk: &DeviceInfoDesk,
) -> Result<RegularGrid2d<f64>, SimulationError> {
    let settings = &configuration.grid;
    let dimensions = info_desk.dimensions(configuration.split_width)?;
    let ymin = settings
        .ymin
        .unwrap_or(-0.5 * (settings.ny - 1) as f64 * settings.dy);
    let zmin = settings.zmin.unwrap_or(dimensions.zmin);
    Ok(RegularGrid2d::new(
        [settings.ny, settings.nz],
        [settings.dy, settings.dz],
        [ymin, zmin],
    )?)
}

/// Run the experiment with any elliptic backend
pub fn run_with_backend<B: EllipticBackend>(
    configuration: &Configuration,
    info_desk: &DeviceInfoDesk,
    backend: B,
) -> Result<LoopOutcome, SimulationError> {
    let dimensions = info_desk.dimensions(configuration.split_width)?;
    let grid = build_grid(configuration, info_desk)?;
    let temperature = configuration
        .physics
        .temperature
        .unwrap_or_else(|| info_desk.temperature());
    tracing::info!(
        ny = grid.ny(),
        nz = grid.nz(),
        temperature,
        "Building the solvers"
    );

    let density_solver = EffectiveMassSolverBuilder::new()
        .with_grid(&grid)
        .with_layers(info_desk)
        .with_temperature(temperature)
        .with_number_of_kt(configuration.physics.number_of_kt)
        .build()?;
    let laplacian = Laplacian::new(&grid, density_solver.permittivity().clone())?;

    let tracker = TrackerBuilder::new()
        .with_grid(&grid)
        .with_start(&configuration.start)
        .with_surface_charge(configuration.boundary.surface_charge)
        .build()?;
    let boundary_conditions = BoundaryConditions {
        surface_charge: tracker.surface_charge(),
        ..configuration.boundary.clone()
    };

    let mut poisson_solver = PoissonSolver::new(&grid, laplacian, backend)?;
    poisson_solver.initiate(&dimensions, &boundary_conditions)?;
    tracing::info!("Calculating the initial potential");
    let bare_potential = poisson_solver.chemical_potential(&GridField::zeros(&grid))?;
    if !tracker.is_empty() {
        poisson_solver.chemical_potential(&tracker.density().spin_summed())?;
    }

    let outcome = {
        let mut outer_loop = OuterLoopBuilder::new()
            .with_density_solver(&density_solver)
            .with_poisson_solver(&mut poisson_solver)
            .with_convergence_policy(&configuration.convergence)
            .with_tracker(&tracker)
            .with_exchange(configuration.exchange)
            .build()?;
        outer_loop.run_loop()?
    };

    persist(
        configuration,
        &density_solver,
        &tracker,
        &bare_potential,
        &outcome,
    )?;

    match outcome.status {
        LoopStatus::Converged => tracing::info!(
            iterations = outcome.iterations,
            damping = outcome.damping,
            "Self-consistent solution found"
        ),
        LoopStatus::MaxCountReached | LoopStatus::Stalled => tracing::warn!(
            status = ?outcome.status,
            iterations = outcome.iterations,
            density_threshold = outcome.density_threshold,
            "Finished without converging"
        ),
    }
    Ok(outcome)
}

fn persist(
    configuration: &Configuration,
    density_solver: &EffectiveMassSolver<'_>,
    tracker: &Tracker,
    bare_potential: &GridField,
    outcome: &LoopOutcome,
) -> Result<(), SimulationError> {
    let writer = OutputWriterBuilder::new()
        .with_directory(configuration.output_directory.as_path())
        .build()?;
    tracing::info!(directory = ?writer.directory(), "Writing results");

    writer.write_density(&outcome.density)?;
    let band_structure = density_solver.band_structure(&outcome.potential)?;
    writer.write_potential(&band_structure)?;
    writer.write_bare_potential(&density_solver.band_structure(bare_potential)?)?;
    writer.write_kohn_sham_potential(&band_structure.checked_add(&outcome.exchange)?)?;
    writer.write_surface_charge(tracker.surface_charge())?;
    writer.write_energies(&density_solver.energy_levels(&outcome.potential, &outcome.exchange)?)?;
    writer.write_exchange(&outcome.exchange)?;

    let recomputed = density_solver
        .charge_density(&outcome.potential, &outcome.exchange)?
        .spin_summed();
    writer.write_density_error(&outcome.density.spin_summed().checked_sub(&recomputed)?)?;
    Ok(())
}
