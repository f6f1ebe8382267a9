use heterostructure_mesher::RegularGrid2d;
use heterostructure_scf::{
    app::{calculations::run_with_backend, Tracker},
    density::{DensityError, DensitySolver, EffectiveMassSolver, EffectiveMassSolverBuilder},
    device::DeviceInfoDesk,
    fields::{GridField, SpinResolved},
    outer_loop::{
        poisson::{BoundaryConditions, Laplacian, PoissonSolver},
        relative_density_difference, ConvergencePolicy, ExchangeSettings, LoopStatus, Outer,
        OuterLoopBuilder,
    },
};
use utilities::{
    structures::{small_grid, split_gate_stack, test_configuration},
    DenseBackend,
};
use std::cell::Cell;

fn density_solver<'a>(
    grid: &'a RegularGrid2d<f64>,
    stack: &'a DeviceInfoDesk,
) -> EffectiveMassSolver<'a> {
    EffectiveMassSolverBuilder::new()
        .with_grid(grid)
        .with_layers(stack)
        .with_temperature(stack.temperature())
        .build()
        .unwrap()
}

fn poisson_solver(
    grid: &RegularGrid2d<f64>,
    stack: &DeviceInfoDesk,
    solver: &EffectiveMassSolver<'_>,
    split_voltage: f64,
) -> PoissonSolver<DenseBackend> {
    let laplacian = Laplacian::new(grid, solver.permittivity().clone()).unwrap();
    let mut poisson = PoissonSolver::new(grid, laplacian, DenseBackend::new()).unwrap();
    let boundary = BoundaryConditions {
        top_voltage: 0.,
        split_voltage,
        bottom_voltage: 0.,
        surface_charge: 0.,
    };
    poisson
        .initiate(&stack.dimensions(40.).unwrap(), &boundary)
        .unwrap();
    poisson
}

#[test]
fn an_empty_device_converges_on_a_small_grid() {
    let grid = small_grid(8, 8);
    let stack = split_gate_stack(1500., 1.);
    let solver = density_solver(&grid, &stack);
    let mut poisson = poisson_solver(&grid, &stack, &solver, 0.);

    let tracker = Tracker::new(SpinResolved::zeros(&grid), 0.);
    poisson
        .chemical_potential(&tracker.density().spin_summed())
        .unwrap();

    let policy = ConvergencePolicy {
        maximum_iterations: 20,
        ..ConvergencePolicy::default()
    };
    let mut outer_loop = OuterLoopBuilder::new()
        .with_density_solver(&solver)
        .with_poisson_solver(&mut poisson)
        .with_convergence_policy(&policy)
        .with_tracker(&tracker)
        .with_exchange(ExchangeSettings {
            enabled: true,
            mixing: 0.1,
        })
        .build()
        .unwrap();
    let outcome = outer_loop.run_loop().unwrap();

    assert_eq!(outcome.status, LoopStatus::Converged);
    assert!(outcome.iterations <= policy.maximum_iterations());
    // the refresh gate opens once the warm up is complete
    assert!(outcome.iterations > policy.warm_up_iterations());

    let recomputed = solver
        .charge_density(&outcome.potential, &outcome.exchange)
        .unwrap();
    let difference =
        relative_density_difference(&outcome.density.spin_summed(), &recomputed.spin_summed())
            .unwrap();
    assert!(difference.max_abs() < outcome.density_threshold);
}

#[test]
fn damping_stays_within_bounds_for_an_occupied_well() {
    let grid = small_grid(8, 8);
    let stack = split_gate_stack(-200., 1.);
    let solver = density_solver(&grid, &stack);
    let mut poisson = poisson_solver(&grid, &stack, &solver, 0.);

    let tracker = Tracker::new(SpinResolved::zeros(&grid), 0.);
    poisson
        .chemical_potential(&tracker.density().spin_summed())
        .unwrap();

    let policy = ConvergencePolicy {
        maximum_iterations: 6,
        ..ConvergencePolicy::default()
    };
    let mut outer_loop = OuterLoopBuilder::new()
        .with_density_solver(&solver)
        .with_poisson_solver(&mut poisson)
        .with_convergence_policy(&policy)
        .with_tracker(&tracker)
        .build()
        .unwrap();

    outer_loop.initialise().unwrap();
    assert!(outer_loop.density().spin_summed().max_abs() > 0.);
    for _ in 0..policy.maximum_iterations() {
        let floor = outer_loop.damping().floor();
        let report = outer_loop.single_iteration().unwrap();
        assert!(report.damping.damping >= floor);
        assert!(report.damping.damping <= 1.);
        assert!(report.density_difference >= 0.);
    }

    let density = outer_loop.density().spin_summed();
    assert!(density.all_finite());
    // electrons carry negative charge, and the density only falls as the potential rises
    assert!(density.values().iter().all(|&rho| rho <= 0.));
    assert!(outer_loop
        .density_derivative()
        .values()
        .iter()
        .all(|&drho| drho <= 0.));
}

/// A uniform density ten times larger on every request, so no damped step lowers the residual
struct RunawayDensity {
    requests: Cell<i32>,
}

impl DensitySolver for RunawayDensity {
    fn charge_density(
        &self,
        chemical_potential: &GridField,
        _exchange: &GridField,
    ) -> Result<SpinResolved, DensityError> {
        let request = self.requests.get();
        self.requests.set(request + 1);
        let total = chemical_potential.map(|_| -1e-3 * 10_f64.powi(request));
        Ok(SpinResolved::from_total(&total))
    }

    fn charge_density_derivative(
        &self,
        chemical_potential: &GridField,
        _exchange: &GridField,
    ) -> Result<SpinResolved, DensityError> {
        Ok(SpinResolved::from_total(&chemical_potential.scale(0.)))
    }

    fn energy_levels(
        &self,
        _chemical_potential: &GridField,
        _exchange: &GridField,
    ) -> Result<Vec<f64>, DensityError> {
        Ok(Vec::new())
    }

    fn exchange_potential(&self, charge_density: &GridField) -> Result<GridField, DensityError> {
        Ok(charge_density.scale(0.))
    }
}

#[test]
fn an_occupied_well_with_exchange_converges() {
    let grid = small_grid(8, 8);
    let stack = split_gate_stack(-100., 1.);
    let solver = density_solver(&grid, &stack);
    let mut poisson = poisson_solver(&grid, &stack, &solver, -0.3);

    let tracker = Tracker::new(SpinResolved::zeros(&grid), 0.);
    poisson
        .chemical_potential(&tracker.density().spin_summed())
        .unwrap();

    let policy = ConvergencePolicy {
        maximum_iterations: 200,
        ..ConvergencePolicy::default()
    };
    let mut outer_loop = OuterLoopBuilder::new()
        .with_density_solver(&solver)
        .with_poisson_solver(&mut poisson)
        .with_convergence_policy(&policy)
        .with_tracker(&tracker)
        .with_exchange(ExchangeSettings {
            enabled: true,
            mixing: 0.1,
        })
        .build()
        .unwrap();
    let outcome = outer_loop.run_loop().unwrap();

    assert_eq!(outcome.status, LoopStatus::Converged);
    assert!(outcome.density.spin_summed().max_abs() > 0.);
    assert!(outcome.exchange.max_abs() > 0.);
    assert!(!solver
        .energy_levels(&outcome.potential, &outcome.exchange)
        .unwrap()
        .is_empty());
}

#[test]
fn the_loop_stops_once_the_iteration_limit_is_exceeded() {
    let grid = small_grid(8, 8);
    let stack = split_gate_stack(-100., 1.);
    let solver = density_solver(&grid, &stack);
    let mut poisson = poisson_solver(&grid, &stack, &solver, -0.3);

    let tracker = Tracker::new(SpinResolved::zeros(&grid), 0.);
    poisson
        .chemical_potential(&tracker.density().spin_summed())
        .unwrap();

    let policy = ConvergencePolicy {
        maximum_iterations: 1,
        ..ConvergencePolicy::default()
    };
    let mut outer_loop = OuterLoopBuilder::new()
        .with_density_solver(&solver)
        .with_poisson_solver(&mut poisson)
        .with_convergence_policy(&policy)
        .with_tracker(&tracker)
        .with_exchange(ExchangeSettings {
            enabled: true,
            mixing: 0.1,
        })
        .build()
        .unwrap();
    let outcome = outer_loop.run_loop().unwrap();

    assert_eq!(outcome.status, LoopStatus::MaxCountReached);
    // the count must exceed the maximum, not merely reach it
    assert_eq!(outcome.iterations, 2);
}

#[test]
fn a_residual_that_never_decreases_stalls_the_loop() {
    let grid = small_grid(8, 8);
    let stack = split_gate_stack(1500., 1.);
    let solver = density_solver(&grid, &stack);
    let mut poisson = poisson_solver(&grid, &stack, &solver, 0.);
    let runaway = RunawayDensity {
        requests: Cell::new(0),
    };

    let tracker = Tracker::new(SpinResolved::zeros(&grid), 0.);
    poisson
        .chemical_potential(&tracker.density().spin_summed())
        .unwrap();

    let policy = ConvergencePolicy {
        maximum_iterations: 10,
        minimum_damping: 1.,
        ..ConvergencePolicy::default()
    };
    let mut outer_loop = OuterLoopBuilder::new()
        .with_density_solver(&runaway)
        .with_poisson_solver(&mut poisson)
        .with_convergence_policy(&policy)
        .with_tracker(&tracker)
        .build()
        .unwrap();
    let outcome = outer_loop.run_loop().unwrap();

    assert_eq!(outcome.status, LoopStatus::Stalled);
    // two consecutive forced steps at a floor of one
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.damping, 1.);
}

#[test]
fn experiments_persist_their_results() {
    let directory = std::env::temp_dir().join("heterostructure_experiment_outputs");
    let configuration = test_configuration(8, 8, &directory);
    let stack = split_gate_stack(1500., 1.);

    let outcome = run_with_backend(&configuration, &stack, DenseBackend::new()).unwrap();
    let written = [
        "dens_2D_raw.dat",
        "dens_2D_up_raw.dat",
        "dens_2D_down_raw.dat",
        "potential.dat",
        "bare_pot.dat",
        "pot_KS.dat",
        "surface_charge.dat",
        "energies.dat",
        "xc_pot.dat",
        "density_error.dat",
    ]
    .iter()
    .all(|name| directory.join(name).is_file());
    let potential = std::fs::read_to_string(directory.join("potential.dat")).unwrap();
    std::fs::remove_dir_all(&directory).unwrap();

    assert_eq!(outcome.status, LoopStatus::Converged);
    assert!(written);
    assert_eq!(potential.lines().count(), 8);
}
