//! The damped Newton iteration coupling the density and potential solvers
//!
//! Each iteration recomputes the charge density at the current chemical potential, asks the
//! elliptic backend for a Newton step and applies as much of that step as the damping search
//! allows. The exchange correlation potential is only refreshed once the density has settled,
//! and the loop converges when a refresh leaves density, exchange potential and chemical
//! potential all within tolerance.

mod convergence;
mod damping;
mod methods;
mod mixing;
pub mod poisson;

pub use convergence::{relative_density_difference, ConvergencePolicy};
pub use damping::{DampingOutcome, DampingSchedule};
pub use methods::{IterationReport, Outer};
pub use mixing::MixingSchedule;

use crate::{
    app::Tracker,
    density::{DensityError, DensitySolver},
    fields::{FieldError, GridField, SpinResolved},
};
use miette::Diagnostic;
use poisson::{EllipticBackend, PoissonError, PoissonSolver};
use serde::Deserialize;

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum OuterLoopError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Density(#[from] DensityError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Poisson(#[from] PoissonError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Field(#[from] FieldError),
}

/// Local density exchange correlation settings
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct ExchangeSettings {
    pub enabled: bool,
    /// Mixing parameter `alpha` used for every refresh inside the loop
    pub mixing: f64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mixing: 0.1,
        }
    }
}

/// How the iteration ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopStatus {
    Converged,
    /// The iteration count exceeded the policy maximum before convergence
    MaxCountReached,
    /// The damping floor reached one and the step was still rejected
    Stalled,
}

/// The final state of a completed iteration
#[derive(Clone, Debug)]
pub struct LoopOutcome {
    pub status: LoopStatus,
    pub iterations: usize,
    /// Chemical potential in meV
    pub potential: GridField,
    /// Charge density in zC / nm^3
    pub density: SpinResolved,
    /// The mixed exchange potential in meV
    pub exchange: GridField,
    pub damping: f64,
    pub density_threshold: f64,
}

/// Builder for the outer loop
pub struct OuterLoopBuilder<RefDensitySolver, RefPoissonSolver, RefConvergencePolicy, RefTracker>
{
    density_solver: RefDensitySolver,
    poisson_solver: RefPoissonSolver,
    convergence_policy: RefConvergencePolicy,
    tracker: RefTracker,
    exchange: ExchangeSettings,
}

impl OuterLoopBuilder<(), (), (), ()> {
    pub fn new() -> Self {
        Self {
            density_solver: (),
            poisson_solver: (),
            convergence_policy: (),
            tracker: (),
            exchange: ExchangeSettings::default(),
        }
    }
}

impl Default for OuterLoopBuilder<(), (), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefDensitySolver, RefPoissonSolver, RefConvergencePolicy, RefTracker>
    OuterLoopBuilder<RefDensitySolver, RefPoissonSolver, RefConvergencePolicy, RefTracker>
{
    /// Attach the charge density solver
    pub fn with_density_solver<DensitySolver>(
        self,
        density_solver: &DensitySolver,
    ) -> OuterLoopBuilder<&DensitySolver, RefPoissonSolver, RefConvergencePolicy, RefTracker> {
        OuterLoopBuilder {
            density_solver,
            poisson_solver: self.poisson_solver,
            convergence_policy: self.convergence_policy,
            tracker: self.tracker,
            exchange: self.exchange,
        }
    }

    /// Attach the potential provider, which is mutated as the loop runs
    pub fn with_poisson_solver<PoissonSolver>(
        self,
        poisson_solver: &mut PoissonSolver,
    ) -> OuterLoopBuilder<RefDensitySolver, &mut PoissonSolver, RefConvergencePolicy, RefTracker>
    {
        OuterLoopBuilder {
            density_solver: self.density_solver,
            poisson_solver,
            convergence_policy: self.convergence_policy,
            tracker: self.tracker,
            exchange: self.exchange,
        }
    }

    /// Attach the thresholds steering the iteration
    pub fn with_convergence_policy<ConvergencePolicy>(
        self,
        convergence_policy: &ConvergencePolicy,
    ) -> OuterLoopBuilder<RefDensitySolver, RefPoissonSolver, &ConvergencePolicy, RefTracker> {
        OuterLoopBuilder {
            density_solver: self.density_solver,
            poisson_solver: self.poisson_solver,
            convergence_policy,
            tracker: self.tracker,
            exchange: self.exchange,
        }
    }

    /// Attach the global tracker holding the starting density
    pub fn with_tracker<Tracker>(
        self,
        tracker: &Tracker,
    ) -> OuterLoopBuilder<RefDensitySolver, RefPoissonSolver, RefConvergencePolicy, &Tracker> {
        OuterLoopBuilder {
            density_solver: self.density_solver,
            poisson_solver: self.poisson_solver,
            convergence_policy: self.convergence_policy,
            tracker,
            exchange: self.exchange,
        }
    }

    pub fn with_exchange(self, exchange: ExchangeSettings) -> Self {
        Self { exchange, ..self }
    }
}

impl<'a, D, B>
    OuterLoopBuilder<&'a D, &'a mut PoissonSolver<B>, &'a ConvergencePolicy, &'a Tracker>
where
    D: DensitySolver,
    B: EllipticBackend,
{
    pub fn build(self) -> Result<OuterLoop<'a, D, B>, OuterLoopError> {
        let grid = self.poisson_solver.grid();
        let tracker = LoopTracker::from_global_tracker(self.tracker);
        tracker.density.up().check_shape(grid.shape())?;

        // mixing is only switched on for the start when there is a density to mix
        let enabled = self.exchange.enabled;
        let initial_mixing = if enabled && !self.tracker.is_empty() {
            self.exchange.mixing
        } else {
            0_f64
        };
        let loop_mixing = if enabled { self.exchange.mixing } else { 0_f64 };

        let policy = self.convergence_policy;
        let mixing = MixingSchedule::new(
            grid,
            initial_mixing,
            policy.density_threshold(),
            policy.minimum_density_threshold(),
        );
        Ok(OuterLoop {
            mixing,
            damping: DampingSchedule::new(policy.damping_ratio(), policy.minimum_damping()),
            density_solver: self.density_solver,
            poisson_solver: self.poisson_solver,
            convergence_policy: policy,
            tracker,
            loop_mixing,
        })
    }
}

/// A structure holding the information to carry out the outer iteration
pub struct OuterLoop<'a, D, B> {
    density_solver: &'a D,
    poisson_solver: &'a mut PoissonSolver<B>,
    convergence_policy: &'a ConvergencePolicy,
    tracker: LoopTracker,
    damping: DampingSchedule,
    mixing: MixingSchedule,
    loop_mixing: f64,
}

impl<D, B> OuterLoop<'_, D, B> {
    pub fn iteration(&self) -> usize {
        self.tracker.iteration
    }

    pub fn density(&self) -> &SpinResolved {
        &self.tracker.density
    }

    pub fn mixing(&self) -> &MixingSchedule {
        &self.mixing
    }

    pub fn damping(&self) -> &DampingSchedule {
        &self.damping
    }
}

/// Iteration state private to a single run of the loop
pub(crate) struct LoopTracker {
    density: SpinResolved,
    derivative: SpinResolved,
    iteration: usize,
}

impl LoopTracker {
    pub(crate) fn from_global_tracker(global_tracker: &Tracker) -> Self {
        let density = global_tracker.density().clone();
        Self {
            derivative: density.scale(0_f64),
            density,
            iteration: 0,
        }
    }
}
