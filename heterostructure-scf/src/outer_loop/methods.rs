use super::{
    convergence::{interior_norm, relative_density_difference},
    DampingOutcome, LoopOutcome, LoopStatus, OuterLoop, OuterLoopError,
};
use crate::{density::DensitySolver, fields::GridField, outer_loop::poisson::EllipticBackend};
use std::time::Instant;

/// Relative growth of the residual norm tolerated when accepting a damped step
const RESIDUAL_SLACK: f64 = 1e-6;
/// Absolute residual tolerance, so a vanishing residual does not reject every step
const RESIDUAL_FLOOR: f64 = 1e-12;

/// Summary of a single iteration
#[derive(Clone, Debug)]
pub struct IterationReport {
    /// Largest relative change of the density over the iteration
    pub density_difference: f64,
    pub damping: DampingOutcome,
    /// The infinity norm of the applied update `t x`, meV
    pub potential_change: f64,
    /// `max |V_mixed - V_xc|` when the exchange potential was refreshed this iteration
    pub exchange_difference: Option<f64>,
}

pub trait Outer {
    /// Whether the iteration summarised by `report` satisfies every convergence criterion
    fn is_loop_converged(&self, report: &IterationReport) -> bool;
    /// Compute the starting density and the exchange potential it implies
    fn initialise(&mut self) -> Result<(), OuterLoopError>;
    /// Carry out a single damped Newton iteration
    fn single_iteration(&mut self) -> Result<IterationReport, OuterLoopError>;
    /// Iterate until convergence, a stall or the iteration limit
    fn run_loop(&mut self) -> Result<LoopOutcome, OuterLoopError>;
}

impl<D, B> Outer for OuterLoop<'_, D, B>
where
    D: DensitySolver,
    B: EllipticBackend,
{
    fn is_loop_converged(&self, report: &IterationReport) -> bool {
        let policy = self.convergence_policy;
        report.exchange_difference.map_or(false, |exchange_difference| {
            report.density_difference < self.mixing.floor() / 2_f64
                && exchange_difference < policy.exchange_tolerance()
                && report.potential_change < policy.potential_tolerance()
        })
    }

    fn initialise(&mut self) -> Result<(), OuterLoopError> {
        let start = self.tracker.density.spin_summed();
        self.mixing
            .blend(&self.density_solver.exchange_potential(&start)?)?;

        let potential = self.poisson_solver.potential();
        let exchange = self.mixing.baseline();
        self.tracker.density = self.density_solver.charge_density(potential, exchange)?;
        self.tracker.derivative = self
            .density_solver
            .charge_density_derivative(potential, exchange)?;

        let density = self.tracker.density.spin_summed();
        self.mixing
            .blend(&self.density_solver.exchange_potential(&density)?)?;
        self.mixing.set_mixing(self.loop_mixing);
        Ok(())
    }

    fn single_iteration(&mut self) -> Result<IterationReport, OuterLoopError> {
        let start = Instant::now();
        let previous = self.tracker.density.spin_summed();
        let exchange = self.mixing.baseline().clone();
        let potential = self.poisson_solver.potential().clone();

        let density = self.density_solver.charge_density(&potential, &exchange)?;
        let derivative = self
            .density_solver
            .charge_density_derivative(&potential, &exchange)?;
        let total = density.spin_summed();

        let residual = self.poisson_solver.residual(&potential, &total)?;
        let newton = self.poisson_solver.newton_step(
            &derivative.spin_summed(),
            &residual,
            &total,
            self.mixing.difference(),
        )?;

        let reference = interior_norm(&residual);
        let tolerance = reference * (1_f64 + RESIDUAL_SLACK) + RESIDUAL_FLOOR;
        let density_solver = self.density_solver;
        let poisson_solver = &*self.poisson_solver;
        let damping = self.damping.select(|t| -> Result<bool, OuterLoopError> {
            let mut trial = potential.clone();
            trial.scaled_add(t, &newton.step)?;
            let trial_density = density_solver
                .charge_density(&trial, &exchange)?
                .spin_summed();
            let trial_residual = poisson_solver.residual(&trial, &trial_density)?;
            Ok(interior_norm(&trial_residual) <= tolerance)
        })?;
        self.poisson_solver
            .apply_damped_step(damping.damping, &newton.step)?;

        let difference = relative_density_difference(&previous, &total)?.max_abs();
        let exchange_difference = if difference < self.mixing.threshold()
            && damping.damping > 10_f64 * self.damping.floor()
            && self.tracker.iteration > self.convergence_policy.warm_up_iterations()
        {
            let exchange = self.density_solver.exchange_potential(&total)?;
            Some(self.mixing.refresh(&exchange)?)
        } else {
            None
        };

        self.tracker.density = density;
        self.tracker.derivative = derivative;

        tracing::info!(
            iteration = self.tracker.iteration,
            density_difference = difference,
            t = damping.damping,
            elapsed = ?start.elapsed(),
            "Outer iteration"
        );
        self.tracker.iteration += 1;

        Ok(IterationReport {
            density_difference: difference,
            potential_change: damping.damping * newton.step.max_abs(),
            damping,
            exchange_difference,
        })
    }

    fn run_loop(&mut self) -> Result<LoopOutcome, OuterLoopError> {
        self.initialise()?;
        let status = loop {
            let report = self.single_iteration()?;
            if self.is_loop_converged(&report) {
                break LoopStatus::Converged;
            }
            if report.damping.stalled {
                tracing::warn!(
                    iteration = self.tracker.iteration,
                    "The damping search failed at the largest possible floor"
                );
                break LoopStatus::Stalled;
            }
            if self.tracker.iteration > self.convergence_policy.maximum_iterations() {
                tracing::warn!(
                    iteration = self.tracker.iteration,
                    "Reached the maximum iteration count without converging"
                );
                break LoopStatus::MaxCountReached;
            }
        };
        tracing::info!(?status, iterations = self.tracker.iteration, "Iteration complete");

        Ok(LoopOutcome {
            status,
            iterations: self.tracker.iteration,
            potential: self.poisson_solver.potential().clone(),
            density: self.tracker.density.clone(),
            exchange: self.mixing.baseline().clone(),
            damping: self.damping.previous(),
            density_threshold: self.mixing.threshold(),
        })
    }
}

impl<D, B> OuterLoop<'_, D, B> {
    /// The Jacobian diagonal `rho'` from the most recent iteration
    pub fn density_derivative(&self) -> GridField {
        self.tracker.derivative.spin_summed()
    }
}
