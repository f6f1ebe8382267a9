use crate::fields::{FieldError, GridField};
use ndarray::{Array2, Zip};
use ndarray_stats::QuantileExt;

/// Thresholds and limits steering the damped Newton iteration
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergencePolicy {
    /// The loop stops once the iteration count exceeds this value
    pub maximum_iterations: usize,
    /// Multiplicative step of the damping search
    pub damping_ratio: f64,
    /// Initial floor of the damping factor
    pub minimum_damping: f64,
    /// Starting relative density change below which the exchange potential is refreshed
    pub density_threshold: f64,
    /// Floor of the adaptive density threshold
    pub minimum_density_threshold: f64,
    /// Maximum exchange potential change at convergence, meV
    pub exchange_tolerance: f64,
    /// Maximum potential change `|t x|` at convergence, meV
    pub potential_tolerance: f64,
    /// Iterations to complete before the exchange potential may be refreshed
    pub warm_up_iterations: usize,
    /// Smallest allowed exchange mixing parameter
    pub minimum_mixing: f64,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            maximum_iterations: 1000,
            damping_ratio: 0.8,
            minimum_damping: 1e-3,
            density_threshold: 0.12,
            minimum_density_threshold: 0.005,
            exchange_tolerance: 0.1,
            potential_tolerance: 0.1,
            warm_up_iterations: 3,
            minimum_mixing: 0.03,
        }
    }
}

impl ConvergencePolicy {
    pub fn maximum_iterations(&self) -> usize {
        self.maximum_iterations
    }

    pub fn damping_ratio(&self) -> f64 {
        self.damping_ratio
    }

    pub fn minimum_damping(&self) -> f64 {
        self.minimum_damping
    }

    pub fn density_threshold(&self) -> f64 {
        self.density_threshold
    }

    pub fn minimum_density_threshold(&self) -> f64 {
        self.minimum_density_threshold
    }

    pub fn exchange_tolerance(&self) -> f64 {
        self.exchange_tolerance
    }

    pub fn potential_tolerance(&self) -> f64 {
        self.potential_tolerance
    }

    pub fn warm_up_iterations(&self) -> usize {
        self.warm_up_iterations
    }

    pub fn minimum_mixing(&self) -> f64 {
        self.minimum_mixing
    }
}

/// Fraction of the peak density below which a point is treated as converged
const DEPLETION_FRACTION: f64 = 0.01;

/// Point-wise relative change `|(current - previous) / current|`
///
/// Points where `|current|` is at most 1% of its maximum, the depleted regions of the device,
/// are reported as zero.
pub fn relative_density_difference(
    previous: &GridField,
    current: &GridField,
) -> Result<GridField, FieldError> {
    previous.check_shape(current.shape())?;
    let magnitude = current.values().mapv(f64::abs);
    let peak = *magnitude.max_skipnan();
    let mut difference = Array2::zeros(current.shape());
    if peak > 0_f64 {
        let floor = DEPLETION_FRACTION * peak;
        Zip::from(&mut difference)
            .and(previous.values())
            .and(current.values())
            .for_each(|out, &old, &new| {
                if new.abs() > floor {
                    *out = ((new - old) / new).abs();
                }
            });
    }
    current.with_values(difference)
}

/// Euclidean norm of a field over the interior points of its grid
pub(crate) fn interior_norm(field: &GridField) -> f64 {
    let (ny, nz) = field.shape();
    let values = field.values();
    if ny < 3 || nz < 3 {
        return 0_f64;
    }
    values
        .slice(ndarray::s![1..ny - 1, 1..nz - 1])
        .iter()
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt()
}
