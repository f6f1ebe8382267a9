//! Thermal occupation of one-dimensional sub-bands
//!
//! A sub-band with edge `E` which is free along the unconfined direction holds
//!
//! n1D(E) = 2 sqrt(2 m) / (pi hbar) * integral_0^{u_max} f(E + u^2) du
//!
//! carriers per unit length, counting both spins. The substitution `eps = u^2` removes
//! the inverse square root singularity of the one-dimensional density of states so the
//! integrand is smooth. The integral runs to `N kT` above the higher of the sub-band edge
//! and the Fermi level, and is split at the Fermi point so each piece is smooth.

use crate::constants::HBAR;
use std::f64::consts::PI;

/// Minimum number of Simpson panels on each piece of the integral
const MINIMUM_INTERVALS: usize = 64;
/// Panels per thermal width of the Fermi step
const PANELS_PER_WIDTH: f64 = 8.0;

/// The Fermi-Dirac occupation of a state `energy` above the Fermi level
pub(crate) fn fermi_dirac(energy: f64, thermal_energy: f64) -> f64 {
    let x = energy / thermal_energy;
    if x > 0_f64 {
        let e = (-x).exp();
        e / (1_f64 + e)
    } else {
        1_f64 / (1_f64 + x.exp())
    }
}

/// `f (1 - f) / kT`, the rate of change of occupation as the Fermi level rises
pub(crate) fn fermi_dirac_derivative(energy: f64, thermal_energy: f64) -> f64 {
    let f = fermi_dirac(energy, thermal_energy);
    f * (1_f64 - f) / thermal_energy
}

/// Which quantity the sub-band integral produces
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Occupation {
    /// Carrier density
    Density,
    /// Derivative of the carrier density with respect to the chemical potential
    Derivative,
}

impl Occupation {
    fn kernel(&self, energy: f64, thermal_energy: f64) -> f64 {
        match self {
            Occupation::Density => fermi_dirac(energy, thermal_energy),
            Occupation::Derivative => fermi_dirac_derivative(energy, thermal_energy),
        }
    }
}

/// Upper edge of the occupied window, `window` above the sub-band edge or the Fermi level
pub(crate) fn occupation_cutoff(lowest_energy: f64, window: f64) -> f64 {
    lowest_energy.max(0_f64) + window
}

/// Line density of a sub-band at `energy` with mass `mass`
///
/// `window` is the width of the occupied window above the higher of the sub-band edge and
/// the Fermi level.
pub(crate) fn one_dimensional_density(
    energy: f64,
    mass: f64,
    thermal_energy: f64,
    window: f64,
    occupation: Occupation,
) -> f64 {
    let prefactor = 2_f64 * (2_f64 * mass).sqrt() / (PI * HBAR);
    let depth = (-energy).max(0_f64);
    let fermi_point = depth.sqrt();
    let upper = (depth + window).sqrt();
    // width in u of the thermal step at the Fermi point
    let width = thermal_energy / (2_f64 * fermi_point.max(thermal_energy.sqrt()));
    let integrand = |u: f64| occupation.kernel(energy + u * u, thermal_energy);
    prefactor
        * (simpson(&integrand, 0_f64, fermi_point, intervals(fermi_point, width))
            + simpson(
                &integrand,
                fermi_point,
                upper,
                intervals(upper - fermi_point, width),
            ))
}

fn intervals(length: f64, width: f64) -> usize {
    let needed = (PANELS_PER_WIDTH * length / width).ceil() as usize;
    let n = needed.max(MINIMUM_INTERVALS);
    n + n % 2
}

/// Composite Simpson rule on `[lower, upper]` with an even number of panels
fn simpson(f: &impl Fn(f64) -> f64, lower: f64, upper: f64, intervals: usize) -> f64 {
    if upper <= lower {
        return 0_f64;
    }
    let h = (upper - lower) / intervals as f64;
    let interior: f64 = (1..intervals)
        .map(|i| {
            let weight = if i % 2 == 1 { 4_f64 } else { 2_f64 };
            weight * f(lower + i as f64 * h)
        })
        .sum();
    h / 3_f64 * (f(lower) + interior + f(upper))
}

#[cfg(test)]
mod test {
    use super::{fermi_dirac, one_dimensional_density, simpson, Occupation};
    use crate::constants::{BOLTZMANN, ELECTRON_MASS, HBAR};
    use approx::assert_relative_eq;
    use rand::Rng;
    use std::f64::consts::PI;

    #[test]
    fn fermi_function_is_stable_far_from_the_fermi_level() {
        assert_relative_eq!(fermi_dirac(1e6, 1.), 0.);
        assert_relative_eq!(fermi_dirac(-1e6, 1.), 1.);
        assert_relative_eq!(fermi_dirac(0., 1.), 0.5);
    }

    #[test]
    fn fermi_function_is_symmetric_about_the_fermi_level() {
        let mut rng = rand::thread_rng();
        let energy: f64 = rng.gen_range(-10.0..10.0);
        assert_relative_eq!(
            fermi_dirac(energy, 2.) + fermi_dirac(-energy, 2.),
            1.,
            epsilon = 1e-14
        );
    }

    #[test]
    fn simpson_integrates_cubics_exactly() {
        let result = simpson(&|x: f64| x * x * x - 2. * x, 1., 3., 4);
        assert_relative_eq!(result, 20. - 8., epsilon = 1e-12);
    }

    #[test]
    fn degenerate_sub_band_matches_the_zero_temperature_limit() {
        // deep below the Fermi level every state up to the Fermi energy is filled
        let mass = 0.067 * ELECTRON_MASS;
        let thermal_energy = BOLTZMANN * 0.1;
        let energy = -5.;
        let result = one_dimensional_density(
            energy,
            mass,
            thermal_energy,
            50. * thermal_energy,
            Occupation::Density,
        );
        let zero_temperature = 2. * (2. * mass).sqrt() / (PI * HBAR) * (-energy).sqrt();
        assert_relative_eq!(result, zero_temperature, max_relative = 1e-4);
    }

    #[test]
    fn derivative_integrates_the_thermal_peak() {
        // d n / d mu of a degenerate band is the density of states at the Fermi level
        let mass = 0.067 * ELECTRON_MASS;
        let thermal_energy = BOLTZMANN * 0.5;
        let energy = -8.;
        let result = one_dimensional_density(
            energy,
            mass,
            thermal_energy,
            50. * thermal_energy,
            Occupation::Derivative,
        );
        let density_of_states = (2. * mass).sqrt() / (PI * HBAR) / (-energy).sqrt();
        assert_relative_eq!(result, density_of_states, max_relative = 1e-3);
    }

    #[test]
    fn derivative_vanishes_far_above_the_fermi_level() {
        let mass = 0.067 * ELECTRON_MASS;
        let result = one_dimensional_density(500., mass, 0.1, 5., Occupation::Derivative);
        assert_relative_eq!(result, 0.);
    }
}
