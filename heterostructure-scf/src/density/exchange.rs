//! Local density exchange potential
//!
//! The only functional carried is Slater exchange for a homogeneous electron gas,
//! `V_x = -(q^2 / 4 pi eps) (3 n / pi)^(1/3)`, evaluated point by point with the local
//! permittivity.

use crate::{
    constants::ELECTRON_CHARGE,
    fields::{FieldError, GridField},
};
use ndarray::{Array2, Zip};
use std::f64::consts::PI;

/// Exchange potential energy in meV for a charge density in zC / nm^3
///
/// Only the magnitude of the charge density is used, so the sign convention of the caller
/// does not matter.
pub(crate) fn exchange_potential(
    charge_density: &GridField,
    permittivity: &Array2<f64>,
) -> Result<GridField, FieldError> {
    charge_density.check_shape(permittivity.dim())?;
    let mut values = Array2::zeros(charge_density.shape());
    Zip::from(&mut values)
        .and(charge_density.values())
        .and(permittivity)
        .for_each(|potential, &rho, &epsilon| {
            let number_density = rho.abs() / ELECTRON_CHARGE;
            *potential = -ELECTRON_CHARGE * ELECTRON_CHARGE / (4_f64 * PI * epsilon)
                * (3_f64 * number_density / PI).cbrt();
        });
    charge_density.with_values(values)
}
