// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Constants
//!
//! Physical constants in the simulation unit system, where energies are in meV,
//! lengths in nm, charges in zC and times in ps

pub const BOLTZMANN: f64 = 0.086173324; // The Boltzmann constant in meV / K
pub const ELECTRON_CHARGE: f64 = 160.217646; // Single electron charge in zC
pub const ELECTRON_MASS: f64 = 5.68562958e-3; // Single electron mass in meV ps^2 / nm^2
pub const EPSILON_0: f64 = 1.41859713; // Permittivity of free space in zC^2 / meV nm
pub const HBAR: f64 = 0.658211814; // Reduced Planck constant in meV ps
