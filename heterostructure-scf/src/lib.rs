// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A self-consistent Schrodinger-Poisson solver for gated two dimensional heterostructures
//!
//! # Overview
//! The solver finds the electron density and electrostatic potential in the cross section of
//! a split-gate device. Electrons are confined along the growth axis `z` by the layer stack and
//! along the lateral axis `y` by the gate potential. The charge density is computed from the
//! single particle states of an effective mass Hamiltonian, the potential from Poisson's
//! equation with that charge as a source, and the two are iterated to self-consistency with a
//! damped Newton method.
//!
//! The Poisson equation itself is solved by an external program. The crate writes the density
//! and the Newton system as text tables, runs the program and reads the solution back.
//!
//! # Usage
//! Define a layer stack in a `.toml` file:
//!
//! ```toml
//! temperature = 1.5
//!
//! [[layers]]
//! material = "GaAs"
//! zmin = -80.0
//! zmax = -60.0
//!
//! [[layers]]
//! material = { AlGaAs = 0.33 }
//! zmin = -60.0
//! zmax = -10.0
//! ```
//!
//! and run the binary with the path to the file. Numerical settings are read from
//! `.config/default.toml`, overridden by `.config/<RUN_MODE>.toml` and by `--config <file>`.
//!
//! # Units
//! Energies are in meV, lengths in nm, charges in zC and times in ps.

/// The command line application, configuration and tracing
pub mod app;

/// Physical constants
pub mod constants;

/// Charge densities from the effective mass Hamiltonian
pub mod density;

/// Device and geometry
pub mod device;

/// Error handling
mod error;

/// Scalar and spin-resolved fields on the simulation grid
pub mod fields;

/// The self-consistent iteration and the potential provider
pub mod outer_loop;

/// Persisting results
pub mod postprocessor;

pub use error::DataFileError;
