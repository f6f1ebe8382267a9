// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Fixtures shared by the integration tests and benches

pub mod backend;
pub mod structures;

pub use backend::DenseBackend;

use heterostructure_mesher::RegularGrid2d;
use heterostructure_scf::fields::GridField;
use rand::{thread_rng, Rng};

/// A chemical potential with uniformly distributed values in `[-amplitude, amplitude]`
pub fn random_potential(grid: &RegularGrid2d<f64>, amplitude: f64) -> GridField {
    let mut rng = thread_rng();
    GridField::from_fn(grid, |_| rng.gen_range(-amplitude..=amplitude))
}
