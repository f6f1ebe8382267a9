// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Regular two-dimensional finite difference grids
//!
//! The grid spans the lateral `y` axis and the growth `z` axis of a layered
//! heterostructure. Points are addressed by an `(i, j)` pair where `i` indexes
//! `y` and `j` indexes `z`. Flattened storage is row-major, so `j` runs fastest.

mod grid;
mod primitives;

pub use grid::*;
pub use primitives::*;

/// Errors raised while constructing a grid
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GridError {
    /// Too few points along an axis
    #[error("at least {minimum} points are needed along {axis}, found {found}")]
    TooFewPoints {
        /// The offending axis
        axis: Axis,
        /// The number of points requested
        found: usize,
        /// The number of points required
        minimum: usize,
    },
    /// Spacings must be finite and strictly positive
    #[error("the spacing along {axis} must be finite and positive, found {found}")]
    InvalidSpacing {
        /// The offending axis
        axis: Axis,
        /// The spacing requested, as a float
        found: f64,
    },
    /// The numeric type could not represent an index
    #[error("failed to represent index {0} in the grid's numeric type")]
    Conversion(usize),
}
