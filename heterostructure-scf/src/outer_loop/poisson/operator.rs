//! The discrete variable-permittivity Laplacian
//!
//! `L(phi) = div(eps grad phi)` is assembled from the five point stencil. The permittivity
//! on the face between two points is the arithmetic mean of the permittivity at the points.
//! The outer ring of the grid is held by the boundary conditions of the elliptic solver,
//! so the operator evaluates to zero there.

use super::PoissonError;
use crate::fields::{FieldError, GridField};
use heterostructure_mesher::RegularGrid2d;
use itertools::iproduct;
use ndarray::Array2;

#[derive(Clone, Debug, PartialEq)]
pub struct Laplacian {
    permittivity: Array2<f64>,
    dy: f64,
    dz: f64,
}

impl Laplacian {
    /// Build the operator for `grid`, which needs an interior along both axes
    pub fn new(grid: &RegularGrid2d<f64>, permittivity: Array2<f64>) -> Result<Self, PoissonError> {
        grid.require_points(3)?;
        if permittivity.dim() != grid.shape() {
            return Err(FieldError::DimensionMismatch {
                expected: grid.shape(),
                found: permittivity.dim(),
            }
            .into());
        }
        Ok(Self {
            permittivity,
            dy: grid.dy(),
            dz: grid.dz(),
        })
    }

    pub fn permittivity(&self) -> &Array2<f64> {
        &self.permittivity
    }

    pub fn shape(&self) -> (usize, usize) {
        self.permittivity.dim()
    }

    /// Apply the operator to `field`
    pub fn apply(&self, field: &GridField) -> Result<GridField, FieldError> {
        field.check_shape(self.shape())?;
        let (ny, nz) = self.shape();
        let f = field.values();
        let eps = &self.permittivity;
        let mut result = Array2::zeros((ny, nz));
        for (i, j) in iproduct!(1..ny - 1, 1..nz - 1) {
            result[[i, j]] = second_difference(
                [f[[i - 1, j]], f[[i, j]], f[[i + 1, j]]],
                [eps[[i - 1, j]], eps[[i, j]], eps[[i + 1, j]]],
                self.dy,
            ) + second_difference(
                [f[[i, j - 1]], f[[i, j]], f[[i, j + 1]]],
                [eps[[i, j - 1]], eps[[i, j]], eps[[i, j + 1]]],
                self.dz,
            );
        }
        field.with_values(result)
    }

    /// The stencil weights `(minus, centre, plus)` along each axis at interior point `(i, j)`
    ///
    /// `apply` is the sum of these weights against the neighbouring values. They are exposed
    /// so that callers can assemble the operator as a matrix.
    pub fn stencil(&self, i: usize, j: usize) -> ([f64; 3], [f64; 3]) {
        let eps = &self.permittivity;
        (
            weights(
                [eps[[i - 1, j]], eps[[i, j]], eps[[i + 1, j]]],
                self.dy,
            ),
            weights(
                [eps[[i, j - 1]], eps[[i, j]], eps[[i, j + 1]]],
                self.dz,
            ),
        )
    }
}

fn weights(epsilons: [f64; 3], delta: f64) -> [f64; 3] {
    let minus = 0.5 * (epsilons[0] + epsilons[1]) / (delta * delta);
    let plus = 0.5 * (epsilons[1] + epsilons[2]) / (delta * delta);
    [minus, -(minus + plus), plus]
}

fn second_difference(values: [f64; 3], epsilons: [f64; 3], delta: f64) -> f64 {
    weights(epsilons, delta)
        .iter()
        .zip(values.iter())
        .map(|(w, v)| w * v)
        .sum()
}
