//! Scalar fields sampled on the regular simulation grid
//!
//! A `GridField` stores one value per grid point together with the spacing and origin
//! of the grid it was sampled on. Every binary operation checks that the two operands
//! share a shape, a mismatch is reported as a `FieldError` and never truncated.

mod spin;

pub use spin::SpinResolved;

use crate::error::DataFileError;
use heterostructure_mesher::RegularGrid2d;
use itertools::Itertools;
use miette::Diagnostic;
use ndarray::Array2;
use std::{io::Write, path::Path};

#[derive(thiserror::Error, Debug, Diagnostic, PartialEq, Eq)]
pub enum FieldError {
    #[error("field dimensions differ: expected {expected:?}, found {found:?}")]
    #[diagnostic(code(heterostructure::dimension_mismatch))]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// A dense field indexed by `[i, j]`, with `i` along `y` and `j` along `z`
#[derive(Clone, Debug, PartialEq)]
pub struct GridField {
    values: Array2<f64>,
    spacing: [f64; 2],
    origin: [f64; 2],
}

impl GridField {
    pub fn zeros(grid: &RegularGrid2d<f64>) -> Self {
        Self::from_element(grid, 0_f64)
    }

    pub fn from_element(grid: &RegularGrid2d<f64>, value: f64) -> Self {
        Self {
            values: Array2::from_elem(grid.shape(), value),
            spacing: [grid.dy(), grid.dz()],
            origin: [grid.ymin(), grid.zmin()],
        }
    }

    /// Wrap an array of values, which must have the same shape as the grid
    pub fn from_array(grid: &RegularGrid2d<f64>, values: Array2<f64>) -> Result<Self, FieldError> {
        if values.dim() != grid.shape() {
            return Err(FieldError::DimensionMismatch {
                expected: grid.shape(),
                found: values.dim(),
            });
        }
        Ok(Self {
            values,
            spacing: [grid.dy(), grid.dz()],
            origin: [grid.ymin(), grid.zmin()],
        })
    }

    /// Evaluate `f(i, j)` at every point of the grid
    pub fn from_fn(grid: &RegularGrid2d<f64>, f: impl FnMut((usize, usize)) -> f64) -> Self {
        Self {
            values: Array2::from_shape_fn(grid.shape(), f),
            spacing: [grid.dy(), grid.dz()],
            origin: [grid.ymin(), grid.zmin()],
        }
    }

    /// Build a field from a row-major list of values
    pub fn from_row_major(grid: &RegularGrid2d<f64>, values: Vec<f64>) -> Result<Self, FieldError> {
        let found = values.len();
        let values = Array2::from_shape_vec(grid.shape(), values).map_err(|_| {
            FieldError::DimensionMismatch {
                expected: grid.shape(),
                found: (found, 1),
            }
        })?;
        Self::from_array(grid, values)
    }

    /// A copy of the field sharing this field's grid but holding new values
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self, FieldError> {
        if values.dim() != self.shape() {
            return Err(FieldError::DimensionMismatch {
                expected: self.shape(),
                found: values.dim(),
            });
        }
        Ok(Self {
            values,
            spacing: self.spacing,
            origin: self.origin,
        })
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Array2<f64> {
        &mut self.values
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn dy(&self) -> f64 {
        self.spacing[0]
    }

    pub fn dz(&self) -> f64 {
        self.spacing[1]
    }

    pub fn ymin(&self) -> f64 {
        self.origin[0]
    }

    pub fn zmin(&self) -> f64 {
        self.origin[1]
    }

    /// Reconstruct the grid this field was sampled on
    pub fn grid(&self) -> Result<RegularGrid2d<f64>, heterostructure_mesher::GridError> {
        let (ny, nz) = self.shape();
        RegularGrid2d::new([ny, nz], self.spacing, self.origin)
    }

    /// Fails unless the field has the `expected` shape
    pub(crate) fn check_shape(&self, expected: (usize, usize)) -> Result<(), FieldError> {
        if self.shape() != expected {
            return Err(FieldError::DimensionMismatch {
                expected,
                found: self.shape(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &GridField) -> Result<GridField, FieldError> {
        other.check_shape(self.shape())?;
        self.with_values(&self.values + &other.values)
    }

    pub fn checked_sub(&self, other: &GridField) -> Result<GridField, FieldError> {
        other.check_shape(self.shape())?;
        self.with_values(&self.values - &other.values)
    }

    /// Computes `self + factor * other` in place
    pub fn scaled_add(&mut self, factor: f64, other: &GridField) -> Result<(), FieldError> {
        other.check_shape(self.shape())?;
        self.values.scaled_add(factor, &other.values);
        Ok(())
    }

    pub fn scale(&self, factor: f64) -> GridField {
        GridField {
            values: &self.values * factor,
            spacing: self.spacing,
            origin: self.origin,
        }
    }

    /// Element-wise map into a new field on the same grid
    pub fn map(&self, f: impl FnMut(&f64) -> f64) -> GridField {
        GridField {
            values: self.values.map(f),
            spacing: self.spacing,
            origin: self.origin,
        }
    }

    /// The largest absolute value in the field, zero for an empty field
    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0_f64, |acc, x| acc.max(x.abs()))
    }

    pub fn all_finite(&self) -> bool {
        self.values.iter().all(|x| x.is_finite())
    }

    /// Read a field written as `ny` lines of `nz` whitespace-separated values
    pub fn read_from_file(
        grid: &RegularGrid2d<f64>,
        path: impl AsRef<Path>,
    ) -> Result<Self, DataFileError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| DataFileError::io(path, e))?;
        let values = contents
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| DataFileError::Parse {
                    path: path.to_path_buf(),
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() != grid.number_of_points() {
            return Err(DataFileError::PointCount {
                path: path.to_path_buf(),
                expected: grid.number_of_points(),
                found: values.len(),
            });
        }
        Self::from_row_major(grid, values).map_err(|_| DataFileError::PointCount {
            path: path.to_path_buf(),
            expected: grid.number_of_points(),
            found: grid.number_of_points(),
        })
    }

    /// Write the field as `ny` lines of `nz` tab-separated values
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), DataFileError> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| DataFileError::io(path, e))?;
        let mut writer = std::io::BufWriter::new(file);
        for row in self.values.rows() {
            writeln!(writer, "{}", row.iter().join("\t"))
                .map_err(|e| DataFileError::io(path, e))?;
        }
        writer.flush().map_err(|e| DataFileError::io(path, e))
    }
}

#[cfg(test)]
mod test {
    use super::{FieldError, GridField};
    use approx::assert_relative_eq;
    use heterostructure_mesher::RegularGrid2d;
    use proptest::prelude::*;
    use rand::Rng;

    fn grid(ny: usize, nz: usize) -> RegularGrid2d<f64> {
        RegularGrid2d::new([ny, nz], [1., 0.5], [0., -2.]).unwrap()
    }

    #[test]
    fn mismatched_fields_are_rejected() {
        let a = GridField::zeros(&grid(4, 5));
        let b = GridField::zeros(&grid(5, 4));
        assert_eq!(
            a.checked_add(&b),
            Err(FieldError::DimensionMismatch {
                expected: (4, 5),
                found: (5, 4)
            })
        );
    }

    #[test]
    fn short_row_major_data_is_rejected() {
        assert!(GridField::from_row_major(&grid(3, 3), vec![0.; 8]).is_err());
    }

    #[test]
    fn max_abs_picks_negative_extremes() {
        let mut field = GridField::zeros(&grid(3, 3));
        field.values_mut()[[1, 2]] = -4.;
        field.values_mut()[[2, 2]] = 3.;
        assert_relative_eq!(field.max_abs(), 4.);
    }

    proptest! {
        #[test]
        fn scaled_add_agrees_with_scale_then_add(
            values in proptest::collection::vec(-1e3_f64..1e3, 12),
            other in proptest::collection::vec(-1e3_f64..1e3, 12),
            factor in -10_f64..10.,
        ) {
            let grid = grid(3, 4);
            let mut field = GridField::from_row_major(&grid, values).unwrap();
            let other = GridField::from_row_major(&grid, other).unwrap();
            let expected = field.checked_add(&other.scale(factor)).unwrap();
            field.scaled_add(factor, &other).unwrap();
            for (a, b) in field.values().iter().zip(expected.values().iter()) {
                prop_assert!((a - b).abs() <= 1e-9 * (1. + b.abs()));
            }
        }

        #[test]
        fn max_abs_bounds_every_value(values in proptest::collection::vec(-1e6_f64..1e6, 9)) {
            let field = GridField::from_row_major(&grid(3, 3), values).unwrap();
            let largest = field.max_abs();
            prop_assert!(field.values().iter().all(|v| v.abs() <= largest));
        }
    }

    #[test]
    fn fields_survive_a_write_read_cycle() {
        let mut rng = rand::thread_rng();
        let grid = grid(4, 6);
        let field = GridField::from_fn(&grid, |_| rng.gen::<f64>() - 0.5);
        let path = std::env::temp_dir().join("heterostructure_field_cycle.dat");
        field.write_to_file(&path).unwrap();
        let read = GridField::read_from_file(&grid, &path).unwrap();
        std::fs::remove_file(&path).unwrap();
        for (a, b) in field.values().iter().zip(read.values().iter()) {
            assert_relative_eq!(a, b);
        }
    }
}
