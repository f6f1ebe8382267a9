use crate::{Axis, GridError};
use nalgebra::{Point2, RealField};
use num_traits::ToPrimitive;

/// A uniform rectangular grid of `ny * nz` points
#[derive(Clone, Debug, PartialEq)]
pub struct RegularGrid2d<T: RealField> {
    counts: [usize; 2],
    spacing: [T; 2],
    origin: [T; 2],
    y_coordinates: Vec<T>,
    z_coordinates: Vec<T>,
}

impl<T> RegularGrid2d<T>
where
    T: Copy + RealField + ToPrimitive,
{
    /// Create a grid with `counts = [ny, nz]` points, `spacing = [dy, dz]` and the
    /// first point at `origin = [ymin, zmin]`
    pub fn new(counts: [usize; 2], spacing: [T; 2], origin: [T; 2]) -> Result<Self, GridError> {
        for (axis, (&count, &delta)) in [Axis::Y, Axis::Z]
            .into_iter()
            .zip(counts.iter().zip(spacing.iter()))
        {
            if count == 0 {
                return Err(GridError::TooFewPoints {
                    axis,
                    found: count,
                    minimum: 1,
                });
            }
            let as_float = delta.to_f64().unwrap_or(f64::NAN);
            if !as_float.is_finite() || as_float <= 0_f64 {
                return Err(GridError::InvalidSpacing {
                    axis,
                    found: as_float,
                });
            }
        }

        let y_coordinates = coordinates(counts[0], spacing[0], origin[0])?;
        let z_coordinates = coordinates(counts[1], spacing[1], origin[1])?;

        Ok(Self {
            counts,
            spacing,
            origin,
            y_coordinates,
            z_coordinates,
        })
    }
}

fn coordinates<T: Copy + RealField>(
    count: usize,
    delta: T,
    start: T,
) -> Result<Vec<T>, GridError> {
    (0..count)
        .map(|i| {
            T::from_usize(i)
                .map(|i_as_t| start + i_as_t * delta)
                .ok_or(GridError::Conversion(i))
        })
        .collect()
}

impl<T: Copy + RealField> RegularGrid2d<T> {
    pub fn ny(&self) -> usize {
        self.counts[0]
    }

    pub fn nz(&self) -> usize {
        self.counts[1]
    }

    pub fn dy(&self) -> T {
        self.spacing[0]
    }

    pub fn dz(&self) -> T {
        self.spacing[1]
    }

    pub fn ymin(&self) -> T {
        self.origin[0]
    }

    pub fn zmin(&self) -> T {
        self.origin[1]
    }

    /// The `(ny, nz)` shape, matching `ndarray` conventions
    pub fn shape(&self) -> (usize, usize) {
        (self.counts[0], self.counts[1])
    }

    pub fn number_of_points(&self) -> usize {
        self.counts[0] * self.counts[1]
    }

    pub fn y_coordinates(&self) -> &[T] {
        &self.y_coordinates
    }

    pub fn z_coordinates(&self) -> &[T] {
        &self.z_coordinates
    }

    pub fn point(&self, i: usize, j: usize) -> Point2<T> {
        Point2::new(self.y_coordinates[i], self.z_coordinates[j])
    }

    /// Row-major flat index of point `(i, j)`
    pub fn flat_index(&self, i: usize, j: usize) -> usize {
        i * self.counts[1] + j
    }

    /// Check there are at least `minimum` points along both axes
    ///
    /// Finite difference operators need `minimum = 3` so the domain has an interior.
    pub fn require_points(&self, minimum: usize) -> Result<(), GridError> {
        for (axis, &count) in [Axis::Y, Axis::Z].into_iter().zip(self.counts.iter()) {
            if count < minimum {
                return Err(GridError::TooFewPoints {
                    axis,
                    found: count,
                    minimum,
                });
            }
        }
        Ok(())
    }

    pub fn is_interior(&self, i: usize, j: usize) -> bool {
        i > 0 && j > 0 && i + 1 < self.counts[0] && j + 1 < self.counts[1]
    }

    /// Iterate over the `(i, j)` pairs of every interior point in row-major order
    ///
    /// Empty when either axis has fewer than three points.
    pub fn interior_points(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (ny, nz) = self.shape();
        (1..ny.saturating_sub(1))
            .flat_map(move |i| (1..nz.saturating_sub(1)).map(move |j| (i, j)))
    }
}

#[cfg(test)]
mod test {
    use super::RegularGrid2d;
    use crate::{Axis, GridError};
    use approx::assert_relative_eq;

    #[test]
    fn coordinates_start_at_origin_and_step_by_spacing() {
        let grid = RegularGrid2d::new([4, 6], [2_f64, 0.5], [-3_f64, 10.]).unwrap();
        assert_eq!(grid.shape(), (4, 6));
        assert_relative_eq!(grid.y_coordinates()[0], -3.);
        assert_relative_eq!(grid.y_coordinates()[3], 3.);
        assert_relative_eq!(grid.z_coordinates()[5], 12.5);
        assert_relative_eq!(grid.point(1, 2).y, 11.);
    }

    #[test]
    fn flat_index_is_row_major() {
        let grid = RegularGrid2d::new([5, 7], [1_f64, 1.], [0_f64, 0.]).unwrap();
        assert_eq!(grid.flat_index(0, 6), 6);
        assert_eq!(grid.flat_index(1, 0), 7);
        assert_eq!(grid.flat_index(4, 6), grid.number_of_points() - 1);
    }

    #[test]
    fn interior_count_excludes_the_outer_ring() {
        let grid = RegularGrid2d::new([8, 8], [1_f64, 1.], [0_f64, 0.]).unwrap();
        assert_eq!(grid.interior_points().count(), 36);
        assert!(grid.interior_points().all(|(i, j)| grid.is_interior(i, j)));
        assert!(!grid.is_interior(0, 3));
        assert!(!grid.is_interior(7, 7));
    }

    #[test]
    fn single_slices_are_valid_grids_without_an_interior() {
        let grid = RegularGrid2d::new([1, 5], [10_f64, 5.], [0_f64, -40.]).unwrap();
        assert_eq!(grid.shape(), (1, 5));
        assert_eq!(grid.interior_points().count(), 0);
        assert!(grid.require_points(1).is_ok());
        assert_eq!(
            grid.require_points(3),
            Err(GridError::TooFewPoints {
                axis: Axis::Y,
                found: 1,
                minimum: 3
            })
        );
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        assert_eq!(
            RegularGrid2d::new([0, 5], [1_f64, 1.], [0_f64, 0.]),
            Err(GridError::TooFewPoints {
                axis: Axis::Y,
                found: 0,
                minimum: 1
            })
        );
        assert!(matches!(
            RegularGrid2d::new([5, 5], [1_f64, -1.], [0_f64, 0.]),
            Err(GridError::InvalidSpacing { axis: Axis::Z, .. })
        ));
    }
}
