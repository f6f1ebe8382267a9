use super::{FieldError, GridField};
use heterostructure_mesher::RegularGrid2d;

/// A pair of fields, one for each spin orientation
///
/// Both components always share a shape, this is checked on construction so every
/// method can combine them without further validation.
#[derive(Clone, Debug, PartialEq)]
pub struct SpinResolved {
    up: GridField,
    down: GridField,
}

impl SpinResolved {
    pub fn new(up: GridField, down: GridField) -> Result<Self, FieldError> {
        down.check_shape(up.shape())?;
        Ok(Self { up, down })
    }

    pub fn zeros(grid: &RegularGrid2d<f64>) -> Self {
        Self {
            up: GridField::zeros(grid),
            down: GridField::zeros(grid),
        }
    }

    /// Split a spin-summed field equally between the two spin channels
    pub fn from_total(total: &GridField) -> Self {
        let half = total.scale(0.5);
        Self {
            up: half.clone(),
            down: half,
        }
    }

    pub fn up(&self) -> &GridField {
        &self.up
    }

    pub fn down(&self) -> &GridField {
        &self.down
    }

    pub fn shape(&self) -> (usize, usize) {
        self.up.shape()
    }

    /// The element-wise sum of the two spin channels
    pub fn spin_summed(&self) -> GridField {
        GridField {
            values: &self.up.values + &self.down.values,
            spacing: self.up.spacing,
            origin: self.up.origin,
        }
    }

    pub fn checked_add(&self, other: &SpinResolved) -> Result<SpinResolved, FieldError> {
        Ok(Self {
            up: self.up.checked_add(&other.up)?,
            down: self.down.checked_add(&other.down)?,
        })
    }

    pub fn checked_sub(&self, other: &SpinResolved) -> Result<SpinResolved, FieldError> {
        Ok(Self {
            up: self.up.checked_sub(&other.up)?,
            down: self.down.checked_sub(&other.down)?,
        })
    }

    pub fn scale(&self, factor: f64) -> SpinResolved {
        Self {
            up: self.up.scale(factor),
            down: self.down.scale(factor),
        }
    }
}
