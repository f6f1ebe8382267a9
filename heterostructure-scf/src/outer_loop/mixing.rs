//! Adaptive mixing of the exchange correlation potential

use crate::fields::{FieldError, GridField};
use heterostructure_mesher::RegularGrid2d;

/// Tracks the mixed exchange potential and the adaptive density threshold
///
/// The baseline is updated as `(1 - alpha) V_old + alpha V_xc`. When a refresh moves the
/// baseline further than the previous one did, the density threshold gating refreshes is
/// halved, bounded below by its floor.
#[derive(Clone, Debug)]
pub struct MixingSchedule {
    mixing: f64,
    baseline: GridField,
    difference: GridField,
    threshold: f64,
    floor: f64,
    largest_difference: f64,
}

impl MixingSchedule {
    pub fn new(grid: &RegularGrid2d<f64>, mixing: f64, threshold: f64, floor: f64) -> Self {
        Self {
            mixing,
            baseline: GridField::zeros(grid),
            difference: GridField::zeros(grid),
            threshold,
            floor,
            largest_difference: f64::MAX,
        }
    }

    /// The mixed exchange potential seen by the density solver
    pub fn baseline(&self) -> &GridField {
        &self.baseline
    }

    /// Difference between the baseline and the most recent unmixed exchange potential
    pub fn difference(&self) -> &GridField {
        &self.difference
    }

    pub fn mixing(&self) -> f64 {
        self.mixing
    }

    pub fn set_mixing(&mut self, mixing: f64) {
        self.mixing = mixing;
    }

    /// The current relative density change below which refreshes are allowed
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Mix a freshly computed exchange potential into the baseline
    pub fn blend(&mut self, exchange: &GridField) -> Result<(), FieldError> {
        exchange.check_shape(self.baseline.shape())?;
        if self.mixing == 0_f64 {
            self.difference = self.baseline.map(|_| 0_f64);
            return Ok(());
        }
        self.baseline = self
            .baseline
            .scale(1_f64 - self.mixing)
            .checked_add(&exchange.scale(self.mixing))?;
        self.difference = self.baseline.checked_sub(exchange)?;
        Ok(())
    }

    /// Blend `exchange` and adapt the density threshold, returning `max |V_mixed - V_xc|`
    pub fn refresh(&mut self, exchange: &GridField) -> Result<f64, FieldError> {
        self.blend(exchange)?;
        let current = self.difference.max_abs();
        if (current > self.largest_difference || self.mixing == 0_f64)
            && self.threshold / 2_f64 > self.floor
        {
            self.threshold /= 2_f64;
            tracing::info!(
                density_threshold = self.threshold,
                "Reduced the density difference threshold"
            );
        }
        self.largest_difference = current;
        Ok(current)
    }
}
