use super::configuration::StartSettings;
use crate::{
    error::DataFileError,
    fields::{GridField, SpinResolved},
};
use heterostructure_mesher::RegularGrid2d;
use std::path::Path;

/// The state a run starts from
#[derive(Clone, Debug)]
pub struct Tracker {
    density: SpinResolved,
    surface_charge: f64,
}

impl Tracker {
    pub fn new(density: SpinResolved, surface_charge: f64) -> Self {
        Self {
            density,
            surface_charge,
        }
    }

    /// The starting charge density in zC / nm^3
    pub fn density(&self) -> &SpinResolved {
        &self.density
    }

    /// Surface charge density in zC / nm^2
    pub fn surface_charge(&self) -> f64 {
        self.surface_charge
    }

    /// True for a cold start, where no density has been computed yet
    pub fn is_empty(&self) -> bool {
        self.density.spin_summed().max_abs() == 0_f64
    }
}

pub struct TrackerBuilder<RefGrid, RefStart> {
    grid: RefGrid,
    start: RefStart,
    surface_charge: f64,
}

impl TrackerBuilder<(), ()> {
    pub fn new() -> Self {
        Self {
            grid: (),
            start: (),
            surface_charge: 0_f64,
        }
    }
}

impl Default for TrackerBuilder<(), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefGrid, RefStart> TrackerBuilder<RefGrid, RefStart> {
    pub fn with_grid<Grid>(self, grid: &Grid) -> TrackerBuilder<&Grid, RefStart> {
        TrackerBuilder {
            grid,
            start: self.start,
            surface_charge: self.surface_charge,
        }
    }

    pub fn with_start<Start>(self, start: &Start) -> TrackerBuilder<RefGrid, &Start> {
        TrackerBuilder {
            grid: self.grid,
            start,
            surface_charge: self.surface_charge,
        }
    }

    /// The surface charge used for a cold start
    pub fn with_surface_charge(self, surface_charge: f64) -> Self {
        Self {
            surface_charge,
            ..self
        }
    }
}

impl<'a> TrackerBuilder<&'a RegularGrid2d<f64>, &'a StartSettings> {
    pub fn build(self) -> Result<Tracker, DataFileError> {
        match self.start {
            StartSettings::Cold => Ok(Tracker::new(
                SpinResolved::zeros(self.grid),
                self.surface_charge,
            )),
            StartSettings::Hot {
                spin_up_file,
                spin_down_file,
                surface_charge_file,
            } => {
                tracing::info!(?spin_up_file, ?spin_down_file, "Reading the starting density");
                let up = GridField::read_from_file(self.grid, spin_up_file)?;
                let down = GridField::read_from_file(self.grid, spin_down_file)?;
                let density = SpinResolved::new(up, down)?;
                Ok(Tracker::new(
                    density,
                    read_surface_charge(surface_charge_file)?,
                ))
            }
        }
    }
}

/// The surface charge is the first token on the first line of the file
fn read_surface_charge(path: &Path) -> Result<f64, DataFileError> {
    let contents = std::fs::read_to_string(path).map_err(|e| DataFileError::io(path, e))?;
    let token = contents
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().next())
        .ok_or_else(|| DataFileError::Empty {
            path: path.to_path_buf(),
        })?;
    token.parse().map_err(|_| DataFileError::Parse {
        path: path.to_path_buf(),
        token: token.to_string(),
    })
}
