//! The potential and Newton step provider
//!
//! The elliptic solve itself is delegated to an `EllipticBackend`. The provider owns the
//! current chemical potential, assembles residuals with the discrete `Laplacian` and applies
//! damped updates. Potentials are energies in meV, the electrostatic potential seen by the
//! Laplacian is `mu / q`.

mod exchange_format;
mod external;
mod operator;

pub use external::{SubprocessBackend, SubprocessSettings};
pub use operator::Laplacian;

use crate::{
    constants::ELECTRON_CHARGE,
    device::DeviceDimensions,
    fields::{FieldError, GridField},
};
use heterostructure_mesher::{GridError, RegularGrid2d};
use miette::Diagnostic;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum PoissonError {
    #[error("could not locate the elliptic solver `{executable}`")]
    #[diagnostic(help("check the `poisson` section of the configuration"))]
    ExecutableNotFound { executable: PathBuf },
    #[error("`{command}` exited with status {status}")]
    NonZeroExit { command: String, status: String },
    #[error("`{command}` did not finish within {seconds} s")]
    Timeout { command: String, seconds: u64 },
    #[error("{file:?} holds {found} values but the grid has {expected} points")]
    PointCount {
        file: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("failed to parse `{token}` in {file:?} as a float")]
    Parse { file: PathBuf, token: String },
    #[error("IO failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("the elliptic solver was used before `initiate` was called")]
    NotInitiated,
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl PoissonError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Gate voltages in V and the surface charge density in zC / nm^2
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BoundaryConditions {
    pub top_voltage: f64,
    pub split_voltage: f64,
    #[serde(default)]
    pub bottom_voltage: f64,
    pub surface_charge: f64,
}

/// Everything a backend needs to know once, before the first solve
pub struct BackendSetup<'a> {
    pub grid: &'a RegularGrid2d<f64>,
    pub dimensions: &'a DeviceDimensions,
    pub boundary_conditions: &'a BoundaryConditions,
    pub laplacian: &'a Laplacian,
}

/// A request to the elliptic solver
#[derive(Debug)]
pub enum EllipticRequest<'a> {
    /// Solve `-L(phi) = rho` subject to the gate boundary conditions
    Potential { density: &'a GridField },
    /// Solve `(-L / q - rho') x = -g` with `x = 0` on the domain edge
    NewtonStep {
        density: &'a GridField,
        jacobian: &'a GridField,
        residual: &'a GridField,
        exchange_difference: &'a GridField,
    },
}

impl<'a> EllipticRequest<'a> {
    pub fn density(&self) -> &'a GridField {
        match self {
            EllipticRequest::Potential { density } => density,
            EllipticRequest::NewtonStep { density, .. } => density,
        }
    }
}

/// The solved field, on the grid of the request
#[derive(Debug)]
pub struct EllipticResponse {
    /// The electrostatic potential for a `Potential` request, the step in meV for a `NewtonStep`
    pub field: GridField,
}

/// A synchronous elliptic solver
pub trait EllipticBackend {
    /// Pass the device geometry and boundary conditions, called once per run
    fn initiate(&mut self, setup: &BackendSetup<'_>) -> Result<(), PoissonError>;
    /// Solve a single request
    fn solve(&mut self, request: &EllipticRequest<'_>) -> Result<EllipticResponse, PoissonError>;
}

/// A Newton step and the undamped potential it leads to
#[derive(Clone, Debug)]
pub struct NewtonStep {
    pub step: GridField,
    pub potential: GridField,
}

/// Owns the current chemical potential and forwards solves to the backend
pub struct PoissonSolver<B> {
    grid: RegularGrid2d<f64>,
    laplacian: Laplacian,
    backend: B,
    chemical_potential: GridField,
    initiated: bool,
}

impl<B: EllipticBackend> PoissonSolver<B> {
    pub fn new(
        grid: &RegularGrid2d<f64>,
        laplacian: Laplacian,
        backend: B,
    ) -> Result<Self, PoissonError> {
        if laplacian.shape() != grid.shape() {
            return Err(FieldError::DimensionMismatch {
                expected: grid.shape(),
                found: laplacian.shape(),
            }
            .into());
        }
        Ok(Self {
            grid: grid.clone(),
            laplacian,
            backend,
            chemical_potential: GridField::zeros(grid),
            initiated: false,
        })
    }

    /// Hand the device dimensions and boundary conditions to the backend
    pub fn initiate(
        &mut self,
        dimensions: &DeviceDimensions,
        boundary_conditions: &BoundaryConditions,
    ) -> Result<(), PoissonError> {
        self.backend.initiate(&BackendSetup {
            grid: &self.grid,
            dimensions,
            boundary_conditions,
            laplacian: &self.laplacian,
        })?;
        self.initiated = true;
        Ok(())
    }

    /// The chemical potential `mu = q phi` for a fixed spin-summed charge density
    ///
    /// The result also becomes the current potential of the provider.
    pub fn chemical_potential(&mut self, density: &GridField) -> Result<GridField, PoissonError> {
        self.check_initiated()?;
        density.check_shape(self.grid.shape())?;
        tracing::debug!("Requesting the potential for a fixed density");
        let response = self
            .backend
            .solve(&EllipticRequest::Potential { density })?;
        response.field.check_shape(self.grid.shape())?;
        self.chemical_potential = response.field.scale(ELECTRON_CHARGE);
        Ok(self.chemical_potential.clone())
    }

    /// The discrete operator `div(eps grad field)`, zero on the edge ring
    pub fn laplacian(&self, field: &GridField) -> Result<GridField, PoissonError> {
        Ok(self.laplacian.apply(field)?)
    }

    /// The Poisson residual `g = -L(mu / q) - rho`
    pub fn residual(
        &self,
        chemical_potential: &GridField,
        density: &GridField,
    ) -> Result<GridField, PoissonError> {
        let curvature = self.laplacian(&chemical_potential.scale(1_f64 / ELECTRON_CHARGE))?;
        Ok(curvature.scale(-1_f64).checked_sub(density)?)
    }

    /// Request the Newton step `x` for the current potential
    ///
    /// The returned potential is the full undamped update `mu + x`, the provider's own
    /// potential is left untouched until `apply_damped_step` is called.
    pub fn newton_step(
        &mut self,
        jacobian: &GridField,
        residual: &GridField,
        density: &GridField,
        exchange_difference: &GridField,
    ) -> Result<NewtonStep, PoissonError> {
        self.check_initiated()?;
        for field in [jacobian, residual, density, exchange_difference] {
            field.check_shape(self.grid.shape())?;
        }
        tracing::debug!("Requesting a Newton step");
        let response = self.backend.solve(&EllipticRequest::NewtonStep {
            density,
            jacobian,
            residual,
            exchange_difference,
        })?;
        let step = response.field;
        let potential = self.chemical_potential.checked_add(&step)?;
        Ok(NewtonStep { step, potential })
    }

    /// Commit `mu <- mu + t x` and return the new potential
    pub fn apply_damped_step(
        &mut self,
        damping: f64,
        step: &GridField,
    ) -> Result<&GridField, PoissonError> {
        self.chemical_potential.scaled_add(damping, step)?;
        Ok(&self.chemical_potential)
    }

    /// The current chemical potential
    pub fn potential(&self) -> &GridField {
        &self.chemical_potential
    }

    pub fn grid(&self) -> &RegularGrid2d<f64> {
        &self.grid
    }

    fn check_initiated(&self) -> Result<(), PoissonError> {
        if self.initiated {
            Ok(())
        } else {
            Err(PoissonError::NotInitiated)
        }
    }
}
