//! Loading and validating the simulation settings
//!
//! Settings are layered: `.config/default.toml`, then an optional `.config/<RUN_MODE>.toml`,
//! then the file passed with `--config`. The merged tree is first deserialised with every
//! leaf optional and then validated once into the typed `Configuration`, so a missing key is
//! reported by its dotted name.

use crate::{
    density::DEFAULT_NUMBER_OF_KT,
    outer_loop::{
        poisson::{BoundaryConditions, SubprocessSettings},
        ConvergencePolicy, ExchangeSettings,
    },
};
use config::{Config, File};
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum SetupError {
    #[error("the configuration is missing the required key `{key}`")]
    #[diagnostic(code(heterostructure::missing_key))]
    MissingKey { key: String },
    #[error("invalid value for `{key}`: {reason}")]
    #[diagnostic(code(heterostructure::invalid_value))]
    InvalidValue { key: String, reason: String },
    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, SetupError> {
    value.ok_or_else(|| SetupError::MissingKey {
        key: key.to_string(),
    })
}

fn invalid(key: &str, reason: impl Into<String>) -> SetupError {
    SetupError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn positive(value: f64, key: &str) -> Result<f64, SetupError> {
    if value.is_finite() && value > 0_f64 {
        Ok(value)
    } else {
        Err(invalid(key, format!("expected a positive number, found {value}")))
    }
}

/// The merged settings tree before validation
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConfiguration {
    grid: RawGrid,
    physics: RawPhysics,
    exchange: RawExchange,
    convergence: RawConvergence,
    poisson: RawPoisson,
    device: RawDevice,
    boundary: RawBoundary,
    start: RawStart,
    output: RawOutput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGrid {
    ny: Option<usize>,
    nz: Option<usize>,
    dy: Option<f64>,
    dz: Option<f64>,
    ymin: Option<f64>,
    zmin: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPhysics {
    temperature: Option<f64>,
    number_of_kt: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExchange {
    enabled: Option<bool>,
    mixing: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConvergence {
    maximum_iterations: Option<usize>,
    damping_ratio: Option<f64>,
    minimum_damping: Option<f64>,
    density_threshold: Option<f64>,
    minimum_density_threshold: Option<f64>,
    exchange_tolerance: Option<f64>,
    potential_tolerance: Option<f64>,
    warm_up_iterations: Option<usize>,
    minimum_mixing: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPoisson {
    initial_executable: Option<PathBuf>,
    newton_executable: Option<PathBuf>,
    initial_parameter_file: Option<PathBuf>,
    newton_parameter_file: Option<PathBuf>,
    initial_result_file: Option<PathBuf>,
    newton_result_file: Option<PathBuf>,
    working_directory: Option<PathBuf>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDevice {
    split_width: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBoundary {
    top_voltage: Option<f64>,
    split_voltage: Option<f64>,
    bottom_voltage: Option<f64>,
    surface_charge: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStart {
    hot_start: Option<bool>,
    spin_up_file: Option<PathBuf>,
    spin_down_file: Option<PathBuf>,
    surface_charge_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOutput {
    directory: Option<PathBuf>,
}

/// Grid dimensions, the origin falls back to values derived from the device when unset
#[derive(Clone, Debug, PartialEq)]
pub struct GridSettings {
    pub ny: usize,
    pub nz: usize,
    pub dy: f64,
    pub dz: f64,
    pub ymin: Option<f64>,
    pub zmin: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsSettings {
    /// Overrides the temperature of the device file when set
    pub temperature: Option<f64>,
    pub number_of_kt: f64,
}

/// Where the starting density comes from
#[derive(Clone, Debug, PartialEq)]
pub enum StartSettings {
    /// Zero density, with the surface charge of the boundary conditions
    Cold,
    /// Densities and surface charge from a previous run
    Hot {
        spin_up_file: PathBuf,
        spin_down_file: PathBuf,
        surface_charge_file: PathBuf,
    },
}

/// The validated simulation settings
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    pub grid: GridSettings,
    pub physics: PhysicsSettings,
    pub exchange: ExchangeSettings,
    pub convergence: ConvergencePolicy,
    pub poisson: SubprocessSettings,
    pub split_width: f64,
    pub boundary: BoundaryConditions,
    pub start: StartSettings,
    pub output_directory: PathBuf,
}

impl Configuration {
    /// Load the layered configuration, with `user_file` applied last when given
    pub fn build(user_file: Option<&Path>) -> Result<Self, SetupError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // The default settings for the simulation which we use in the general case
            .add_source(File::with_name("../.config/default"))
            // The override settings which may be set by the user, optional
            .add_source(File::with_name(&format!("../.config/{}", run_mode)).required(false));
        if let Some(path) = user_file {
            builder = builder.add_source(File::from(path));
        }
        let raw: RawConfiguration = builder.build()?.try_deserialize()?;
        raw.validate()
    }

    /// Parse a single TOML document, without the layered defaults
    pub fn from_toml(contents: &str) -> Result<Self, SetupError> {
        let raw: RawConfiguration = Config::builder()
            .add_source(File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        raw.validate()
    }
}

impl RawConfiguration {
    pub fn validate(self) -> Result<Configuration, SetupError> {
        let grid = GridSettings {
            ny: required(self.grid.ny, "grid.ny")?,
            nz: required(self.grid.nz, "grid.nz")?,
            dy: positive(required(self.grid.dy, "grid.dy")?, "grid.dy")?,
            dz: positive(required(self.grid.dz, "grid.dz")?, "grid.dz")?,
            ymin: self.grid.ymin,
            zmin: self.grid.zmin,
        };
        for (count, key) in [(grid.ny, "grid.ny"), (grid.nz, "grid.nz")] {
            if count < 3 {
                return Err(invalid(key, "a grid needs at least 3 points per axis"));
            }
        }

        let physics = PhysicsSettings {
            temperature: self
                .physics
                .temperature
                .map(|t| positive(t, "physics.temperature"))
                .transpose()?,
            number_of_kt: positive(
                self.physics.number_of_kt.unwrap_or(DEFAULT_NUMBER_OF_KT),
                "physics.number_of_kt",
            )?,
        };

        let c = self.convergence;
        let convergence = ConvergencePolicy {
            maximum_iterations: required(c.maximum_iterations, "convergence.maximum_iterations")?,
            damping_ratio: required(c.damping_ratio, "convergence.damping_ratio")?,
            minimum_damping: required(c.minimum_damping, "convergence.minimum_damping")?,
            density_threshold: positive(
                required(c.density_threshold, "convergence.density_threshold")?,
                "convergence.density_threshold",
            )?,
            minimum_density_threshold: positive(
                required(
                    c.minimum_density_threshold,
                    "convergence.minimum_density_threshold",
                )?,
                "convergence.minimum_density_threshold",
            )?,
            exchange_tolerance: required(c.exchange_tolerance, "convergence.exchange_tolerance")?,
            potential_tolerance: required(
                c.potential_tolerance,
                "convergence.potential_tolerance",
            )?,
            warm_up_iterations: required(c.warm_up_iterations, "convergence.warm_up_iterations")?,
            minimum_mixing: required(c.minimum_mixing, "convergence.minimum_mixing")?,
        };
        if !(convergence.damping_ratio > 0_f64 && convergence.damping_ratio < 1_f64) {
            return Err(invalid(
                "convergence.damping_ratio",
                "the ratio must lie strictly between 0 and 1",
            ));
        }
        if !(convergence.minimum_damping > 0_f64 && convergence.minimum_damping <= 1_f64) {
            return Err(invalid(
                "convergence.minimum_damping",
                "the damping floor must lie in (0, 1]",
            ));
        }

        let exchange = ExchangeSettings {
            enabled: required(self.exchange.enabled, "exchange.enabled")?,
            mixing: required(self.exchange.mixing, "exchange.mixing")?,
        };
        if exchange.enabled
            && !(exchange.mixing >= convergence.minimum_mixing && exchange.mixing <= 1_f64)
        {
            return Err(invalid(
                "exchange.mixing",
                format!(
                    "the mixing parameter must lie in [{}, 1], found {}",
                    convergence.minimum_mixing, exchange.mixing
                ),
            ));
        }

        let p = self.poisson;
        let poisson = SubprocessSettings {
            initial_executable: required(p.initial_executable, "poisson.initial_executable")?,
            newton_executable: required(p.newton_executable, "poisson.newton_executable")?,
            initial_parameter_file: p
                .initial_parameter_file
                .unwrap_or_else(|| PathBuf::from("split_gate.in")),
            newton_parameter_file: p
                .newton_parameter_file
                .unwrap_or_else(|| PathBuf::from("newton.in")),
            initial_result_file: p
                .initial_result_file
                .unwrap_or_else(|| PathBuf::from("phi.dat")),
            newton_result_file: p
                .newton_result_file
                .unwrap_or_else(|| PathBuf::from("x.dat")),
            working_directory: required(p.working_directory, "poisson.working_directory")?,
            timeout_seconds: required(p.timeout_seconds, "poisson.timeout_seconds")?,
        };

        let boundary = BoundaryConditions {
            top_voltage: required(self.boundary.top_voltage, "boundary.top_voltage")?,
            split_voltage: required(self.boundary.split_voltage, "boundary.split_voltage")?,
            bottom_voltage: self.boundary.bottom_voltage.unwrap_or(0_f64),
            surface_charge: required(self.boundary.surface_charge, "boundary.surface_charge")?,
        };

        let start = if self.start.hot_start.unwrap_or(false) {
            StartSettings::Hot {
                spin_up_file: required(self.start.spin_up_file, "start.spin_up_file")?,
                spin_down_file: required(self.start.spin_down_file, "start.spin_down_file")?,
                surface_charge_file: required(
                    self.start.surface_charge_file,
                    "start.surface_charge_file",
                )?,
            }
        } else {
            StartSettings::Cold
        };

        Ok(Configuration {
            grid,
            physics,
            exchange,
            convergence,
            poisson,
            split_width: positive(
                required(self.device.split_width, "device.split_width")?,
                "device.split_width",
            )?,
            boundary,
            start,
            output_directory: required(self.output.directory, "output.directory")?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::{Configuration, SetupError, StartSettings};

    const COMPLETE: &str = r#"
        [grid]
        ny = 8
        nz = 8
        dy = 5.0
        dz = 1.0

        [exchange]
        enabled = true
        mixing = 0.1

        [convergence]
        maximum_iterations = 100
        damping_ratio = 0.8
        minimum_damping = 1e-3
        density_threshold = 0.12
        minimum_density_threshold = 0.005
        exchange_tolerance = 0.1
        potential_tolerance = 0.1
        warm_up_iterations = 3
        minimum_mixing = 0.03

        [poisson]
        initial_executable = "split_gate"
        newton_executable = "split_gate_newton"
        working_directory = "."
        timeout_seconds = 60

        [device]
        split_width = 600.0

        [boundary]
        top_voltage = 0.0
        split_voltage = -0.5
        surface_charge = 0.0

        [output]
        directory = "results"
    "#;

    #[test]
    fn a_complete_file_validates() {
        let configuration = Configuration::from_toml(COMPLETE).unwrap();
        assert_eq!(configuration.grid.ny, 8);
        assert_eq!(configuration.start, StartSettings::Cold);
        assert_eq!(configuration.boundary.bottom_voltage, 0.);
        assert_eq!(
            configuration.poisson.newton_result_file,
            std::path::PathBuf::from("x.dat")
        );
        assert!(configuration.physics.temperature.is_none());
    }

    #[test]
    fn missing_keys_are_reported_by_name() {
        let contents = COMPLETE.replace("split_voltage = -0.5", "");
        match Configuration::from_toml(&contents) {
            Err(SetupError::MissingKey { key }) => assert_eq!(key, "boundary.split_voltage"),
            other => panic!("expected a missing key, found {other:?}"),
        }
    }

    #[test]
    fn hot_starts_need_their_files() {
        let contents = format!("{COMPLETE}\n[start]\nhot_start = true\nspin_up_file = \"up.dat\"\n");
        match Configuration::from_toml(&contents) {
            Err(SetupError::MissingKey { key }) => assert_eq!(key, "start.spin_down_file"),
            other => panic!("expected a missing key, found {other:?}"),
        }
    }

    #[test]
    fn mixing_below_the_floor_is_rejected() {
        let contents = COMPLETE.replace("mixing = 0.1", "mixing = 0.01");
        assert!(matches!(
            Configuration::from_toml(&contents),
            Err(SetupError::InvalidValue { key, .. }) if key == "exchange.mixing"
        ));
    }

    #[test]
    fn disabled_exchange_ignores_the_mixing_floor() {
        let contents = COMPLETE
            .replace("mixing = 0.1", "mixing = 0.0")
            .replace("enabled = true", "enabled = false");
        assert!(Configuration::from_toml(&contents).is_ok());
    }
}
