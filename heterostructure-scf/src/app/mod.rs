//! The command line application: settings, logging and a single experiment run

pub mod calculations;
mod configuration;
mod error;
mod telemetry;
mod tracker;

pub use configuration::{
    Configuration, GridSettings, PhysicsSettings, RawConfiguration, SetupError, StartSettings,
};
pub use error::SimulationError;
pub use tracker::{Tracker, TrackerBuilder};

use clap::{ArgEnum, Parser};
use std::{fmt, path::PathBuf};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct App {
    /// The device file describing the layer stack
    file_path: PathBuf,
    /// Settings applied on top of `.config/default.toml`
    #[clap(short, long)]
    config: Option<PathBuf>,
    #[clap(arg_enum, short, long, default_value = "info")]
    log_level: LogLevel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{}", level)
    }
}

pub fn run() -> color_eyre::Result<()> {
    let cli = App::parse();

    let configuration = Configuration::build(cli.config.as_deref())?;
    std::fs::create_dir_all(&configuration.output_directory)?;

    let (subscriber, _guard) =
        telemetry::get_subscriber(cli.log_level, &configuration.output_directory);
    telemetry::init_subscriber(subscriber)?;

    tracing::info!(path = ?cli.file_path, "Running experiment");
    let outcome = calculations::run_experiment(&configuration, &cli.file_path)?;
    tracing::info!(
        status = ?outcome.status,
        iterations = outcome.iterations,
        "Experiment complete"
    );
    Ok(())
}
