// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Error
//! The error type for the binary

use super::configuration::SetupError;
use crate::{
    density::DensityError,
    device::DeviceError,
    error::DataFileError,
    fields::FieldError,
    outer_loop::{poisson::PoissonError, OuterLoopError},
    postprocessor::PostProcessorError,
};
use heterostructure_mesher::GridError;
use miette::Diagnostic;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum SimulationError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Setup(#[from] SetupError),
    #[error("failed to read the device file {path:?}")]
    #[diagnostic(code(heterostructure::device_file))]
    DeviceFile {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Density(#[from] DensityError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Poisson(#[from] PoissonError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    OuterLoop(#[from] OuterLoopError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    DataFile(#[from] DataFileError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    PostProcessor(#[from] PostProcessorError),
}
