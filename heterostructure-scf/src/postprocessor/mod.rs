//! Persisting the results of a self-consistent run
//!
//! Nothing here feeds back into the iteration, the files exist so a run can be inspected or
//! used as the hot start of a later one.

mod output;

pub use output::{OutputWriter, OutputWriterBuilder};

use crate::error::DataFileError;
use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum PostProcessorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    DataFile(#[from] DataFileError),
}
