//! # Error
//! Errors shared by the modules which read and write grid data

use crate::fields::FieldError;
use miette::Diagnostic;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug, Diagnostic)]
/// Error for reading and writing whitespace-delimited data files
pub enum DataFileError {
    #[error("IO failure on {path:?}: {source}")]
    #[diagnostic(code(heterostructure::io_error))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse `{token}` in {path:?} as a float")]
    #[diagnostic(code(heterostructure::parse_error))]
    Parse { path: PathBuf, token: String },
    #[error("{path:?} holds {found} values but the grid has {expected} points")]
    #[diagnostic(code(heterostructure::point_count))]
    PointCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("{path:?} is empty")]
    Empty { path: PathBuf },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Field(#[from] FieldError),
}

impl DataFileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
