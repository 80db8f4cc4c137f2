//! Input validation errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop processing of one input file.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is neither UTF-8 nor Shift_JIS text", path.display())]
    UnreadableEncoding { path: PathBuf },

    #[error("malformed CSV in {source_name}: {source}")]
    Csv {
        source_name: String,
        source: csv::Error,
    },

    #[error("{source_name} is missing required columns: {}", missing.join(", "))]
    MissingColumns {
        source_name: String,
        missing: Vec<String>,
    },

    #[error("{source_name} has no header row")]
    NoHeader { source_name: String },

    #[error("{source_name}: line {line}: `{value}` is not a count")]
    BadCount {
        source_name: String,
        line: usize,
        value: String,
    },

    #[error("column {column} not found in the response data")]
    UnknownColumn { column: String },
}

pub type InputResult<T> = Result<T, InputError>;
