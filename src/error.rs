//! Analysis Errors
//!
//! Failures raised by the analytical functions. Loading and I/O code uses
//! `anyhow` with path context instead.

use crate::data::IndexKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("not enough {kind} observations: need {needed}, got {got}")]
    InsufficientData {
        kind: IndexKind,
        needed: usize,
        got: usize,
    },

    #[error("no usable index values for this field")]
    NoIndexData,

    #[error("unknown crop '{0}'")]
    UnknownCrop(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("projection horizon of {requested} days exceeds the {max}-day limit")]
    HorizonTooLong { requested: u32, max: u32 },
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
