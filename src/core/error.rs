//! Error types for the kernel matched subspace detector

use crate::core::ClassLabel;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KMSDError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing class: no {label} samples in the training data")]
    MissingClass { label: ClassLabel },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error("Model not trained")]
    ModelNotTrained,

    #[error("Model already trained")]
    ModelAlreadyTrained,

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, KMSDError>;
