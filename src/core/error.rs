//! Error types for SVM machines, trainers and readers

use thiserror::Error;

/// Broad families of failures, used by callers that want to branch on the
/// kind of problem rather than on the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input data: syntax, shapes, dimensionality
    MalformedInput,
    /// Unsupported or inconsistent settings, detected before any solver call
    Configuration,
    /// A feature not enabled for this machine instance
    Capability,
    /// The solver rejected the problem
    Solver,
    /// File system or serialization failures
    Io,
}

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown machine type: {0}")]
    UnknownMachineType(String),

    #[error("Unknown kernel type: {0}")]
    UnknownKernelType(String),

    #[error("Unsupported machine type: {0}")]
    UnsupportedMachineType(String),

    #[error("Unsupported kernel type: {0}")]
    UnsupportedKernelType(String),

    #[error("Training requires at least two classes, got {0}")]
    NotEnoughClasses(usize),

    #[error("Both `subtract` and `divide` must be provided, but only `{provided}` was given")]
    MissingNormalization { provided: &'static str },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Shape mismatch for `{what}`: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Model file error at line {line}: {message}")]
    ModelFormatError { line: usize, message: String },

    #[error("Reader is in a failed state, reset() it before reading again")]
    ReaderFailed,

    #[error("Machine does not support probability estimates")]
    ProbabilityNotSupported,

    #[error("Training failed: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SVMError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SVMError::ParseError { .. }
            | SVMError::ModelFormatError { .. }
            | SVMError::InvalidModel(_)
            | SVMError::DimensionMismatch { .. }
            | SVMError::ShapeMismatch { .. }
            | SVMError::InvalidDataset(_)
            | SVMError::ReaderFailed => ErrorCategory::MalformedInput,
            SVMError::InvalidParameter(_)
            | SVMError::UnknownMachineType(_)
            | SVMError::UnknownKernelType(_)
            | SVMError::UnsupportedMachineType(_)
            | SVMError::UnsupportedKernelType(_)
            | SVMError::NotEnoughClasses(_)
            | SVMError::MissingNormalization { .. } => ErrorCategory::Configuration,
            SVMError::ProbabilityNotSupported => ErrorCategory::Capability,
            SVMError::TrainingError(_) => ErrorCategory::Solver,
            SVMError::IoError(_) | SVMError::SerializationError(_) => ErrorCategory::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;
