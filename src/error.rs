//! Error types for operator construction and execution.

use thiserror::Error;

/// Everything that can go wrong while configuring or running an operator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpError {
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("operator `{op}` does not accept argument `{key}`")]
    UnknownArgument { op: String, key: String },

    #[error("operator `{op}` requires argument `{key}`")]
    MissingArgument { op: String, key: String },

    #[error("operator `{op}`: invalid value `{value}` for `{key}`: {reason}")]
    InvalidArgument {
        op: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("operator `{op}` takes {expected} inputs, got {found}")]
    InputCount {
        op: String,
        expected: usize,
        found: usize,
    },

    #[error("operator `{op}`: input `{input}` expects shape {expected}, got {found}")]
    ShapeMismatch {
        op: String,
        input: String,
        expected: String,
        found: String,
    },

    #[error("invalid shape {shape}: {reason}")]
    InvalidShape { shape: String, reason: String },

    #[error("operator `{op}` has backward `{expected}`, requested `{requested}`")]
    BackwardMismatch {
        op: String,
        expected: String,
        requested: String,
    },

    #[error("executor used before init()")]
    NotInitialized,

    #[error("backward requested before a forward pass")]
    NotExecuted,

    #[error("operator `{0}` has no backward pass")]
    NoBackward(String),
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, OpError>;
