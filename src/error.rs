// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the collocation engine.

use std::fmt;

/// Result type alias for collocation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Collocation error types.
#[derive(Debug)]
pub enum Error {
    /// Configuration error (missing parameter, bad mode, bad weights)
    Config(String),
    /// Shape mismatch between operators, states, or bound arrays
    Dimension(DimensionError),
    /// NaN/Inf or singular system inside a numeric kernel
    Numeric(NumericError),
    /// Solver terminated at an infeasible point
    Infeasible(ConstraintViolation),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Dimension(e) => write!(f, "Dimension error: {}", e),
            Error::Numeric(e) => write!(f, "Numeric error: {}", e),
            Error::Infeasible(e) => write!(f, "Infeasible: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Dimension(e) => Some(e),
            Error::Numeric(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<DimensionError> for Error {
    fn from(e: DimensionError) -> Self {
        Error::Dimension(e)
    }
}

impl From<NumericError> for Error {
    fn from(e: NumericError) -> Self {
        Error::Numeric(e)
    }
}

impl From<ConstraintViolation> for Error {
    fn from(e: ConstraintViolation) -> Self {
        Error::Infeasible(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Shape mismatches, detected at construction time.
#[derive(Debug)]
pub enum DimensionError {
    /// Operator is not square
    NotSquare { rows: usize, cols: usize },
    /// Two quantities that must agree in size do not
    Mismatch {
        context: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for DimensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionError::NotSquare { rows, cols } => {
                write!(f, "operator must be square, got {} x {}", rows, cols)
            }
            DimensionError::Mismatch {
                context,
                expected,
                actual,
            } => {
                write!(f, "{}: expected {}, got {}", context, expected, actual)
            }
        }
    }
}

impl std::error::Error for DimensionError {}

/// Numeric failures inside a callback or kernel.
#[derive(Debug)]
pub enum NumericError {
    /// NaN or Inf in a buffer
    NonFinite { what: String, index: usize },
    /// Linear solve hit a (near-)singular pivot
    Singular { context: String },
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::NonFinite { what, index } => {
                write!(f, "{} contains NaN/Inf at index {}", what, index)
            }
            NumericError::Singular { context } => {
                write!(f, "singular linear system in {}", context)
            }
        }
    }
}

impl std::error::Error for NumericError {}

/// Terminal infeasibility, surfaced with the achieved infidelity so the
/// caller can judge whether the point is still usable.
#[derive(Debug)]
pub struct ConstraintViolation {
    /// Solver message
    pub message: String,
    /// Terminal infidelity at the returned point
    pub final_infidelity: f64,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (final infidelity {:.3e})",
            self.message, self.final_infidelity
        )
    }
}
