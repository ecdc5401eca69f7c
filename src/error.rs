//! Crate-wide error type.
//!
//! Every fallible operation returns `Result<_, AppError>`. The variant encodes
//! the failure class and maps to the process exit code used by the binary.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Malformed shapes, non-finite values, too few distinct points.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Incompatible method combinations or option values.
    #[error("configuration error: {0}")]
    Config(String),

    /// Solver non-convergence, singular systems, inconsistent regressions.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// File access in the CLI layer.
    #[error("{0}")]
    Io(String),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InvalidInput(_) | AppError::Config(_) => 2,
            AppError::Io(_) => 3,
            AppError::Numerical(_) => 4,
        }
    }
}

/// Fail with `InvalidInput` if any value is NaN or infinite.
pub fn ensure_finite(name: &str, values: &[f64]) -> Result<(), AppError> {
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(AppError::invalid(format!(
            "{name}[{i}] is not finite ({})",
            values[i]
        )));
    }
    Ok(())
}

/// Fail with `InvalidInput` if the two slices differ in length.
pub fn ensure_same_len(a_name: &str, a: usize, b_name: &str, b: usize) -> Result<(), AppError> {
    if a != b {
        return Err(AppError::invalid(format!(
            "{a_name} has {a} values but {b_name} has {b}"
        )));
    }
    Ok(())
}
