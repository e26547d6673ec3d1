//! Unified error type for the volta crates.
//!
//! Structural defects (shape inconsistencies, dangling bus references,
//! unrecognized structure names) are hard errors returned through
//! [`VoltaError`]; degraded-but-usable conditions (blackout grids, zero
//! ratings, near-singular impedances) go through
//! [`crate::diagnostics::Diagnostics`] instead so the caller can decide
//! whether to proceed.

use thiserror::Error;

/// Errors raised by model construction and circuit compilation.
#[derive(Error, Debug)]
pub enum VoltaError {
    /// Positionally aligned arrays or matrix axes disagree in length.
    /// Always indicates a building-stage defect, never recoverable.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// A branch or injection device references a bus index outside the grid.
    #[error("{device} references bus {bus} but the grid has {nbus} buses")]
    UnknownBus {
        device: String,
        bus: usize,
        nbus: usize,
    },

    /// Unrecognized diagnostic-structure name (programmer error).
    #[error("unknown structure '{name}'; supported values: {supported}")]
    UnknownStructure { name: String, supported: String },

    /// Invalid compilation configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic wrapper for external errors.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the workspace.
pub type VoltaResult<T> = Result<T, VoltaError>;

impl VoltaError {
    /// Shorthand for the shape-consistency check used by every assembler.
    pub fn dimension(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        VoltaError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

impl From<anyhow::Error> for VoltaError {
    fn from(err: anyhow::Error) -> Self {
        VoltaError::Other(err.to_string())
    }
}

impl From<String> for VoltaError {
    fn from(s: String) -> Self {
        VoltaError::Other(s)
    }
}

impl From<&str> for VoltaError {
    fn from(s: &str) -> Self {
        VoltaError::Other(s.to_string())
    }
}
