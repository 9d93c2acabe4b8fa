//! Error taxonomy for the solver.
//!
//! The kernel performs no I/O, so the only recoverable failures are inputs
//! that would otherwise corrupt a tick half-way through. Both are rejected
//! before any particle state is touched.

use std::fmt;

/// Errors returned by fallible particle-set and solver operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The particle count would exceed the pre-allocated buffer capacity.
    CapacityExceeded {
        /// Number of particles requested.
        requested: usize,
        /// Maximum number of particles the buffers were sized for.
        capacity: usize,
    },
    /// The timestep is zero, negative, or not finite.
    InvalidTimestep(f32),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::CapacityExceeded { requested, capacity } => write!(
                f,
                "particle count {requested} exceeds pre-allocated capacity {capacity}"
            ),
            SolverError::InvalidTimestep(dt) => {
                write!(f, "timestep must be finite and positive, got {dt}")
            }
        }
    }
}

impl std::error::Error for SolverError {}
