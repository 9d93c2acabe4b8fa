//! Position-Based Fluids Kernel
//!
//! This crate provides the numerical core of a real-time position-based
//! fluids (PBF) simulation. It performs no I/O and owns no rendering state:
//! callers hand in a [`ParticleSet`] once per tick and read it back afterwards.
//!
//! # Modules
//! - [`sph`] -- Poly6, Spiky and cubic spline smoothing kernels behind one trait.
//! - [`neighbor`] -- Fixed-bucket spatial hash and the neighbor search strategies.
//! - [`particle`] -- Particle storage, render records and velocity colouring.
//! - [`parallel`] -- Sequential / thread-pool parallel-for used by every hot loop.
//! - [`solver`] -- The per-tick PBF constraint projection.
//! - [`error`] -- Errors rejected before a tick starts.

#![warn(missing_docs)]

pub mod error;
pub mod neighbor;
pub mod parallel;
pub mod particle;
pub mod solver;
pub mod sph;

pub use error::SolverError;
pub use neighbor::{
    BruteForceSearch, NeighborLists, NeighborPair, NeighborSearch, SpatialHashIndex,
    SpatialHashSearch,
};
pub use parallel::Execution;
pub use particle::{GpuParticle, Particle, ParticleSet, ParticleType};
pub use solver::{FluidSolver, SolverParams, StepMetrics};
pub use sph::{CubicSpline, Kernel, KernelKind, Poly6, SmoothingKernel, Spiky};
