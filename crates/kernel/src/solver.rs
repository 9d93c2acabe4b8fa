//! Position-based fluids solver.
//!
//! One call to [`FluidSolver::step`] advances a [`ParticleSet`] by one tick:
//!
//! 1. Predict: save positions, integrate gravity into fluid velocities and
//!    velocities into fluid positions.
//! 2. Neighbor search at the predicted positions, `h = 4 * radius`. The lists
//!    are reused by every projection iteration of the tick.
//! 3. Partition indices into fluid and boundary lists.
//! 4. Boundary mass: `m_b = rho0 / (W(0) + sum_{boundary j} W(x_b - x_j))`.
//! 5. Constraint projection, `iterations` times: density, lambda, position
//!    delta, apply. Each pass reads only the previous pass's output, so all
//!    deltas of an iteration are computed from the same positions (Jacobi).
//! 6. Velocity from net displacement: `v = (x - x_saved) / dt`.
//! 7. XSPH viscosity against a snapshot of the reconciled velocities.
//!
//! All per-tick scratch data is owned here and resized at the top of each
//! tick, keyed by particle index (or by position in the fluid/boundary list).

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::SolverError;
use crate::neighbor::{NeighborLists, NeighborSearch, SpatialHashSearch};
use crate::parallel::{self, Execution};
use crate::particle::{Particle, ParticleSet};
use crate::sph::{Kernel, KernelKind, SmoothingKernel};

/// Rest density of water (kg/m^3).
pub const WATER_REST_DENSITY: f32 = 997.0;

/// Standard gravity along -z (m/s^2).
pub const STANDARD_GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -9.80665);

/// Number of constraint projection iterations per tick.
pub const DEFAULT_ITERATIONS: usize = 5;

/// Tunable solver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Rest density `rho0` (kg/m^3).
    pub rest_density: f32,
    /// Gravitational acceleration (m/s^2).
    pub gravity: Vec3,
    /// Projection iterations per tick.
    pub iterations: usize,
    /// XSPH coefficient. Zero disables the viscosity pass.
    pub viscosity: f32,
    /// Kernel for density, boundary mass and viscosity weights.
    pub density_kernel: KernelKind,
    /// Kernel for constraint gradients.
    pub gradient_kernel: KernelKind,
    /// Sequential or thread-pool execution of the per-particle passes.
    pub execution: Execution,
    /// Constant added to the lambda denominator (constraint-force mixing).
    pub relaxation: f32,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            rest_density: WATER_REST_DENSITY,
            gravity: STANDARD_GRAVITY,
            iterations: DEFAULT_ITERATIONS,
            viscosity: 0.0,
            density_kernel: KernelKind::Poly6,
            gradient_kernel: KernelKind::Spiky,
            execution: Execution::Sequential,
            relaxation: 0.0,
        }
    }
}

/// Summary of the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepMetrics {
    /// Fluid particles advanced.
    pub fluid_count: usize,
    /// Boundary particles whose mass was refreshed.
    pub boundary_count: usize,
    /// Directed neighbor pairs found by the search.
    pub neighbor_pairs: usize,
    /// Largest `max(rho / rho0 - 1, 0)` in the last projection iteration.
    pub max_compression: f32,
    /// Mean of `max(rho / rho0 - 1, 0)` over fluid particles in the last
    /// projection iteration.
    pub mean_compression: f32,
}

/// Position-based fluids solver with solver-owned scratch arenas.
pub struct FluidSolver<S: NeighborSearch = SpatialHashSearch> {
    params: SolverParams,
    search: S,
    max_particles: usize,
    ticks: u64,

    // ---- Indexed by particle ----
    saved_positions: Vec<Vec3>,
    predicted: Vec<Vec3>,
    velocity_snapshot: Vec<Vec3>,
    neighbors: NeighborLists,
    fluid_slot: Vec<Option<u32>>,

    // ---- Indexed by fluid / boundary list position ----
    fluid: Vec<u32>,
    boundary: Vec<u32>,
    density: Vec<f32>,
    lambda: Vec<f32>,
    delta: Vec<Vec3>,
    boundary_mass: Vec<f32>,

    metrics: StepMetrics,
}

impl FluidSolver<SpatialHashSearch> {
    /// Solver using the spatial-hash search, with arenas reserved for
    /// `max_particles` particles.
    pub fn new(params: SolverParams, max_particles: usize) -> Self {
        Self::with_search(params, max_particles, SpatialHashSearch::new())
    }
}

impl<S: NeighborSearch> FluidSolver<S> {
    /// Solver using a custom neighbor search strategy.
    pub fn with_search(params: SolverParams, max_particles: usize, search: S) -> Self {
        Self {
            params,
            search,
            max_particles,
            ticks: 0,
            saved_positions: Vec::with_capacity(max_particles),
            predicted: Vec::with_capacity(max_particles),
            velocity_snapshot: Vec::with_capacity(max_particles),
            neighbors: NeighborLists::new(),
            fluid_slot: Vec::with_capacity(max_particles),
            fluid: Vec::with_capacity(max_particles),
            boundary: Vec::new(),
            density: Vec::with_capacity(max_particles),
            lambda: Vec::with_capacity(max_particles),
            delta: Vec::with_capacity(max_particles),
            boundary_mass: Vec::new(),
            metrics: StepMetrics::default(),
        }
    }

    /// Current parameters.
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Mutable parameters. Changes apply from the next tick.
    pub fn params_mut(&mut self) -> &mut SolverParams {
        &mut self.params
    }

    /// Maximum particle count accepted by [`step`](Self::step).
    pub fn max_particles(&self) -> usize {
        self.max_particles
    }

    /// Ticks completed since construction or the last [`reset`](Self::reset).
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Metrics of the last tick.
    pub fn metrics(&self) -> StepMetrics {
        self.metrics
    }

    /// Neighbor lists of the last tick (at predicted positions).
    pub fn neighbor_lists(&self) -> &NeighborLists {
        &self.neighbors
    }

    /// Fluid particle indices of the last tick.
    pub fn fluid_indices(&self) -> &[u32] {
        &self.fluid
    }

    /// Boundary particle indices of the last tick.
    pub fn boundary_indices(&self) -> &[u32] {
        &self.boundary
    }

    /// Densities of the last projection iteration, parallel to
    /// [`fluid_indices`](Self::fluid_indices).
    pub fn densities(&self) -> &[f32] {
        &self.density
    }

    /// Lambdas of the last projection iteration, parallel to
    /// [`fluid_indices`](Self::fluid_indices).
    pub fn lambdas(&self) -> &[f32] {
        &self.lambda
    }

    /// Drop all per-tick state, e.g. after the scene was re-seeded.
    pub fn reset(&mut self) {
        self.saved_positions.clear();
        self.predicted.clear();
        self.velocity_snapshot.clear();
        self.neighbors.resize(0);
        self.fluid_slot.clear();
        self.fluid.clear();
        self.boundary.clear();
        self.density.clear();
        self.lambda.clear();
        self.delta.clear();
        self.boundary_mass.clear();
        self.metrics = StepMetrics::default();
        self.ticks = 0;
    }

    /// The checks [`step`](Self::step) makes before touching any particle.
    pub fn check_step(&self, particles: &ParticleSet, dt: f32) -> Result<(), SolverError> {
        particles.check_capacity()?;
        if particles.len() > self.max_particles {
            return Err(SolverError::CapacityExceeded {
                requested: particles.len(),
                capacity: self.max_particles,
            });
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SolverError::InvalidTimestep(dt));
        }
        Ok(())
    }

    /// Advance `particles` by `dt` seconds.
    ///
    /// Fails without touching any particle if the set is larger than the
    /// solver's capacity or `dt` is not a positive finite number.
    pub fn step(&mut self, particles: &mut ParticleSet, dt: f32) -> Result<StepMetrics, SolverError> {
        self.check_step(particles, dt)?;

        let params = self.params;
        let execution = params.execution;
        let h = particles.support_radius();
        let w = Kernel::new(params.density_kernel, h);
        let grad_w = Kernel::new(params.gradient_kernel, h);

        // ---- 1. Predict ----
        self.saved_positions.clear();
        self.saved_positions.extend(particles.iter().map(|p| p.position));
        let gravity_dv = params.gravity * dt;
        parallel::for_each_mut(execution, particles.as_mut_slice(), |_, p| {
            if p.is_fluid() {
                p.velocity += gravity_dv;
                p.position += p.velocity * dt;
            }
        });

        // ---- 2. Neighbor search ----
        self.predicted.clear();
        self.predicted.extend(particles.iter().map(|p| p.position));
        self.search
            .compute_neighbors(&self.predicted, h, execution, &mut self.neighbors);

        // ---- 3. Partition ----
        self.partition(particles.as_slice());

        // ---- 4. Boundary mass ----
        self.update_boundary_mass(particles, &w);

        // ---- 5. Constraint projection ----
        for _ in 0..params.iterations {
            self.project(particles, &w, &grad_w);
        }

        // ---- 6. Velocity from displacement ----
        let saved = &self.saved_positions;
        let inv_dt = 1.0 / dt;
        parallel::for_each_mut(execution, particles.as_mut_slice(), |i, p| {
            if p.is_fluid() {
                p.velocity = (p.position - saved[i]) * inv_dt;
            }
        });

        // ---- 7. XSPH viscosity ----
        if params.viscosity > 0.0 {
            self.apply_viscosity(particles, &w);
        }

        self.metrics = self.compute_metrics();
        self.ticks += 1;
        if self.ticks % 100 == 0 {
            tracing::debug!(
                tick = self.ticks,
                fluid = self.metrics.fluid_count,
                pairs = self.metrics.neighbor_pairs,
                max_compression = self.metrics.max_compression,
                "pbf tick"
            );
        }
        Ok(self.metrics)
    }

    fn partition(&mut self, particles: &[Particle]) {
        let n = particles.len();
        self.fluid.clear();
        self.boundary.clear();
        self.fluid_slot.clear();
        self.fluid_slot.resize(n, None);
        for (i, p) in particles.iter().enumerate() {
            if p.is_fluid() {
                self.fluid_slot[i] = Some(self.fluid.len() as u32);
                self.fluid.push(i as u32);
            } else {
                self.boundary.push(i as u32);
            }
        }

        let nf = self.fluid.len();
        self.density.clear();
        self.density.resize(nf, 0.0);
        self.lambda.clear();
        self.lambda.resize(nf, 0.0);
        self.delta.clear();
        self.delta.resize(nf, Vec3::ZERO);
        self.boundary_mass.clear();
        self.boundary_mass.resize(self.boundary.len(), 0.0);
    }

    fn update_boundary_mass(&mut self, particles: &mut ParticleSet, w: &Kernel) {
        let rest_density = self.params.rest_density;
        let ps = particles.as_slice();
        let boundary = &self.boundary;
        let neighbors = &self.neighbors;
        let self_weight = w.self_weight();

        parallel::for_each_mut(self.params.execution, &mut self.boundary_mass, |k, mass| {
            let b = boundary[k] as usize;
            let xb = ps[b].position;
            let mut number_density = self_weight;
            for &j in neighbors.get(b) {
                let pj = &ps[j as usize];
                if !pj.is_fluid() {
                    number_density += w.weight(xb - pj.position);
                }
            }
            *mass = rest_density / number_density;
        });

        for (k, &b) in self.boundary.iter().enumerate() {
            particles[b as usize].mass = self.boundary_mass[k];
        }
    }

    /// One Jacobi projection iteration.
    fn project(&mut self, particles: &mut ParticleSet, w: &Kernel, grad_w: &Kernel) {
        let execution = self.params.execution;
        let rest_density = self.params.rest_density;
        let inv_rest = 1.0 / rest_density;
        let relaxation = self.params.relaxation;
        let fluid = &self.fluid;
        let fluid_slot = &self.fluid_slot;
        let neighbors = &self.neighbors;

        {
            let ps = particles.as_slice();

            // ---- a. Density ----
            let self_weight = w.self_weight();
            parallel::for_each_mut(execution, &mut self.density, |k, rho| {
                let i = fluid[k] as usize;
                let xi = ps[i].position;
                let mut sum = ps[i].mass * self_weight;
                for &j in neighbors.get(i) {
                    let pj = &ps[j as usize];
                    sum += pj.mass * w.weight(xi - pj.position);
                }
                *rho = sum;
            });

            // ---- b. Lambda ----
            let density = &self.density;
            parallel::for_each_mut(execution, &mut self.lambda, |k, lambda| {
                let constraint = (density[k] * inv_rest - 1.0).max(0.0);
                if constraint == 0.0 {
                    *lambda = 0.0;
                    return;
                }
                let i = fluid[k] as usize;
                let xi = ps[i].position;
                let mut grad_self = Vec3::ZERO;
                let mut denom = 0.0_f32;
                for &j in neighbors.get(i) {
                    let pj = &ps[j as usize];
                    let g = grad_w.gradient(xi - pj.position) * (pj.mass * inv_rest);
                    grad_self += g;
                    if pj.is_fluid() {
                        denom += g.length_squared();
                    }
                }
                let denom = denom + grad_self.length_squared() + relaxation;
                *lambda = if denom > 0.0 { -constraint / denom } else { 0.0 };
            });

            // ---- c. Position delta ----
            let lambdas = &self.lambda;
            parallel::for_each_mut(execution, &mut self.delta, |k, delta| {
                let i = fluid[k] as usize;
                let xi = ps[i].position;
                let lambda_i = lambdas[k];
                let mut sum = Vec3::ZERO;
                for &j in neighbors.get(i) {
                    let j = j as usize;
                    let pj = &ps[j];
                    let lambda_sum = match fluid_slot[j] {
                        Some(slot) => lambda_i + lambdas[slot as usize],
                        None => lambda_i,
                    };
                    sum += grad_w.gradient(xi - pj.position) * (lambda_sum * pj.mass);
                }
                *delta = sum * inv_rest;
            });
        }

        // ---- d. Apply ----
        let deltas = &self.delta;
        parallel::for_each_mut(execution, particles.as_mut_slice(), |i, p| {
            if let Some(slot) = fluid_slot[i] {
                p.position += deltas[slot as usize];
            }
        });
    }

    fn apply_viscosity(&mut self, particles: &mut ParticleSet, w: &Kernel) {
        let execution = self.params.execution;
        let viscosity = self.params.viscosity;
        let fluid = &self.fluid;
        let fluid_slot = &self.fluid_slot;
        let neighbors = &self.neighbors;
        let density = &self.density;

        self.velocity_snapshot.clear();
        self.velocity_snapshot
            .extend(particles.iter().map(|p| p.velocity));
        let velocities = &self.velocity_snapshot;

        {
            let ps = particles.as_slice();
            parallel::for_each_mut(execution, &mut self.delta, |k, dv| {
                let i = fluid[k] as usize;
                let xi = ps[i].position;
                let vi = velocities[i];
                let mut sum = Vec3::ZERO;
                for &j in neighbors.get(i) {
                    let j = j as usize;
                    let Some(slot) = fluid_slot[j] else { continue };
                    let rho_j = density[slot as usize];
                    if rho_j <= 0.0 {
                        continue;
                    }
                    let weight = w.weight(xi - ps[j].position);
                    sum += (vi - velocities[j]) * (ps[j].mass / rho_j * weight);
                }
                *dv = sum * viscosity;
            });
        }

        let corrections = &self.delta;
        parallel::for_each_mut(execution, particles.as_mut_slice(), |i, p| {
            if let Some(slot) = fluid_slot[i] {
                p.velocity -= corrections[slot as usize];
            }
        });
    }

    fn compute_metrics(&self) -> StepMetrics {
        let inv_rest = 1.0 / self.params.rest_density;
        let mut max_compression = 0.0_f32;
        let mut total = 0.0_f64;
        for &rho in &self.density {
            let c = (rho * inv_rest - 1.0).max(0.0);
            max_compression = max_compression.max(c);
            total += c as f64;
        }
        let mean_compression = if self.density.is_empty() {
            0.0
        } else {
            (total / self.density.len() as f64) as f32
        };
        StepMetrics {
            fluid_count: self.fluid.len(),
            boundary_count: self.boundary.len(),
            neighbor_pairs: self.neighbors.pair_count(),
            max_compression,
            mean_compression,
        }
    }
}
