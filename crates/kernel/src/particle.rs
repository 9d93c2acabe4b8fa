//! Particle storage.
//!
//! Particles are stored array-of-structs: the solver touches every field of a
//! particle together and the render buffer is produced in one linear pass.
//! Per-tick scratch data (density, lambda, deltas, neighbor lists) lives in
//! the solver, in arrays keyed by the same index as [`ParticleSet`].

use std::ops::{Index, IndexMut};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::SolverError;

/// Support radius as a multiple of the nominal particle radius.
pub const SUPPORT_RADIUS_FACTOR: f32 = 4.0;

/// Speed at which the fluid colour ramp saturates (m/s).
pub const MAX_COLOR_SPEED: f32 = 3.0;

/// Wall colour (dark brown).
pub const BOUNDARY_COLOR: Vec3 = Vec3::new(101.0 / 255.0, 67.0 / 255.0, 33.0 / 255.0);

/// Particle role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ParticleType {
    /// Advected fluid particle.
    Fluid = 0,
    /// Wall particle. Never integrated under gravity; its mass is recomputed
    /// every tick from its boundary neighbourhood.
    Boundary = 1,
}

/// A single simulation particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Position (m).
    pub position: Vec3,
    /// Velocity (m/s).
    pub velocity: Vec3,
    /// Mass (kg).
    pub mass: f32,
    /// Fluid or boundary.
    pub particle_type: ParticleType,
    /// Display colour in `[0, 1]^3`. Not read by the solver.
    pub color: Vec3,
}

impl Particle {
    /// A fluid particle at rest.
    pub fn fluid(position: Vec3, mass: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            mass,
            particle_type: ParticleType::Fluid,
            color: Vec3::new(0.0, 0.0, 1.0),
        }
    }

    /// A boundary particle. Its mass is filled in by the solver.
    pub fn boundary(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            mass: 0.0,
            particle_type: ParticleType::Boundary,
            color: BOUNDARY_COLOR,
        }
    }

    /// True for fluid particles.
    #[inline]
    pub fn is_fluid(&self) -> bool {
        self.particle_type == ParticleType::Fluid
    }
}

/// Render record, laid out for direct upload as a storage/vertex buffer.
///
/// 48 bytes, 16-byte aligned fields:
/// `position.xyz, type | velocity.xyz, mass | color.xyz, pad`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuParticle {
    /// Position.
    pub position: [f32; 3],
    /// `ParticleType` discriminant.
    pub particle_type: u32,
    /// Velocity.
    pub velocity: [f32; 3],
    /// Mass.
    pub mass: f32,
    /// Display colour.
    pub color: [f32; 3],
    /// Padding to 48 bytes.
    pub _pad: f32,
}

impl From<&Particle> for GpuParticle {
    fn from(p: &Particle) -> Self {
        Self {
            position: p.position.to_array(),
            particle_type: p.particle_type as u32,
            velocity: p.velocity.to_array(),
            mass: p.mass,
            color: p.color.to_array(),
            _pad: 0.0,
        }
    }
}

/// Index-stable particle array with a fixed maximum capacity and a nominal
/// particle radius.
#[derive(Debug, Clone)]
pub struct ParticleSet {
    particles: Vec<Particle>,
    radius: f32,
    capacity: usize,
}

impl ParticleSet {
    /// Create an empty set able to hold up to `capacity` particles.
    pub fn new(radius: f32, capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            radius,
            capacity,
        }
    }

    /// Create a set from existing particles.
    pub fn from_particles(
        particles: Vec<Particle>,
        radius: f32,
        capacity: usize,
    ) -> Result<Self, SolverError> {
        if particles.len() > capacity {
            return Err(SolverError::CapacityExceeded {
                requested: particles.len(),
                capacity,
            });
        }
        let mut set = Self::new(radius, capacity);
        set.particles.extend(particles);
        Ok(set)
    }

    /// Append a particle, failing if the set is full.
    pub fn push(&mut self, particle: Particle) -> Result<(), SolverError> {
        if self.particles.len() >= self.capacity {
            return Err(SolverError::CapacityExceeded {
                requested: self.particles.len() + 1,
                capacity: self.capacity,
            });
        }
        self.particles.push(particle);
        Ok(())
    }

    /// Grow or shrink to `len` particles, filling new slots with `fill`.
    /// Fails without changing the set if `len` exceeds the capacity.
    pub fn resize(&mut self, len: usize, fill: Particle) -> Result<(), SolverError> {
        if len > self.capacity {
            return Err(SolverError::CapacityExceeded {
                requested: len,
                capacity: self.capacity,
            });
        }
        self.particles.resize(len, fill);
        Ok(())
    }

    /// Remove every particle. Capacity and radius are kept.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Fail if the current count is over capacity.
    pub fn check_capacity(&self) -> Result<(), SolverError> {
        if self.particles.len() > self.capacity {
            return Err(SolverError::CapacityExceeded {
                requested: self.particles.len(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// True if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Maximum number of particles.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Nominal particle radius (m).
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Change the nominal radius. Takes effect on the next tick.
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
    }

    /// Kernel support radius `h = 4 r` derived from the nominal radius.
    pub fn support_radius(&self) -> f32 {
        SUPPORT_RADIUS_FACTOR * self.radius
    }

    /// Read-only view of all particles.
    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable view of all particles. The count cannot change through it.
    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Iterate over particles in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    /// Number of fluid particles.
    pub fn fluid_count(&self) -> usize {
        self.particles.iter().filter(|p| p.is_fluid()).count()
    }

    /// Number of boundary particles.
    pub fn boundary_count(&self) -> usize {
        self.len() - self.fluid_count()
    }

    /// Recolour fluid particles from their speed: `(t, t, 1)` with
    /// `t = min(|v| / max_speed, 1)`. Boundary particles keep the wall colour.
    pub fn colorize_by_speed(&mut self, max_speed: f32) {
        for p in &mut self.particles {
            p.color = if p.is_fluid() {
                let t = (p.velocity.length() / max_speed).min(1.0);
                Vec3::new(t, t, 1.0)
            } else {
                BOUNDARY_COLOR
            };
        }
    }

    /// Refill `out` with render records, optionally omitting boundary particles.
    pub fn write_records(&self, include_boundary: bool, out: &mut Vec<GpuParticle>) {
        out.clear();
        out.extend(
            self.particles
                .iter()
                .filter(|p| include_boundary || p.is_fluid())
                .map(GpuParticle::from),
        );
    }

    /// Render records as a fresh vector.
    pub fn to_records(&self, include_boundary: bool) -> Vec<GpuParticle> {
        let mut out = Vec::with_capacity(self.len());
        self.write_records(include_boundary, &mut out);
        out
    }
}

impl Index<usize> for ParticleSet {
    type Output = Particle;

    fn index(&self, i: usize) -> &Particle {
        &self.particles[i]
    }
}

impl IndexMut<usize> for ParticleSet {
    fn index_mut(&mut self, i: usize) -> &mut Particle {
        &mut self.particles[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_record_is_48_bytes() {
        assert_eq!(std::mem::size_of::<GpuParticle>(), 48);
        let records = [GpuParticle::from(&Particle::fluid(Vec3::ONE, 2.0))];
        assert_eq!(bytemuck::cast_slice::<GpuParticle, u8>(&records).len(), 48);
    }

    #[test]
    fn push_past_capacity_fails() {
        let mut set = ParticleSet::new(0.1, 2);
        set.push(Particle::fluid(Vec3::ZERO, 1.0)).unwrap();
        set.push(Particle::boundary(Vec3::X)).unwrap();
        let err = set.push(Particle::fluid(Vec3::Y, 1.0)).unwrap_err();
        assert_eq!(err, SolverError::CapacityExceeded { requested: 3, capacity: 2 });
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn resize_respects_capacity() {
        let mut set = ParticleSet::new(0.1, 4);
        set.push(Particle::boundary(Vec3::X)).unwrap();
        set.resize(3, Particle::fluid(Vec3::ONE, 2.0)).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.fluid_count(), 2);
        assert_eq!(set[2].position, Vec3::ONE);

        let err = set.resize(5, Particle::fluid(Vec3::ZERO, 1.0)).unwrap_err();
        assert_eq!(err, SolverError::CapacityExceeded { requested: 5, capacity: 4 });
        assert_eq!(set.len(), 3);

        set.resize(1, Particle::fluid(Vec3::ZERO, 1.0)).unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set[0].is_fluid());
    }

    #[test]
    fn from_particles_rejects_oversized_input() {
        let particles = vec![Particle::fluid(Vec3::ZERO, 1.0); 5];
        assert!(ParticleSet::from_particles(particles, 0.1, 4).is_err());
    }

    #[test]
    fn counts_by_type() {
        let mut set = ParticleSet::new(0.1, 8);
        for i in 0..3 {
            set.push(Particle::fluid(Vec3::splat(i as f32), 1.0)).unwrap();
        }
        set.push(Particle::boundary(Vec3::ZERO)).unwrap();
        assert_eq!(set.fluid_count(), 3);
        assert_eq!(set.boundary_count(), 1);
        assert!((set.support_radius() - 0.4).abs() < 1.0e-6);
    }

    #[test]
    fn colour_ramp_saturates() {
        let mut set = ParticleSet::new(0.1, 4);
        let mut slow = Particle::fluid(Vec3::ZERO, 1.0);
        slow.velocity = Vec3::new(1.5, 0.0, 0.0);
        let mut fast = Particle::fluid(Vec3::ZERO, 1.0);
        fast.velocity = Vec3::new(0.0, 0.0, -10.0);
        let mut wall = Particle::boundary(Vec3::ZERO);
        wall.velocity = Vec3::splat(5.0);
        set.push(slow).unwrap();
        set.push(fast).unwrap();
        set.push(wall).unwrap();

        set.colorize_by_speed(MAX_COLOR_SPEED);

        assert!((set[0].color - Vec3::new(0.5, 0.5, 1.0)).length() < 1.0e-6);
        assert_eq!(set[1].color, Vec3::ONE);
        assert_eq!(set[2].color, BOUNDARY_COLOR);
    }

    #[test]
    fn records_can_hide_boundary() {
        let mut set = ParticleSet::new(0.1, 4);
        set.push(Particle::boundary(Vec3::ZERO)).unwrap();
        set.push(Particle::fluid(Vec3::ONE, 3.0)).unwrap();

        assert_eq!(set.to_records(true).len(), 2);
        let fluid_only = set.to_records(false);
        assert_eq!(fluid_only.len(), 1);
        assert_eq!(fluid_only[0].position, [1.0, 1.0, 1.0]);
        assert_eq!(fluid_only[0].particle_type, ParticleType::Fluid as u32);
        assert_eq!(fluid_only[0].mass, 3.0);
    }
}
