//! Domain setup: fluid block placement and tank wall generation
//!
//! The tank is a closed box of boundary particles three fluid blocks long in
//! x. The fluid block sits in the first third, against the x = 0 end wall,
//! which is the wall driven by the wave excitation.

use glam::Vec3;
use kernel::{Particle, ParticleSet, SolverError};

use crate::config::SceneConfig;

/// Seeded particles plus the indices of the wave-driven wall.
#[derive(Debug, Clone)]
pub struct SceneLayout {
    /// Fluid particles first, then boundary particles.
    pub particles: ParticleSet,
    /// Boundary particles of the x = 0 end wall.
    pub wave_driven: Vec<u32>,
}

/// Fluid particle mass: 80% of a rest-density cube of edge `2r`.
pub fn fluid_particle_mass(radius: f32, rest_density: f32) -> f32 {
    0.8 * rest_density * 8.0 * radius * radius * radius
}

/// Set up the scene with fluid and boundary particles
///
/// The returned set has capacity for the largest valid grid, so any later
/// re-seed fits the same render buffer.
pub fn setup_particles(config: &SceneConfig) -> Result<SceneLayout, SolverError> {
    let mut particles =
        ParticleSet::new(config.particle_radius, SceneConfig::max_particle_count());
    let mut wave_driven = Vec::new();

    place_fluid_particles(&mut particles, config)?;
    generate_wall_particles(&mut particles, config, &mut wave_driven)?;

    tracing::info!(
        "Scene setup complete: {} fluid particles, {} boundary particles",
        config.fluid_count(),
        config.boundary_count()
    );

    Ok(SceneLayout {
        particles,
        wave_driven,
    })
}

/// Place the fluid block at `(i + 1, j + 1, k + 1) * 2r`, index `i*Y*Z + j*Z + k`
fn place_fluid_particles(particles: &mut ParticleSet, config: &SceneConfig) -> Result<(), SolverError> {
    let spacing = 2.0 * config.particle_radius;
    let mass = fluid_particle_mass(config.particle_radius, config.rest_density);
    let [nx, ny, nz] = config.fluid_grid;

    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let position = Vec3::new((i + 1) as f32, (j + 1) as f32, (k + 1) as f32) * spacing;
                particles.push(Particle::fluid(position, mass))?;
            }
        }
    }
    Ok(())
}

/// Generate the six tank walls, in pairs
fn generate_wall_particles(
    particles: &mut ParticleSet,
    config: &SceneConfig,
    wave_driven: &mut Vec<u32>,
) -> Result<(), SolverError> {
    let spacing = 2.0 * config.particle_radius;
    let [nx, ny, nz] = config.fluid_grid;
    let length = nx * 3;

    let lid = (nz + 1) as f32 * spacing;
    let back = (ny + 1) as f32 * spacing;
    let far_end = (length + 1) as f32 * spacing;

    // Floor and lid
    for i in 0..length {
        for j in 0..ny {
            let (u, v) = ((i + 1) as f32 * spacing, (j + 1) as f32 * spacing);
            particles.push(Particle::boundary(Vec3::new(u, v, 0.0)))?;
            particles.push(Particle::boundary(Vec3::new(u, v, lid)))?;
        }
    }

    // Front and back
    for i in 0..length {
        for j in 0..nz {
            let (u, v) = ((i + 1) as f32 * spacing, (j + 1) as f32 * spacing);
            particles.push(Particle::boundary(Vec3::new(u, 0.0, v)))?;
            particles.push(Particle::boundary(Vec3::new(u, back, v)))?;
        }
    }

    // End walls; the x = 0 one is wave-driven
    for i in 0..ny {
        for j in 0..nz {
            let (u, v) = ((i + 1) as f32 * spacing, (j + 1) as f32 * spacing);
            wave_driven.push(particles.len() as u32);
            particles.push(Particle::boundary(Vec3::new(0.0, u, v)))?;
            particles.push(Particle::boundary(Vec3::new(far_end, u, v)))?;
        }
    }
    Ok(())
}
