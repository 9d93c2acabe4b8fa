//! Per-frame scene driver
//!
//! [`FluidScene`] owns the particle set, the solver and the render buffer.
//! The host calls [`FluidScene::advance`] once per rendered frame with the
//! wall-clock frame time; the scene runs at most one solver tick, synchronously
//! on the calling thread, and refreshes the output buffer.

use kernel::particle::MAX_COLOR_SPEED;
use kernel::{FluidSolver, GpuParticle, ParticleSet, SolverError, StepMetrics};

use crate::config::SceneConfig;
use crate::domain;

/// Peak displacement of the wave-driven wall (meters).
pub const WAVE_AMPLITUDE: f32 = 1.0;

/// Scene state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    /// Ticks run every frame
    Running,
    /// Frames only refresh the render output
    Paused,
}

/// What one call to [`FluidScene::advance`] did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Simulated time step after slow motion, zero when paused
    pub dt: f32,
    /// Whether a solver tick ran
    pub ticked: bool,
    /// Solver metrics of the tick, if one ran
    pub metrics: Option<StepMetrics>,
    /// Number of records in the output buffer
    pub output_len: usize,
}

/// A fluid tank scene driven one frame at a time
pub struct FluidScene {
    config: SceneConfig,
    particles: ParticleSet,
    solver: FluidSolver,
    wave_driven: Vec<u32>,
    wave_phase: f32,
    state: SceneState,
    sim_time: f64,
    frame_count: u64,
    output: Vec<GpuParticle>,
}

impl FluidScene {
    /// Create and seed a scene from a configuration
    pub fn new(config: SceneConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let layout = domain::setup_particles(&config)?;
        let solver = FluidSolver::new(config.solver_params(), layout.particles.capacity());
        let state = if config.animation {
            SceneState::Running
        } else {
            SceneState::Paused
        };

        let mut scene = Self {
            config,
            particles: layout.particles,
            solver,
            wave_driven: layout.wave_driven,
            wave_phase: 0.0,
            state,
            sim_time: 0.0,
            frame_count: 0,
            output: Vec::with_capacity(SceneConfig::max_particle_count()),
        };
        scene.refresh_output();
        Ok(scene)
    }

    /// Discard the current particles and seed a fresh fluid block using the
    /// current configuration (including any grid size changed since).
    pub fn reinitialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.config.validate()?;
        let layout = domain::setup_particles(&self.config)?;
        self.particles = layout.particles;
        self.wave_driven = layout.wave_driven;
        self.wave_phase = 0.0;
        self.sim_time = 0.0;
        self.solver.reset();
        self.refresh_output();
        tracing::info!(
            "Scene '{}' reinitialized: {} particles",
            self.config.name,
            self.particles.len()
        );
        Ok(())
    }

    /// Replace the configuration.
    ///
    /// Solver parameters, visibility, slow motion, wave and animation settings
    /// apply from the next frame. Grid size and radius changes wait for
    /// [`reinitialize`](Self::reinitialize).
    pub fn apply_config(&mut self, config: SceneConfig) -> Result<(), String> {
        config.validate()?;
        if config.fluid_grid != self.config.fluid_grid
            || config.particle_radius != self.config.particle_radius
        {
            tracing::info!(
                "Grid {:?} r={} takes effect on reinitialize",
                config.fluid_grid,
                config.particle_radius
            );
        }
        *self.solver.params_mut() = config.solver_params();
        self.state = if config.animation {
            SceneState::Running
        } else {
            SceneState::Paused
        };
        let visibility_changed = config.show_boundary != self.config.show_boundary;
        self.config = config;
        if visibility_changed {
            self.refresh_output();
        }
        Ok(())
    }

    /// Stop ticking; frames keep refreshing the output
    pub fn pause(&mut self) {
        if self.state == SceneState::Running {
            self.state = SceneState::Paused;
            self.config.animation = false;
        }
    }

    /// Resume ticking
    pub fn resume(&mut self) {
        if self.state == SceneState::Paused {
            self.state = SceneState::Running;
            self.config.animation = true;
        }
    }

    /// Current state
    pub fn state(&self) -> SceneState {
        self.state
    }

    /// True while paused
    pub fn is_paused(&self) -> bool {
        self.state == SceneState::Paused
    }

    /// Show or hide boundary particles in the output
    pub fn set_show_boundary(&mut self, show: bool) {
        self.config.show_boundary = show;
        self.refresh_output();
    }

    /// Advance by one rendered frame of `frame_dt` wall-clock seconds.
    ///
    /// The frame time is clamped to `max_frame_dt` and divided once by the
    /// slow-motion scale. When running, the wave wall is moved and one solver
    /// tick is taken. The output buffer is refreshed either way.
    pub fn advance(&mut self, frame_dt: f32) -> Result<FrameStats, SolverError> {
        if frame_dt.is_nan() || frame_dt < 0.0 {
            return Err(SolverError::InvalidTimestep(frame_dt));
        }
        let mut frame_dt = frame_dt;
        if frame_dt > self.config.max_frame_dt {
            tracing::warn!(
                "Frame time {:.4}s clamped to {:.4}s",
                frame_dt,
                self.config.max_frame_dt
            );
            frame_dt = self.config.max_frame_dt;
        }
        let dt = frame_dt / self.config.timestep_scale();

        let mut metrics = None;
        let running = self.state == SceneState::Running && dt > 0.0;
        if running {
            // Reject before the wave wall moves, so a failed frame changes nothing.
            self.solver.check_step(&self.particles, dt)?;
            if self.config.wave {
                self.drive_wave(dt);
            }
            metrics = Some(self.solver.step(&mut self.particles, dt)?);
            self.sim_time += dt as f64;
        }

        self.particles.colorize_by_speed(MAX_COLOR_SPEED);
        self.refresh_output();
        self.frame_count += 1;

        Ok(FrameStats {
            dt: if running { dt } else { 0.0 },
            ticked: running,
            metrics,
            output_len: self.output.len(),
        })
    }

    fn drive_wave(&mut self, dt: f32) {
        self.wave_phase += dt * self.config.wave_speed;
        let x = (1.0 - self.wave_phase.cos()) / 2.0 * WAVE_AMPLITUDE;
        for &i in &self.wave_driven {
            self.particles[i as usize].position.x = x;
        }
    }

    fn refresh_output(&mut self) {
        self.particles
            .write_records(self.config.show_boundary, &mut self.output);
    }

    /// Render records of the last frame
    pub fn output(&self) -> &[GpuParticle] {
        &self.output
    }

    /// Render records as raw bytes, ready for a buffer upload
    pub fn output_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.output)
    }

    /// Simulation particles
    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    /// Current configuration
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Metrics of the last tick
    pub fn metrics(&self) -> StepMetrics {
        self.solver.metrics()
    }

    /// Simulated seconds since the last (re)initialization
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Frames advanced since creation
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Current wave phase (radians)
    pub fn wave_phase(&self) -> f32 {
        self.wave_phase
    }

    /// Indices of the wave-driven wall particles
    pub fn wave_driven(&self) -> &[u32] {
        &self.wave_driven
    }
}
