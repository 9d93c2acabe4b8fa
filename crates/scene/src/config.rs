//! Configuration parsing and validation for fluid tank scenes

use glam::Vec3;
use kernel::{Execution, KernelKind, SolverParams};
use serde::{Deserialize, Serialize};
use std::fs;

/// Largest allowed fluid block side, in particles.
pub const MAX_FLUID_SIDE: u32 = 40;

/// Slow-motion divisors, indexed by [`SceneConfig::slow_motion_level`].
pub const TIMESTEP_SCALES: [f32; 5] = [1.0, 1.7, 3.0, 5.0, 10.0];

/// Upper bound of the wave speed slider.
pub const MAX_WAVE_SPEED: f32 = 5.0;

/// Upper bound of the XSPH viscosity slider.
pub const MAX_VISCOSITY: f32 = 1.0;

/// Fluid tank scene configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Human-readable scene name
    #[serde(default = "default_name")]
    pub name: String,
    /// Fluid block size in particles along x, y, z
    #[serde(default = "default_fluid_grid")]
    pub fluid_grid: [u32; 3],
    /// Nominal particle radius (meters). Spacing is twice this.
    #[serde(default = "default_particle_radius")]
    pub particle_radius: f32,
    /// Rest density (kg/m^3)
    #[serde(default = "default_rest_density")]
    pub rest_density: f32,
    /// Gravity vector (m/s^2)
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],
    /// Constraint projection iterations per tick
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Run the per-particle passes on the thread pool
    #[serde(default)]
    pub multiprocessing: bool,
    /// XSPH viscosity coefficient, in `[0, 1]`
    #[serde(default)]
    pub viscosity: f32,
    /// Index into [`TIMESTEP_SCALES`]
    #[serde(default)]
    pub slow_motion_level: usize,
    /// Kernel for density sums
    #[serde(default)]
    pub density_kernel: KernelKind,
    /// Kernel for constraint gradients
    #[serde(default = "default_gradient_kernel")]
    pub gradient_kernel: KernelKind,
    /// Drive the x = 0 end wall back and forth
    #[serde(default)]
    pub wave: bool,
    /// Wave phase speed (rad/s), in `[0, 5]`
    #[serde(default = "default_wave_speed")]
    pub wave_speed: f32,
    /// Include boundary particles in the render output
    #[serde(default = "default_true")]
    pub show_boundary: bool,
    /// Advance the simulation (false = paused)
    #[serde(default = "default_true")]
    pub animation: bool,
    /// Longest frame time fed to one tick, before slow motion (seconds)
    #[serde(default = "default_max_frame_dt")]
    pub max_frame_dt: f32,
}

// Default values
fn default_name() -> String {
    "fluid tank".to_string()
}

fn default_fluid_grid() -> [u32; 3] {
    [10, 10, 10]
}

fn default_particle_radius() -> f32 {
    0.1
}

fn default_rest_density() -> f32 {
    kernel::solver::WATER_REST_DENSITY
}

fn default_gravity() -> [f32; 3] {
    kernel::solver::STANDARD_GRAVITY.to_array()
}

fn default_iterations() -> usize {
    kernel::solver::DEFAULT_ITERATIONS
}

fn default_gradient_kernel() -> KernelKind {
    KernelKind::Spiky
}

fn default_wave_speed() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_max_frame_dt() -> f32 {
    1.0 / 30.0
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            fluid_grid: default_fluid_grid(),
            particle_radius: default_particle_radius(),
            rest_density: default_rest_density(),
            gravity: default_gravity(),
            iterations: default_iterations(),
            multiprocessing: false,
            viscosity: 0.0,
            slow_motion_level: 0,
            density_kernel: KernelKind::Poly6,
            gradient_kernel: default_gradient_kernel(),
            wave: false,
            wave_speed: default_wave_speed(),
            show_boundary: true,
            animation: true,
            max_frame_dt: default_max_frame_dt(),
        }
    }
}

impl SceneConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: SceneConfig = serde_json::from_str(json)
            .map_err(|e| format!("Failed to parse config JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (axis, &side) in ["x", "y", "z"].iter().zip(&self.fluid_grid) {
            if side == 0 || side > MAX_FLUID_SIDE {
                return Err(format!(
                    "Fluid grid {} side must be in 1..={}, got {}",
                    axis, MAX_FLUID_SIDE, side
                ));
            }
        }

        if !(self.particle_radius > 0.0 && self.particle_radius.is_finite()) {
            return Err("Particle radius must be positive".to_string());
        }

        if !(self.rest_density > 0.0 && self.rest_density.is_finite()) {
            return Err("Rest density must be positive".to_string());
        }

        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err("Gravity must be finite".to_string());
        }

        if self.iterations == 0 {
            return Err("At least one projection iteration is required".to_string());
        }

        if !(0.0..=MAX_VISCOSITY).contains(&self.viscosity) {
            return Err(format!("Viscosity must be in range [0, {}]", MAX_VISCOSITY));
        }

        if self.slow_motion_level >= TIMESTEP_SCALES.len() {
            return Err(format!(
                "Slow motion level must be below {}, got {}",
                TIMESTEP_SCALES.len(),
                self.slow_motion_level
            ));
        }

        if !(0.0..=MAX_WAVE_SPEED).contains(&self.wave_speed) {
            return Err(format!("Wave speed must be in range [0, {}]", MAX_WAVE_SPEED));
        }

        if !(self.max_frame_dt > 0.0 && self.max_frame_dt.is_finite()) {
            return Err("max_frame_dt must be positive".to_string());
        }

        Ok(())
    }

    /// Slow-motion divisor applied to every frame time
    pub fn timestep_scale(&self) -> f32 {
        TIMESTEP_SCALES[self.slow_motion_level.min(TIMESTEP_SCALES.len() - 1)]
    }

    /// Solver parameters derived from this configuration
    pub fn solver_params(&self) -> SolverParams {
        SolverParams {
            rest_density: self.rest_density,
            gravity: Vec3::from_array(self.gravity),
            iterations: self.iterations,
            viscosity: self.viscosity,
            density_kernel: self.density_kernel,
            gradient_kernel: self.gradient_kernel,
            execution: Execution::from_flag(self.multiprocessing),
            relaxation: 0.0,
        }
    }

    /// Number of fluid particles
    pub fn fluid_count(&self) -> usize {
        let [x, y, z] = self.fluid_grid.map(|s| s as usize);
        x * y * z
    }

    /// Number of wall particles: floor and lid, front and back, two end walls
    pub fn boundary_count(&self) -> usize {
        Self::boundary_count_for(self.fluid_grid)
    }

    /// Total particle count
    pub fn particle_count(&self) -> usize {
        self.fluid_count() + self.boundary_count()
    }

    /// Particle capacity covering every valid grid size
    pub fn max_particle_count() -> usize {
        let side = MAX_FLUID_SIDE as usize;
        side * side * side + Self::boundary_count_for([MAX_FLUID_SIDE; 3])
    }

    fn boundary_count_for(grid: [u32; 3]) -> usize {
        let [x, y, z] = grid.map(|s| s as usize);
        (x * 3 * y + y * z + z * x * 3) * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SceneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fluid_count(), 1000);
        assert_eq!(config.boundary_count(), (300 + 100 + 300) * 2);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = SceneConfig::from_json("{}").unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = SceneConfig::from_json(
            r#"{ "fluid_grid": [4, 5, 6], "density_kernel": "CubicSpline", "wave": true }"#,
        )
        .unwrap();
        assert_eq!(config.fluid_grid, [4, 5, 6]);
        assert_eq!(config.density_kernel, KernelKind::CubicSpline);
        assert_eq!(config.gradient_kernel, KernelKind::Spiky);
        assert!(config.wave);
        assert_eq!(config.particle_count(), 120 + (12 * 5 + 5 * 6 + 6 * 12) * 2);
    }

    #[test]
    fn test_validation_fluid_grid() {
        let mut config = SceneConfig {
            fluid_grid: [0, 10, 10],
            ..SceneConfig::default()
        };
        assert!(config.validate().is_err());

        config.fluid_grid = [MAX_FLUID_SIDE + 1, 10, 10];
        assert!(config.validate().is_err());

        config.fluid_grid = [MAX_FLUID_SIDE, 1, 1];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_sliders() {
        let mut config = SceneConfig {
            viscosity: 1.5,
            ..SceneConfig::default()
        };
        assert!(config.validate().is_err());
        config.viscosity = 1.0;
        assert!(config.validate().is_ok());

        config.wave_speed = -0.1;
        assert!(config.validate().is_err());
        config.wave_speed = 5.0;
        assert!(config.validate().is_ok());

        config.slow_motion_level = TIMESTEP_SCALES.len();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timestep_scale_table() {
        let mut config = SceneConfig::default();
        let scales: Vec<f32> = (0..TIMESTEP_SCALES.len())
            .map(|level| {
                config.slow_motion_level = level;
                config.timestep_scale()
            })
            .collect();
        assert_eq!(scales, vec![1.0, 1.7, 3.0, 5.0, 10.0]);
    }

    #[test]
    fn test_solver_params_follow_config() {
        let config = SceneConfig {
            multiprocessing: true,
            viscosity: 0.25,
            gradient_kernel: KernelKind::CubicSpline,
            ..SceneConfig::default()
        };
        let params = config.solver_params();
        assert_eq!(params.execution, Execution::Parallel);
        assert_eq!(params.viscosity, 0.25);
        assert_eq!(params.gradient_kernel, KernelKind::CubicSpline);
        assert_eq!(params.iterations, 5);
        assert_eq!(params.gravity, Vec3::new(0.0, 0.0, -9.80665));
    }

    #[test]
    fn test_max_particle_count() {
        assert_eq!(SceneConfig::max_particle_count(), 64_000 + 22_400);
    }
}
