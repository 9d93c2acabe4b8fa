//! Fluid Tank Scene
//!
//! This crate drives the position-based fluids kernel as an interactive scene:
//! - Scene configuration (grid size, kernels, viscosity, slow motion, wave)
//! - Fluid block and tank wall seeding
//! - Per-frame driving with pause, slow motion and wave excitation
//! - The render output buffer, with optional boundary hiding

#![warn(missing_docs)]

pub mod config;
pub mod domain;
pub mod runner;

pub use config::SceneConfig;
pub use runner::{FluidScene, FrameStats, SceneState};

/// Create a complete scene from a configuration file
///
/// This function performs the full scene setup pipeline:
/// 1. Load and validate the configuration
/// 2. Seed the fluid block and the tank walls
/// 3. Create the solver with arenas sized for the largest grid
///
/// # Arguments
/// * `config_path` - Path to the JSON configuration file
///
/// # Returns
/// A `FluidScene` ready to be advanced, or an error if setup fails
///
/// # Example
/// ```no_run
/// use scene::create_scene;
///
/// let mut scene = create_scene("config/wave_tank.json")?;
/// scene.advance(1.0 / 60.0)?;
/// let bytes = scene.output_bytes();
/// # let _ = bytes;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_scene(config_path: &str) -> Result<FluidScene, Box<dyn std::error::Error>> {
    tracing::info!("Creating scene from config: {}", config_path);

    let config = SceneConfig::load(config_path)?;
    tracing::info!(
        "Configuration loaded: {} ({}x{}x{} fluid)",
        config.name,
        config.fluid_grid[0],
        config.fluid_grid[1],
        config.fluid_grid[2]
    );

    let scene = FluidScene::new(config)?;
    tracing::info!(
        "Scene ready: {} fluid, {} boundary particles",
        scene.particles().fluid_count(),
        scene.particles().boundary_count()
    );
    Ok(scene)
}
