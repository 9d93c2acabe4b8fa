//! Headless fluid tank runner
//!
//! Advances a scene for a fixed number of 60 Hz frames without a renderer and
//! logs solver metrics. Useful for profiling and for checking configurations.
//!
//! Usage: `pbf-headless [config.json] [frames]`

use scene::{FluidScene, SceneConfig};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const FRAME_DT: f32 = 1.0 / 60.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pbf_headless=info,scene=info,kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let mut tank = match args.next() {
        Some(path) => scene::create_scene(&path)?,
        None => {
            tracing::info!("No config given, using the default scene");
            FluidScene::new(SceneConfig::default())?
        }
    };
    let frames: u64 = args
        .next()
        .and_then(|f| f.parse().ok())
        .unwrap_or(600);

    tracing::info!(
        "Running {} frames with {} particles ({})",
        frames,
        tank.particles().len(),
        if tank.config().multiprocessing { "parallel" } else { "sequential" }
    );

    let start = Instant::now();
    for frame in 1..=frames {
        let stats = tank.advance(FRAME_DT)?;
        if frame % 60 == 0 {
            if let Some(m) = stats.metrics {
                tracing::info!(
                    "frame {:>5}  t={:.2}s  pairs={}  max_compression={:.4}  mean_compression={:.5}",
                    frame,
                    tank.sim_time(),
                    m.neighbor_pairs,
                    m.max_compression,
                    m.mean_compression
                );
            }
        }
    }
    let elapsed = start.elapsed().as_secs_f64();

    tracing::info!(
        "{} frames in {:.2}s ({:.1} frames/s)",
        frames,
        elapsed,
        frames as f64 / elapsed.max(1e-9)
    );
    Ok(())
}
