//! Scene lifecycle: loading, frame driving, slow motion, wave excitation,
//! boundary visibility and re-seeding.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scene::config::{SceneConfig, MAX_FLUID_SIDE};
use scene::{create_scene, FluidScene, SceneState};

const FRAME: f32 = 1.0 / 60.0;

fn small(grid: [u32; 3]) -> SceneConfig {
    SceneConfig {
        fluid_grid: grid,
        ..SceneConfig::default()
    }
}

fn write_temp_config(tag: &str, json: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("pbf_scene_{}_{}.json", tag, std::process::id()));
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn create_scene_from_file() {
    let path = write_temp_config(
        "load",
        r#"{ "name": "test tank", "fluid_grid": [3, 4, 5], "show_boundary": false }"#,
    );
    let scene = create_scene(path.to_str().unwrap()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(scene.config().name, "test tank");
    assert_eq!(scene.particles().fluid_count(), 60);
    assert_eq!(
        scene.particles().boundary_count(),
        (9 * 4 + 4 * 5 + 5 * 9) * 2
    );
    // Boundary hidden from the very first frame.
    assert_eq!(scene.output().len(), 60);
}

#[test]
fn create_scene_rejects_bad_input() {
    assert!(create_scene("/nonexistent/pbf/scene.json").is_err());

    let path = write_temp_config("invalid", r#"{ "fluid_grid": [3, 3, 3], "viscosity": 2.0 }"#);
    let result = create_scene(path.to_str().unwrap());
    std::fs::remove_file(&path).ok();
    assert!(result.is_err());

    let oversized = small([MAX_FLUID_SIDE + 1, 1, 1]);
    assert!(FluidScene::new(oversized).is_err());
}

#[test]
fn slow_motion_divides_frame_time_once() {
    let mut config = small([2, 2, 2]);
    config.slow_motion_level = 4;
    let mut scene = FluidScene::new(config).unwrap();

    let stats = scene.advance(FRAME).unwrap();
    assert!(stats.ticked);
    assert!((stats.dt - FRAME / 10.0).abs() < 1.0e-9, "dt = {}", stats.dt);
    assert!((scene.sim_time() - (FRAME / 10.0) as f64).abs() < 1.0e-9);
}

#[test]
fn long_frames_are_clamped() {
    let mut scene = FluidScene::new(small([2, 2, 2])).unwrap();
    let stats = scene.advance(2.0).unwrap();
    assert!((stats.dt - 1.0 / 30.0).abs() < 1.0e-7, "dt = {}", stats.dt);
}

#[test]
fn wave_moves_only_the_driven_wall() {
    let mut config = small([2, 2, 2]);
    config.wave = true;
    config.wave_speed = 3.0;
    let mut scene = FluidScene::new(config).unwrap();
    let far_wall_before: Vec<Vec3> = scene
        .particles()
        .iter()
        .filter(|p| !p.is_fluid() && p.position.x > 1.0)
        .map(|p| p.position)
        .collect();

    for _ in 0..10 {
        scene.advance(FRAME).unwrap();
    }

    let phase = 10.0 * FRAME * 3.0;
    assert!((scene.wave_phase() - phase).abs() < 1.0e-5);
    let expected_x = (1.0 - phase.cos()) / 2.0;
    for &i in scene.wave_driven() {
        let x = scene.particles()[i as usize].position.x;
        assert!((x - expected_x).abs() < 1.0e-5, "driven wall at {x}, expected {expected_x}");
    }

    let far_wall_after: Vec<Vec3> = scene
        .particles()
        .iter()
        .filter(|p| !p.is_fluid() && p.position.x > 1.0)
        .map(|p| p.position)
        .collect();
    assert_eq!(far_wall_before, far_wall_after);
}

#[test]
fn paused_scene_freezes_wave_and_particles() {
    let mut config = small([2, 2, 2]);
    config.wave = true;
    config.animation = false;
    let mut scene = FluidScene::new(config).unwrap();
    assert_eq!(scene.state(), SceneState::Paused);

    let before: Vec<Vec3> = scene.particles().iter().map(|p| p.position).collect();
    for _ in 0..5 {
        let stats = scene.advance(FRAME).unwrap();
        assert!(!stats.ticked);
    }
    let after: Vec<Vec3> = scene.particles().iter().map(|p| p.position).collect();
    assert_eq!(before, after);
    assert_eq!(scene.wave_phase(), 0.0);

    scene.resume();
    assert!(scene.advance(FRAME).unwrap().ticked);
}

#[test]
fn boundary_visibility_only_affects_output() {
    let mut scene = FluidScene::new(small([3, 3, 3])).unwrap();
    let total = scene.particles().len();
    assert_eq!(scene.output().len(), total);

    scene.set_show_boundary(false);
    assert_eq!(scene.output().len(), 27);
    let stats = scene.advance(FRAME).unwrap();
    assert_eq!(stats.output_len, 27);
    assert_eq!(scene.particles().len(), total);
    assert_eq!(scene.metrics().boundary_count, total - 27);

    scene.set_show_boundary(true);
    assert_eq!(scene.output().len(), total);
}

#[test]
fn grid_changes_wait_for_reinitialize() {
    let mut scene = FluidScene::new(small([2, 2, 2])).unwrap();
    scene.advance(FRAME).unwrap();

    let mut config = scene.config().clone();
    config.fluid_grid = [4, 3, 2];
    config.viscosity = 0.3;
    scene.apply_config(config).unwrap();
    assert_eq!(scene.particles().fluid_count(), 8);

    scene.reinitialize().unwrap();
    assert_eq!(scene.particles().fluid_count(), 24);
    assert_eq!(scene.output().len(), scene.config().particle_count());
    assert_eq!(scene.sim_time(), 0.0);
    assert!(scene.particles().iter().all(|p| p.velocity == Vec3::ZERO));

    let stats = scene.advance(FRAME).unwrap();
    assert_eq!(stats.metrics.map(|m| m.fluid_count), Some(24));
}

#[test]
fn reinitialize_to_a_smaller_grid_keeps_running() {
    let mut scene = FluidScene::new(small([12, 12, 12])).unwrap();
    scene.advance(FRAME).unwrap();

    let mut config = scene.config().clone();
    config.fluid_grid = [3, 3, 3];
    scene.apply_config(config).unwrap();
    scene.reinitialize().unwrap();

    for _ in 0..3 {
        let stats = scene.advance(FRAME).unwrap();
        assert_eq!(stats.metrics.map(|m| m.fluid_count), Some(27));
    }
    assert_eq!(scene.particles().len(), scene.config().particle_count());
    assert!(scene.particles().iter().all(|p| p.position.is_finite()));
}

#[test]
fn apply_config_rejects_invalid_values() {
    let mut scene = FluidScene::new(small([2, 2, 2])).unwrap();
    let mut config = scene.config().clone();
    config.wave_speed = 9.0;
    assert!(scene.apply_config(config).is_err());
    assert_eq!(scene.config().wave_speed, 1.0);
}

#[test]
fn fluid_stays_inside_the_tank() {
    let mut scene = FluidScene::new(small([3, 3, 3])).unwrap();
    let walls: Vec<Vec3> = scene
        .particles()
        .iter()
        .filter(|p| !p.is_fluid())
        .map(|p| p.position)
        .collect();
    let lo = walls.iter().fold(Vec3::MAX, |m, p| m.min(*p)) - Vec3::splat(0.05);
    let hi = walls.iter().fold(Vec3::MIN, |m, p| m.max(*p)) + Vec3::splat(0.05);

    for frame in 0..30 {
        scene.advance(FRAME).unwrap();
        for (i, p) in scene.particles().iter().enumerate() {
            assert!(p.position.is_finite(), "frame {frame}: particle {i} not finite");
            if p.is_fluid() {
                assert!(
                    p.position.cmpgt(lo).all() && p.position.cmplt(hi).all(),
                    "frame {frame}: fluid particle {i} escaped to {}",
                    p.position
                );
            }
        }
    }
    eprintln!("after 30 frames: {:?}", scene.metrics());
}

#[test]
fn colours_follow_speed() {
    let mut scene = FluidScene::new(small([2, 2, 2])).unwrap();
    for _ in 0..3 {
        scene.advance(FRAME).unwrap();
    }
    for record in scene.output() {
        if record.particle_type == 0 {
            let speed = Vec3::from_array(record.velocity).length();
            let t = (speed / 3.0).min(1.0);
            assert!((record.color[0] - t).abs() < 1.0e-5);
            assert_eq!(record.color[2], 1.0);
        }
    }
}

#[test]
fn jittered_frame_times() {
    let mut config = small([2, 2, 2]);
    config.slow_motion_level = 2;
    let mut scene = FluidScene::new(config).unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    let mut elapsed = 0.0_f64;
    for _ in 0..40 {
        let frame_dt: f32 = rng.random_range(0.0..0.1);
        let stats = scene.advance(frame_dt).unwrap();
        let expected = frame_dt.min(1.0 / 30.0) / 3.0;
        assert!((stats.dt - expected).abs() < 1.0e-7);
        elapsed += stats.dt as f64;
    }
    assert!((scene.sim_time() - elapsed).abs() < 1.0e-9);
    assert_eq!(scene.frame_count(), 40);
    assert!(scene.particles().iter().all(|p| p.position.is_finite()));
}
