//! Two-particle repulsion.
//!
//! Two fluid particles closer than the support radius, at rest, without
//! gravity. One tick must push them apart and lower their density toward the
//! rest density, symmetrically.

use glam::Vec3;
use kernel::{
    FluidSolver, Kernel, KernelKind, Particle, ParticleSet, SmoothingKernel, SolverParams,
};

const RADIUS: f32 = 0.1;
const MASS: f32 = 60.0;
const REST_DENSITY: f32 = 997.0;

/// Density of particle `i` summed over the whole set with the Poly6 kernel.
fn density_of(set: &ParticleSet, i: usize) -> f32 {
    let w = Kernel::new(KernelKind::Poly6, set.support_radius());
    let xi = set[i].position;
    set.iter().map(|p| p.mass * w.weight(xi - p.position)).sum()
}

fn setup() -> ParticleSet {
    let mut set = ParticleSet::new(RADIUS, 2);
    set.push(Particle::fluid(Vec3::new(1.0, 1.0, 1.0), MASS)).unwrap();
    set.push(Particle::fluid(Vec3::new(1.1, 1.0, 1.0), MASS)).unwrap();
    set
}

fn params() -> SolverParams {
    SolverParams {
        gravity: Vec3::ZERO,
        rest_density: REST_DENSITY,
        ..SolverParams::default()
    }
}

#[test]
fn particles_move_apart() {
    let mut set = setup();
    let d0 = set[0].position.distance(set[1].position);
    let rho_before = density_of(&set, 0);

    let mut solver = FluidSolver::new(params(), 2);
    solver.step(&mut set, 0.01).unwrap();

    let d1 = set[0].position.distance(set[1].position);
    let rho_after = density_of(&set, 0);
    eprintln!("separation {d0:.4} -> {d1:.4}, density {rho_before:.1} -> {rho_after:.1}");

    assert!(d1 > d0, "separation should grow: {d0} -> {d1}");
    assert!(rho_after < rho_before, "density should drop: {rho_before} -> {rho_after}");
    assert!(
        (rho_after - REST_DENSITY).abs() < (rho_before - REST_DENSITY).abs(),
        "density should approach rest density: {rho_before} -> {rho_after}"
    );
}

#[test]
fn response_is_symmetric() {
    let mut set = setup();
    let mut solver = FluidSolver::new(params(), 2);
    solver.step(&mut set, 0.01).unwrap();

    let midpoint = 0.5 * (set[0].position + set[1].position);
    assert!(
        (midpoint - Vec3::new(1.05, 1.0, 1.0)).length() < 1.0e-4,
        "midpoint drifted to {midpoint}"
    );
    let momentum = set[0].velocity * MASS + set[1].velocity * MASS;
    assert!(
        momentum.length() < 1.0e-2 * MASS,
        "net momentum should vanish, got {momentum}"
    );
    assert!(set[0].velocity.x < 0.0 && set[1].velocity.x > 0.0);
    assert!(set[0].position.y == 1.0 && set[0].position.z == 1.0);
}

#[test]
fn lambdas_are_non_positive_and_finite() {
    let mut set = setup();
    let mut solver = FluidSolver::new(params(), 2);
    solver.step(&mut set, 0.01).unwrap();

    for (&lambda, &rho) in solver.lambdas().iter().zip(solver.densities()) {
        eprintln!("rho = {rho:.2}, lambda = {lambda:e}");
        assert!(lambda.is_finite());
        assert!(lambda <= 0.0, "lambda must not pull particles together: {lambda}");
    }
    assert!(set.iter().all(|p| p.position.is_finite() && p.velocity.is_finite()));
}
