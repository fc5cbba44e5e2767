//! Seeding and advection through the simulation context.

use eigenfluid::{BasisFlags, Disk, Simulation, SimulationConfig};
use glam::{IVec2, Vec2};

fn test_config() -> SimulationConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut config = SimulationConfig::default();
    config.template_res = 48;
    config.integral_res = 16;
    config.particle_substeps = 1;
    config
}

#[test]
fn seeding_fills_the_configured_disk() {
    let mut sim = Simulation::new(test_config()).unwrap();
    sim.seed_particles();
    assert_eq!(sim.particles.len(), sim.config.seed_count);

    let center = Vec2::new(sim.config.seed_center_x, sim.config.seed_center_y);
    for &p in &sim.particles.positions {
        assert!(
            p.distance(center) <= sim.config.seed_radius + 1e-6,
            "seed {p} outside the seeding disk"
        );
    }
}

#[test]
fn seeding_skips_samples_inside_obstacles() {
    let mut config = test_config();
    config.seed_radius = 0.25;
    let mut sim = Simulation::new(config).unwrap();
    // disk covering most of the seeding area; samples inside are dropped
    sim.add_obstacle(Box::new(Disk {
        center: Vec2::ZERO,
        radius: 0.2,
    }));
    sim.seed_particles();

    assert!(
        sim.particles.len() < sim.config.seed_count,
        "skipped samples are not retried"
    );
    for &p in &sim.particles.positions {
        assert!(p.length() >= 0.2 - 1e-6, "seed {p} landed inside the obstacle");
    }
}

#[test]
fn particle_buffer_wraps_after_max_seed_groups() {
    let mut config = test_config();
    config.seed_count = 4;
    config.max_seed_groups = 2;
    let mut sim = Simulation::new(config).unwrap();

    sim.seed_particles();
    sim.seed_particles();
    assert_eq!(sim.particles.len(), 8);
    assert!(!sim.particles.looped());

    sim.seed_particles();
    assert_eq!(sim.particles.len(), 8, "capacity is fixed");
    assert!(sim.particles.looped(), "third group recycles the oldest slots");
}

#[test]
fn single_basis_advects_particle_along_template_velocity() {
    let mut sim = Simulation::new(test_config()).unwrap();
    let i = sim
        .add_basis(IVec2::new(0, 0), Vec2::ZERO, BasisFlags::INTERIOR)
        .unwrap();
    // pure boundary weight: the velocity is exactly the template sample
    sim.basis_mut(i).coeff = 0.0;
    sim.basis_mut(i).coeff_boundary = 1.0;

    let start = Vec2::new(0.1, 0.0);
    sim.particles.seed(start);
    let expected_v = sim.templates().evaluate(start, IVec2::new(0, 0), Vec2::ZERO);
    assert!(expected_v.length() > 1e-3, "sample point must see real flow");

    let dt = 0.01;
    sim.step(dt);

    let moved = sim.particles.positions[0];
    assert!(
        (moved - (start + dt * expected_v)).length() < 1e-6,
        "one substep of forward Euler along the basis velocity"
    );
    assert!((sim.particles.ages[0] - dt).abs() < 1e-6);
}

#[test]
fn particle_outside_every_support_stays_put() {
    let mut sim = Simulation::new(test_config()).unwrap();
    let i = sim
        .add_basis(IVec2::new(0, 0), Vec2::ZERO, BasisFlags::INTERIOR)
        .unwrap();
    sim.basis_mut(i).coeff = 1.0;
    sim.basis_mut(i).coeff_boundary = 1.0;

    let start = Vec2::new(0.8, 0.8); // outside the [-0.5, 0.5]^2 support
    sim.particles.seed(start);
    sim.step(0.01);
    assert_eq!(sim.particles.positions[0], start);
}

#[test]
fn obstacle_projection_pushes_particles_to_the_surface() {
    let mut sim = Simulation::new(test_config()).unwrap();
    sim.add_obstacle(Box::new(Disk {
        center: Vec2::ZERO,
        radius: 0.3,
    }));

    // no bases: the only motion is the projection out of the disk
    sim.particles.seed(Vec2::new(0.1, 0.05));
    sim.step(0.01);

    let p = sim.particles.positions[0];
    assert!(
        (p.length() - 0.3).abs() < 1e-5,
        "projected particle sits on the obstacle surface, got radius {}",
        p.length()
    );
    // projection preserves the direction from the disk center
    let dir = Vec2::new(0.1, 0.05).normalize();
    assert!(p.normalize().dot(dir) > 0.9999);
}
