//! Whole-environment properties: boundary, coupling, stability and sharing.
//!
//! These run through [`Environment`] rather than the individual modules.

use diffusion_engine::{BoundaryCondition, Environment, EnvironmentError, LigandConfig, Vec2};
use diffusion_common::GridConfig;
use std::thread;

fn grid(dimensions: [f64; 2], resolution: f64, boundary: BoundaryCondition) -> GridConfig {
    GridConfig {
        dimensions,
        resolution,
        boundary,
    }
}

fn spike_env(boundary: BoundaryCondition) -> Environment {
    let mut env = Environment::new(
        &grid([8.0, 8.0], 1.0, boundary),
        vec![LigandConfig::new(1, "spike", 0.0, 1.0)],
    )
    .unwrap();
    let mut values = vec![0.0; 64];
    values[4 * 8 + 4] = 1.0;
    env.restore_field(1, &values).unwrap();
    env
}

fn max_of(env: &Environment) -> f64 {
    env.field_of(1).unwrap().max()
}

#[test]
fn registry_maps_ids_in_registration_order() {
    let ligands = [3, 1, 4]
        .into_iter()
        .map(|id| LigandConfig::new(id, format!("l{id}"), 0.0, 0.1))
        .collect();
    let env = Environment::new(&grid([2.0, 2.0], 1.0, BoundaryCondition::Periodic), ligands).unwrap();
    assert_eq!(env.lookup_many(&[3, 1, 4]).unwrap(), vec![0, 1, 2]);
    assert_eq!(env.lookup(2), Err(EnvironmentError::UnknownLigand { id: 2 }));
}

#[test]
fn boundary_application_is_idempotent() {
    for boundary in [
        BoundaryCondition::Periodic,
        BoundaryCondition::Neumann { x_neg: 0.5, x_pos: -0.5, y_neg: 1.0, y_pos: 0.0 },
        BoundaryCondition::Dirichlet { x_neg: 2.0, x_pos: 0.0, y_neg: 1.0, y_pos: 3.0 },
    ] {
        let mut env = spike_env(boundary);
        env.apply_boundary();
        let once = env.field().as_slice().to_vec();
        env.apply_boundary();
        assert_eq!(env.field().as_slice(), once.as_slice());
    }
}

#[test]
fn periodic_ghosts_copy_the_opposite_edge() {
    let mut env = Environment::new(
        &grid([3.0, 2.0], 1.0, BoundaryCondition::Periodic),
        vec![LigandConfig::new(1, "a", 0.0, 0.0)],
    )
    .unwrap();
    // 2 rows x 3 cols
    env.restore_field(1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    env.apply_boundary();
    let f = env.field();
    assert_eq!(f.get(0, 1, 0), Some(4.0));
    assert_eq!(f.get(3, 3, 0), Some(3.0));
    assert_eq!(f.get(1, 0, 0), Some(3.0));
    assert_eq!(f.get(2, 4, 0), Some(4.0));
    assert_eq!(f.get(0, 0, 0), Some(6.0));
}

#[test]
fn weights_always_sum_to_one() {
    let env = spike_env(BoundaryCondition::Periodic);
    let positions: Vec<Vec2> = (0..50)
        .map(|i| Vec2::new(i as f64 * 0.157, 8.0 - i as f64 * 0.131))
        .collect();
    let plan = env.plan(&positions).unwrap();
    for corner in plan.corners() {
        let total: f64 = corner.weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(corner.weights.iter().all(|w| *w >= 0.0));
    }
}

#[test]
fn scatter_at_a_node_is_sampled_back_exactly() {
    let mut env = Environment::new(
        &grid([3.0, 3.0], 0.5, BoundaryCondition::Periodic),
        vec![LigandConfig::new(1, "a", 2.0, 0.1), LigandConfig::new(2, "b", 0.0, 0.1)],
    )
    .unwrap();
    let position = [Vec2::new(1.0, 1.5)];
    let pre = env.sample(&position, &[0]).unwrap()[0];
    env.scatter_add(&[0.75], &position, &[0]).unwrap();
    let post = env.sample(&position, &[0]).unwrap()[0];
    assert!((post - pre - 0.75).abs() < 1e-12);
    assert_eq!(env.field_of(2).unwrap().sum(), 0.0);
}

#[test]
fn scatter_adds_its_delta_to_the_total_mass() {
    let mut env = Environment::new(
        &grid([3.0, 3.0], 0.5, BoundaryCondition::Periodic),
        vec![LigandConfig::new(1, "a", 1.0, 0.1)],
    )
    .unwrap();
    let positions = [Vec2::new(0.8, 1.3), Vec2::new(2.21, 0.4), Vec2::new(0.8, 1.3)];
    let before = env.field_of(1).unwrap().sum();
    env.scatter_add(&[0.3, -0.1, 0.5], &positions, &[0, 0, 0]).unwrap();
    let after = env.field_of(1).unwrap().sum();
    assert!((after - before - 0.7).abs() < 1e-12);
}

#[test]
fn out_of_range_positions_are_rejected() {
    let mut env = spike_env(BoundaryCondition::Periodic);
    let before = env.field().as_slice().to_vec();
    for position in [Vec2::new(-1.5, 2.0), Vec2::new(2.0, 9.5), Vec2::new(f64::NAN, 1.0)] {
        assert!(matches!(
            env.scatter_add(&[1.0], &[position], &[0]),
            Err(EnvironmentError::OutOfBounds { .. })
        ));
    }
    assert_eq!(env.field().as_slice(), before.as_slice());
}

#[test]
fn uniform_field_is_a_fixed_point() {
    for boundary in [
        BoundaryCondition::Periodic,
        BoundaryCondition::Neumann { x_neg: 0.0, x_pos: 0.0, y_neg: 0.0, y_pos: 0.0 },
    ] {
        let mut env = Environment::new(
            &grid([4.0, 4.0], 1.0, boundary),
            vec![LigandConfig::new(1, "flat", 10.0, 0.1)],
        )
        .unwrap();
        let dt = 0.5 * env.stable_timestep();
        for _ in 0..100 {
            env.step(dt);
        }
        let channel = env.field_of(1).unwrap();
        assert!(channel.iter().all(|v| (v - 10.0).abs() < 1e-12), "{boundary:?}");
        assert!((channel.mean() - 10.0).abs() < 1e-12, "{boundary:?}");
    }
}

#[test]
fn half_the_stable_step_never_raises_the_maximum() {
    let mut env = spike_env(BoundaryCondition::Periodic);
    let dt = 0.5 * env.stable_timestep();
    let mut previous = max_of(&env);
    for _ in 0..50 {
        env.step(dt);
        let current = max_of(&env);
        assert!(current <= previous + 1e-12);
        previous = current;
    }
    // periodic diffusion without reaction conserves mass
    assert!((env.field_of(1).unwrap().sum() - 1.0).abs() < 1e-9);
}

#[test]
fn four_times_the_stable_step_diverges() {
    let mut env = spike_env(BoundaryCondition::Periodic);
    let dt = 4.0 * env.stable_timestep();
    let mut peak: f64 = 0.0;
    for _ in 0..50 {
        env.step(dt);
        peak = peak.max(env.field_of(1).unwrap().iter().map(f64::abs).fold(0.0, f64::max));
    }
    assert!(peak > 1e3);
}

#[test]
fn populations_sharing_an_environment_accumulate() {
    let shared = Environment::new(
        &grid([4.0, 4.0], 1.0, BoundaryCondition::Periodic),
        vec![LigandConfig::new(1, "a", 0.0, 0.5)],
    )
    .unwrap()
    .into_shared();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let env = shared.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let mut guard = env.write().unwrap();
                    guard.scatter_add(&[0.5], &[Vec2::new(1.25, 2.5)], &[0]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let env = shared.read().unwrap();
    assert!((env.field_of(1).unwrap().sum() - 200.0).abs() < 1e-9);
    assert_eq!(env.tick(), 0);
}
