//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use bevy::math::DVec3;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use kessler::config::KesslerConfig;
use kessler::plugin::KesslerPlugin;
use kessler::population::{Population, PopulationSettings};
use kessler::source::{NewObject, SimulationSource};
use kessler::types::{DEG_TO_RAD, EARTH_RADIUS_KM, ObjectId, ObjectKind, circular_speed};

/// Frame length used by headless apps.
pub const FRAME: Duration = Duration::from_millis(100);

/// A headless app running the full engine with fixed 100 ms frames.
pub fn headless_app(config: KesslerConfig) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(FRAME))
        .add_plugins(KesslerPlugin::new(config));
    app
}

/// Config with a small seeded population and no spawn grace.
pub fn small_config(satellites: usize) -> KesslerConfig {
    KesslerConfig {
        population: PopulationSettings {
            initial_satellites: satellites,
            spawn_grace_secs: 0.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
}

/// A 500 kg satellite on a prograde equatorial circular orbit.
pub fn satellite(altitude_km: f64, phase_deg: f64) -> NewObject {
    let r = EARTH_RADIUS_KM + altitude_km;
    let v = circular_speed(altitude_km);
    let phase = phase_deg * DEG_TO_RAD;
    NewObject::new(
        DVec3::new(r * phase.cos(), r * phase.sin(), 0.0),
        DVec3::new(-v * phase.sin(), v * phase.cos(), 0.0),
        500.0,
        ObjectKind::Satellite,
    )
}

/// A population of `altitudes.len()` satellites spread 20° apart.
pub fn population_with(altitudes: &[f64]) -> Population {
    let mut population = Population::new(PopulationSettings {
        spawn_grace_secs: 0.0,
        ..Default::default()
    });
    for (i, &alt) in altitudes.iter().enumerate() {
        population.spawn(satellite(alt, i as f64 * 20.0));
    }
    population
}

/// A fresh directory under the system temp dir.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("kessler-test-{}", uuid::Uuid::new_v4()))
}

/// Spawn two satellites on the same 500 km circle flying towards each other,
/// 1° apart. They meet after roughly 8 seconds.
pub fn spawn_head_on_pair(population: &mut Population) -> (ObjectId, ObjectId) {
    let a = population.spawn(satellite(500.0, 0.0));
    let mut oncoming = satellite(500.0, 1.0);
    oncoming.velocity = -oncoming.velocity;
    let b = population.spawn(oncoming);
    (a, b)
}
