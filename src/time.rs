//! Time advancement for the debris simulation.
//!
//! Handles progression of simulation time based on scale and pause state.

use bevy::prelude::*;

/// Plugin providing time advancement functionality.
pub struct TimePlugin;

impl Plugin for TimePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationClock>()
            .add_systems(PreUpdate, advance_time);
    }
}

/// Simulation clock resource.
///
/// `current` is simulation seconds since the engine started; `scale` is the
/// time-acceleration multiplier (1.0 = real time).
#[derive(Resource, Clone, Debug)]
pub struct SimulationClock {
    /// Simulation seconds since start
    pub current: f64,
    /// Wall-clock seconds since start (unaffected by scale or pause)
    pub real: f64,
    /// Time scale multiplier
    pub scale: f64,
    /// Whether simulation is paused
    pub paused: bool,
    /// Simulation seconds advanced by the latest frame
    pub last_step: f64,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            current: 0.0,
            real: 0.0,
            scale: 1.0,
            paused: false,
            last_step: 0.0,
        }
    }
}

impl SimulationClock {
    /// Create a clock running at the given multiplier.
    pub fn with_scale(scale: f64) -> Self {
        Self {
            scale,
            ..Default::default()
        }
    }

    /// Advance by `real_delta` wall seconds, returning the simulation step.
    pub fn advance(&mut self, real_delta: f64) -> f64 {
        self.real += real_delta;
        self.last_step = if self.paused {
            0.0
        } else {
            real_delta * self.scale
        };
        self.current += self.last_step;
        self.last_step
    }
}

/// Advance simulation time from the frame delta.
fn advance_time(mut clock: ResMut<SimulationClock>, time: Res<Time>) {
    clock.advance(time.delta_secs_f64());
}
