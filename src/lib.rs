//! Kessler - Collision Prediction & Cascade Simulation Engine
//!
//! Tracks a population of Earth-orbiting objects, predicts close approaches,
//! injects anomalies and debris cascades, and keeps a bounded, persisted
//! history of conjunction events alongside cached simulation snapshots.

pub mod cascade;
pub mod config;
pub mod conjunction;
pub mod events;
pub mod export;
pub mod orbit;
pub mod persistence;
pub mod plugin;
pub mod population;
pub mod snapshot;
pub mod source;
pub mod ticker;
pub mod time;
pub mod types;

#[cfg(test)]
pub mod test_utils;
