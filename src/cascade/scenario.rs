//! Cascade scenarios and deferred cascade actions.

use serde::{Deserialize, Serialize};

use crate::types::{ObjectId, TrackedObject};

/// Closed altitude range (km).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AltitudeBand {
    pub min_km: f64,
    pub max_km: f64,
}

impl AltitudeBand {
    pub const fn new(min_km: f64, max_km: f64) -> Self {
        Self { min_km, max_km }
    }

    pub fn contains(&self, altitude_km: f64) -> bool {
        (self.min_km..=self.max_km).contains(&altitude_km)
    }

    pub fn contains_object(&self, object: &TrackedObject) -> bool {
        self.contains(object.altitude())
    }
}

/// A named cascade with its own configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CascadeScenario {
    /// Destroy one object in the band and spawn a large field where it was.
    Asat { band: AltitudeBand, fragments: usize },
    /// Staggered forced collisions, one per band.
    MultiPoint {
        bands: Vec<AltitudeBand>,
        stage_delay_secs: f64,
        fragments_per_stage: usize,
    },
    /// One large high-velocity field.
    Swarm {
        altitude_km: f64,
        count: usize,
        velocity_factor: f64,
    },
    /// Hand off to the source's built-in collision trigger.
    Default,
}

impl CascadeScenario {
    pub fn asat() -> Self {
        CascadeScenario::Asat {
            band: AltitudeBand::new(700.0, 900.0),
            fragments: 150,
        }
    }

    pub fn multi_point() -> Self {
        CascadeScenario::MultiPoint {
            bands: vec![
                AltitudeBand::new(400.0, 600.0),
                AltitudeBand::new(600.0, 800.0),
                AltitudeBand::new(800.0, 1000.0),
            ],
            stage_delay_secs: 2.0,
            fragments_per_stage: 80,
        }
    }

    pub fn swarm() -> Self {
        CascadeScenario::Swarm {
            altitude_km: 750.0,
            count: 200,
            velocity_factor: 1.2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CascadeScenario::Asat { .. } => "asat",
            CascadeScenario::MultiPoint { .. } => "multi-point",
            CascadeScenario::Swarm { .. } => "swarm",
            CascadeScenario::Default => "default",
        }
    }
}

/// Work the controller defers until a later tick.
#[derive(Clone, Debug, PartialEq)]
pub enum CascadeAction {
    /// Remove a body after its grace delay.
    Destroy(ObjectId),
    /// One stage of a multi-point cascade.
    Strike { band: AltitudeBand, fragments: usize },
}
