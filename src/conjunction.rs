//! Pairwise conjunction prediction.
//!
//! Every unordered pair of candidate objects is propagated along a
//! straight-line relative trajectory. The time of closest approach has a
//! closed form:
//!
//! ```text
//! t* = -(r · v) / |v|²
//! ```
//!
//! where `r` and `v` are the relative position and velocity. Pairs that are not
//! approaching, or whose closest approach falls outside the horizon, produce
//! nothing. The candidate set is capped so the quadratic pair loop stays
//! bounded regardless of population size.

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use wide::f64x4;

use crate::events::{ConjunctionEventStore, NewConjunction};
use crate::types::{ObjectId, ObjectKind, TrackedObject};

/// Relative speeds below this (squared relative speed, km²/s²) count as stationary.
const MIN_RELATIVE_SPEED_SQ: f64 = 1e-12;

/// Configuration for conjunction prediction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSettings {
    /// Look-ahead window (seconds)
    pub horizon_secs: f64,
    /// Predictions with a larger miss distance are discarded (km)
    pub proximity_threshold_km: f64,
    /// Decay constant `k` in `100·exp(-k·d)` (1/km)
    pub probability_decay: f64,
    /// Maximum objects fed into the pair loop
    pub candidate_cap: usize,
    /// Kinetic-energy bucket edges (J), ascending
    pub severity_thresholds_j: Vec<f64>,
    /// Events whose closest approach is this close become active (seconds)
    pub active_window_secs: f64,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            horizon_secs: 300.0,
            proximity_threshold_km: 25.0,
            probability_decay: 0.2,
            candidate_cap: 250,
            severity_thresholds_j: (3..=11).map(|e| 10f64.powi(e)).collect(),
            active_window_secs: 60.0,
        }
    }
}

/// One predicted close approach.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConjunctionPrediction {
    /// Lower identifier of the pair
    pub object_a: ObjectId,
    /// Higher identifier of the pair
    pub object_b: ObjectId,
    /// Seconds from now until closest approach
    pub time_to_closest_approach: f64,
    pub miss_distance_km: f64,
    /// Collision probability, 0-100
    pub probability: f64,
    /// Impact severity, 1-10
    pub severity: u8,
    pub relative_speed_km_s: f64,
}

impl ConjunctionPrediction {
    pub fn pair(&self) -> (ObjectId, ObjectId) {
        (self.object_a, self.object_b)
    }

    pub fn involves(&self, id: ObjectId) -> bool {
        self.object_a == id || self.object_b == id
    }
}

/// Collision probability for a miss distance.
pub fn collision_probability(miss_distance_km: f64, decay: f64) -> f64 {
    (100.0 * (-decay * miss_distance_km).exp()).min(100.0)
}

/// Relative kinetic energy in joules (masses in kg, speed in km/s).
pub fn relative_kinetic_energy(mass_a: f64, mass_b: f64, relative_speed_km_s: f64) -> f64 {
    let total = mass_a + mass_b;
    if total <= 0.0 {
        return 0.0;
    }
    let reduced = mass_a * mass_b / total;
    let v_m_s = relative_speed_km_s * 1000.0;
    0.5 * reduced * v_m_s * v_m_s
}

/// Bucket an energy into 1-10 against ascending thresholds.
pub fn severity_for_energy(energy_j: f64, thresholds: &[f64]) -> u8 {
    let crossed = thresholds.iter().filter(|&&t| energy_j >= t).count();
    (1 + crossed).min(10) as u8
}

/// Pick at most `cap` objects to feed the pair loop.
///
/// Anomalies always make the cut; the rest is an evenly strided sample of
/// the remaining population.
pub fn select_candidates(objects: &[TrackedObject], cap: usize) -> Vec<TrackedObject> {
    if objects.len() <= cap {
        return objects.to_vec();
    }

    let (anomalies, rest): (Vec<&TrackedObject>, Vec<&TrackedObject>) = objects
        .iter()
        .partition(|o| o.kind == ObjectKind::Anomaly);

    let mut selected: Vec<TrackedObject> = anomalies.into_iter().take(cap).cloned().collect();
    let remaining = cap - selected.len();
    if remaining > 0 && !rest.is_empty() {
        let stride = rest.len() as f64 / remaining as f64;
        selected.extend(
            (0..remaining)
                .map(|k| ((k as f64 * stride) as usize).min(rest.len() - 1))
                .map(|i| rest[i].clone()),
        );
    }
    selected
}

/// Structure-of-arrays view of the candidates.
struct Lanes {
    px: Vec<f64>,
    py: Vec<f64>,
    pz: Vec<f64>,
    vx: Vec<f64>,
    vy: Vec<f64>,
    vz: Vec<f64>,
}

impl Lanes {
    fn new(objects: &[TrackedObject]) -> Self {
        Self {
            px: objects.iter().map(|o| o.position.x).collect(),
            py: objects.iter().map(|o| o.position.y).collect(),
            pz: objects.iter().map(|o| o.position.z).collect(),
            vx: objects.iter().map(|o| o.velocity.x).collect(),
            vy: objects.iter().map(|o| o.velocity.y).collect(),
            vz: objects.iter().map(|o| o.velocity.z).collect(),
        }
    }

    /// Load four entries starting at `start`, padding past the end with `pad`.
    fn load(values: &[f64], start: usize, pad: f64) -> f64x4 {
        let at = |k: usize| values.get(start + k).copied().unwrap_or(pad);
        f64x4::new([at(0), at(1), at(2), at(3)])
    }
}

/// Closest-approach geometry for one pair.
#[derive(Clone, Copy, Debug)]
struct Approach {
    tca: f64,
    miss: f64,
    speed: f64,
}

/// Predicts close approaches and keeps the latest results.
#[derive(Resource, Default)]
pub struct ConjunctionPredictor {
    pub settings: PredictionSettings,
    latest: Vec<ConjunctionPrediction>,
    risk: HashMap<ObjectId, f64>,
    cycles: u64,
}

impl ConjunctionPredictor {
    pub fn new(settings: PredictionSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Predict closest approaches within `horizon_secs`, soonest first.
    ///
    /// Every pair of `objects` is considered; callers cap the input.
    pub fn predict(&self, objects: &[TrackedObject], horizon_secs: f64) -> Vec<ConjunctionPrediction> {
        let lanes = Lanes::new(objects);
        let n = objects.len();
        let mut predictions = Vec::new();

        for i in 0..n {
            let (pxi, pyi, pzi) = (lanes.px[i], lanes.py[i], lanes.pz[i]);
            let (vxi, vyi, vzi) = (lanes.vx[i], lanes.vy[i], lanes.vz[i]);

            let mut j = i + 1;
            while j < n {
                let approaches = closest_approach_x4(&lanes, j, [pxi, pyi, pzi, vxi, vyi, vzi]);
                for (lane, approach) in approaches.iter().enumerate() {
                    let k = j + lane;
                    if k >= n {
                        break;
                    }
                    let Some(approach) = approach else {
                        continue;
                    };
                    if approach.tca < 0.0
                        || approach.tca > horizon_secs
                        || approach.miss >= self.settings.proximity_threshold_km
                    {
                        continue;
                    }
                    predictions.push(self.score(&objects[i], &objects[k], *approach));
                }
                j += 4;
            }
        }

        predictions.sort_by(|a, b| a.time_to_closest_approach.total_cmp(&b.time_to_closest_approach));
        predictions
    }

    fn score(&self, a: &TrackedObject, b: &TrackedObject, approach: Approach) -> ConjunctionPrediction {
        let (object_a, object_b) = if a.id <= b.id { (a.id, b.id) } else { (b.id, a.id) };
        let energy = relative_kinetic_energy(a.mass, b.mass, approach.speed);
        ConjunctionPrediction {
            object_a,
            object_b,
            time_to_closest_approach: approach.tca,
            miss_distance_km: approach.miss,
            probability: collision_probability(approach.miss, self.settings.probability_decay),
            severity: severity_for_energy(energy, &self.settings.severity_thresholds_j),
            relative_speed_km_s: approach.speed,
        }
    }

    /// Select candidates, predict over the configured horizon and refresh the
    /// per-object risk annotations.
    pub fn run(&mut self, objects: &[TrackedObject]) -> &[ConjunctionPrediction] {
        let candidates = select_candidates(objects, self.settings.candidate_cap);
        self.latest = self.predict(&candidates, self.settings.horizon_secs);

        self.risk.clear();
        for p in &self.latest {
            for id in [p.object_a, p.object_b] {
                let entry = self.risk.entry(id).or_insert(0.0);
                *entry = entry.max(p.probability);
            }
        }
        self.cycles += 1;
        &self.latest
    }

    /// Predictions from the latest run.
    pub fn latest(&self) -> &[ConjunctionPrediction] {
        &self.latest
    }

    /// Highest collision probability involving `id` in the latest run.
    pub fn risk_score(&self, id: ObjectId) -> Option<f64> {
        self.risk.get(&id).copied()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Push the latest predictions into the event store.
    ///
    /// Pairs without an open event get a new `predicted` event; open events
    /// have their geometry refreshed.
    pub fn record_predictions(&self, now_secs: f64, store: &mut ConjunctionEventStore) {
        if self.latest.is_empty() {
            return;
        }
        let batch: Vec<NewConjunction> = self
            .latest
            .iter()
            .map(|p| NewConjunction::from_prediction(p, now_secs))
            .collect();
        store.upsert_predictions(&batch);
    }
}

/// Closest approach of object `i` (given as `[px, py, pz, vx, vy, vz]`) to the
/// four objects starting at `start`. Padded lanes carry `i`'s own state and
/// come back as `None`.
fn closest_approach_x4(lanes: &Lanes, start: usize, own: [f64; 6]) -> [Option<Approach>; 4] {
    let [pxi, pyi, pzi, vxi, vyi, vzi] = own;

    let rx = Lanes::load(&lanes.px, start, pxi) - f64x4::splat(pxi);
    let ry = Lanes::load(&lanes.py, start, pyi) - f64x4::splat(pyi);
    let rz = Lanes::load(&lanes.pz, start, pzi) - f64x4::splat(pzi);
    let vx = Lanes::load(&lanes.vx, start, vxi) - f64x4::splat(vxi);
    let vy = Lanes::load(&lanes.vy, start, vyi) - f64x4::splat(vyi);
    let vz = Lanes::load(&lanes.vz, start, vzi) - f64x4::splat(vzi);

    let dot = rx * vx + ry * vy + rz * vz;
    let v2 = vx * vx + vy * vy + vz * vz;
    // Stationary lanes divide by zero here and are filtered below
    let t = (f64x4::splat(0.0) - dot) / v2;

    let mx = rx + vx * t;
    let my = ry + vy * t;
    let mz = rz + vz * t;
    let miss = (mx * mx + my * my + mz * mz).sqrt();

    let t = t.to_array();
    let miss = miss.to_array();
    let v2 = v2.to_array();

    std::array::from_fn(|lane| {
        if v2[lane] < MIN_RELATIVE_SPEED_SQ || !t[lane].is_finite() || !miss[lane].is_finite() {
            return None;
        }
        Some(Approach {
            tca: t[lane],
            miss: miss[lane],
            speed: v2[lane].sqrt(),
        })
    })
}
