//! Tracked-object population: the in-process simulation source.
//!
//! Every object lives in one owned table keyed by [`ObjectId`]. Rendering or
//! dashboard layers look objects up by handle and never hold references into
//! the table.
//!
//! Each frame the population:
//! - integrates all bodies under central two-body gravity (velocity Verlet)
//! - drops bodies that have decayed into the atmosphere
//! - rebuilds the raw transform buffer
//! - detects geometric collisions with a spatial hash and queues notifications

use std::collections::{BTreeMap, HashMap, HashSet};

use bevy::log::{debug, info, warn};
use bevy::math::DVec3;
use bevy::prelude::*;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::orbit::{ElementSet, LeoParams, OrbitalStateResolver, generate_tle};
use crate::source::{
    ExportedObject, NewObject, SimulationSource, SourceCounters, TRANSFORM_STRIDE, write_transform,
};
use crate::time::SimulationClock;
use crate::types::{
    COLLISION_DISTANCE_KM, EARTH_RADIUS_KM, MU_EARTH, ObjectId, ObjectKind, TrackedObject,
};

/// Altitude below which a body is considered to have re-entered (km).
const REENTRY_ALTITUDE_KM: f64 = 100.0;

/// Configuration for the population.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationSettings {
    /// Satellites generated at startup
    pub initial_satellites: usize,
    /// Maximum number of objects the render layer draws
    pub render_budget: usize,
    /// Separation that counts as a collision (km)
    pub collision_distance_km: f64,
    /// Largest integration step (simulation seconds)
    pub max_substep_secs: f64,
    /// Newly spawned bodies are ignored by collision detection for this long
    pub spawn_grace_secs: f64,
    /// Seed for satellite generation and the built-in collision trigger
    pub seed: u64,
}

impl Default for PopulationSettings {
    fn default() -> Self {
        Self {
            initial_satellites: 500,
            render_budget: 5000,
            collision_distance_km: COLLISION_DISTANCE_KM,
            max_substep_secs: 10.0,
            spawn_grace_secs: 5.0,
            seed: 0x5eed,
        }
    }
}

#[derive(Clone, Debug)]
struct Body {
    object: TrackedObject,
    spawned_at: f64,
}

/// The arena of tracked objects.
#[derive(Resource)]
pub struct Population {
    bodies: BTreeMap<ObjectId, Body>,
    next_id: u64,
    transforms: Vec<f32>,
    in_contact: HashSet<(ObjectId, ObjectId)>,
    pending_collisions: Vec<(ObjectId, ObjectId)>,
    collision_count: u64,
    debris_generated: u64,
    cascade_active: bool,
    time_scale: f64,
    now: f64,
    export_enabled: bool,
    settings: PopulationSettings,
    rng: StdRng,
}

impl Default for Population {
    fn default() -> Self {
        Self::new(PopulationSettings::default())
    }
}

impl Population {
    pub fn new(settings: PopulationSettings) -> Self {
        Self {
            bodies: BTreeMap::new(),
            next_id: 1,
            transforms: Vec::new(),
            in_contact: HashSet::new(),
            pending_collisions: Vec::new(),
            collision_count: 0,
            debris_generated: 0,
            cascade_active: false,
            time_scale: 1.0,
            now: 0.0,
            export_enabled: true,
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Enable or disable the bulk export fast path.
    pub fn set_export_enabled(&mut self, enabled: bool) {
        self.export_enabled = enabled;
    }

    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale;
    }

    /// Add satellites from element sets resolved at `at`.
    ///
    /// Entries that fail to parse or propagate are skipped.
    pub fn seed_from_elements(&mut self, sets: &[ElementSet], at: DateTime<Utc>) -> Vec<ObjectId> {
        let resolved = OrbitalStateResolver::resolve_batch(sets, at);
        let skipped = sets.len() - resolved.len();
        if skipped > 0 {
            warn!("Skipped {} of {} element sets", skipped, sets.len());
        }

        let ids: Vec<ObjectId> = resolved
            .into_iter()
            .map(|(_, state)| {
                let mass = self.rng.gen_range(100.0..2000.0);
                self.spawn(NewObject::new(
                    state.position,
                    state.velocity,
                    mass,
                    ObjectKind::Satellite,
                ))
            })
            .collect();
        self.rebuild_transforms();
        ids
    }

    /// Generate `count` realistic LEO satellites with fresh element sets.
    pub fn seed_random_satellites(&mut self, count: usize, at: DateTime<Utc>) -> Vec<ObjectId> {
        let sets: Vec<ElementSet> = (0..count)
            .map(|i| {
                let params = LeoParams::random(&mut self.rng);
                let catalog = 10_000 + (self.next_id as u32 + i as u32) % 90_000;
                let (line1, line2) = generate_tle(&mut self.rng, catalog, &params, at).to_lines();
                ElementSet {
                    name: format!("SAT-{catalog}"),
                    line1,
                    line2,
                }
            })
            .collect();
        let ids = self.seed_from_elements(&sets, at);
        info!("Seeded {} satellites", ids.len());
        ids
    }

    /// Advance every body by `dt` simulation seconds and detect collisions.
    pub fn step(&mut self, dt: f64, now: f64) {
        self.now = now;
        if dt > 0.0 {
            let substeps = (dt / self.settings.max_substep_secs).ceil().max(1.0) as usize;
            let h = dt / substeps as f64;
            for body in self.bodies.values_mut() {
                for _ in 0..substeps {
                    verlet_step(&mut body.object.position, &mut body.object.velocity, h);
                }
            }
            self.remove_reentered();
        }
        self.rebuild_transforms();
        self.detect_collisions();
    }

    fn remove_reentered(&mut self) {
        let decayed: Vec<ObjectId> = self
            .bodies
            .values()
            .filter(|b| b.object.altitude() < REENTRY_ALTITUDE_KM)
            .map(|b| b.object.id)
            .collect();
        for id in decayed {
            debug!("{} re-entered", id);
            self.bodies.remove(&id);
        }
    }

    fn rebuild_transforms(&mut self) {
        self.transforms.resize(self.bodies.len() * TRANSFORM_STRIDE, 0.0);
        for (chunk, body) in self
            .transforms
            .chunks_exact_mut(TRANSFORM_STRIDE)
            .zip(self.bodies.values())
        {
            write_transform(chunk, body.object.position);
        }
    }

    /// Spatial-hash broad phase with cells the size of the collision distance.
    fn detect_collisions(&mut self) {
        let cell = self.settings.collision_distance_km;
        let grace = self.settings.spawn_grace_secs;
        let now = self.now;

        let candidates: Vec<&Body> = self
            .bodies
            .values()
            .filter(|b| now - b.spawned_at >= grace)
            .collect();

        let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        for (i, body) in candidates.iter().enumerate() {
            grid.entry(cell_of(body.object.position, cell)).or_default().push(i);
        }

        let mut contacts = HashSet::new();
        for (i, body) in candidates.iter().enumerate() {
            let (cx, cy, cz) = cell_of(body.object.position, cell);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let Some(members) = grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                            continue;
                        };
                        for &j in members.iter().filter(|&&j| j > i) {
                            let other = candidates[j];
                            let distance = body.object.position.distance(other.object.position);
                            if distance < cell {
                                contacts.insert(ordered_pair(body.object.id, other.object.id));
                            }
                        }
                    }
                }
            }
        }

        for pair in contacts.iter() {
            if !self.in_contact.contains(pair) {
                info!("Collision detected between {} and {}", pair.0, pair.1);
                self.collision_count += 1;
                self.pending_collisions.push(*pair);
            }
        }
        self.in_contact = contacts;
    }
}

fn cell_of(position: DVec3, cell: f64) -> (i64, i64, i64) {
    (
        (position.x / cell).floor() as i64,
        (position.y / cell).floor() as i64,
        (position.z / cell).floor() as i64,
    )
}

/// Normalise a pair so (a, b) and (b, a) compare equal.
pub fn ordered_pair(a: ObjectId, b: ObjectId) -> (ObjectId, ObjectId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Central-gravity acceleration (km/s²).
fn gravity(position: DVec3) -> DVec3 {
    let r = position.length();
    -MU_EARTH / (r * r * r) * position
}

/// One velocity Verlet step.
fn verlet_step(position: &mut DVec3, velocity: &mut DVec3, dt: f64) {
    let acc = gravity(*position);
    let new_pos = *position + *velocity * dt + acc * (0.5 * dt * dt);
    let new_acc = gravity(new_pos);
    *velocity += (acc + new_acc) * (0.5 * dt);
    *position = new_pos;
}

impl SimulationSource for Population {
    fn export_objects(&self, max: usize) -> Option<Vec<ExportedObject>> {
        if !self.export_enabled {
            return None;
        }
        Some(
            self.bodies
                .values()
                .take(max)
                .map(|b| ExportedObject {
                    id: b.object.id,
                    position: b.object.position.to_array(),
                    velocity: b.object.velocity.to_array(),
                    mass: b.object.mass,
                    altitude: b.object.altitude(),
                    kind: b.object.kind,
                })
                .collect(),
        )
    }

    fn raw_transforms(&self) -> Option<&[f32]> {
        Some(&self.transforms)
    }

    fn counters(&self) -> SourceCounters {
        SourceCounters {
            active_objects: self.bodies.len(),
            rendered_objects: self.bodies.len().min(self.settings.render_budget),
            time_scale: self.time_scale,
            collision_count: self.collision_count,
            cascade_active: self.cascade_active,
            debris_generated: self.debris_generated,
        }
    }

    fn tracked_objects(&self) -> Vec<TrackedObject> {
        self.bodies.values().map(|b| b.object.clone()).collect()
    }

    fn get(&self, id: ObjectId) -> Option<TrackedObject> {
        self.bodies.get(&id).map(|b| b.object.clone())
    }

    fn count_kind(&self, kind: ObjectKind) -> usize {
        self.bodies.values().filter(|b| b.object.kind == kind).count()
    }

    fn spawn(&mut self, object: NewObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        if object.kind == ObjectKind::Debris {
            self.debris_generated += 1;
        }
        let class = object.class();
        self.bodies.insert(
            id,
            Body {
                object: TrackedObject {
                    id,
                    position: object.position,
                    velocity: object.velocity,
                    mass: object.mass,
                    class,
                    kind: object.kind,
                    threat: object.threat,
                },
                spawned_at: self.now,
            },
        );
        id
    }

    fn destroy_body(&mut self, id: ObjectId) -> bool {
        self.bodies.remove(&id).is_some()
    }

    fn remove_satellite(&mut self, id: ObjectId) -> bool {
        match self.bodies.get(&id) {
            Some(b) if b.object.kind == ObjectKind::Satellite => {
                self.bodies.remove(&id);
                true
            }
            _ => false,
        }
    }

    fn trigger_collision(&mut self) -> Option<(ObjectId, ObjectId)> {
        let ids: Vec<ObjectId> = self.bodies.keys().copied().collect();
        let picked: Vec<ObjectId> = ids.choose_multiple(&mut self.rng, 2).copied().collect();
        let [a, b] = picked[..] else {
            warn!("Collision trigger needs at least two objects");
            return None;
        };

        // Move the second body onto the first
        let target = self.bodies.get(&a)?.object.position;
        if let Some(body) = self.bodies.get_mut(&b) {
            body.object.position = target + DVec3::new(0.5, 0.0, 0.0);
        }
        let pair = ordered_pair(a, b);
        self.in_contact.insert(pair);
        self.collision_count += 1;
        self.pending_collisions.push(pair);
        info!("Forced collision between {} and {}", pair.0, pair.1);
        Some(pair)
    }

    fn set_cascade_active(&mut self, active: bool) {
        self.cascade_active = active;
    }

    fn drain_collisions(&mut self) -> Vec<(ObjectId, ObjectId)> {
        std::mem::take(&mut self.pending_collisions)
    }
}

/// Advance the population by the frame's simulation step.
pub fn step_population(mut population: ResMut<Population>, clock: Res<SimulationClock>) {
    population.set_time_scale(clock.scale);
    population.step(clock.last_step, clock.current);
}
