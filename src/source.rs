//! Boundary to the live simulation source.
//!
//! The source owns every tracked object. Core components read it through this
//! trait and only mutate it through the explicit destructive and spawning calls
//! the cascade controller issues.

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use crate::cascade::ThreatLevel;
use crate::types::{ObjectId, ObjectKind, OrbitalClass, TrackedObject};

/// Floats per object in the raw transform buffer (column-major 4×4).
pub const TRANSFORM_STRIDE: usize = 16;

/// Offset of the translation column inside one transform.
pub const TRANSLATION_OFFSET: usize = 12;

/// One object as returned by the bulk export fast path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedObject {
    pub id: ObjectId,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub mass: f64,
    pub altitude: f64,
    pub kind: ObjectKind,
}

/// Aggregate counters published by the source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCounters {
    pub active_objects: usize,
    pub rendered_objects: usize,
    pub time_scale: f64,
    pub collision_count: u64,
    pub cascade_active: bool,
    pub debris_generated: u64,
}

/// Request to add an object to the source.
#[derive(Clone, Debug)]
pub struct NewObject {
    pub position: DVec3,
    pub velocity: DVec3,
    pub mass: f64,
    pub kind: ObjectKind,
    pub threat: Option<ThreatLevel>,
}

impl NewObject {
    pub fn new(position: DVec3, velocity: DVec3, mass: f64, kind: ObjectKind) -> Self {
        Self {
            position,
            velocity,
            mass,
            kind,
            threat: None,
        }
    }

    pub fn with_threat(mut self, threat: ThreatLevel) -> Self {
        self.threat = Some(threat);
        self
    }

    /// Regime implied by the initial state.
    pub fn class(&self) -> OrbitalClass {
        OrbitalClass::from_state(self.position, self.velocity)
    }
}

/// Live simulation state as seen by the engine.
pub trait SimulationSource {
    /// Bulk export of up to `max` objects. `None` when the fast path is
    /// unavailable.
    fn export_objects(&self, max: usize) -> Option<Vec<ExportedObject>>;

    /// Raw transform buffer, [`TRANSFORM_STRIDE`] floats per object with the
    /// position in the last column.
    fn raw_transforms(&self) -> Option<&[f32]>;

    fn counters(&self) -> SourceCounters;

    /// Current state of every tracked object.
    fn tracked_objects(&self) -> Vec<TrackedObject>;

    fn get(&self, id: ObjectId) -> Option<TrackedObject>;

    /// Number of live objects of one kind.
    fn count_kind(&self, kind: ObjectKind) -> usize {
        self.tracked_objects().iter().filter(|o| o.kind == kind).count()
    }

    fn spawn(&mut self, object: NewObject) -> ObjectId;

    /// Remove a debris or anomaly body. Returns false if it was not present.
    fn destroy_body(&mut self, id: ObjectId) -> bool;

    /// Remove a satellite. Returns false if it was not present.
    fn remove_satellite(&mut self, id: ObjectId) -> bool;

    /// Built-in collision trigger: forces an impact between two objects of
    /// the source's choosing and reports the pair.
    fn trigger_collision(&mut self) -> Option<(ObjectId, ObjectId)>;

    fn set_cascade_active(&mut self, active: bool);

    /// Collision notifications raised since the last call.
    fn drain_collisions(&mut self) -> Vec<(ObjectId, ObjectId)>;
}

/// Read positions out of a raw transform buffer.
///
/// Trailing floats that do not form a complete transform are ignored.
pub fn positions_from_transforms(buffer: &[f32]) -> Vec<DVec3> {
    buffer
        .chunks_exact(TRANSFORM_STRIDE)
        .map(|m| {
            DVec3::new(
                m[TRANSLATION_OFFSET] as f64,
                m[TRANSLATION_OFFSET + 1] as f64,
                m[TRANSLATION_OFFSET + 2] as f64,
            )
        })
        .collect()
}

/// Write a translation-only transform for `position` into `out`.
pub fn write_transform(out: &mut [f32], position: DVec3) {
    out.fill(0.0);
    out[0] = 1.0;
    out[5] = 1.0;
    out[10] = 1.0;
    out[15] = 1.0;
    out[TRANSLATION_OFFSET] = position.x as f32;
    out[TRANSLATION_OFFSET + 1] = position.y as f32;
    out[TRANSLATION_OFFSET + 2] = position.z as f32;
}
