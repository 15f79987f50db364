//! Shared fixtures for unit tests.

/// Fixtures for building objects, element sets and predictions.
pub mod fixtures {
    use bevy::math::DVec3;

    use crate::conjunction::ConjunctionPrediction;
    use crate::source::NewObject;
    use crate::types::{
        DEG_TO_RAD, EARTH_RADIUS_KM, ObjectId, ObjectKind, OrbitalClass, TrackedObject,
        circular_speed,
    };

    /// Reference ISS element set (epoch 2008-264).
    pub const ISS_LINE1: &str =
        "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    pub const ISS_LINE2: &str =
        "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    /// A tracked satellite with an explicit state, classified as LEO.
    pub fn object_at(id: u64, position: DVec3, velocity: DVec3, mass: f64) -> TrackedObject {
        TrackedObject {
            id: ObjectId(id),
            position,
            velocity,
            mass,
            class: OrbitalClass::Leo,
            kind: ObjectKind::Satellite,
            threat: None,
        }
    }

    /// A 500 kg satellite on a prograde equatorial circular orbit.
    pub fn circular_satellite(altitude_km: f64, phase_deg: f64) -> NewObject {
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

    /// A 15 km/s head-on pass with a 1 km miss, `tca` seconds out.
    pub fn head_on_prediction(a: u64, b: u64, tca: f64) -> ConjunctionPrediction {
        ConjunctionPrediction {
            object_a: ObjectId(a.min(b)),
            object_b: ObjectId(a.max(b)),
            time_to_closest_approach: tca,
            miss_distance_km: 1.0,
            probability: 100.0 * (-0.2f64).exp(),
            severity: 9,
            relative_speed_km_s: 15.0,
        }
    }
}
