//! Debris-field generation.

use bevy::math::{DQuat, DVec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::source::NewObject;
use crate::types::{DEG_TO_RAD, EARTH_RADIUS_KM, ObjectKind, RAD_TO_DEG, circular_speed};

/// Fractional altitude jitter applied to each fragment.
const ALTITUDE_JITTER: f64 = 0.10;

/// Inclination jitter applied to each fragment (degrees).
const INCLINATION_JITTER_DEG: f64 = 10.0;

/// Where and how a debris field is spawned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebrisFieldConfig {
    /// Central altitude (km)
    pub altitude_km: f64,
    /// Central inclination (degrees)
    pub inclination_deg: f64,
    /// Right ascension of the ascending node (degrees)
    pub raan_deg: f64,
    /// Central argument of latitude (degrees)
    pub phase_deg: f64,
    pub count: usize,
    /// Total mass shared evenly between fragments (kg)
    pub mass_kg: f64,
    /// Maximum angular spread along and across the orbit (degrees)
    pub spread_deg: f64,
    /// Multiplier on circular speed
    pub velocity_factor: f64,
}

impl Default for DebrisFieldConfig {
    fn default() -> Self {
        Self {
            altitude_km: 800.0,
            inclination_deg: 98.0,
            raan_deg: 0.0,
            phase_deg: 0.0,
            count: 50,
            mass_kg: 500.0,
            spread_deg: 15.0,
            velocity_factor: 1.0,
        }
    }
}

impl DebrisFieldConfig {
    /// A field centred on the orbit an object currently occupies.
    pub fn around(position: DVec3, velocity: DVec3, count: usize, mass_kg: f64) -> Self {
        let elements = PlaneElements::from_state(position, velocity);
        Self {
            altitude_km: position.length() - EARTH_RADIUS_KM,
            inclination_deg: elements.inclination_deg,
            raan_deg: elements.raan_deg,
            phase_deg: elements.argument_of_latitude_deg,
            count,
            mass_kg,
            spread_deg: 5.0,
            velocity_factor: 1.0,
        }
    }

    /// Draw one fragment per count.
    pub fn fragments<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<NewObject> {
        if self.count == 0 {
            return Vec::new();
        }
        let mass = self.mass_kg / self.count as f64;
        let half_spread = self.spread_deg.max(0.0) * 0.5;

        (0..self.count)
            .map(|_| {
                let altitude = self.altitude_km
                    * (1.0 + rng.gen_range(-ALTITUDE_JITTER..=ALTITUDE_JITTER));
                let inclination = (self.inclination_deg
                    + rng.gen_range(-INCLINATION_JITTER_DEG..=INCLINATION_JITTER_DEG))
                .clamp(0.0, 180.0);
                let raan = self.raan_deg + rng.gen_range(-half_spread..=half_spread);
                let phase = self.phase_deg + rng.gen_range(-half_spread..=half_spread);
                let speed = circular_speed(altitude) * self.velocity_factor;
                let (position, velocity) = orbit_state(altitude, inclination, raan, phase, speed);
                NewObject::new(position, velocity, mass, ObjectKind::Debris)
            })
            .collect()
    }
}

/// Orientation of the orbital plane and the position within it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneElements {
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub argument_of_latitude_deg: f64,
}

impl PlaneElements {
    pub fn from_state(position: DVec3, velocity: DVec3) -> Self {
        let h = position.cross(velocity);
        if h.length_squared() == 0.0 {
            return Self {
                inclination_deg: 0.0,
                raan_deg: 0.0,
                argument_of_latitude_deg: position.y.atan2(position.x) * RAD_TO_DEG,
            };
        }
        let h_hat = h.normalize();
        let inclination = h_hat.z.clamp(-1.0, 1.0).acos();

        // Equatorial orbits have no node; measure from the x axis
        let node = DVec3::Z.cross(h_hat);
        let n_hat = if node.length_squared() < 1e-18 {
            DVec3::X
        } else {
            node.normalize()
        };
        let raan = n_hat.y.atan2(n_hat.x);
        let along = h_hat.cross(n_hat);
        let u = position.dot(along).atan2(position.dot(n_hat));

        Self {
            inclination_deg: inclination * RAD_TO_DEG,
            raan_deg: raan * RAD_TO_DEG,
            argument_of_latitude_deg: u * RAD_TO_DEG,
        }
    }
}

/// Position and velocity on a circular-plane orbit.
///
/// The body sits `phase_deg` past the ascending node with `speed` along the
/// direction of motion.
pub fn orbit_state(
    altitude_km: f64,
    inclination_deg: f64,
    raan_deg: f64,
    phase_deg: f64,
    speed: f64,
) -> (DVec3, DVec3) {
    let r = EARTH_RADIUS_KM + altitude_km;
    let u = phase_deg * DEG_TO_RAD;
    let rotation = DQuat::from_rotation_z(raan_deg * DEG_TO_RAD)
        * DQuat::from_rotation_x(inclination_deg * DEG_TO_RAD);

    let position = rotation * DVec3::new(r * u.cos(), r * u.sin(), 0.0);
    let velocity = rotation * DVec3::new(-speed * u.sin(), speed * u.cos(), 0.0);
    (position, velocity)
}
