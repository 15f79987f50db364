//! Core data types and constants for the debris-cascade engine.
//!
//! Distances are kilometres, velocities km/s, masses kg and times seconds
//! unless a name says otherwise. Positions live in an Earth-centred inertial
//! frame.

use std::fmt;

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use crate::cascade::ThreatLevel;

/// Physical constants

/// Earth's gravitational parameter (km³/s²)
pub const MU_EARTH: f64 = 398_600.4418;

/// Mean Earth radius in km, used for altitude
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Equatorial Earth radius in km, used by the J2 secular terms
pub const EARTH_EQUATORIAL_RADIUS_KM: f64 = 6378.137;

/// Second zonal harmonic of Earth's gravity field
pub const J2: f64 = 1.082_626_68e-3;

/// Degrees to radians conversion factor
pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Radians to degrees conversion factor
pub const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Separation below which two bodies are considered to have collided (km)
pub const COLLISION_DISTANCE_KM: f64 = 5.0;

/// Altitude of the geostationary belt (km)
pub const GEO_ALTITUDE_KM: f64 = 35_786.0;

/// Stable handle of a tracked object.
///
/// Handles index the population table; nothing outside the table holds a
/// reference to the object itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj-{}", self.0)
    }
}

impl std::str::FromStr for ObjectId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("obj-").unwrap_or(s);
        digits.parse().map(ObjectId)
    }
}

/// Orbital regime of an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrbitalClass {
    Leo,
    Meo,
    Geo,
    Heo,
}

impl OrbitalClass {
    /// Classify an orbit from its altitude and eccentricity.
    ///
    /// Strongly eccentric orbits are HEO regardless of their current altitude.
    pub fn classify(altitude_km: f64, eccentricity: f64) -> Self {
        if eccentricity > 0.25 {
            OrbitalClass::Heo
        } else if altitude_km < 2000.0 {
            OrbitalClass::Leo
        } else if (altitude_km - GEO_ALTITUDE_KM).abs() <= 1000.0 {
            OrbitalClass::Geo
        } else if altitude_km < GEO_ALTITUDE_KM {
            OrbitalClass::Meo
        } else {
            OrbitalClass::Heo
        }
    }

    /// Classify from a state vector (eccentricity computed from the state).
    pub fn from_state(position: DVec3, velocity: DVec3) -> Self {
        let altitude = position.length() - EARTH_RADIUS_KM;
        Self::classify(altitude, eccentricity_of(position, velocity))
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrbitalClass::Leo => "LEO",
            OrbitalClass::Meo => "MEO",
            OrbitalClass::Geo => "GEO",
            OrbitalClass::Heo => "HEO",
        }
    }
}

/// What a tracked object is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Satellite,
    Debris,
    Anomaly,
}

impl ObjectKind {
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Satellite => "satellite",
            ObjectKind::Debris => "debris",
            ObjectKind::Anomaly => "anomaly",
        }
    }
}

/// A body tracked by the simulation source.
#[derive(Clone, Debug)]
pub struct TrackedObject {
    pub id: ObjectId,
    /// Position in km (ECI)
    pub position: DVec3,
    /// Velocity in km/s (ECI)
    pub velocity: DVec3,
    /// Mass in kg
    pub mass: f64,
    pub class: OrbitalClass,
    pub kind: ObjectKind,
    /// Threat classification, set for injected anomalies
    pub threat: Option<ThreatLevel>,
}

impl TrackedObject {
    /// Altitude above the mean Earth radius (km).
    pub fn altitude(&self) -> f64 {
        self.position.length() - EARTH_RADIUS_KM
    }

    /// Speed in km/s.
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }
}

/// Eccentricity of the osculating orbit for a state vector.
pub fn eccentricity_of(position: DVec3, velocity: DVec3) -> f64 {
    let r = position.length();
    if r <= 0.0 {
        return 0.0;
    }
    let v2 = velocity.length_squared();
    let e_vec = (position * (v2 - MU_EARTH / r) - velocity * position.dot(velocity)) / MU_EARTH;
    e_vec.length()
}

/// Circular orbital speed at the given altitude (km/s).
pub fn circular_speed(altitude_km: f64) -> f64 {
    (MU_EARTH / (EARTH_RADIUS_KM + altitude_km)).sqrt()
}
