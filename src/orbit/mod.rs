//! Orbital state resolution from two-line element sets.
//!
//! Converts a TLE pair and a target time into an ECI position/velocity with
//! derived altitude and orbital regime. Everything here is pure: no shared
//! state, safe to call from any number of callers.

pub mod kepler;
pub mod tle;

#[cfg(test)]
mod proptest_orbit;

use bevy::log::warn;
use bevy::math::DVec3;
use chrono::{DateTime, Utc};

pub use kepler::{KeplerOrbit, PropagationError, StateVector};
pub use tle::{
    LeoParams, TleParseError, TwoLineElements, checksum, generate_tle, mean_motion_for_altitude,
};

use crate::types::{EARTH_RADIUS_KM, OrbitalClass};

/// Why an element set could not be resolved.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("malformed orbital elements: {0}")]
    Parse(#[from] TleParseError),

    #[error("propagation failed: {0}")]
    Propagation(#[from] PropagationError),
}

/// State of one object at the requested time.
#[derive(Clone, Debug)]
pub struct ResolvedState {
    /// Position in km (ECI)
    pub position: DVec3,
    /// Velocity in km/s (ECI)
    pub velocity: DVec3,
    /// Altitude above the mean Earth radius (km)
    pub altitude_km: f64,
    pub class: OrbitalClass,
}

/// A named TLE pair waiting to be resolved.
#[derive(Clone, Debug)]
pub struct ElementSet {
    pub name: String,
    pub line1: String,
    pub line2: String,
}

/// Stateless resolver from orbital elements to state vectors.
pub struct OrbitalStateResolver;

impl OrbitalStateResolver {
    /// Resolve a raw line pair at `at`.
    pub fn resolve(line1: &str, line2: &str, at: DateTime<Utc>) -> Result<ResolvedState, ResolveError> {
        let elements = TwoLineElements::parse(line1, line2)?;
        Ok(Self::resolve_elements(&elements, at)?)
    }

    /// Resolve already-parsed elements at `at`.
    pub fn resolve_elements(
        elements: &TwoLineElements,
        at: DateTime<Utc>,
    ) -> Result<ResolvedState, PropagationError> {
        let orbit = elements.to_orbit()?;
        let dt = (at - elements.epoch).num_microseconds().map_or_else(
            || (at - elements.epoch).num_seconds() as f64,
            |us| us as f64 * 1e-6,
        );
        let state = orbit.propagate(dt)?;
        let altitude_km = state.position.length() - EARTH_RADIUS_KM;
        if altitude_km <= 0.0 {
            return Err(PropagationError::Decayed {
                perigee_altitude_km: altitude_km,
            });
        }

        Ok(ResolvedState {
            position: state.position,
            velocity: state.velocity,
            altitude_km,
            class: OrbitalClass::classify(altitude_km, elements.eccentricity),
        })
    }

    /// Resolve a batch, skipping (and logging) entries that fail.
    ///
    /// Returns the surviving entries with their states, in input order.
    pub fn resolve_batch<'a>(
        sets: &'a [ElementSet],
        at: DateTime<Utc>,
    ) -> Vec<(&'a ElementSet, ResolvedState)> {
        sets.iter()
            .filter_map(|set| match Self::resolve(&set.line1, &set.line2, at) {
                Ok(state) => Some((set, state)),
                Err(e) => {
                    warn!("Skipping {}: {}", set.name, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{ISS_LINE1, ISS_LINE2};
    use chrono::Duration;

    #[test]
    fn test_resolve_reference_at_epoch() {
        let tle = TwoLineElements::parse(ISS_LINE1, ISS_LINE2).unwrap();
        let state = OrbitalStateResolver::resolve(ISS_LINE1, ISS_LINE2, tle.epoch).unwrap();

        assert!(state.altitude_km > 300.0 && state.altitude_km < 420.0);
        assert_eq!(state.class, OrbitalClass::Leo);
        assert!((state.velocity.length() - 7.7).abs() < 0.2);
    }

    #[test]
    fn test_resolve_moves_with_time() {
        let tle = TwoLineElements::parse(ISS_LINE1, ISS_LINE2).unwrap();
        let a = OrbitalStateResolver::resolve_elements(&tle, tle.epoch).unwrap();
        let b = OrbitalStateResolver::resolve_elements(&tle, tle.epoch + Duration::seconds(60))
            .unwrap();

        // ~7.7 km/s for a minute
        let moved = (b.position - a.position).length();
        assert!((400.0..500.0).contains(&moved), "moved {moved} km");
    }

    #[test]
    fn test_malformed_lines_are_parse_errors() {
        let err = OrbitalStateResolver::resolve("garbage", ISS_LINE2, Utc::now()).unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)));
    }

    #[test]
    fn test_decayed_orbit_is_propagation_error() {
        let mut tle = TwoLineElements::parse(ISS_LINE1, ISS_LINE2).unwrap();
        tle.mean_motion_rev_per_day = 17.5;
        let (l1, l2) = tle.to_lines();

        let err = OrbitalStateResolver::resolve(&l1, &l2, tle.epoch).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Propagation(PropagationError::Decayed { .. })
        ));
    }

    #[test]
    fn test_batch_skips_failures() {
        let sets = vec![
            ElementSet {
                name: "ISS".into(),
                line1: ISS_LINE1.into(),
                line2: ISS_LINE2.into(),
            },
            ElementSet {
                name: "BROKEN".into(),
                line1: "1 00000".into(),
                line2: String::new(),
            },
        ];

        let resolved = OrbitalStateResolver::resolve_batch(&sets, Utc::now());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].0.name, "ISS");
    }
}
