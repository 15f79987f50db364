//! Property-based tests for element generation and propagation.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{LeoParams, OrbitalStateResolver, TwoLineElements, checksum, generate_tle};
use crate::types::{EARTH_RADIUS_KM, OrbitalClass, circular_speed};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Generated element sets always parse back and resolve to a LEO state
    /// near the requested altitude.
    #[test]
    fn prop_generated_tle_resolves_near_altitude(
        seed in any::<u64>(),
        altitude in 300.0f64..1700.0,
        inclination in 0.0f64..120.0,
        offset_s in 0.0f64..86_400.0,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let epoch = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let params = LeoParams::with_shape(&mut rng, altitude, inclination);
        let (line1, line2) = generate_tle(&mut rng, 12345, &params, epoch).to_lines();

        prop_assert!(TwoLineElements::parse(&line1, &line2).is_ok());

        let at = epoch + chrono::Duration::milliseconds((offset_s * 1000.0) as i64);
        let state = OrbitalStateResolver::resolve(&line1, &line2, at).unwrap();

        // Eccentricity ≤ 0.02 bounds the radial excursion to ~2% of the radius
        let tolerance = 0.021 * (EARTH_RADIUS_KM + altitude) + 1.0;
        prop_assert!(
            (state.altitude_km - altitude).abs() < tolerance,
            "altitude {} vs requested {}", state.altitude_km, altitude
        );
        prop_assert_eq!(state.class, OrbitalClass::Leo);

        let v_circ = circular_speed(altitude);
        prop_assert!((state.velocity.length() - v_circ).abs() < 0.03 * v_circ);
    }

    /// Checksums are single digits for any input.
    #[test]
    fn prop_checksum_is_digit(line in "[0-9 .+-]{0,80}") {
        prop_assert!(checksum(&line) < 10);
    }
}
