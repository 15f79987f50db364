//! Property-based tests for threat assessment and risk scoring.

use proptest::prelude::*;

use super::anomaly::AnomalyConfig;
use super::{AnomalyKind, ThreatCounts, ThreatThresholds};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Raising any count never lowers the threat level.
    #[test]
    fn prop_threat_monotonic(
        anomalies in 0usize..40,
        collisions in 0u64..20,
        debris in 0usize..3000,
        da in 0usize..10,
        dc in 0u64..10,
        dd in 0usize..500,
    ) {
        let thresholds = ThreatThresholds::default();
        let before = thresholds.assess(ThreatCounts { anomalies, collisions, debris });
        let after = thresholds.assess(ThreatCounts {
            anomalies: anomalies + da,
            collisions: collisions + dc,
            debris: debris + dd,
        });
        prop_assert!(after >= before, "{:?} dropped to {:?}", before, after);
    }

    /// Risk scores stay inside 0..=100 for any configuration.
    #[test]
    fn prop_risk_score_bounded(
        altitude in 150.0f64..40_000.0,
        velocity in 0.0f64..20.0,
        mass in 0.0f64..50_000.0,
        eccentricity in 0.0f64..0.9,
        inclination in 0.0f64..180.0,
    ) {
        let config = AnomalyConfig {
            kind: AnomalyKind::RogueSatellite,
            altitude_km: altitude,
            velocity_km_s: velocity,
            mass_kg: mass,
            eccentricity,
            inclination_deg: inclination,
            threat: super::ThreatLevel::Caution,
        };
        let score = config.risk_score();
        prop_assert!(score <= 100);
    }
}
