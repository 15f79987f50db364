//! Synthetic hazardous objects.
//!
//! Each anomaly type has its own parameter distribution. Risk is a 0-100
//! score built from additive rules on speed, mass, altitude band,
//! eccentricity and orbit direction.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use super::ThreatLevel;
use crate::types::{ObjectId, circular_speed};

/// Kind of injected anomaly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    RogueSatellite,
    AsatDebris,
    Micrometeorite,
    DefunctStage,
    CollisionFragment,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 5] = [
        AnomalyKind::RogueSatellite,
        AnomalyKind::AsatDebris,
        AnomalyKind::Micrometeorite,
        AnomalyKind::DefunctStage,
        AnomalyKind::CollisionFragment,
    ];

    /// Relative selection weight.
    pub fn weight(&self) -> f64 {
        match self {
            AnomalyKind::RogueSatellite => 0.25,
            AnomalyKind::AsatDebris => 0.15,
            AnomalyKind::Micrometeorite => 0.25,
            AnomalyKind::DefunctStage => 0.20,
            AnomalyKind::CollisionFragment => 0.15,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::RogueSatellite => "rogue satellite",
            AnomalyKind::AsatDebris => "ASAT debris",
            AnomalyKind::Micrometeorite => "micrometeorite",
            AnomalyKind::DefunctStage => "defunct stage",
            AnomalyKind::CollisionFragment => "collision fragment",
        }
    }

    /// Weighted random pick among all kinds.
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        WeightedIndex::new(Self::ALL.iter().map(AnomalyKind::weight))
            .map_or(AnomalyKind::RogueSatellite, |dist| Self::ALL[dist.sample(rng)])
    }
}

/// Parameters of one anomaly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    pub kind: AnomalyKind,
    pub altitude_km: f64,
    pub velocity_km_s: f64,
    pub mass_kg: f64,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub threat: ThreatLevel,
}

impl AnomalyConfig {
    /// Draw a configuration from the kind's distribution.
    pub fn sample<R: Rng + ?Sized>(kind: AnomalyKind, rng: &mut R) -> Self {
        let (altitude_km, mass_kg, eccentricity, threat): (f64, f64, f64, _) = match kind {
            AnomalyKind::RogueSatellite => (
                rng.gen_range(400.0..1200.0),
                rng.gen_range(200.0..2000.0),
                rng.gen_range(0.0..0.05),
                ThreatLevel::Elevated,
            ),
            AnomalyKind::AsatDebris => (
                rng.gen_range(500.0..900.0),
                rng.gen_range(5.0..50.0),
                rng.gen_range(0.0..0.02),
                ThreatLevel::Severe,
            ),
            AnomalyKind::Micrometeorite => (
                rng.gen_range(200.0..2000.0),
                rng.gen_range(0.001..0.5),
                rng.gen_range(0.3..0.9),
                ThreatLevel::Caution,
            ),
            AnomalyKind::DefunctStage => (
                rng.gen_range(300.0..900.0),
                rng.gen_range(1000.0..4000.0),
                rng.gen_range(0.01..0.15),
                ThreatLevel::Elevated,
            ),
            AnomalyKind::CollisionFragment => (
                rng.gen_range(400.0..1000.0),
                rng.gen_range(0.1..10.0),
                rng.gen_range(0.0..0.08),
                ThreatLevel::Caution,
            ),
        };

        let v_circ = circular_speed(altitude_km);
        let velocity_km_s = match kind {
            AnomalyKind::Micrometeorite => rng.gen_range(11.0..15.0),
            AnomalyKind::AsatDebris => v_circ * rng.gen_range(1.0..1.15),
            // Faster at perigee for an eccentric orbit
            _ => v_circ * (1.0 + eccentricity).sqrt() * rng.gen_range(0.99..1.01),
        };

        // Rogue satellites are the only kind that may fly retrograde
        let inclination_deg = match kind {
            AnomalyKind::RogueSatellite => rng.gen_range(0.0..180.0),
            _ => rng.gen_range(0.0..100.0),
        };

        Self {
            kind,
            altitude_km,
            velocity_km_s,
            mass_kg,
            eccentricity,
            inclination_deg,
            threat,
        }
    }

    pub fn is_retrograde(&self) -> bool {
        self.inclination_deg > 90.0
    }

    /// Collision-risk score, 0-100.
    pub fn risk_score(&self) -> u8 {
        let mut score = 0u32;

        score += match self.velocity_km_s {
            v if v > 10.0 => 30,
            v if v > 8.0 => 20,
            v if v > 7.5 => 10,
            _ => 0,
        };
        score += match self.mass_kg {
            m if m > 1000.0 => 25,
            m if m > 100.0 => 15,
            m if m > 1.0 => 5,
            _ => 0,
        };
        // The densest shells score highest
        score += match self.altitude_km {
            a if (700.0..=900.0).contains(&a) => 20,
            a if (400.0..700.0).contains(&a) => 15,
            _ => 5,
        };
        score += match self.eccentricity {
            e if e > 0.1 => 15,
            e if e > 0.01 => 5,
            _ => 0,
        };
        if self.is_retrograde() {
            score += 10;
        }

        score.min(100) as u8
    }
}

/// An injected anomaly and the objects it put into the source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: u64,
    pub config: AnomalyConfig,
    pub risk_score: u8,
    /// One body, or the fragments of an ASAT field
    pub objects: Vec<ObjectId>,
    /// Simulation time of injection (s)
    pub injected_at: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config(velocity: f64, mass: f64, altitude: f64, ecc: f64, inc: f64) -> AnomalyConfig {
        AnomalyConfig {
            kind: AnomalyKind::RogueSatellite,
            altitude_km: altitude,
            velocity_km_s: velocity,
            mass_kg: mass,
            eccentricity: ecc,
            inclination_deg: inc,
            threat: ThreatLevel::Elevated,
        }
    }

    #[test]
    fn test_risk_score_rules() {
        // 30 + 25 + 20 + 15 + 10
        assert_eq!(config(12.0, 2000.0, 800.0, 0.2, 120.0).risk_score(), 100);
        // 10 + 15 + 15 + 0 + 0
        assert_eq!(config(7.6, 500.0, 550.0, 0.001, 51.6).risk_score(), 40);
        // 0 + 0 + 5 + 5 + 0
        assert_eq!(config(3.0, 0.5, 20_000.0, 0.05, 10.0).risk_score(), 10);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = AnomalyKind::ALL.iter().map(AnomalyKind::weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sampling_covers_every_kind() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(AnomalyKind::sample(&mut rng));
        }
        assert_eq!(seen.len(), AnomalyKind::ALL.len());
    }

    #[test]
    fn test_sampled_configs_are_in_range() {
        let mut rng = StdRng::seed_from_u64(5);
        for kind in AnomalyKind::ALL {
            for _ in 0..50 {
                let c = AnomalyConfig::sample(kind, &mut rng);
                assert!(c.altitude_km >= 200.0 && c.altitude_km < 2000.0);
                assert!(c.velocity_km_s > 6.5);
                assert!(c.mass_kg > 0.0);
                assert!(c.risk_score() <= 100);
                if kind != AnomalyKind::RogueSatellite {
                    assert!(!c.is_retrograde());
                }
            }
        }
    }

    #[test]
    fn test_defunct_stage_is_launched_at_perigee_speed() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let c = AnomalyConfig::sample(AnomalyKind::DefunctStage, &mut rng);
            let floor = circular_speed(c.altitude_km) * (1.0 + c.eccentricity).sqrt() * 0.99;
            assert!(c.eccentricity >= 0.01 && c.eccentricity < 0.15);
            assert!(c.velocity_km_s >= floor, "{} < {floor}", c.velocity_km_s);
        }
    }
}
