//! Aggregate threat assessment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete aggregate risk classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    #[default]
    Nominal,
    Caution,
    Elevated,
    Severe,
    Critical,
}

impl ThreatLevel {
    pub const ALL: [ThreatLevel; 5] = [
        ThreatLevel::Nominal,
        ThreatLevel::Caution,
        ThreatLevel::Elevated,
        ThreatLevel::Severe,
        ThreatLevel::Critical,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ThreatLevel::Nominal => "NOMINAL",
            ThreatLevel::Caution => "CAUTION",
            ThreatLevel::Elevated => "ELEVATED",
            ThreatLevel::Severe => "SEVERE",
            ThreatLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Minimum counts for one tier. A tier matches when any count reaches its
/// threshold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub anomalies: usize,
    pub collisions: u64,
    pub debris: usize,
}

impl TierThreshold {
    fn matches(&self, counts: &ThreatCounts) -> bool {
        counts.anomalies >= self.anomalies
            || counts.collisions >= self.collisions
            || counts.debris >= self.debris
    }
}

/// The inputs of an assessment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThreatCounts {
    /// Live anomalies
    pub anomalies: usize,
    /// Cumulative collisions
    pub collisions: u64,
    /// Live debris objects
    pub debris: usize,
}

/// Thresholds for every tier above nominal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatThresholds {
    pub critical: TierThreshold,
    pub severe: TierThreshold,
    pub elevated: TierThreshold,
    pub caution: TierThreshold,
}

impl Default for ThreatThresholds {
    fn default() -> Self {
        Self {
            critical: TierThreshold {
                anomalies: 20,
                collisions: 10,
                debris: 2000,
            },
            severe: TierThreshold {
                anomalies: 10,
                collisions: 5,
                debris: 1000,
            },
            elevated: TierThreshold {
                anomalies: 5,
                collisions: 3,
                debris: 250,
            },
            caution: TierThreshold {
                anomalies: 1,
                collisions: 1,
                debris: 50,
            },
        }
    }
}

impl ThreatThresholds {
    /// Highest matching tier, checked from the most severe down.
    pub fn assess(&self, counts: ThreatCounts) -> ThreatLevel {
        let tiers = [
            (ThreatLevel::Critical, &self.critical),
            (ThreatLevel::Severe, &self.severe),
            (ThreatLevel::Elevated, &self.elevated),
            (ThreatLevel::Caution, &self.caution),
        ];
        tiers
            .into_iter()
            .find(|(_, threshold)| threshold.matches(&counts))
            .map_or(ThreatLevel::Nominal, |(level, _)| level)
    }
}
