//! Engine configuration.
//!
//! Every section is optional in the TOML file; missing sections and fields
//! take their defaults.
//!
//! ```toml
//! time_scale = 10.0
//! persistence_dir = "state"
//!
//! [schedule]
//! prediction_ms = 500
//!
//! [cascade]
//! stage_timing = "simulation_time"
//! ```

use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cascade::CascadeSettings;
use crate::conjunction::PredictionSettings;
use crate::events::EventStoreSettings;
use crate::persistence::{FileStore, MemoryStore, StateStore};
use crate::population::PopulationSettings;
use crate::snapshot::SnapshotSettings;
use crate::ticker::ActivitySchedule;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Periods of the three periodic activities (milliseconds).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub snapshot_ms: u64,
    pub prediction_ms: u64,
    pub status_ms: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            snapshot_ms: 100,
            prediction_ms: 1000,
            status_ms: 500,
        }
    }
}

impl ScheduleSettings {
    pub fn activity_schedule(&self) -> ActivitySchedule {
        ActivitySchedule::new(self.snapshot_ms, self.prediction_ms, self.status_ms)
    }
}

/// Top-level configuration resource.
#[derive(Resource, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KesslerConfig {
    /// Initial simulation time multiplier
    pub time_scale: Option<f64>,
    /// Directory for persisted state; in-memory only when absent
    pub persistence_dir: Option<PathBuf>,
    pub schedule: ScheduleSettings,
    pub prediction: PredictionSettings,
    pub cascade: CascadeSettings,
    pub events: EventStoreSettings,
    pub snapshot: SnapshotSettings,
    pub population: PopulationSettings,
}

impl KesslerConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: KesslerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let schedule = &self.schedule;
        if [schedule.snapshot_ms, schedule.prediction_ms, schedule.status_ms].contains(&0) {
            return Err(ConfigError::Invalid {
                field: "schedule",
                reason: "periods must be positive".into(),
            });
        }
        if let Some(scale) = self.time_scale {
            positive("time_scale", scale)?;
        }
        positive("prediction.horizon_secs", self.prediction.horizon_secs)?;
        let decay = self.prediction.probability_decay;
        if decay < 0.0 || !decay.is_finite() {
            return Err(ConfigError::Invalid {
                field: "prediction.probability_decay",
                reason: format!("{decay} is negative or not finite"),
            });
        }
        if self.prediction.candidate_cap == 0 {
            return Err(ConfigError::Invalid {
                field: "prediction.candidate_cap",
                reason: "must admit at least one object".into(),
            });
        }
        if self
            .prediction
            .severity_thresholds_j
            .windows(2)
            .any(|w| w[0] > w[1])
        {
            return Err(ConfigError::Invalid {
                field: "prediction.severity_thresholds_j",
                reason: "thresholds must be ascending".into(),
            });
        }
        if self.events.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "events.history_capacity",
                reason: "must hold at least one event".into(),
            });
        }
        positive(
            "population.collision_distance_km",
            self.population.collision_distance_km,
        )?;
        positive("population.max_substep_secs", self.population.max_substep_secs)?;
        Ok(())
    }

    /// The durable store selected by `persistence_dir`.
    pub fn state_store(&self) -> Box<dyn StateStore> {
        match &self.persistence_dir {
            Some(dir) => Box::new(FileStore::new(dir)),
            None => Box::new(MemoryStore::new()),
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is not a positive finite number"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::StageTiming;

    #[test]
    fn test_empty_file_is_default() {
        let config = KesslerConfig::from_toml_str("").unwrap();
        assert_eq!(config.schedule, ScheduleSettings::default());
        assert_eq!(config.prediction.candidate_cap, 250);
        assert_eq!(config.events.history_capacity, 1000);
        assert!(config.persistence_dir.is_none());
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = KesslerConfig::from_toml_str(
            r#"
            time_scale = 20.0

            [schedule]
            prediction_ms = 250

            [cascade]
            stage_timing = "simulation_time"
            grace_delay_secs = 1.5

            [cascade.thresholds.caution]
            anomalies = 2
            collisions = 1
            debris = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.time_scale, Some(20.0));
        assert_eq!(config.schedule.prediction_ms, 250);
        assert_eq!(config.schedule.snapshot_ms, 100);
        assert_eq!(config.cascade.stage_timing, StageTiming::SimulationTime);
        assert_eq!(config.cascade.grace_delay_secs, 1.5);
        assert_eq!(config.cascade.thresholds.caution.anomalies, 2);
        assert_eq!(config.cascade.thresholds.critical.anomalies, 20);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = KesslerConfig::from_toml_str("[schedule]\nsnapshot_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "schedule", .. }));

        let err = KesslerConfig::from_toml_str("[prediction]\nseverity_thresholds_j = [10.0, 1.0]")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = KesslerConfig::from_toml_str("time_scale = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    fn rejected_field(content: &str) -> &'static str {
        match KesslerConfig::from_toml_str(content) {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected an invalid setting, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_zero_substep() {
        assert_eq!(
            rejected_field("[population]\nmax_substep_secs = 0.0"),
            "population.max_substep_secs"
        );
        assert_eq!(
            rejected_field("[population]\nmax_substep_secs = -1.0"),
            "population.max_substep_secs"
        );
    }

    #[test]
    fn test_rejects_bad_time_scale() {
        assert_eq!(rejected_field("time_scale = 0.0"), "time_scale");
        assert_eq!(rejected_field("time_scale = -2.0"), "time_scale");
        assert_eq!(rejected_field("time_scale = inf"), "time_scale");
        assert_eq!(rejected_field("time_scale = nan"), "time_scale");
    }

    #[test]
    fn test_rejects_negative_probability_decay() {
        assert_eq!(
            rejected_field("[prediction]\nprobability_decay = -0.1"),
            "prediction.probability_decay"
        );
        // Zero decay is allowed and makes every prediction certain
        assert!(KesslerConfig::from_toml_str("[prediction]\nprobability_decay = 0.0").is_ok());
    }

    #[test]
    fn test_rejects_zero_candidate_cap() {
        assert_eq!(
            rejected_field("[prediction]\ncandidate_cap = 0"),
            "prediction.candidate_cap"
        );
    }

    #[test]
    fn test_missing_file() {
        let err = KesslerConfig::load("/nonexistent/kessler.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
