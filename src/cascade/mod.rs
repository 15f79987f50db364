//! Cascade controller: anomaly injection, debris fields, scenario-driven
//! cascades and threat assessment.
//!
//! The controller is the only component that mutates the simulation source.
//! It receives the source and the event store explicitly on every call and
//! never looks them up itself. Work that must happen later (destroying
//! collided bodies after a grace delay, later stages of a multi-point
//! cascade) goes through a [`DelayQueue`] drained by [`CascadeController::advance`].

pub mod anomaly;
pub mod debris;
pub mod scenario;
pub mod threat;

#[cfg(test)]
mod proptest_threat;

use std::collections::{BTreeSet, HashSet, VecDeque};

use bevy::log::{debug, info, warn};
use bevy::math::DVec3;
use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub use anomaly::{Anomaly, AnomalyConfig, AnomalyKind};
pub use debris::{DebrisFieldConfig, PlaneElements, orbit_state};
pub use scenario::{AltitudeBand, CascadeAction, CascadeScenario};
pub use threat::{ThreatCounts, ThreatLevel, ThreatThresholds, TierThreshold};

use crate::conjunction::ConjunctionPrediction;
use crate::events::{ConjunctionEventStore, EventId};
use crate::population::ordered_pair;
use crate::source::{NewObject, SimulationSource};
use crate::ticker::DelayQueue;
use crate::time::SimulationClock;
use crate::types::{ObjectId, ObjectKind, OrbitalClass, TrackedObject, circular_speed};

/// Which clock cascade delays are measured on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageTiming {
    /// Wall-clock seconds, independent of the time multiplier
    #[default]
    RealTime,
    /// Scaled simulation seconds
    SimulationTime,
}

/// Configuration for the cascade controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeSettings {
    /// Seed for every random draw the controller makes
    pub seed: u64,
    pub thresholds: ThreatThresholds,
    pub stage_timing: StageTiming,
    /// Delay before collided bodies are removed (s)
    pub grace_delay_secs: f64,
    /// Fragments spawned by one collision
    pub collision_fragments: usize,
    /// Predictions closer than this raise an alert (s)
    pub imminent_secs: f64,
    pub alert_capacity: usize,
    /// Predictions carried in the status report
    pub recent_predictions: usize,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            seed: 0xca5cade,
            thresholds: ThreatThresholds::default(),
            stage_timing: StageTiming::RealTime,
            grace_delay_secs: 0.5,
            collision_fragments: 40,
            imminent_secs: 30.0,
            alert_capacity: 100,
            recent_predictions: 10,
        }
    }
}

/// Aggregate cascade counters. Only [`CascadeController::reset`] lowers them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeMetrics {
    pub total_collisions: u64,
    pub total_debris: u64,
    pub affected_regimes: BTreeSet<OrbitalClass>,
    /// 0-10
    pub cascade_level: u8,
    pub critical_density: bool,
    /// Debris objects alive at the last assessment
    pub live_debris: usize,
}

/// Live debris at which the population counts as critically dense.
const CRITICAL_DEBRIS: usize = 1500;

impl CascadeMetrics {
    fn refresh_level(&mut self, live_debris: usize) {
        self.live_debris = live_debris;
        let level = self.total_collisions as f64 * 0.5 + live_debris as f64 / 250.0;
        self.cascade_level = level.floor().min(10.0) as u8;
        self.critical_density = live_debris >= CRITICAL_DEBRIS || self.cascade_level >= 8;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ThreatChange,
    Collision,
    ImminentConjunction,
    Scenario,
}

/// One entry of the alert log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    /// Simulation time (s)
    pub sim_time: f64,
    pub kind: AlertKind,
    pub level: ThreatLevel,
    pub message: String,
}

/// Display-facing summary of the controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeStatus {
    pub threat_level: ThreatLevel,
    pub active_anomalies: usize,
    pub predicted_collisions: usize,
    pub cascade_metrics: CascadeMetrics,
    pub recent_predictions: Vec<ConjunctionPrediction>,
}

/// Requests from dashboards and other outer layers.
#[derive(Clone, Debug, PartialEq)]
pub enum CascadeCommand {
    InjectAnomalies(usize),
    CreateDebrisField(DebrisFieldConfig),
    Trigger(CascadeScenario),
    Acknowledge(EventId),
    Reset,
}

/// Commands waiting for the next frame.
#[derive(Resource, Default, Debug)]
pub struct CascadeCommands {
    queue: Vec<CascadeCommand>,
}

impl CascadeCommands {
    pub fn push(&mut self, command: CascadeCommand) {
        self.queue.push(command);
    }

    pub fn drain(&mut self) -> Vec<CascadeCommand> {
        std::mem::take(&mut self.queue)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Resource)]
pub struct CascadeController {
    settings: CascadeSettings,
    rng: StdRng,
    threat: ThreatLevel,
    metrics: CascadeMetrics,
    anomalies: Vec<Anomaly>,
    next_anomaly: u64,
    /// Collisions already processed, as ordered pairs
    handled: HashSet<(ObjectId, ObjectId)>,
    pending: DelayQueue<CascadeAction>,
    alerts: VecDeque<Alert>,
    next_alert: u64,
    predictions: Vec<ConjunctionPrediction>,
    /// Pairs already announced as imminent
    warned: HashSet<(ObjectId, ObjectId)>,
    sim_now: f64,
    real_now: f64,
}

impl Default for CascadeController {
    fn default() -> Self {
        Self::new(CascadeSettings::default())
    }
}

impl CascadeController {
    pub fn new(settings: CascadeSettings) -> Self {
        Self {
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
            threat: ThreatLevel::Nominal,
            metrics: CascadeMetrics::default(),
            anomalies: Vec::new(),
            next_anomaly: 1,
            handled: HashSet::new(),
            pending: DelayQueue::default(),
            alerts: VecDeque::new(),
            next_alert: 1,
            predictions: Vec::new(),
            warned: HashSet::new(),
            sim_now: 0.0,
            real_now: 0.0,
        }
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    pub fn threat_level(&self) -> ThreatLevel {
        self.threat
    }

    pub fn metrics(&self) -> &CascadeMetrics {
        &self.metrics
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn active_anomalies(&self) -> usize {
        self.anomalies.len()
    }

    /// Deferred actions not yet due.
    pub fn pending_actions(&self) -> usize {
        self.pending.len()
    }

    /// Now, on the clock delays are measured against.
    fn timeline_now(&self) -> f64 {
        match self.settings.stage_timing {
            StageTiming::RealTime => self.real_now,
            StageTiming::SimulationTime => self.sim_now,
        }
    }

    fn alert(&mut self, kind: AlertKind, level: ThreatLevel, message: String) {
        self.alerts.push_front(Alert {
            id: self.next_alert,
            sim_time: self.sim_now,
            kind,
            level,
            message,
        });
        self.next_alert += 1;
        self.alerts.truncate(self.settings.alert_capacity);
    }

    /// Newest alerts first, at most `limit`.
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.alerts.iter().take(limit).cloned().collect()
    }

    /// Recompute the threat tier and cascade level from current counts.
    fn reassess(&mut self, source: &dyn SimulationSource) {
        let live_debris = source.count_kind(ObjectKind::Debris);
        self.metrics.refresh_level(live_debris);

        let level = self.settings.thresholds.assess(ThreatCounts {
            anomalies: self.anomalies.len(),
            collisions: self.metrics.total_collisions,
            debris: live_debris,
        });
        if level != self.threat {
            info!("Threat level {} -> {}", self.threat, level);
            self.alert(
                AlertKind::ThreatChange,
                level,
                format!("Threat level changed from {} to {}", self.threat, level),
            );
            self.threat = level;
        }
    }

    fn spawn_field(&mut self, config: &DebrisFieldConfig, source: &mut dyn SimulationSource) -> Vec<ObjectId> {
        let fragments = config.fragments(&mut self.rng);
        self.metrics.total_debris += fragments.len() as u64;
        fragments
            .into_iter()
            .map(|fragment| {
                self.metrics.affected_regimes.insert(fragment.class());
                source.spawn(fragment)
            })
            .collect()
    }

    /// Inject `count` anomalies of weighted random kinds.
    ///
    /// ASAT anomalies become a debris field; every other kind is one body.
    pub fn inject_anomalies(&mut self, count: usize, source: &mut dyn SimulationSource) -> Vec<u64> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = AnomalyKind::sample(&mut self.rng);
            let config = AnomalyConfig::sample(kind, &mut self.rng);
            let raan = self.rng.gen_range(0.0..360.0);
            let phase = self.rng.gen_range(0.0..360.0);

            let objects = if kind == AnomalyKind::AsatDebris {
                let fragments = self.rng.gen_range(20..=60);
                let field = DebrisFieldConfig {
                    altitude_km: config.altitude_km,
                    inclination_deg: config.inclination_deg,
                    raan_deg: raan,
                    phase_deg: phase,
                    count: fragments,
                    mass_kg: config.mass_kg * fragments as f64,
                    spread_deg: 10.0,
                    velocity_factor: config.velocity_km_s / circular_speed(config.altitude_km),
                };
                self.spawn_field(&field, source)
            } else {
                let (position, velocity) = orbit_state(
                    config.altitude_km,
                    config.inclination_deg,
                    raan,
                    phase,
                    config.velocity_km_s,
                );
                let object = NewObject::new(position, velocity, config.mass_kg, ObjectKind::Anomaly)
                    .with_threat(config.threat);
                self.metrics.affected_regimes.insert(object.class());
                vec![source.spawn(object)]
            };

            let anomaly = Anomaly {
                id: self.next_anomaly,
                risk_score: config.risk_score(),
                config,
                objects,
                injected_at: self.sim_now,
            };
            debug!(
                "Anomaly {} ({}) risk {}",
                anomaly.id,
                anomaly.config.kind.label(),
                anomaly.risk_score
            );
            ids.push(anomaly.id);
            self.next_anomaly += 1;
            self.anomalies.push(anomaly);
        }
        info!("Injected {} anomalies", count);
        self.reassess(source);
        ids
    }

    /// Spawn a debris field and reassess.
    pub fn create_debris_field(
        &mut self,
        config: &DebrisFieldConfig,
        source: &mut dyn SimulationSource,
    ) -> Vec<ObjectId> {
        let ids = self.spawn_field(config, source);
        info!(
            "Debris field of {} fragments at {:.0} km",
            ids.len(),
            config.altitude_km
        );
        self.reassess(source);
        ids
    }

    /// Destroy one object in `band` and fragment it where it was.
    ///
    /// Debris is never targeted. Returns `None` when the band is empty.
    fn strike(
        &mut self,
        band: AltitudeBand,
        fragments: usize,
        source: &mut dyn SimulationSource,
    ) -> Option<Vec<ObjectId>> {
        let targets: Vec<TrackedObject> = source
            .tracked_objects()
            .into_iter()
            .filter(|o| o.kind != ObjectKind::Debris && band.contains_object(o))
            .collect();
        let Some(target) = targets.choose(&mut self.rng) else {
            info!(
                "No targets between {:.0} and {:.0} km, strike skipped",
                band.min_km, band.max_km
            );
            return None;
        };

        remove_object(source, target);
        let field = DebrisFieldConfig::around(
            target.position,
            target.velocity,
            fragments,
            target.mass.max(100.0),
        );
        let ids = self.spawn_field(&field, source);
        self.metrics.total_collisions += 1;
        self.metrics.affected_regimes.insert(target.class);
        self.alert(
            AlertKind::Collision,
            self.threat,
            format!("{} destroyed at {:.0} km", target.id, target.altitude()),
        );
        Some(ids)
    }

    /// Run a named cascade scenario. Returns false when it was a no-op.
    pub fn trigger_cascade(
        &mut self,
        scenario: &CascadeScenario,
        source: &mut dyn SimulationSource,
        store: &mut ConjunctionEventStore,
    ) -> bool {
        info!("Triggering {} cascade", scenario.name());
        let fired = match scenario {
            CascadeScenario::Asat { band, fragments } => {
                self.strike(*band, *fragments, source).is_some()
            }
            CascadeScenario::MultiPoint {
                bands,
                stage_delay_secs,
                fragments_per_stage,
            } => {
                let objects = source.tracked_objects();
                let has_targets = bands.iter().any(|band| {
                    objects
                        .iter()
                        .any(|o| o.kind != ObjectKind::Debris && band.contains_object(o))
                });
                if has_targets {
                    let start = self.timeline_now();
                    for (stage, band) in bands.iter().enumerate() {
                        self.pending.schedule(
                            start + stage as f64 * stage_delay_secs,
                            CascadeAction::Strike {
                                band: *band,
                                fragments: *fragments_per_stage,
                            },
                        );
                    }
                    self.run_due(source);
                } else {
                    info!("No targets in any multi-point band, cascade skipped");
                }
                has_targets
            }
            CascadeScenario::Swarm {
                altitude_km,
                count,
                velocity_factor,
            } => {
                let field = DebrisFieldConfig {
                    altitude_km: *altitude_km,
                    inclination_deg: self.rng.gen_range(0.0..100.0),
                    raan_deg: self.rng.gen_range(0.0..360.0),
                    phase_deg: self.rng.gen_range(0.0..360.0),
                    count: *count,
                    mass_kg: *count as f64 * 5.0,
                    spread_deg: 30.0,
                    velocity_factor: *velocity_factor,
                };
                let spawned = self.spawn_field(&field, source);
                if !spawned.is_empty() {
                    self.metrics.total_collisions += 1;
                }
                !spawned.is_empty()
            }
            CascadeScenario::Default => match source.trigger_collision() {
                Some((a, b)) => self.handle_collision(a, b, source, store),
                None => {
                    warn!("Simulation source could not force a collision");
                    false
                }
            },
        };

        if fired {
            source.set_cascade_active(true);
            self.alert(
                AlertKind::Scenario,
                self.threat,
                format!("{} cascade triggered", scenario.name()),
            );
        }
        self.reassess(source);
        fired
    }

    /// Process an observed collision between `a` and `b`.
    ///
    /// Each physical collision is handled once; repeated notifications for the
    /// same pair return false. The pair's events are resolved, a fragment
    /// field is spawned at the midpoint and both bodies are removed after the
    /// grace delay.
    pub fn handle_collision(
        &mut self,
        a: ObjectId,
        b: ObjectId,
        source: &mut dyn SimulationSource,
        store: &mut ConjunctionEventStore,
    ) -> bool {
        let pair = ordered_pair(a, b);
        if !self.handled.insert(pair) {
            debug!("Collision {}/{} already handled", pair.0, pair.1);
            return false;
        }

        // Pairs whose bodies are both gone cannot be reported again
        self.handled.retain(|&(x, y)| {
            (x, y) == pair || source.get(x).is_some() || source.get(y).is_some()
        });

        store.record_impact(a, b, self.sim_now);

        let bodies: Vec<TrackedObject> = [a, b].into_iter().filter_map(|id| source.get(id)).collect();
        if !bodies.is_empty() {
            let n = bodies.len() as f64;
            let position = bodies.iter().map(|o| o.position).sum::<DVec3>() / n;
            let velocity = bodies.iter().map(|o| o.velocity).sum::<DVec3>() / n;
            let mass: f64 = bodies.iter().map(|o| o.mass).sum();
            for body in &bodies {
                self.metrics.affected_regimes.insert(body.class);
            }
            let field = DebrisFieldConfig::around(
                position,
                velocity,
                self.settings.collision_fragments,
                mass,
            );
            self.spawn_field(&field, source);
        }

        let due = self.timeline_now() + self.settings.grace_delay_secs;
        self.pending.schedule(due, CascadeAction::Destroy(a));
        self.pending.schedule(due, CascadeAction::Destroy(b));

        self.metrics.total_collisions += 1;
        source.set_cascade_active(true);
        info!("Collision between {} and {}", pair.0, pair.1);
        self.alert(
            AlertKind::Collision,
            self.threat,
            format!("Collision between {} and {}", pair.0, pair.1),
        );
        self.reassess(source);
        true
    }

    fn run_due(&mut self, source: &mut dyn SimulationSource) {
        for action in self.pending.drain_due(self.timeline_now()) {
            match action {
                CascadeAction::Destroy(id) => {
                    if let Some(object) = source.get(id) {
                        remove_object(source, &object);
                    }
                }
                CascadeAction::Strike { band, fragments } => {
                    self.strike(band, fragments, source);
                }
            }
        }
    }

    /// Sync to the clock, handle collisions the source reported, execute due
    /// actions and reassess.
    pub fn advance(
        &mut self,
        clock: &SimulationClock,
        source: &mut dyn SimulationSource,
        store: &mut ConjunctionEventStore,
    ) {
        self.sim_now = clock.current;
        self.real_now = clock.real;
        for (a, b) in source.drain_collisions() {
            self.handle_collision(a, b, source, store);
        }
        self.run_due(source);

        // Anomalies whose bodies are all gone no longer count as active
        self.anomalies
            .retain(|a| a.objects.iter().any(|&id| source.get(id).is_some()));
        self.reassess(source);
    }

    /// Take the latest predictions and raise alerts for imminent ones.
    pub fn observe_predictions(&mut self, predictions: &[ConjunctionPrediction]) {
        self.predictions = predictions.to_vec();

        let imminent: Vec<&ConjunctionPrediction> = predictions
            .iter()
            .filter(|p| p.time_to_closest_approach < self.settings.imminent_secs)
            .collect();
        let current: HashSet<(ObjectId, ObjectId)> = imminent.iter().map(|p| p.pair()).collect();

        for p in imminent {
            if self.warned.contains(&p.pair()) {
                continue;
            }
            warn!(
                "Imminent conjunction {}/{} in {:.1}s, miss {:.2} km",
                p.object_a, p.object_b, p.time_to_closest_approach, p.miss_distance_km
            );
            self.alert(
                AlertKind::ImminentConjunction,
                self.threat,
                format!(
                    "{} and {} pass within {:.2} km in {:.0}s",
                    p.object_a, p.object_b, p.miss_distance_km, p.time_to_closest_approach
                ),
            );
        }
        self.warned = current;
    }

    pub fn status(&self) -> CascadeStatus {
        CascadeStatus {
            threat_level: self.threat,
            active_anomalies: self.anomalies.len(),
            predicted_collisions: self.predictions.len(),
            cascade_metrics: self.metrics.clone(),
            recent_predictions: self
                .predictions
                .iter()
                .take(self.settings.recent_predictions)
                .cloned()
                .collect(),
        }
    }

    /// Forget all cascade state. Spawned objects stay in the source.
    pub fn reset(&mut self, source: &mut dyn SimulationSource) {
        self.threat = ThreatLevel::Nominal;
        self.metrics = CascadeMetrics::default();
        self.anomalies.clear();
        self.handled.clear();
        self.pending.clear();
        self.alerts.clear();
        self.predictions.clear();
        self.warned.clear();
        source.set_cascade_active(false);
        info!("Cascade state reset");
    }

    /// Execute one queued command.
    pub fn apply(
        &mut self,
        command: CascadeCommand,
        source: &mut dyn SimulationSource,
        store: &mut ConjunctionEventStore,
    ) {
        match command {
            CascadeCommand::InjectAnomalies(count) => {
                self.inject_anomalies(count, source);
            }
            CascadeCommand::CreateDebrisField(config) => {
                self.create_debris_field(&config, source);
            }
            CascadeCommand::Trigger(scenario) => {
                self.trigger_cascade(&scenario, source, store);
            }
            CascadeCommand::Acknowledge(id) => {
                if let Err(e) = store.acknowledge(id) {
                    warn!("Acknowledge failed: {}", e);
                }
            }
            CascadeCommand::Reset => self.reset(source),
        }
    }
}

fn remove_object(source: &mut dyn SimulationSource, object: &TrackedObject) {
    let removed = match object.kind {
        ObjectKind::Satellite => source.remove_satellite(object.id),
        ObjectKind::Debris | ObjectKind::Anomaly => source.destroy_body(object.id),
    };
    if !removed {
        debug!("{} already gone", object.id);
    }
}
