//! Engine wiring.
//!
//! [`KesslerPlugin`] inserts every engine resource built from a
//! [`KesslerConfig`] and schedules the frame loop:
//!
//! 1. `PreUpdate`: the simulation clock advances
//! 2. `Update`: the population steps, queued commands run, the cascade
//!    controller catches up, then the periodic activities (prediction,
//!    snapshot refresh, status poll) fire on their own tickers

use bevy::prelude::*;
use chrono::Utc;

use crate::cascade::{CascadeCommands, CascadeController, CascadeStatus};
use crate::config::KesslerConfig;
use crate::conjunction::ConjunctionPredictor;
use crate::events::ConjunctionEventStore;
use crate::export::TimeSeriesRecorder;
use crate::population::{Population, step_population};
use crate::snapshot::{RefreshOutcome, SimulationSnapshotCache};
use crate::source::SimulationSource;
use crate::ticker::ActivitySchedule;
use crate::time::{SimulationClock, TimePlugin};

/// Points kept per metric by the runtime recorder.
const METRIC_HISTORY: usize = 600;

/// Latest status poll, for display layers.
#[derive(Resource, Clone, Debug, Default)]
pub struct StatusBoard {
    pub status: Option<CascadeStatus>,
    pub polls: u64,
}

/// Rolling metric history fed by every committed snapshot.
#[derive(Resource, Debug)]
pub struct MetricHistory(pub TimeSeriesRecorder);

impl Default for MetricHistory {
    fn default() -> Self {
        Self(TimeSeriesRecorder::new(METRIC_HISTORY))
    }
}

#[derive(Default)]
pub struct KesslerPlugin {
    pub config: KesslerConfig,
}

impl KesslerPlugin {
    pub fn new(config: KesslerConfig) -> Self {
        Self { config }
    }
}

impl Plugin for KesslerPlugin {
    fn build(&self, app: &mut App) {
        let config = &self.config;

        // Inserted before TimePlugin so its init_resource keeps the scale
        app.insert_resource(SimulationClock::with_scale(config.time_scale.unwrap_or(1.0)));
        if !app.is_plugin_added::<TimePlugin>() {
            app.add_plugins(TimePlugin);
        }

        app.insert_resource(config.clone())
            .insert_resource(config.schedule.activity_schedule())
            .insert_resource(Population::new(config.population.clone()))
            .insert_resource(ConjunctionPredictor::new(config.prediction.clone()))
            .insert_resource(CascadeController::new(config.cascade.clone()))
            .insert_resource(ConjunctionEventStore::new(
                config.events.clone(),
                config.state_store(),
            ))
            .insert_resource(SimulationSnapshotCache::new(config.snapshot.clone()))
            .init_resource::<CascadeCommands>()
            .init_resource::<StatusBoard>()
            .init_resource::<MetricHistory>()
            .add_systems(Startup, (load_event_history, seed_population))
            .add_systems(
                Update,
                (
                    step_population,
                    apply_cascade_commands,
                    advance_cascade,
                    run_predictions,
                    refresh_snapshot,
                    poll_status,
                )
                    .chain(),
            );
    }
}

fn load_event_history(mut store: ResMut<ConjunctionEventStore>) {
    let restored = store.load();
    if restored > 0 {
        info!("Restored {} conjunction events", restored);
    }
}

fn seed_population(mut population: ResMut<Population>, config: Res<KesslerConfig>) {
    let ids = population.seed_random_satellites(config.population.initial_satellites, Utc::now());
    info!("Seeded {} satellites", ids.len());
}

fn apply_cascade_commands(
    mut commands: ResMut<CascadeCommands>,
    mut controller: ResMut<CascadeController>,
    mut population: ResMut<Population>,
    mut store: ResMut<ConjunctionEventStore>,
) {
    if commands.is_empty() {
        return;
    }
    for command in commands.drain() {
        debug!("Applying {:?}", command);
        controller.apply(command, &mut *population, &mut store);
    }
}

fn advance_cascade(
    clock: Res<SimulationClock>,
    mut controller: ResMut<CascadeController>,
    mut population: ResMut<Population>,
    mut store: ResMut<ConjunctionEventStore>,
) {
    controller.advance(&clock, &mut *population, &mut store);
}

fn run_predictions(
    time: Res<Time>,
    clock: Res<SimulationClock>,
    mut schedule: ResMut<ActivitySchedule>,
    mut predictor: ResMut<ConjunctionPredictor>,
    mut controller: ResMut<CascadeController>,
    mut store: ResMut<ConjunctionEventStore>,
    population: Res<Population>,
) {
    if !schedule.prediction.should_run(time.delta()) {
        return;
    }
    let objects = population.tracked_objects();
    let found = predictor.run(&objects).len();
    predictor.record_predictions(clock.current, &mut store);
    controller.observe_predictions(predictor.latest());

    let window = predictor.settings.active_window_secs;
    let changed = store.advance_lifecycle(clock.current, window);
    debug!(
        "Prediction cycle {}: {} conjunctions, {} lifecycle changes",
        predictor.cycles(),
        found,
        changed
    );
}

fn refresh_snapshot(
    time: Res<Time>,
    clock: Res<SimulationClock>,
    mut schedule: ResMut<ActivitySchedule>,
    mut cache: ResMut<SimulationSnapshotCache>,
    mut history: ResMut<MetricHistory>,
    controller: Res<CascadeController>,
    store: Res<ConjunctionEventStore>,
    population: Res<Population>,
) {
    cache.record_frame(time.delta_secs_f64());
    if !schedule.snapshot.should_run(time.delta()) {
        return;
    }

    let conjunctions = store.active_events().into_iter().cloned().collect();
    let alerts = controller.recent_alerts(cache.settings().alert_limit);
    match cache.refresh(Some(&*population), conjunctions, alerts, clock.real) {
        RefreshOutcome::Refreshed => {
            if let Some(snapshot) = cache.latest() {
                history.0.record(&snapshot);
            }
        }
        outcome => debug!("Snapshot refresh: {:?}", outcome),
    }
}

fn poll_status(
    time: Res<Time>,
    mut schedule: ResMut<ActivitySchedule>,
    mut board: ResMut<StatusBoard>,
    controller: Res<CascadeController>,
) {
    if !schedule.status.should_run(time.delta()) {
        return;
    }
    let status = controller.status();
    if board
        .status
        .as_ref()
        .is_none_or(|previous| previous.threat_level != status.threat_level)
    {
        info!(
            "Threat level {} ({} anomalies, {} predicted collisions)",
            status.threat_level, status.active_anomalies, status.predicted_collisions
        );
    }
    board.status = Some(status);
    board.polls += 1;
}
