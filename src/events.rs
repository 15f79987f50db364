//! Conjunction event lifecycle and bounded history.
//!
//! Every conjunction, predicted or detected, becomes a [`ConjunctionEvent`]
//! with a small state machine:
//!
//! ```text
//! predicted ──► active ──► resolved
//!     │            │
//!     └────────────┴────► passed
//! ```
//!
//! `resolved` and `passed` are terminal. History is newest first and evicts
//! from the tail once full; an evicted event also leaves the active index.
//! Every mutating operation ends by persisting history and named snapshots as
//! one record. Persistence failures are logged and never returned.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use bevy::log::{debug, info, warn};
use bevy::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conjunction::ConjunctionPrediction;
use crate::export::{self, ExportError};
use crate::persistence::{MemoryStore, StateStore};
use crate::population::ordered_pair;
use crate::types::ObjectId;

/// Storage key of the persisted record.
pub const STORE_KEY: &str = "kessler.conjunctions";

/// Unique event identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        EventId(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Predicted,
    Active,
    Resolved,
    Passed,
}

impl EventStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Resolved | EventStatus::Passed)
    }

    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        match (self, next) {
            (EventStatus::Predicted, EventStatus::Active) => true,
            (from, to) if !from.is_terminal() && to.is_terminal() => true,
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventStatus::Predicted => "predicted",
            EventStatus::Active => "active",
            EventStatus::Resolved => "resolved",
            EventStatus::Passed => "passed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "predicted" => Ok(EventStatus::Predicted),
            "active" => Ok(EventStatus::Active),
            "resolved" => Ok(EventStatus::Resolved),
            "passed" => Ok(EventStatus::Passed),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

/// Persisted record of one conjunction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConjunctionEvent {
    pub id: EventId,
    pub created_at: DateTime<Utc>,
    /// Simulation time the event was recorded (s)
    pub sim_time: f64,
    pub object_a: ObjectId,
    pub object_b: ObjectId,
    pub miss_distance_km: f64,
    /// Collision probability, 0-100
    pub probability: f64,
    /// Impact severity, 1-10
    pub severity: u8,
    /// Simulation time of closest approach (s)
    pub tca: f64,
    pub status: EventStatus,
}

impl ConjunctionEvent {
    pub fn pair(&self) -> (ObjectId, ObjectId) {
        (self.object_a, self.object_b)
    }
}

/// Input for a new event.
#[derive(Clone, Debug, PartialEq)]
pub struct NewConjunction {
    pub object_a: ObjectId,
    pub object_b: ObjectId,
    pub miss_distance_km: f64,
    pub probability: f64,
    pub severity: u8,
    /// Simulation time of closest approach (s)
    pub tca: f64,
    /// Simulation time now (s)
    pub sim_time: f64,
}

impl NewConjunction {
    pub fn from_prediction(prediction: &ConjunctionPrediction, now_secs: f64) -> Self {
        Self {
            object_a: prediction.object_a,
            object_b: prediction.object_b,
            miss_distance_km: prediction.miss_distance_km,
            probability: prediction.probability,
            severity: prediction.severity,
            tca: now_secs + prediction.time_to_closest_approach,
            sim_time: now_secs,
        }
    }

    /// An impact observed at `now_secs`.
    pub fn impact(a: ObjectId, b: ObjectId, now_secs: f64) -> Self {
        Self {
            object_a: a,
            object_b: b,
            miss_distance_km: 0.0,
            probability: 100.0,
            severity: 10,
            tca: now_secs,
            sim_time: now_secs,
        }
    }
}

/// Fields merged by [`ConjunctionEventStore::update_conjunction`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConjunctionUpdate {
    pub status: Option<EventStatus>,
    pub miss_distance_km: Option<f64>,
    pub probability: Option<f64>,
    pub tca: Option<f64>,
}

impl ConjunctionUpdate {
    pub fn status(status: EventStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Aggregate risk of the active set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// Classify from the highest collision probability (0-100).
    pub fn from_probability(max_probability: f64) -> Self {
        if max_probability >= 75.0 {
            RiskLevel::Critical
        } else if max_probability >= 50.0 {
            RiskLevel::High
        } else if max_probability >= 25.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// Named capture of the active set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub name: String,
    pub taken_at: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub events: Vec<ConjunctionEvent>,
}

/// Errors returned by event store operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EventStoreError {
    #[error("no conjunction event with id {0}")]
    NotFound(EventId),

    #[error("event {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: EventId,
        from: EventStatus,
        to: EventStatus,
    },
}

/// Capacities of the bounded lists.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EventStoreSettings {
    pub history_capacity: usize,
    pub snapshot_capacity: usize,
}

impl Default for EventStoreSettings {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            snapshot_capacity: 50,
        }
    }
}

/// The persisted layout: two bounded lists, newest first.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    history: Vec<ConjunctionEvent>,
    snapshots: Vec<AnalysisSnapshot>,
}

/// Bounded conjunction history with an index of open events.
#[derive(Resource)]
pub struct ConjunctionEventStore {
    settings: EventStoreSettings,
    history: VecDeque<ConjunctionEvent>,
    active: HashSet<EventId>,
    snapshots: VecDeque<AnalysisSnapshot>,
    backend: Box<dyn StateStore>,
}

impl Default for ConjunctionEventStore {
    fn default() -> Self {
        Self::new(EventStoreSettings::default(), Box::new(MemoryStore::new()))
    }
}

impl ConjunctionEventStore {
    pub fn new(settings: EventStoreSettings, backend: Box<dyn StateStore>) -> Self {
        Self {
            settings,
            history: VecDeque::new(),
            active: HashSet::new(),
            snapshots: VecDeque::new(),
            backend,
        }
    }

    /// Replace in-memory state with the persisted record, if any.
    ///
    /// Returns the number of events loaded. A missing or unreadable record
    /// leaves the store empty.
    pub fn load(&mut self) -> usize {
        let raw = match self.backend.read(STORE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(e) => {
                warn!("Failed to read conjunction history: {}", e);
                return 0;
            }
        };
        let state: PersistedState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding unreadable conjunction history: {}", e);
                return 0;
            }
        };

        self.history = state
            .history
            .into_iter()
            .take(self.settings.history_capacity)
            .collect();
        self.snapshots = state
            .snapshots
            .into_iter()
            .take(self.settings.snapshot_capacity)
            .collect();
        self.active = self
            .history
            .iter()
            .filter(|e| !e.status.is_terminal())
            .map(|e| e.id)
            .collect();
        info!(
            "Loaded {} conjunction events ({} open)",
            self.history.len(),
            self.active.len()
        );
        self.history.len()
    }

    fn persist(&self) {
        let state = PersistedState {
            history: self.history.iter().cloned().collect(),
            snapshots: self.snapshots.iter().cloned().collect(),
        };
        let result = serde_json::to_string(&state)
            .map_err(Into::into)
            .and_then(|json| self.backend.write(STORE_KEY, &json));
        if let Err(e) = result {
            warn!("Failed to persist conjunction history: {}", e);
        }
    }

    fn insert(&mut self, new: &NewConjunction) -> EventId {
        let (object_a, object_b) = ordered_pair(new.object_a, new.object_b);
        let event = ConjunctionEvent {
            id: EventId::new(),
            created_at: Utc::now(),
            sim_time: new.sim_time,
            object_a,
            object_b,
            miss_distance_km: new.miss_distance_km,
            probability: new.probability,
            severity: new.severity,
            tca: new.tca,
            status: EventStatus::Predicted,
        };
        let id = event.id;
        self.history.push_front(event);
        self.active.insert(id);

        while self.history.len() > self.settings.history_capacity {
            if let Some(evicted) = self.history.pop_back() {
                self.active.remove(&evicted.id);
            }
        }
        id
    }

    /// Record a new `predicted` event.
    pub fn add_conjunction(&mut self, new: NewConjunction) -> EventId {
        let id = self.insert(&new);
        debug!("Conjunction {} recorded for {}/{}", id, new.object_a, new.object_b);
        self.persist();
        id
    }

    /// Insert or refresh one event per prediction, persisting once.
    ///
    /// A pair that already has an open event gets its geometry refreshed;
    /// other pairs get a new `predicted` event.
    pub fn upsert_predictions(&mut self, batch: &[NewConjunction]) {
        for new in batch {
            match self.open_event_for_pair(new.object_a, new.object_b).map(|e| e.id) {
                Some(id) => {
                    if let Some(event) = self.find_mut(id) {
                        event.miss_distance_km = new.miss_distance_km;
                        event.probability = new.probability;
                        event.severity = new.severity;
                        event.tca = new.tca;
                    }
                }
                None => {
                    self.insert(new);
                }
            }
        }
        self.persist();
    }

    fn find_mut(&mut self, id: EventId) -> Option<&mut ConjunctionEvent> {
        self.history.iter_mut().find(|e| e.id == id)
    }

    pub fn get(&self, id: EventId) -> Option<&ConjunctionEvent> {
        self.history.iter().find(|e| e.id == id)
    }

    fn apply(&mut self, id: EventId, update: &ConjunctionUpdate) -> Result<EventStatus, EventStoreError> {
        let event = self.find_mut(id).ok_or(EventStoreError::NotFound(id))?;
        if let Some(next) = update.status {
            if next != event.status && !event.status.can_transition_to(next) {
                return Err(EventStoreError::InvalidTransition {
                    id,
                    from: event.status,
                    to: next,
                });
            }
        }

        if let Some(d) = update.miss_distance_km {
            event.miss_distance_km = d;
        }
        if let Some(p) = update.probability {
            event.probability = p;
        }
        if let Some(t) = update.tca {
            event.tca = t;
        }
        if let Some(next) = update.status {
            event.status = next;
        }
        let status = event.status;
        if status.is_terminal() {
            self.active.remove(&id);
        }
        Ok(status)
    }

    /// Merge `update` into an event.
    ///
    /// Moving to `resolved` or `passed` drops the event from the active index;
    /// it stays in history.
    pub fn update_conjunction(
        &mut self,
        id: EventId,
        update: ConjunctionUpdate,
    ) -> Result<EventStatus, EventStoreError> {
        let status = self.apply(id, &update)?;
        self.persist();
        Ok(status)
    }

    /// External acknowledgement: close the event as resolved.
    pub fn acknowledge(&mut self, id: EventId) -> Result<EventStatus, EventStoreError> {
        self.update_conjunction(id, ConjunctionUpdate::status(EventStatus::Resolved))
    }

    /// Mark an observed impact between `a` and `b`.
    ///
    /// Every open event for the pair passes through `active` to `resolved`.
    /// If the pair had no open event one is created first. Returns the ids
    /// touched.
    pub fn record_impact(&mut self, a: ObjectId, b: ObjectId, now_secs: f64) -> Vec<EventId> {
        let mut ids: Vec<EventId> = self.events_for_pair(a, b)
            .into_iter()
            .filter(|e| !e.status.is_terminal())
            .map(|e| e.id)
            .collect();
        if ids.is_empty() {
            ids.push(self.insert(&NewConjunction::impact(a, b, now_secs)));
        }

        for &id in &ids {
            let steps = [
                ConjunctionUpdate {
                    status: Some(EventStatus::Active),
                    miss_distance_km: Some(0.0),
                    tca: Some(now_secs),
                    ..Default::default()
                },
                ConjunctionUpdate::status(EventStatus::Resolved),
            ];
            for step in &steps {
                if let Err(e) = self.apply(id, step) {
                    warn!("Impact update skipped: {}", e);
                }
            }
        }
        self.persist();
        ids
    }

    /// Move events along their lifecycle at simulation time `now`.
    ///
    /// Predicted events become active once closest approach is within
    /// `active_window_secs`; open events pass once closest approach has
    /// elapsed. Returns the number of events changed.
    pub fn advance_lifecycle(&mut self, now: f64, active_window_secs: f64) -> usize {
        let mut changed = 0;
        let mut closed = Vec::new();
        for event in self.history.iter_mut().filter(|e| !e.status.is_terminal()) {
            let next = if event.tca < now {
                EventStatus::Passed
            } else if event.status == EventStatus::Predicted && event.tca - now <= active_window_secs {
                EventStatus::Active
            } else {
                continue;
            };
            event.status = next;
            if next.is_terminal() {
                closed.push(event.id);
            }
            changed += 1;
        }
        for id in &closed {
            self.active.remove(id);
        }
        if changed > 0 {
            self.persist();
        }
        changed
    }

    /// Every event for the pair, newest first.
    pub fn events_for_pair(&self, a: ObjectId, b: ObjectId) -> Vec<&ConjunctionEvent> {
        let pair = ordered_pair(a, b);
        self.history.iter().filter(|e| e.pair() == pair).collect()
    }

    /// The newest non-terminal event for the pair.
    pub fn open_event_for_pair(&self, a: ObjectId, b: ObjectId) -> Option<&ConjunctionEvent> {
        let pair = ordered_pair(a, b);
        self.history
            .iter()
            .find(|e| e.pair() == pair && self.active.contains(&e.id))
    }

    /// Open events, newest first.
    pub fn active_events(&self) -> Vec<&ConjunctionEvent> {
        self.history
            .iter()
            .filter(|e| self.active.contains(&e.id))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &ConjunctionEvent> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.settings.history_capacity
    }

    /// Aggregate risk from the highest open probability.
    pub fn risk_level(&self) -> RiskLevel {
        let max = self
            .active_events()
            .iter()
            .map(|e| e.probability)
            .fold(0.0, f64::max);
        RiskLevel::from_probability(max)
    }

    /// Capture the active set under `name` (or a timestamped default).
    pub fn save_snapshot(&mut self, name: Option<&str>) -> &AnalysisSnapshot {
        let taken_at = Utc::now();
        let snapshot = AnalysisSnapshot {
            name: name.map_or_else(
                || format!("analysis-{}", taken_at.format("%Y%m%dT%H%M%S")),
                str::to_string,
            ),
            taken_at,
            risk_level: self.risk_level(),
            events: self.active_events().into_iter().cloned().collect(),
        };
        self.snapshots.push_front(snapshot);
        self.snapshots.truncate(self.settings.snapshot_capacity);
        self.persist();
        &self.snapshots[0]
    }

    /// Saved analysis snapshots, newest first.
    pub fn snapshots(&self) -> impl Iterator<Item = &AnalysisSnapshot> {
        self.snapshots.iter()
    }

    /// Drop all history, open events and saved snapshots.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.active.clear();
        self.snapshots.clear();
        info!("Conjunction history cleared");
        self.persist();
    }

    /// History as a JSON array.
    pub fn export_json(&self) -> Result<String, ExportError> {
        let events: Vec<&ConjunctionEvent> = self.history.iter().collect();
        Ok(serde_json::to_string_pretty(&events)?)
    }

    /// History as delimited text, one row per event.
    pub fn export_csv(&self) -> String {
        export::conjunctions_to_csv(self.history.iter())
    }
}

/// Parse a JSON export back into events.
pub fn parse_json_export(json: &str) -> Result<Vec<ConjunctionEvent>, ExportError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::FailingStore;
    use std::sync::Arc;

    fn new_conj(a: u64, b: u64, tca: f64) -> NewConjunction {
        NewConjunction {
            object_a: ObjectId(a),
            object_b: ObjectId(b),
            miss_distance_km: 2.0,
            probability: 67.0,
            severity: 4,
            tca,
            sim_time: 0.0,
        }
    }

    /// Shares one memory store between two event stores.
    struct Shared(Arc<MemoryStore>);

    impl StateStore for Shared {
        fn read(&self, key: &str) -> Result<Option<String>, crate::persistence::PersistenceError> {
            self.0.read(key)
        }
        fn write(&self, key: &str, value: &str) -> Result<(), crate::persistence::PersistenceError> {
            self.0.write(key, value)
        }
    }

    #[test]
    fn test_add_normalises_pair() {
        let mut store = ConjunctionEventStore::default();
        let id = store.add_conjunction(new_conj(9, 3, 100.0));

        let event = store.get(id).unwrap();
        assert_eq!(event.pair(), (ObjectId(3), ObjectId(9)));
        assert_eq!(event.status, EventStatus::Predicted);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_history_is_bounded_fifo() {
        let settings = EventStoreSettings {
            history_capacity: 3,
            ..Default::default()
        };
        let mut store = ConjunctionEventStore::new(settings, Box::new(MemoryStore::new()));
        let ids: Vec<EventId> = (0..5).map(|i| store.add_conjunction(new_conj(i, i + 100, 10.0))).collect();

        assert_eq!(store.len(), 3);
        assert!(store.get(ids[0]).is_none());
        assert!(store.get(ids[1]).is_none());
        assert_eq!(store.history().next().unwrap().id, ids[4]);
        assert_eq!(store.active_count(), 3);
    }

    #[test]
    fn test_terminal_update_leaves_history() {
        let mut store = ConjunctionEventStore::default();
        let id = store.add_conjunction(new_conj(1, 2, 100.0));

        assert_eq!(store.acknowledge(id), Ok(EventStatus::Resolved));
        assert_eq!(store.active_count(), 0);
        assert_eq!(store.get(id).unwrap().status, EventStatus::Resolved);

        let err = store
            .update_conjunction(id, ConjunctionUpdate::status(EventStatus::Active))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_unknown_id() {
        let mut store = ConjunctionEventStore::default();
        let id = EventId::new();
        assert_eq!(store.acknowledge(id), Err(EventStoreError::NotFound(id)));
    }

    #[test]
    fn test_lifecycle_activation_and_passing() {
        let mut store = ConjunctionEventStore::default();
        let soon = store.add_conjunction(new_conj(1, 2, 30.0));
        let later = store.add_conjunction(new_conj(3, 4, 200.0));

        assert_eq!(store.advance_lifecycle(0.0, 60.0), 1);
        assert_eq!(store.get(soon).unwrap().status, EventStatus::Active);
        assert_eq!(store.get(later).unwrap().status, EventStatus::Predicted);

        assert_eq!(store.advance_lifecycle(31.0, 60.0), 1);
        assert_eq!(store.get(soon).unwrap().status, EventStatus::Passed);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_upsert_refreshes_open_pair() {
        let mut store = ConjunctionEventStore::default();
        store.upsert_predictions(&[new_conj(1, 2, 50.0)]);
        let mut refreshed = new_conj(2, 1, 45.0);
        refreshed.miss_distance_km = 0.5;
        store.upsert_predictions(&[refreshed]);

        assert_eq!(store.len(), 1);
        let event = store.open_event_for_pair(ObjectId(1), ObjectId(2)).unwrap();
        assert_eq!(event.miss_distance_km, 0.5);
        assert_eq!(event.tca, 45.0);
    }

    #[test]
    fn test_record_impact_resolves_open_events() {
        let mut store = ConjunctionEventStore::default();
        let id = store.add_conjunction(new_conj(1, 2, 50.0));

        assert_eq!(store.record_impact(ObjectId(2), ObjectId(1), 12.0), vec![id]);
        assert_eq!(store.get(id).unwrap().status, EventStatus::Resolved);

        // A pair with no prior event still gets a record
        let created = store.record_impact(ObjectId(5), ObjectId(6), 13.0);
        assert_eq!(created.len(), 1);
        assert_eq!(store.get(created[0]).unwrap().miss_distance_km, 0.0);
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_snapshots_are_bounded() {
        let settings = EventStoreSettings {
            snapshot_capacity: 2,
            ..Default::default()
        };
        let mut store = ConjunctionEventStore::new(settings, Box::new(MemoryStore::new()));
        store.add_conjunction(new_conj(1, 2, 50.0));

        store.save_snapshot(Some("first"));
        store.save_snapshot(None);
        let last = store.save_snapshot(Some("third"));
        assert_eq!(last.risk_level, RiskLevel::High);
        assert_eq!(last.events.len(), 1);

        let names: Vec<&str> = store.snapshots().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "third");
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let mut store =
            ConjunctionEventStore::new(EventStoreSettings::default(), Box::new(FailingStore));
        let id = store.add_conjunction(new_conj(1, 2, 50.0));

        assert!(store.get(id).is_some());
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn test_reload_restores_active_index() {
        let backend = Arc::new(MemoryStore::new());
        let mut store =
            ConjunctionEventStore::new(EventStoreSettings::default(), Box::new(Shared(backend.clone())));
        let open = store.add_conjunction(new_conj(1, 2, 50.0));
        let closed = store.add_conjunction(new_conj(3, 4, 50.0));
        store.acknowledge(closed).unwrap();

        let mut reloaded =
            ConjunctionEventStore::new(EventStoreSettings::default(), Box::new(Shared(backend)));
        assert_eq!(reloaded.load(), 2);
        assert_eq!(reloaded.active_count(), 1);
        assert!(reloaded.open_event_for_pair(ObjectId(1), ObjectId(2)).is_some());
        assert_eq!(reloaded.get(open).unwrap().status, EventStatus::Predicted);
    }

    #[test]
    fn test_json_export_round_trip() {
        let mut store = ConjunctionEventStore::default();
        store.add_conjunction(new_conj(1, 2, 50.0));
        let id = store.add_conjunction(new_conj(3, 4, 60.0));
        store.acknowledge(id).unwrap();

        let parsed = parse_json_export(&store.export_json().unwrap()).unwrap();
        let original: Vec<_> = store.history().cloned().collect();
        assert_eq!(parsed, original);
    }
}
