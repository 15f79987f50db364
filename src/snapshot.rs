//! Rate-limited snapshot cache in front of the simulation source.
//!
//! A refresh samples the source, builds a complete [`Snapshot`] and swaps it in
//! whole. Consumers hold an `Arc` to whichever snapshot was current when they
//! asked and never observe a partial update.
//!
//! Refreshes never overlap. An in-progress flag is claimed through
//! [`SimulationSnapshotCache::begin_refresh`]; the returned guard clears it on
//! drop, so an abandoned refresh cannot leave the cache wedged. Stopping the
//! cache bumps an epoch so a refresh that was in flight when the stop arrived
//! is discarded instead of committed.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bevy::log::{debug, warn};
use bevy::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cascade::Alert;
use crate::events::ConjunctionEvent;
use crate::source::{ExportedObject, SimulationSource, positions_from_transforms};
use crate::types::{EARTH_RADIUS_KM, ObjectId, ObjectKind};

/// Configuration for the snapshot cache.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Objects requested from the bulk export per refresh
    pub max_export_objects: usize,
    /// Smoothing factor of the FPS moving average, 0-1
    pub fps_smoothing: f64,
    /// Alerts copied into each snapshot
    pub alert_limit: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            max_export_objects: 10_000,
            fps_smoothing: 0.1,
            alert_limit: 20,
        }
    }
}

/// How the object list of a snapshot was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectSourcePath {
    Export,
    RawBuffer,
}

/// One object as seen by consumers.
///
/// Objects read from the raw buffer only carry a position; their id is the
/// buffer index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotObject {
    pub id: ObjectId,
    pub position: [f64; 3],
    pub velocity: Option<[f64; 3]>,
    pub mass: Option<f64>,
    pub altitude: f64,
    pub kind: Option<ObjectKind>,
}

impl From<ExportedObject> for SnapshotObject {
    fn from(o: ExportedObject) -> Self {
        Self {
            id: o.id,
            position: o.position,
            velocity: Some(o.velocity),
            mass: Some(o.mass),
            altitude: o.altitude,
            kind: Some(o.kind),
        }
    }
}

/// Aggregate metrics captured with a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetrics {
    pub objects_tracked: usize,
    pub objects_rendered: usize,
    pub fps: f64,
    pub time_scale: f64,
    pub collision_count: u64,
    pub debris_generated: u64,
    pub cascade_active: bool,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub refreshes: u64,
    pub skipped_refreshes: u64,
    pub active_conjunctions: usize,
}

impl SnapshotMetrics {
    /// Every metric as a (name, value) pair.
    pub fn samples(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("objects_tracked", self.objects_tracked as f64),
            ("objects_rendered", self.objects_rendered as f64),
            ("fps", self.fps),
            ("time_scale", self.time_scale),
            ("collision_count", self.collision_count as f64),
            ("debris_generated", self.debris_generated as f64),
            ("cascade_active", if self.cascade_active { 1.0 } else { 0.0 }),
            ("cache_hits", self.cache_hits as f64),
            ("cache_misses", self.cache_misses as f64),
            ("refreshes", self.refreshes as f64),
            ("skipped_refreshes", self.skipped_refreshes as f64),
            ("active_conjunctions", self.active_conjunctions as f64),
        ]
    }
}

/// Immutable view of the simulation at one refresh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub objects: Vec<SnapshotObject>,
    pub metrics: SnapshotMetrics,
    pub conjunctions: Vec<ConjunctionEvent>,
    pub alerts: Vec<Alert>,
    pub timestamp: DateTime<Utc>,
    /// Engine wall-clock seconds at capture
    pub captured_at: f64,
    pub path: ObjectSourcePath,
}

/// Result of one refresh attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Another refresh was in flight, or the cache is stopped
    Skipped,
    /// No source, no objects, or neither read path available
    SourceUnavailable,
}

/// Filtering and downsampling for [`SimulationSnapshotCache::get_data`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataOptions {
    pub max_objects: Option<usize>,
    pub kind: Option<ObjectKind>,
}

/// What a consumer receives.
#[derive(Clone, Debug)]
pub struct SnapshotView {
    pub snapshot: Arc<Snapshot>,
    /// Filtered and downsampled objects
    pub objects: Vec<SnapshotObject>,
    /// Seconds since the snapshot was captured
    pub cache_age: f64,
}

/// Raised by a subscriber that could not take a snapshot.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SubscriberError {
    #[error("subscriber rejected snapshot: {0}")]
    Rejected(String),

    #[error("subscriber panicked: {0}")]
    Panicked(String),
}

type Callback = Box<dyn Fn(&Snapshot) -> Result<(), SubscriberError> + Send + Sync>;

struct Subscriber {
    name: String,
    callback: Callback,
    failures: u64,
}

/// Proof that a refresh holds the in-progress flag.
#[must_use]
pub struct RefreshGuard {
    flag: Arc<AtomicBool>,
    epoch: u64,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Resource)]
pub struct SimulationSnapshotCache {
    settings: SnapshotSettings,
    current: Option<Arc<Snapshot>>,
    refreshing: Arc<AtomicBool>,
    epoch: AtomicU64,
    stopped: bool,
    fps: f64,
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    skips: AtomicU64,
    subscribers: Vec<Subscriber>,
}

impl Default for SimulationSnapshotCache {
    fn default() -> Self {
        Self::new(SnapshotSettings::default())
    }
}

impl SimulationSnapshotCache {
    pub fn new(settings: SnapshotSettings) -> Self {
        Self {
            settings,
            current: None,
            refreshing: Arc::new(AtomicBool::new(false)),
            epoch: AtomicU64::new(0),
            stopped: false,
            fps: 0.0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            skips: AtomicU64::new(0),
            subscribers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &SnapshotSettings {
        &self.settings
    }

    /// Claim the in-progress flag. `None` if a refresh is already running.
    pub fn begin_refresh(&self) -> Option<RefreshGuard> {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            self.skips.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        Some(RefreshGuard {
            flag: Arc::clone(&self.refreshing),
            epoch: self.epoch.load(Ordering::Acquire),
        })
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Install `snapshot` if the guard's refresh is still current.
    ///
    /// Returns false when a stop arrived after the refresh began.
    pub fn commit(&mut self, guard: RefreshGuard, snapshot: Snapshot) -> bool {
        if self.stopped || guard.epoch != self.epoch.load(Ordering::Acquire) {
            debug!("Discarding snapshot from a stopped refresh");
            return false;
        }
        let snapshot = Arc::new(snapshot);
        self.current = Some(Arc::clone(&snapshot));
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        drop(guard);
        self.notify(&snapshot);
        true
    }

    /// Stop refreshing. Idempotent.
    ///
    /// A refresh already in flight keeps its flag until its guard drops, and
    /// its result is discarded by the epoch check in [`Self::commit`].
    pub fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.epoch.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn start(&mut self) {
        self.stopped = false;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Fold a frame delta into the FPS moving average.
    pub fn record_frame(&mut self, delta_secs: f64) {
        if delta_secs <= 0.0 {
            return;
        }
        let instant = 1.0 / delta_secs;
        self.fps = if self.fps == 0.0 {
            instant
        } else {
            self.fps + self.settings.fps_smoothing * (instant - self.fps)
        };
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Sample the source and replace the current snapshot.
    ///
    /// Conjunctions and alerts come from their owning components. When the
    /// source is missing or empty the previous snapshot stays in place.
    pub fn refresh(
        &mut self,
        source: Option<&dyn SimulationSource>,
        conjunctions: Vec<ConjunctionEvent>,
        alerts: Vec<Alert>,
        now: f64,
    ) -> RefreshOutcome {
        if self.stopped {
            return RefreshOutcome::Skipped;
        }
        let Some(guard) = self.begin_refresh() else {
            return RefreshOutcome::Skipped;
        };
        let Some(source) = source else {
            return RefreshOutcome::SourceUnavailable;
        };

        let counters = source.counters();
        if counters.active_objects == 0 {
            return RefreshOutcome::SourceUnavailable;
        }

        let (objects, path) = match source.export_objects(self.settings.max_export_objects) {
            Some(exported) => (
                exported.into_iter().map(SnapshotObject::from).collect(),
                ObjectSourcePath::Export,
            ),
            None => match source.raw_transforms() {
                Some(buffer) => (objects_from_buffer(buffer), ObjectSourcePath::RawBuffer),
                None => {
                    warn!("Simulation source offers neither export nor raw buffer");
                    return RefreshOutcome::SourceUnavailable;
                }
            },
        };

        let metrics = SnapshotMetrics {
            objects_tracked: counters.active_objects,
            objects_rendered: counters.rendered_objects,
            fps: self.fps,
            time_scale: counters.time_scale,
            collision_count: counters.collision_count,
            debris_generated: counters.debris_generated,
            cascade_active: counters.cascade_active,
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed) + 1,
            skipped_refreshes: self.skips.load(Ordering::Relaxed),
            active_conjunctions: conjunctions.len(),
        };
        let mut alerts = alerts;
        alerts.truncate(self.settings.alert_limit);

        let snapshot = Snapshot {
            objects,
            metrics,
            conjunctions,
            alerts,
            timestamp: Utc::now(),
            captured_at: now,
            path,
        };
        if self.commit(guard, snapshot) {
            RefreshOutcome::Refreshed
        } else {
            RefreshOutcome::Skipped
        }
    }

    /// The current snapshot, if any.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.current.clone()
    }

    /// The current snapshot filtered by kind and evenly downsampled.
    ///
    /// Counts a cache hit when a snapshot exists, a miss otherwise.
    pub fn get_data(&self, options: &DataOptions, now: f64) -> Option<SnapshotView> {
        let Some(snapshot) = self.current.clone() else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        self.hits.fetch_add(1, Ordering::Relaxed);

        let filtered: Vec<&SnapshotObject> = snapshot
            .objects
            .iter()
            .filter(|o| options.kind.is_none_or(|k| o.kind == Some(k)))
            .collect();
        let objects = match options.max_objects {
            Some(max) => downsample(&filtered, max),
            None => filtered.into_iter().cloned().collect(),
        };

        Some(SnapshotView {
            cache_age: (now - snapshot.captured_at).max(0.0),
            snapshot,
            objects,
        })
    }

    pub fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn skipped_count(&self) -> u64 {
        self.skips.load(Ordering::Relaxed)
    }

    /// Register a callback invoked after every committed refresh.
    pub fn subscribe<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Snapshot) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribers.push(Subscriber {
            name: name.into(),
            callback: Box::new(callback),
            failures: 0,
        });
    }

    pub fn unsubscribe(&mut self, name: &str) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.name != name);
        self.subscribers.len() != before
    }

    /// Failures recorded for a subscriber.
    pub fn subscriber_failures(&self, name: &str) -> Option<u64> {
        self.subscribers
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.failures)
    }

    fn notify(&mut self, snapshot: &Snapshot) {
        for subscriber in &mut self.subscribers {
            let callback = &subscriber.callback;
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot)))
                .unwrap_or_else(|payload| Err(SubscriberError::Panicked(panic_message(&*payload))));
            if let Err(e) = result {
                subscriber.failures += 1;
                warn!("Snapshot subscriber {} failed: {}", subscriber.name, e);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn objects_from_buffer(buffer: &[f32]) -> Vec<SnapshotObject> {
    positions_from_transforms(buffer)
        .into_iter()
        .enumerate()
        .map(|(i, p)| SnapshotObject {
            id: ObjectId(i as u64),
            position: p.to_array(),
            velocity: None,
            mass: None,
            altitude: p.length() - EARTH_RADIUS_KM,
            kind: None,
        })
        .collect()
}

/// Evenly strided subset of at most `max` items, keeping the first.
pub fn downsample<T: Clone>(items: &[&T], max: usize) -> Vec<T> {
    if items.len() <= max {
        return items.iter().map(|&item| item.clone()).collect();
    }
    if max == 0 {
        return Vec::new();
    }
    let stride = items.len() as f64 / max as f64;
    (0..max)
        .map(|k| items[(k as f64 * stride) as usize].clone())
        .collect()
}
