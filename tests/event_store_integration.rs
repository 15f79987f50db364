//! Integration tests for the conjunction event store with durable storage.

mod common;

use common::scratch_dir;
use kessler::events::{
    ConjunctionEventStore, EventStatus, EventStoreSettings, NewConjunction, RiskLevel,
    STORE_KEY, parse_json_export,
};
use kessler::export::parse_conjunction_csv;
use kessler::persistence::FileStore;
use kessler::types::ObjectId;

fn conjunction(a: u64, b: u64, miss_km: f64, tca: f64) -> NewConjunction {
    NewConjunction {
        object_a: ObjectId(a),
        object_b: ObjectId(b),
        miss_distance_km: miss_km,
        probability: 100.0 * (-0.2 * miss_km).exp(),
        severity: 4,
        tca,
        sim_time: 0.0,
    }
}

fn file_store(dir: &std::path::Path, settings: EventStoreSettings) -> ConjunctionEventStore {
    ConjunctionEventStore::new(settings, Box::new(FileStore::new(dir)))
}

#[test]
fn test_history_survives_restart() {
    let dir = scratch_dir();
    let (kept, acknowledged) = {
        let mut store = file_store(&dir, EventStoreSettings::default());
        let kept = store.add_conjunction(conjunction(1, 2, 0.5, 40.0));
        let acknowledged = store.add_conjunction(conjunction(3, 4, 8.0, 90.0));
        store.add_conjunction(conjunction(5, 6, 20.0, 200.0));
        store.acknowledge(acknowledged).unwrap();
        store.save_snapshot(Some("before-restart"));
        (kept, acknowledged)
    };
    assert!(dir.join(format!("{STORE_KEY}.json")).exists());

    let mut reloaded = file_store(&dir, EventStoreSettings::default());
    assert_eq!(reloaded.load(), 3);
    assert_eq!(reloaded.active_count(), 2);
    assert_eq!(reloaded.get(kept).map(|e| e.status), Some(EventStatus::Predicted));
    assert_eq!(
        reloaded.get(acknowledged).map(|e| e.status),
        Some(EventStatus::Resolved)
    );

    let snapshot = reloaded.snapshots().next().unwrap();
    assert_eq!(snapshot.name, "before-restart");
    assert_eq!(snapshot.events.len(), 2);
    assert_eq!(snapshot.risk_level, RiskLevel::Critical);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_reload_respects_smaller_capacity() {
    let dir = scratch_dir();
    {
        let mut store = file_store(&dir, EventStoreSettings::default());
        for i in 0..10 {
            store.add_conjunction(conjunction(i, i + 100, 1.0, 60.0));
        }
    }

    let settings = EventStoreSettings {
        history_capacity: 4,
        ..Default::default()
    };
    let mut reloaded = file_store(&dir, settings);
    assert_eq!(reloaded.load(), 4);
    assert_eq!(reloaded.len(), 4);
    // Newest events are kept
    let first = reloaded.history().next().unwrap();
    assert_eq!(first.pair(), (ObjectId(9), ObjectId(109)));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_corrupt_record_starts_empty() {
    let dir = scratch_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{STORE_KEY}.json")), "{ not json").unwrap();

    let mut store = file_store(&dir, EventStoreSettings::default());
    assert_eq!(store.load(), 0);
    assert!(store.is_empty());

    // The next write replaces the unreadable record
    store.add_conjunction(conjunction(1, 2, 3.0, 10.0));
    let mut reloaded = file_store(&dir, EventStoreSettings::default());
    assert_eq!(reloaded.load(), 1);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_exports_parse_back() {
    let mut store = ConjunctionEventStore::default();
    store.add_conjunction(conjunction(1, 2, 0.5, 40.0));
    store.add_conjunction(conjunction(7, 3, 12.0, 90.0));
    store.record_impact(ObjectId(2), ObjectId(1), 41.0);

    let events = parse_json_export(&store.export_json().unwrap()).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].pair(), (ObjectId(3), ObjectId(7)));
    assert_eq!(events[1].status, EventStatus::Resolved);

    let rows = parse_conjunction_csv(&store.export_csv()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].status, EventStatus::Resolved);
    assert_eq!(rows[1].distance_km, 0.0);

    store.clear_history();
    assert!(store.is_empty());
    assert_eq!(parse_conjunction_csv(&store.export_csv()).unwrap().len(), 0);
}
