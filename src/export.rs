//! Outbound data formats.
//!
//! - Flat metric samples (name, value, timestamp, labels) for metrics pipelines
//! - A bounded time-series recorder, one `[[value, timestamp_ms], …]` series
//!   per metric
//! - Delimited conjunction text with a matching parser

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{ConjunctionEvent, EventStatus};
use crate::snapshot::{ObjectSourcePath, Snapshot};
use crate::types::ObjectId;

/// Prefix of every exported metric name.
pub const METRIC_PREFIX: &str = "kessler_";

/// Header row of the delimited conjunction format.
pub const CSV_HEADER: &str = "time,object_a,object_b,distance_km,probability,status";

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing or unexpected header row")]
    Header,

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// One metric value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub timestamp_ms: i64,
    pub labels: BTreeMap<String, String>,
}

/// Every metric of a snapshot as a flat sample list.
pub fn flat_metrics(snapshot: &Snapshot) -> Vec<MetricSample> {
    let timestamp_ms = snapshot.timestamp.timestamp_millis();
    let path = match snapshot.path {
        ObjectSourcePath::Export => "export",
        ObjectSourcePath::RawBuffer => "raw_buffer",
    };
    snapshot
        .metrics
        .samples()
        .into_iter()
        .map(|(name, value)| MetricSample {
            name: format!("{METRIC_PREFIX}{name}"),
            value,
            timestamp_ms,
            labels: BTreeMap::from([("path".to_string(), path.to_string())]),
        })
        .collect()
}

/// Rolling per-metric history for dashboard backends.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeSeriesRecorder {
    capacity: usize,
    series: BTreeMap<String, VecDeque<(f64, i64)>>,
}

impl TimeSeriesRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            series: BTreeMap::new(),
        }
    }

    /// Append every metric of `snapshot`, dropping the oldest points once a
    /// series is full.
    pub fn record(&mut self, snapshot: &Snapshot) {
        for sample in flat_metrics(snapshot) {
            let points = self.series.entry(sample.name).or_default();
            points.push_back((sample.value, sample.timestamp_ms));
            while points.len() > self.capacity {
                points.pop_front();
            }
        }
    }

    pub fn series(&self, name: &str) -> Option<&VecDeque<(f64, i64)>> {
        self.series.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// `{ name: [[value, timestamp_ms], …] }`
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string(&self.series)?)
    }
}

/// One parsed row of the delimited format.
#[derive(Clone, Debug, PartialEq)]
pub struct ConjunctionRow {
    pub time: DateTime<Utc>,
    pub object_a: ObjectId,
    pub object_b: ObjectId,
    pub distance_km: f64,
    pub probability: f64,
    pub status: EventStatus,
}

impl From<&ConjunctionEvent> for ConjunctionRow {
    fn from(e: &ConjunctionEvent) -> Self {
        Self {
            time: e.created_at,
            object_a: e.object_a,
            object_b: e.object_b,
            distance_km: e.miss_distance_km,
            probability: e.probability,
            status: e.status,
        }
    }
}

/// One row per event, header first.
pub fn conjunctions_to_csv<'a>(events: impl IntoIterator<Item = &'a ConjunctionEvent>) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for e in events {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            e.created_at.to_rfc3339(),
            e.object_a.0,
            e.object_b.0,
            e.miss_distance_km,
            e.probability,
            e.status
        ));
    }
    out
}

/// Parse text produced by [`conjunctions_to_csv`]. Blank lines are ignored.
pub fn parse_conjunction_csv(text: &str) -> Result<Vec<ConjunctionRow>, ExportError> {
    let mut lines = text.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.trim() == CSV_HEADER => {}
        _ => return Err(ExportError::Header),
    }

    lines
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(index, l)| parse_row(index + 1, l))
        .collect()
}

fn parse_row(line: usize, text: &str) -> Result<ConjunctionRow, ExportError> {
    let malformed = |reason: String| ExportError::Malformed { line, reason };

    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    let [time, a, b, distance, probability, status] = fields[..] else {
        return Err(malformed(format!("expected 6 fields, found {}", fields.len())));
    };

    Ok(ConjunctionRow {
        time: DateTime::parse_from_rfc3339(time)
            .map_err(|e| malformed(format!("time: {e}")))?
            .with_timezone(&Utc),
        object_a: ObjectId(a.parse().map_err(|e| malformed(format!("object_a: {e}")))?),
        object_b: ObjectId(b.parse().map_err(|e| malformed(format!("object_b: {e}")))?),
        distance_km: distance
            .parse()
            .map_err(|e| malformed(format!("distance_km: {e}")))?,
        probability: probability
            .parse()
            .map_err(|e| malformed(format!("probability: {e}")))?,
        status: status.parse().map_err(malformed)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConjunctionEventStore, NewConjunction};
    use crate::snapshot::SnapshotMetrics;

    fn snapshot_at(ms: i64, tracked: usize) -> Snapshot {
        Snapshot {
            objects: Vec::new(),
            metrics: SnapshotMetrics {
                objects_tracked: tracked,
                ..Default::default()
            },
            conjunctions: Vec::new(),
            alerts: Vec::new(),
            timestamp: DateTime::from_timestamp_millis(ms).unwrap(),
            captured_at: 0.0,
            path: ObjectSourcePath::Export,
        }
    }

    #[test]
    fn test_flat_metrics_are_prefixed_and_labelled() {
        let samples = flat_metrics(&snapshot_at(1_700_000_000_000, 42));
        let tracked = samples
            .iter()
            .find(|s| s.name == "kessler_objects_tracked")
            .unwrap();

        assert_eq!(tracked.value, 42.0);
        assert_eq!(tracked.timestamp_ms, 1_700_000_000_000);
        assert_eq!(tracked.labels["path"], "export");
    }

    #[test]
    fn test_time_series_is_bounded() {
        let mut recorder = TimeSeriesRecorder::new(2);
        for i in 0..3 {
            recorder.record(&snapshot_at(1000 * i, i as usize));
        }

        let series = recorder.series("kessler_objects_tracked").unwrap();
        assert_eq!(series.iter().copied().collect::<Vec<_>>(), vec![(1.0, 1000), (2.0, 2000)]);

        let json = recorder.to_json().unwrap();
        assert!(json.contains("\"kessler_objects_tracked\":[[1.0,1000],[2.0,2000]]"));
    }

    #[test]
    fn test_csv_round_trip() {
        let mut store = ConjunctionEventStore::default();
        for (a, b, d) in [(1, 2, 0.25), (7, 3, 12.5), (4, 9, 3.0)] {
            store.add_conjunction(NewConjunction {
                object_a: ObjectId(a),
                object_b: ObjectId(b),
                miss_distance_km: d,
                probability: 100.0 * (-0.2 * d).exp(),
                severity: 3,
                tca: 20.0,
                sim_time: 0.0,
            });
        }
        let first = store.history().next().unwrap().id;
        store.acknowledge(first).unwrap();

        let rows = parse_conjunction_csv(&store.export_csv()).unwrap();
        let expected: Vec<ConjunctionRow> = store
            .history()
            .map(ConjunctionRow::from)
            .collect();
        let triples = |rows: &[ConjunctionRow]| -> Vec<_> {
            rows.iter()
                .map(|r| ((r.object_a, r.object_b), r.distance_km, r.status))
                .collect()
        };
        assert_eq!(triples(&rows), triples(&expected));
        assert_eq!(rows[0].status, EventStatus::Resolved);
    }

    #[test]
    fn test_csv_errors() {
        assert!(matches!(parse_conjunction_csv("nope"), Err(ExportError::Header)));

        let text = format!("{CSV_HEADER}\n2025-01-01T00:00:00Z,1,2,abc,5,active\n");
        assert!(matches!(
            parse_conjunction_csv(&text),
            Err(ExportError::Malformed { line: 1, .. })
        ));
    }
}
